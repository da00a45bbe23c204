use crate::ids::ObjectId;
use crate::kernel::Kernel;
use sim_lib::diag::{DebugMask, DiagContext};

pub(crate) struct ObjectData {
    pub name: String,
    #[allow(dead_code)]
    pub parent: Option<ObjectId>,
    pub fqn: String,
    pub children: Vec<ObjectId>,
}

impl ObjectData {
    pub fn root(name: String) -> Self {
        ObjectData { fqn: name.clone(), name, parent: None, children: Vec::new() }
    }

    pub fn child(name: String, parent: ObjectId, parent_fqn: &str) -> Self {
        let fqn = format!("{parent_fqn}.{name}");
        ObjectData { name, parent: Some(parent), fqn, children: Vec::new() }
    }
}

/// A borrowed view of one object used to satisfy [`DiagContext`] at a
/// `sim_debug_*!` call site, e.g. `sim_debug_deadlock!(kernel.diag(id), ...)`.
pub struct ObjectDiag<'k> {
    pub(crate) kernel: &'k Kernel,
    pub(crate) object: ObjectId,
}

impl<'k> DiagContext for ObjectDiag<'k> {
    fn master_cycle(&self) -> u64 {
        self.kernel.master_cycle()
    }

    fn fqn(&self) -> &str {
        self.kernel.object_fqn(self.object)
    }

    fn active_process_name(&self) -> Option<&str> {
        self.kernel.active_process_name()
    }

    fn debug_mask(&self) -> DebugMask {
        self.kernel.debug_mode()
    }
}
