use crate::ids::{ClockId, ObjectId};

pub(crate) struct StorageData {
    #[allow(dead_code)]
    pub object: ObjectId,
    pub clock: ClockId,
    pub queued: bool,
}

impl StorageData {
    pub fn new(object: ObjectId, clock: ClockId) -> Self {
        StorageData { object, clock, queued: false }
    }
}

/// Implemented by every storage element (`Flag`, `Buffer<T>`, and
/// component-defined storages) so kernel-level code — trace bookkeeping,
/// deadlock reports — can refer to them uniformly without knowing their
/// concrete update logic.
pub trait Storage {
    fn storage_id(&self) -> crate::ids::StorageId;
    fn clock(&self) -> ClockId;
}
