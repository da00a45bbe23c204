use crate::ids::{ClockId, ObjectId};
use crate::trace::{StorageTrace, StorageTraceSet};

/// Run state of a process, as last observed by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// The component has no work.
    Idle,
    /// The component has been activated but has not run this cycle yet.
    Active,
    /// The component is currently being run (set for the duration of its
    /// own `on_cycle` call, useful for re-entrancy assertions).
    Running,
    /// The component has work but could not make progress for an entire
    /// cycle in which every other process also failed to progress.
    Deadlock,
    /// The simulation has been aborted; no further processes will run.
    Aborted,
}

/// Outcome of a single process invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessResult {
    /// The operation could not make progress and must be retried.
    Failed,
    /// The operation made progress but must still be retried (e.g. a
    /// multi-cycle operation reporting intermediate progress).
    Delayed,
    /// The operation made progress and need not be retried this cycle.
    Success,
}

pub(crate) struct ProcessData {
    pub name: String,
    #[allow(dead_code)]
    pub object: ObjectId,
    pub clock: ClockId,
    pub state: ProcessState,
    pub activations: u64,
    pub stalls: u64,
    #[allow(dead_code)]
    pub queued: bool,
    #[allow(dead_code)]
    pub declared_traces: StorageTraceSet,
    #[allow(dead_code)]
    pub current_trace: StorageTrace,
}

impl ProcessData {
    pub fn new(name: String, object: ObjectId, clock: ClockId) -> Self {
        ProcessData {
            name,
            object,
            clock,
            state: ProcessState::Idle,
            activations: 0,
            stalls: 0,
            queued: false,
            declared_traces: StorageTraceSet::empty(),
            current_trace: StorageTrace::empty(),
        }
    }
}
