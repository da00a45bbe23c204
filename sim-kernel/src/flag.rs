//! A single-bit storage element a process can block on.

use sim_lib::sampler::SampleClass;

use crate::ids::{ClockId, ObjectId, ProcessId, StorageId};
use crate::kernel::Kernel;
use crate::storage::Storage;

/// A flag a process can set, clear, and be woken by. Mutating methods
/// take `&mut Kernel` because a set/clear that flips the flag's value
/// activates or deactivates the process [`Flag::set_sensitive`] attached.
pub struct Flag {
    id: StorageId,
    clock: ClockId,
    sensitive: Option<ProcessId>,
    set: bool,
    new: bool,
    updated: bool,
    stalls: u64,
    lastcycle: u64,
    totalsize: u64,
}

impl Flag {
    /// `initial` is staged as a pending write, matching the original's
    /// constructor behavior of registering an update round immediately
    /// when constructed already-set, so the processes sensitive on it
    /// get activated on the very first storage-update pass.
    pub fn new(kernel: &mut Kernel, object: ObjectId, clock: ClockId, initial: bool) -> Self {
        let id = kernel.register_storage(object, clock);
        if initial {
            kernel.activate_storage(id);
        }
        Flag { id, clock, sensitive: None, set: false, new: initial, updated: false, stalls: 0, lastcycle: 0, totalsize: 0 }
    }

    pub fn id(&self) -> StorageId {
        self.id
    }

    pub fn is_set(&self) -> bool {
        self.set
    }

    /// Attaches a process that is woken whenever the flag transitions
    /// from clear to set, and put to sleep when it transitions back.
    pub fn set_sensitive(&mut self, process: ProcessId) {
        self.sensitive = Some(process);
    }

    /// Requests the flag be set. Returns `true` if accepted (idempotent
    /// within a cycle — repeated calls after the first just accumulate a
    /// stall statistic during `Acquire`).
    pub fn set(&mut self, kernel: &mut Kernel) -> bool {
        self.request(kernel, true)
    }

    /// Requests the flag be cleared. See [`Flag::set`].
    pub fn clear(&mut self, kernel: &mut Kernel) -> bool {
        self.request(kernel, false)
    }

    fn request(&mut self, kernel: &mut Kernel, value: bool) -> bool {
        if !self.updated {
            self.new = value;
            self.updated = true;
            kernel.activate_storage(self.id);
            true
        } else {
            if kernel.is_acquiring() {
                self.stalls += 1;
            }
            false
        }
    }

    /// Commits the staged value. Called by the embedder's
    /// [`crate::kernel::Components::update_storage`] implementation when
    /// the kernel reports this flag's [`StorageId`].
    pub fn commit(&mut self, kernel: &mut Kernel, name: &str) {
        if self.new && !self.set {
            if let Some(p) = self.sensitive {
                kernel.activate_process(p);
            }
        } else if self.set && !self.new {
            if let Some(p) = self.sensitive {
                kernel.deactivate_process(p);
            }
        }

        self.set = self.new;
        self.updated = false;

        let cycle = kernel.master_cycle();
        let elapsed = cycle - self.lastcycle;
        self.lastcycle = cycle;
        self.totalsize += (self.set as u64) * elapsed;

        let sampler = kernel.sampler_mut();
        sampler.sample(&format!("{name}.totalsize"), SampleClass::Cumulative, self.totalsize);
        sampler.sample(&format!("{name}.set"), SampleClass::Level, self.set as u64);
        sampler.sample(&format!("{name}.stalls"), SampleClass::Cumulative, self.stalls);
    }
}

impl Storage for Flag {
    fn storage_id(&self) -> StorageId {
        self.id
    }

    fn clock(&self) -> ClockId {
        self.clock
    }
}
