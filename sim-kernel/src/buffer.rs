//! A bounded FIFO storage queue.

use std::collections::VecDeque;

use sim_lib::sampler::SampleClass;

use crate::ids::{ClockId, ObjectId, ProcessId, StorageId};
use crate::kernel::Kernel;
use crate::storage::Storage;

/// In hardware, supporting more than a handful of simultaneous pushes
/// per cycle stops being realistic; this caps `max_pushes` the same way
/// the original does.
pub const MAX_PUSHES: usize = 4;

/// Pass as `max_size` for an unbounded buffer.
pub const INFINITE: usize = usize::MAX;

pub struct Buffer<T> {
    id: StorageId,
    clock: ClockId,
    sensitive: Option<ProcessId>,
    max_size: usize,
    max_pushes: usize,
    data: VecDeque<T>,
    pending: Vec<T>,
    popped: bool,
    stalls: u64,
    lastcycle: u64,
    totalsize: u64,
    maxeffsize: usize,
}

impl<T> Buffer<T> {
    pub fn new(kernel: &mut Kernel, object: ObjectId, clock: ClockId, max_size: usize, max_pushes: usize) -> Self {
        assert!(max_pushes <= MAX_PUSHES, "max_pushes exceeds MAX_PUSHES");
        let id = kernel.register_storage(object, clock);
        Buffer {
            id,
            clock,
            sensitive: None,
            max_size,
            max_pushes: max_pushes.max(1),
            data: VecDeque::new(),
            pending: Vec::new(),
            popped: false,
            stalls: 0,
            lastcycle: 0,
            totalsize: 0,
            maxeffsize: 0,
        }
    }

    pub fn id(&self) -> StorageId {
        self.id
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn front(&self) -> Option<&T> {
        self.data.front()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.data.iter()
    }

    /// Attaches a process woken whenever the buffer becomes non-empty,
    /// and put to sleep when it becomes empty.
    pub fn set_sensitive(&mut self, process: ProcessId) {
        self.sensitive = Some(process);
    }

    fn check_clocks(&self, kernel: &Kernel) {
        if let Some(p) = kernel.active_process() {
            debug_assert_eq!(
                kernel.process_clock(p),
                self.clock,
                "storage accessed from a process outside its clock domain without cross-domain support"
            );
        }
    }

    /// Stages a pop of the front element. Only one pop per cycle is
    /// allowed; the element is actually removed during the storage
    /// update round.
    pub fn pop(&mut self, kernel: &mut Kernel) {
        self.check_clocks(kernel);
        debug_assert!(!self.popped, "Pop() called twice in the same cycle");
        self.popped = true;
        kernel.activate_storage(self.id);
    }

    /// Stages a push of `item`, succeeding only if at least `min_space`
    /// slots remain free (after accounting for pushes already staged
    /// this cycle). `min_space` lets a pusher reserve room for a
    /// multi-element write ahead of time.
    pub fn push(&mut self, kernel: &mut Kernel, item: T, min_space: usize) -> bool {
        debug_assert!(min_space >= 1);

        if self.max_pushes != 1 {
            // Multiple pushes per cycle are only safe when buffer and
            // pusher share a clock domain.
            self.check_clocks(kernel);
            debug_assert!(self.pending.len() < self.max_pushes);
        } else if self.pending.len() == 1 {
            // Already pushed this cycle; this could be a genuine bug or
            // a cross-domain pusher racing the buffer's own update.
            return false;
        }

        let fits = self.max_size == INFINITE || self.data.len() + self.pending.len() + min_space <= self.max_size;
        if fits {
            if self.pending.is_empty() {
                kernel.activate_storage(self.id);
            }
            self.pending.push(item);
            return true;
        }

        if kernel.is_acquiring() {
            self.stalls += 1;
        }
        false
    }

    /// Commits staged pushes and the staged pop, in that order, matching
    /// the original's update ordering. Called by the embedder's
    /// [`crate::kernel::Components::update_storage`] implementation.
    pub fn commit(&mut self, kernel: &mut Kernel, name: &str) {
        if !self.pending.is_empty() {
            if self.data.is_empty() {
                if let Some(p) = self.sensitive {
                    kernel.activate_process(p);
                }
            }
            self.data.extend(self.pending.drain(..));
        }

        if self.popped {
            self.data.pop_front();
            if self.data.is_empty() {
                if let Some(p) = self.sensitive {
                    kernel.deactivate_process(p);
                }
            }
        }
        self.popped = false;

        let cycle = kernel.master_cycle();
        let elapsed = cycle - self.lastcycle;
        self.lastcycle = cycle;
        let cursize = self.data.len();
        self.totalsize += (cursize as u64) * elapsed;
        self.maxeffsize = self.maxeffsize.max(cursize);

        let sampler = kernel.sampler_mut();
        sampler.sample(&format!("{name}.totalsize"), SampleClass::Cumulative, self.totalsize);
        sampler.sample(&format!("{name}.cursize"), SampleClass::Level, cursize as u64);
        sampler.sample(&format!("{name}.maxeffsize"), SampleClass::Watermark, self.maxeffsize as u64);
        sampler.sample(&format!("{name}.stalls"), SampleClass::Cumulative, self.stalls);
    }
}

impl<T> Storage for Buffer<T> {
    fn storage_id(&self) -> StorageId {
        self.id
    }

    fn clock(&self) -> ClockId {
        self.clock
    }
}
