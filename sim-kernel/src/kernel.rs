//! The scheduler. [`Kernel`] owns every piece of bookkeeping needed to
//! decide, cycle by cycle, which clocks tick and which processes,
//! arbitrators and storages run on them. It owns no component logic of
//! its own: the actual behavior behind a process, an arbitrator's
//! `OnArbitrate`, or a storage's commit is supplied by the embedder
//! through the [`Components`] trait, invoked at the right point in each
//! phase. This split exists because the original's scheduling lists are
//! intrusive (`Process*`/`Storage*` chained through their own fields) —
//! a shape that requires the scheduler and the scheduled objects to
//! alias each other, which safe Rust does not allow. Here the scheduler
//! holds only identifiers; the behavior lives wherever the embedder
//! wants it to.

use std::collections::HashSet;

use sim_lib::diag::DebugMask;
use sim_lib::sampler::{NullSampler, Sampler};

use crate::arena::Arena;
use crate::clock::{lcm, ClockData, CycleNo, Frequency, INFINITE_CYCLES};
use crate::error::{SimResult, SimulationException, SimulationExceptionKind};
use crate::ids::{ArbitratorId, ClockId, ObjectId, ProcessId, StorageId};
use crate::object::ObjectData;
use crate::process::{ProcessData, ProcessResult, ProcessState};
use crate::storage::StorageData;

/// Sub-cycle phase, mirroring the original's three-phase commit
/// protocol: requests are staged in `Acquire`, a process that staged
/// successfully is asked to confirm in `Check`, and if it confirms, to
/// make the change permanent in `Commit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Acquire,
    Check,
    Commit,
}

/// Outcome of [`Kernel::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No process had anything to do; the simulation has reached a
    /// fixed point with no process left in [`ProcessState::Deadlock`].
    Idle,
    /// The cycle that ended the run produced no commits or storage
    /// updates, and at least one process is stuck in
    /// [`ProcessState::Deadlock`]. Call [`Kernel::deadlocked_processes`]
    /// for the stalled set.
    Deadlock,
    /// Simulation stopped after running the requested number of cycles.
    Running,
    /// [`Kernel::abort`] was called during the run.
    Aborted,
}

pub(crate) struct ArbitratorData {
    pub clock: ClockId,
    pub queued: bool,
}

/// Supplies the behavior the kernel has no business owning itself.
/// Implemented once by whatever embeds the kernel (typically a single
/// struct holding every component in the simulated system).
pub trait Components {
    /// Run one process for one phase of one cycle. `kernel.cycle_phase()`
    /// tells the implementation which of `Acquire`/`Check`/`Commit` this
    /// is; `Acquire` is the only phase where returning [`ProcessResult::Failed`]
    /// is not a bug (the process simply had nothing to do yet).
    fn run_process(&mut self, kernel: &mut Kernel, process: ProcessId) -> ProcessResult;

    /// Run one arbitrator's selection logic for this cycle.
    fn arbitrate(&mut self, kernel: &mut Kernel, arbitrator: ArbitratorId);

    /// Commit one storage's staged changes for this cycle.
    fn update_storage(&mut self, kernel: &mut Kernel, storage: StorageId);
}

pub struct Kernel {
    objects: Arena<ObjectData>,
    clocks: Arena<ClockData>,
    processes: Arena<ProcessData>,
    storages: Arena<StorageData>,
    arbitrators: Arena<ArbitratorData>,

    /// Clocks with pending work, sorted ascending by `next_tick`.
    active_clocks: Vec<ClockId>,

    master_cycle: CycleNo,
    master_frequency: Frequency,
    last_suspend: CycleNo,

    active_clock: Option<ClockId>,
    active_process: Option<ProcessId>,
    phase: CyclePhase,

    debug_mode: DebugMask,
    aborted: bool,
    suspended: bool,
    pending_exception: Option<SimulationException>,

    sampler: Box<dyn Sampler>,
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    pub fn new() -> Self {
        Kernel {
            objects: Arena::new(),
            clocks: Arena::new(),
            processes: Arena::new(),
            storages: Arena::new(),
            arbitrators: Arena::new(),
            active_clocks: Vec::new(),
            master_cycle: 0,
            master_frequency: 0,
            last_suspend: CycleNo::MAX,
            active_clock: None,
            active_process: None,
            phase: CyclePhase::Commit,
            debug_mode: DebugMask::empty(),
            aborted: false,
            suspended: false,
            pending_exception: None,
            sampler: Box::new(NullSampler),
        }
    }

    pub fn set_sampler(&mut self, sampler: Box<dyn Sampler>) {
        self.sampler = sampler;
    }

    pub fn sampler_mut(&mut self) -> &mut dyn Sampler {
        self.sampler.as_mut()
    }

    // --- object tree -----------------------------------------------

    pub fn create_root_object(&mut self, name: impl Into<String>) -> ObjectId {
        ObjectId(self.objects.insert(ObjectData::root(name.into())))
    }

    pub fn create_object(&mut self, name: impl Into<String>, parent: ObjectId) -> ObjectId {
        let parent_fqn = self.object_fqn(parent).to_string();
        let child = ObjectId(self.objects.insert(ObjectData::child(name.into(), parent, &parent_fqn)));
        self.objects.get_mut(parent.0).expect("unknown object").children.push(child);
        child
    }

    pub fn object_name(&self, object: ObjectId) -> &str {
        &self.objects.get(object.0).expect("unknown object").name
    }

    pub fn object_fqn(&self, object: ObjectId) -> &str {
        &self.objects.get(object.0).expect("unknown object").fqn
    }

    /// The object tree is walkable downward from any node; there is no
    /// destruction API yet, so this list only ever grows.
    pub fn object_children(&self, object: ObjectId) -> &[ObjectId] {
        &self.objects.get(object.0).expect("unknown object").children
    }

    /// A view of `object` usable as the context argument to a
    /// `sim_debug_*!` call site.
    pub fn diag(&self, object: ObjectId) -> crate::object::ObjectDiag<'_> {
        crate::object::ObjectDiag { kernel: self, object }
    }

    // --- clocks ------------------------------------------------------

    /// Creates a clock at the given frequency (in the same units
    /// throughout, e.g. MHz), recomputing the master frequency as the
    /// LCM of every clock's frequency so each clock's period divides it
    /// evenly. Must be called before the simulation starts stepping.
    pub fn create_clock(&mut self, frequency: Frequency) -> ClockId {
        assert_eq!(self.master_cycle, 0, "clocks must be created before the simulation starts");
        let frequency = frequency.max(1);

        for (id, data) in self.clocks.iter() {
            if data.frequency == frequency {
                return ClockId(id);
            }
        }

        let mut master_freq = self.clocks.iter().fold(1u64, |acc, (_, c)| lcm(acc, c.frequency));
        master_freq = lcm(master_freq, frequency);

        if self.master_frequency != master_freq {
            self.master_frequency = master_freq;
            for (_, data) in self.clocks.iter_mut() {
                debug_assert_eq!(self.master_frequency % data.frequency, 0);
                data.period = self.master_frequency / data.frequency;
            }
        }
        debug_assert_eq!(self.master_frequency % frequency, 0);

        let period = self.master_frequency / frequency;
        ClockId(self.clocks.insert(ClockData::new(frequency, period)))
    }

    pub fn master_frequency(&self) -> Frequency {
        self.master_frequency
    }

    pub fn clock_frequency(&self, clock: ClockId) -> Frequency {
        self.clocks.get(clock.0).expect("unknown clock").frequency
    }

    /// Queues `clock` to run at its next tick, unless it is already
    /// queued. Called whenever a process, arbitrator or storage on that
    /// clock is activated.
    fn activate_clock(&mut self, clock: ClockId) {
        let data = self.clocks.get_mut(clock.0).expect("unknown clock");
        if data.queued {
            return;
        }
        data.queued = true;
        data.next_tick = (self.master_cycle / data.period) * data.period + data.period;
        let next_tick = data.next_tick;

        let pos = self.active_clocks.partition_point(|&c| self.clocks.get(c.0).unwrap().next_tick <= next_tick);
        self.active_clocks.insert(pos, clock);
    }

    // --- processes -----------------------------------------------------

    pub fn register_process(&mut self, name: impl Into<String>, object: ObjectId, clock: ClockId) -> ProcessId {
        ProcessId(self.processes.insert(ProcessData::new(name.into(), object, clock)))
    }

    pub fn process_name(&self, process: ProcessId) -> &str {
        &self.processes.get(process.0).expect("unknown process").name
    }

    pub(crate) fn process_clock(&self, process: ProcessId) -> ClockId {
        self.processes.get(process.0).expect("unknown process").clock
    }

    /// Activates `process`, scheduling its clock if needed. A process can
    /// be activated by more than one source (e.g. two storages it is
    /// sensitive on both becoming ready); it only actually starts running
    /// once, and stays active until every activation is matched by a
    /// [`Kernel::deactivate_process`].
    pub fn activate_process(&mut self, process: ProcessId) {
        let data = self.processes.get_mut(process.0).expect("unknown process");
        let clock = data.clock;
        data.activations += 1;
        if data.activations == 1 {
            data.state = ProcessState::Active;
            self.clocks.get_mut(clock.0).expect("unknown clock").active_processes.push(process);
            self.activate_clock(clock);
        }
    }

    pub fn deactivate_process(&mut self, process: ProcessId) {
        let data = self.processes.get_mut(process.0).expect("unknown process");
        debug_assert!(data.activations > 0, "deactivating a process with no outstanding activation");
        data.activations -= 1;
        if data.activations == 0 {
            data.state = ProcessState::Idle;
            let clock = data.clock;
            self.clocks.get_mut(clock.0).expect("unknown clock").active_processes.retain(|&p| p != process);
        }
    }

    pub fn active_process(&self) -> Option<ProcessId> {
        self.active_process
    }

    pub fn active_process_name(&self) -> Option<&str> {
        self.active_process.map(|p| self.process_name(p))
    }

    /// `process`'s state as of the last cycle it was scheduled on.
    pub fn process_state(&self, process: ProcessId) -> ProcessState {
        self.processes.get(process.0).expect("unknown process").state
    }

    /// Number of `Acquire` cycles `process` has failed over its lifetime.
    pub fn process_stalls(&self, process: ProcessId) -> u64 {
        self.processes.get(process.0).expect("unknown process").stalls
    }

    /// Every process currently stuck in [`ProcessState::Deadlock`], i.e.
    /// still active but unable to make progress as of the last cycle run.
    /// Non-empty exactly when the preceding [`Kernel::step`] returned
    /// [`RunState::Deadlock`].
    pub fn deadlocked_processes(&self) -> Vec<ProcessId> {
        self.processes.iter().filter(|(_, data)| data.state == ProcessState::Deadlock).map(|(idx, _)| ProcessId(idx)).collect()
    }

    // --- storages ------------------------------------------------------

    pub fn register_storage(&mut self, object: ObjectId, clock: ClockId) -> StorageId {
        StorageId(self.storages.insert(StorageData::new(object, clock)))
    }

    /// Queues `storage` for an update at the end of this cycle, unless it
    /// is already queued. Returns whether it was newly queued (the
    /// original's `RegisterUpdate` / `MarkUpdate` idiom relies on this to
    /// avoid registering a storage twice per cycle).
    pub fn activate_storage(&mut self, storage: StorageId) -> bool {
        let data = self.storages.get_mut(storage.0).expect("unknown storage");
        if data.queued {
            return false;
        }
        data.queued = true;
        let clock = data.clock;
        let clock_data = self.clocks.get_mut(clock.0).expect("unknown clock");
        clock_data.active_storages.push(storage);
        self.activate_clock(clock);
        true
    }

    // --- arbitrators -----------------------------------------------------

    pub fn register_arbitrator(&mut self, clock: ClockId) -> ArbitratorId {
        ArbitratorId(self.arbitrators.insert(ArbitratorData { clock, queued: false }))
    }

    /// Requests that `arbitrator`'s `OnArbitrate` run this cycle. Safe to
    /// call more than once per cycle; only the first call schedules it.
    pub fn request_arbitration(&mut self, arbitrator: ArbitratorId) {
        let data = self.arbitrators.get_mut(arbitrator.0).expect("unknown arbitrator");
        if data.queued {
            return;
        }
        data.queued = true;
        let clock = data.clock;
        let clock_data = self.clocks.get_mut(clock.0).expect("unknown clock");
        clock_data.active_arbitrators.push(arbitrator);
        self.activate_clock(clock);
    }

    // --- accessors used by diagnostics and component logic --------------

    pub fn master_cycle(&self) -> CycleNo {
        self.master_cycle
    }

    pub fn cycle_phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn is_acquiring(&self) -> bool {
        self.phase == CyclePhase::Acquire
    }

    pub fn active_clock(&self) -> Option<ClockId> {
        self.active_clock
    }

    pub fn debug_mode(&self) -> DebugMask {
        self.debug_mode
    }

    pub fn set_debug_mode(&mut self, mode: DebugMask) {
        self.debug_mode = mode;
    }

    pub fn toggle_debug_mode(&mut self, mode: DebugMask) {
        self.debug_mode.toggle(mode);
    }

    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn stop(&mut self) {
        self.suspended = true;
    }

    /// Raises an exception that unwinds the current [`Kernel::step`]
    /// call, attaching the cycle and active process at the point of the
    /// call. Only the first exception raised in a given `step` survives;
    /// later ones are dropped, matching the original's "first exception
    /// wins" unwind semantics.
    pub fn raise(&mut self, kind: SimulationExceptionKind) {
        if self.pending_exception.is_none() {
            let process = self.active_process_name().map(str::to_string);
            self.pending_exception = Some(SimulationException { kind, master_cycle: self.master_cycle, process });
        }
        self.aborted = true;
    }

    /// Convenience wrapper for the case spec'd out as its own variant:
    /// the simulated program itself asked to stop, not a kernel-detected
    /// fault.
    pub fn terminate_program(&mut self, exit_code: i32) {
        self.raise(SimulationExceptionKind::ProgramTermination { exit_code });
    }

    // --- the main loop ---------------------------------------------------

    /// Advances the simulation by up to `cycles` master cycles, or
    /// until it deadlocks / is aborted / is stopped. Pass
    /// [`crate::clock::INFINITE_CYCLES`] to run until one of those
    /// conditions occurs.
    ///
    /// Returns `Err` only when a [`SimulationException`] was raised via
    /// [`Kernel::raise`]/[`Kernel::terminate_program`] during the run;
    /// every other outcome, including a detected deadlock, comes back as
    /// `Ok(RunState)` since those are expected fixed points of the
    /// scheduling protocol, not kernel-internal faults.
    pub fn step(&mut self, cycles: CycleNo, components: &mut impl Components) -> SimResult<RunState> {
        let endcycle = if cycles == INFINITE_CYCLES { cycles } else { self.master_cycle + cycles };

        if self.master_cycle == 0 {
            // Effect any initialization writes so the processes they
            // activate are scheduled before the first real cycle.
            self.update_storages(components);
        }

        if let Some(&first) = self.active_clocks.first() {
            self.master_cycle = self.clocks.get(first.0).unwrap().next_tick;
        }

        self.aborted = false;
        self.suspended = false;
        let mut idle = false;

        while !self.aborted
            && (!self.suspended || self.last_suspend == self.master_cycle)
            && !idle
            && (endcycle == INFINITE_CYCLES || self.master_cycle < endcycle)
        {
            idle = true;

            self.run_acquire_phase(components);
            self.run_arbitrate_phase(components);
            let committed = self.run_check_commit_phase(components);
            if committed {
                idle = false;
            }

            if self.update_storages(components) {
                idle = false;
            }

            if idle {
                idle = !self.active_clocks.iter().any(|&c| self.clocks.get(c.0).unwrap().next_tick > self.master_cycle);
            }

            if !idle {
                self.advance_clocks();
            }
        }

        self.master_cycle = self.master_cycle.min(endcycle);

        if let Some(exception) = self.pending_exception.take() {
            return Err(exception);
        }
        if self.aborted {
            return Ok(RunState::Aborted);
        }
        if self.suspended {
            self.last_suspend = self.master_cycle;
            return Ok(RunState::Aborted);
        }
        if idle {
            if self.deadlocked_processes().is_empty() {
                Ok(RunState::Idle)
            } else {
                Ok(RunState::Deadlock)
            }
        } else {
            Ok(RunState::Running)
        }
    }

    fn clocks_ticking_now(&self) -> Vec<ClockId> {
        self.active_clocks.iter().copied().take_while(|&c| self.clocks.get(c.0).unwrap().next_tick == self.master_cycle).collect()
    }

    fn run_acquire_phase(&mut self, components: &mut impl Components) {
        self.phase = CyclePhase::Acquire;
        for clock in self.clocks_ticking_now() {
            self.active_clock = Some(clock);
            let processes = self.clocks.get(clock.0).unwrap().active_processes.clone();
            for process in processes {
                self.active_process = Some(process);
                let result = components.run_process(self, process);
                let data = self.processes.get_mut(process.0).unwrap();
                match result {
                    ProcessResult::Success | ProcessResult::Delayed => data.state = ProcessState::Running,
                    ProcessResult::Failed => {
                        data.state = ProcessState::Deadlock;
                        data.stalls += 1;
                    }
                }
            }
        }
        self.active_process = None;
    }

    fn run_arbitrate_phase(&mut self, components: &mut impl Components) {
        for clock in self.clocks_ticking_now() {
            self.active_clock = Some(clock);
            let arbitrators = std::mem::take(&mut self.clocks.get_mut(clock.0).unwrap().active_arbitrators);
            for arbitrator in &arbitrators {
                components.arbitrate(self, *arbitrator);
                self.arbitrators.get_mut(arbitrator.0).unwrap().queued = false;
            }
        }
    }

    /// Runs `Check` then, for processes that pass, `Commit`. Returns
    /// whether any process actually committed (i.e. the cycle was not
    /// idle because of process activity).
    fn run_check_commit_phase(&mut self, components: &mut impl Components) -> bool {
        let mut did_something = false;
        for clock in self.clocks_ticking_now() {
            self.active_clock = Some(clock);
            let processes = self.clocks.get(clock.0).unwrap().active_processes.clone();
            for process in processes {
                if self.processes.get(process.0).unwrap().state == ProcessState::Deadlock {
                    continue;
                }
                self.active_process = Some(process);
                self.phase = CyclePhase::Check;
                let result = components.run_process(self, process);
                match result {
                    ProcessResult::Success | ProcessResult::Delayed => {
                        self.phase = CyclePhase::Commit;
                        let commit_result = components.run_process(self, process);
                        debug_assert!(!matches!(commit_result, ProcessResult::Failed), "Commit cannot fail after a successful Check");
                        self.processes.get_mut(process.0).unwrap().state = ProcessState::Running;
                        did_something = true;
                    }
                    ProcessResult::Failed => {
                        self.processes.get_mut(process.0).unwrap().state = ProcessState::Deadlock;
                    }
                }
            }
        }
        self.active_process = None;
        did_something
    }

    fn update_storages(&mut self, components: &mut impl Components) -> bool {
        let mut updated = false;
        for clock in self.clocks_ticking_now() {
            let storages = std::mem::take(&mut self.clocks.get_mut(clock.0).unwrap().active_storages);
            for storage in &storages {
                components.update_storage(self, *storage);
                self.storages.get_mut(storage.0).unwrap().queued = false;
                updated = true;
            }
        }
        updated
    }

    fn advance_clocks(&mut self) {
        let ticking: HashSet<ClockId> = self.clocks_ticking_now().into_iter().collect();
        self.active_clocks.retain(|c| !ticking.contains(c));

        for clock in ticking {
            let data = self.clocks.get_mut(clock.0).unwrap();
            data.queued = false;
            let still_active = !data.active_processes.is_empty() || !data.active_storages.is_empty();
            if still_active {
                self.activate_clock(clock);
            }
        }

        if let Some(&first) = self.active_clocks.first() {
            self.master_cycle = self.clocks.get(first.0).unwrap().next_tick;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessResult;

    struct CountingComponents {
        acquire_calls: u32,
        max_calls: u32,
    }

    impl Components for CountingComponents {
        fn run_process(&mut self, kernel: &mut Kernel, process: ProcessId) -> ProcessResult {
            match kernel.cycle_phase() {
                CyclePhase::Acquire => {
                    self.acquire_calls += 1;
                    if self.acquire_calls >= self.max_calls {
                        kernel.deactivate_process(process);
                    }
                    ProcessResult::Success
                }
                _ => ProcessResult::Success,
            }
        }

        fn arbitrate(&mut self, _kernel: &mut Kernel, _arbitrator: ArbitratorId) {}
        fn update_storage(&mut self, _kernel: &mut Kernel, _storage: StorageId) {}
    }

    #[test]
    fn a_process_with_no_more_work_goes_idle() {
        let mut kernel = Kernel::new();
        let root = kernel.create_root_object("sys");
        let clock = kernel.create_clock(100);
        let process = kernel.register_process("p", root, clock);
        kernel.activate_process(process);

        let mut components = CountingComponents { acquire_calls: 0, max_calls: 3 };
        let state = kernel.step(INFINITE_CYCLES, &mut components).unwrap();
        assert_eq!(state, RunState::Idle);
        assert_eq!(components.acquire_calls, 3);
    }

    #[test]
    fn a_process_that_never_progresses_is_reported_as_deadlocked() {
        struct StuckForever;
        impl Components for StuckForever {
            fn run_process(&mut self, kernel: &mut Kernel, _process: ProcessId) -> ProcessResult {
                match kernel.cycle_phase() {
                    CyclePhase::Acquire => ProcessResult::Failed,
                    _ => ProcessResult::Success,
                }
            }
            fn arbitrate(&mut self, _kernel: &mut Kernel, _arbitrator: ArbitratorId) {}
            fn update_storage(&mut self, _kernel: &mut Kernel, _storage: StorageId) {}
        }

        let mut kernel = Kernel::new();
        let root = kernel.create_root_object("sys");
        let clock = kernel.create_clock(100);
        let process = kernel.register_process("p", root, clock);
        kernel.activate_process(process);

        let state = kernel.step(INFINITE_CYCLES, &mut StuckForever).unwrap();
        assert_eq!(state, RunState::Deadlock);
        assert_eq!(kernel.deadlocked_processes(), vec![process]);
    }

    #[test]
    fn create_clock_recomputes_master_frequency_as_lcm() {
        let mut kernel = Kernel::new();
        kernel.create_clock(300);
        kernel.create_clock(400);
        assert_eq!(kernel.master_frequency(), 1200);
    }

    #[test]
    fn abort_stops_the_run_immediately() {
        struct Loud;
        impl Components for Loud {
            fn run_process(&mut self, kernel: &mut Kernel, _process: ProcessId) -> ProcessResult {
                kernel.abort();
                ProcessResult::Success
            }
            fn arbitrate(&mut self, _kernel: &mut Kernel, _arbitrator: ArbitratorId) {}
            fn update_storage(&mut self, _kernel: &mut Kernel, _storage: StorageId) {}
        }

        let mut kernel = Kernel::new();
        let root = kernel.create_root_object("sys");
        let clock = kernel.create_clock(100);
        let process = kernel.register_process("p", root, clock);
        kernel.activate_process(process);

        let state = kernel.step(INFINITE_CYCLES, &mut Loud).unwrap();
        assert_eq!(state, RunState::Aborted);
    }

    #[test]
    fn raising_an_exception_unwinds_step_as_an_error() {
        struct Exploding;
        impl Components for Exploding {
            fn run_process(&mut self, kernel: &mut Kernel, _process: ProcessId) -> ProcessResult {
                kernel.terminate_program(0);
                ProcessResult::Success
            }
            fn arbitrate(&mut self, _kernel: &mut Kernel, _arbitrator: ArbitratorId) {}
            fn update_storage(&mut self, _kernel: &mut Kernel, _storage: StorageId) {}
        }

        let mut kernel = Kernel::new();
        let root = kernel.create_root_object("sys");
        let clock = kernel.create_clock(100);
        let process = kernel.register_process("p", root, clock);
        kernel.activate_process(process);

        let err = kernel.step(INFINITE_CYCLES, &mut Exploding).unwrap_err();
        assert_eq!(err.kind, crate::error::SimulationExceptionKind::ProgramTermination { exit_code: 0 });
        assert_eq!(err.master_cycle, 1);
        assert_eq!(err.process.as_deref(), Some("p"));
    }

    #[test]
    fn object_children_tracks_the_tree() {
        let mut kernel = Kernel::new();
        let root = kernel.create_root_object("sys");
        let a = kernel.create_object("a", root);
        let b = kernel.create_object("b", root);
        assert_eq!(kernel.object_children(root).to_vec(), vec![a, b]);
        assert!(kernel.object_children(a).is_empty());
    }
}
