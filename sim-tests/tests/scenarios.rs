//! End-to-end scenarios driven through whole `Kernel::step` runs, the way
//! an embedder exercises the kernel rather than any single primitive in
//! isolation.

use std::cell::RefCell;
use std::rc::Rc;

use sim_kernel::interconnect::{Interconnect, ReceiverEndpoint, SenderKey, SourceBuffering, WireNet};
use sim_kernel::ports::{ArbitratedService, CyclicArbitratedPort, PriorityArbitratedPort};
use sim_kernel::trace::StorageTraceSet;
use sim_kernel::{ArbitratorId, Buffer, Components, CyclePhase, Flag, Kernel, ProcessId, ProcessResult, RunState, StorageId, INFINITE_CYCLES};

// --------------------------------------------------------------------
// Scenario 1: producer/consumer on a shared clock, buffer size 2.
// --------------------------------------------------------------------

struct ProducerConsumer {
    buffer: Buffer<u32>,
    producer: ProcessId,
    #[allow(dead_code)]
    consumer: ProcessId,
    next_value: u32,
    producer_stalls: u32,
    consumer_tick: u32,
    consumed: Vec<u32>,
}

impl Components for ProducerConsumer {
    fn run_process(&mut self, kernel: &mut Kernel, process: ProcessId) -> ProcessResult {
        if kernel.cycle_phase() != CyclePhase::Acquire {
            return ProcessResult::Success;
        }
        if process == self.producer {
            if self.next_value >= 5 {
                kernel.deactivate_process(process);
                return ProcessResult::Success;
            }
            if self.buffer.push(kernel, self.next_value, 1) {
                self.next_value += 1;
                ProcessResult::Success
            } else {
                self.producer_stalls += 1;
                ProcessResult::Failed
            }
        } else {
            self.consumer_tick += 1;
            if self.consumer_tick < 5 {
                // Gives the producer a head start so the buffer actually
                // fills up before anyone drains it.
                return ProcessResult::Success;
            }
            match self.buffer.front().copied() {
                Some(v) => {
                    self.consumed.push(v);
                    self.buffer.pop(kernel);
                    if self.consumed.len() == 5 {
                        kernel.deactivate_process(process);
                    }
                    ProcessResult::Success
                }
                None => ProcessResult::Success,
            }
        }
    }

    fn arbitrate(&mut self, _kernel: &mut Kernel, _arbitrator: ArbitratorId) {}

    fn update_storage(&mut self, kernel: &mut Kernel, storage: StorageId) {
        if storage == self.buffer.id() {
            self.buffer.commit(kernel, "pc");
        }
    }
}

#[test]
fn producer_consumer_preserves_order_and_stalls_while_the_buffer_is_full() {
    let mut kernel = Kernel::new();
    let root = kernel.create_root_object("sys");
    let clock = kernel.create_clock(100);
    let buffer = Buffer::new(&mut kernel, root, clock, 2, 1);
    let producer = kernel.register_process("producer", root, clock);
    let consumer = kernel.register_process("consumer", root, clock);
    kernel.activate_process(producer);
    kernel.activate_process(consumer);

    let mut components =
        ProducerConsumer { buffer, producer, consumer, next_value: 0, producer_stalls: 0, consumer_tick: 0, consumed: Vec::new() };
    let state = kernel.step(INFINITE_CYCLES, &mut components).unwrap();

    assert_eq!(state, RunState::Idle);
    assert_eq!(components.consumed, vec![0, 1, 2, 3, 4]);
    assert_eq!(components.producer_stalls, 3);
}

// --------------------------------------------------------------------
// Scenario 2: a process sensitive on a flag wakes on the rising edge and
// sleeps on the falling edge.
// --------------------------------------------------------------------

struct FlagEdge {
    flag: Flag,
    setter: ProcessId,
    #[allow(dead_code)]
    observer: ProcessId,
    observed_cycles: Vec<u64>,
}

impl Components for FlagEdge {
    fn run_process(&mut self, kernel: &mut Kernel, process: ProcessId) -> ProcessResult {
        if kernel.cycle_phase() != CyclePhase::Acquire {
            return ProcessResult::Success;
        }
        if process == self.setter {
            match kernel.master_cycle() {
                10 => {
                    self.flag.set(kernel);
                }
                15 => {
                    self.flag.clear(kernel);
                }
                16 => kernel.deactivate_process(process),
                _ => {}
            }
            ProcessResult::Success
        } else {
            self.observed_cycles.push(kernel.master_cycle());
            ProcessResult::Success
        }
    }

    fn arbitrate(&mut self, _kernel: &mut Kernel, _arbitrator: ArbitratorId) {}

    fn update_storage(&mut self, kernel: &mut Kernel, storage: StorageId) {
        if storage == self.flag.id() {
            self.flag.commit(kernel, "f");
        }
    }
}

#[test]
fn flag_wakes_on_rising_edge_and_sleeps_on_falling_edge() {
    let mut kernel = Kernel::new();
    let root = kernel.create_root_object("sys");
    let clock = kernel.create_clock(100);
    let setter = kernel.register_process("setter", root, clock);
    let observer = kernel.register_process("observer", root, clock);
    let mut flag = Flag::new(&mut kernel, root, clock, false);
    flag.set_sensitive(observer);
    kernel.activate_process(setter);
    // `observer` is never activated directly: only the flag's own edge
    // detection should wake it.

    let mut components = FlagEdge { flag, setter, observer, observed_cycles: Vec::new() };
    let state = kernel.step(INFINITE_CYCLES, &mut components).unwrap();

    assert_eq!(state, RunState::Idle);
    assert_eq!(components.observed_cycles, vec![11, 12, 13, 14, 15]);
}

// --------------------------------------------------------------------
// Scenario 3: strict priority arbitration.
// --------------------------------------------------------------------

struct PriorityArbitration {
    service: ArbitratedService<PriorityArbitratedPort>,
    p1: ProcessId,
    #[allow(dead_code)]
    p2: ProcessId,
    winners: Vec<(u64, ProcessId)>,
}

impl Components for PriorityArbitration {
    fn run_process(&mut self, kernel: &mut Kernel, process: ProcessId) -> ProcessResult {
        let cycle = kernel.master_cycle();
        if cycle >= 2 {
            if kernel.cycle_phase() == CyclePhase::Acquire {
                kernel.deactivate_process(process);
            }
            return ProcessResult::Success;
        }

        // P1 only contends on cycle 0; P2 contends on both cycles, so
        // cycle 1 has it requesting alone.
        let wants = if process == self.p1 { cycle == 0 } else { cycle == 0 || cycle == 1 };
        if !wants {
            return ProcessResult::Success;
        }

        match kernel.cycle_phase() {
            CyclePhase::Acquire => {
                self.service.invoke(kernel);
                ProcessResult::Success
            }
            CyclePhase::Check => {
                if self.service.invoke(kernel) {
                    self.winners.push((cycle, process));
                    ProcessResult::Success
                } else {
                    ProcessResult::Failed
                }
            }
            CyclePhase::Commit => ProcessResult::Success,
        }
    }

    fn arbitrate(&mut self, _kernel: &mut Kernel, arbitrator: ArbitratorId) {
        if arbitrator == self.service.port().arbitrator() {
            self.service.port_mut().arbitrate();
        }
    }

    fn update_storage(&mut self, _kernel: &mut Kernel, _storage: StorageId) {}
}

#[test]
fn priority_arbitration_prefers_the_earlier_registered_process() {
    let mut kernel = Kernel::new();
    let root = kernel.create_root_object("sys");
    let clock = kernel.create_clock(100);
    let arbitrator = kernel.register_arbitrator(clock);
    let mut port = PriorityArbitratedPort::new(root, "svc".into(), arbitrator);
    let p1 = kernel.register_process("p1", root, clock);
    let p2 = kernel.register_process("p2", root, clock);
    port.add_process(p1);
    port.add_process(p2);
    kernel.activate_process(p1);
    kernel.activate_process(p2);

    let service = ArbitratedService::new(port);
    let mut components = PriorityArbitration { service, p1, p2, winners: Vec::new() };
    let state = kernel.step(INFINITE_CYCLES, &mut components).unwrap();

    assert_eq!(state, RunState::Idle);
    assert_eq!(components.winners, vec![(0, p1), (1, p2)]);
}

// --------------------------------------------------------------------
// Scenario 4: round-robin arbitration advances past the last winner.
// --------------------------------------------------------------------

struct CyclicArbitration {
    service: ArbitratedService<CyclicArbitratedPort>,
    processes: [ProcessId; 3],
    winners: Vec<(u64, ProcessId)>,
}

impl Components for CyclicArbitration {
    fn run_process(&mut self, kernel: &mut Kernel, process: ProcessId) -> ProcessResult {
        let cycle = kernel.master_cycle();
        if cycle >= 2 {
            if kernel.cycle_phase() == CyclePhase::Acquire {
                kernel.deactivate_process(process);
            }
            return ProcessResult::Success;
        }

        match kernel.cycle_phase() {
            CyclePhase::Acquire => {
                self.service.invoke(kernel);
                ProcessResult::Success
            }
            CyclePhase::Check => {
                if self.service.invoke(kernel) {
                    self.winners.push((cycle, process));
                    ProcessResult::Success
                } else {
                    ProcessResult::Failed
                }
            }
            CyclePhase::Commit => ProcessResult::Success,
        }
    }

    fn arbitrate(&mut self, _kernel: &mut Kernel, arbitrator: ArbitratorId) {
        if arbitrator == self.service.port().arbitrator() {
            self.service.port_mut().arbitrate();
        }
    }

    fn update_storage(&mut self, _kernel: &mut Kernel, _storage: StorageId) {}
}

#[test]
fn cyclic_arbitration_advances_the_round_robin_cursor_each_cycle() {
    let mut kernel = Kernel::new();
    let root = kernel.create_root_object("sys");
    let clock = kernel.create_clock(100);
    let arbitrator = kernel.register_arbitrator(clock);
    let mut port = CyclicArbitratedPort::new(root, "svc".into(), arbitrator);
    let p0 = kernel.register_process("p0", root, clock);
    let p1 = kernel.register_process("p1", root, clock);
    let p2 = kernel.register_process("p2", root, clock);
    port.add_process(p0);
    port.add_process(p1);
    port.add_process(p2);
    kernel.activate_process(p0);
    kernel.activate_process(p1);
    kernel.activate_process(p2);

    let service = ArbitratedService::new(port);
    let mut components = CyclicArbitration { service, processes: [p0, p1, p2], winners: Vec::new() };
    let state = kernel.step(INFINITE_CYCLES, &mut components).unwrap();

    assert_eq!(state, RunState::Idle);
    assert_eq!(components.winners, vec![(0, components.processes[1]), (1, components.processes[2])]);
}

// --------------------------------------------------------------------
// Scenario 5: cross-domain messaging (400 MHz sender, 300 MHz receiver)
// through a buffered, always-queuing source layer.
// --------------------------------------------------------------------

struct CrossDomain {
    source: SourceBuffering<u32, WireNet<u32>>,
    consumer_buffer: Rc<RefCell<Buffer<u32>>>,
    sender: ProcessId,
    drain: ProcessId,
    #[allow(dead_code)]
    consumer: ProcessId,
    sk: SenderKey,
    next_value: u32,
    sender_stalls: u32,
    received: Vec<u32>,
}

impl Components for CrossDomain {
    fn run_process(&mut self, kernel: &mut Kernel, process: ProcessId) -> ProcessResult {
        if process == self.sender {
            if kernel.cycle_phase() != CyclePhase::Acquire {
                return ProcessResult::Success;
            }
            if self.next_value >= 8 {
                kernel.deactivate_process(process);
                return ProcessResult::Success;
            }
            if self.source.send_message(kernel, self.sk, 0, self.next_value) {
                self.next_value += 1;
                ProcessResult::Success
            } else {
                self.sender_stalls += 1;
                ProcessResult::Failed
            }
        } else if process == self.drain {
            self.source.drain(kernel, self.sk)
        } else {
            if kernel.cycle_phase() != CyclePhase::Acquire {
                return ProcessResult::Success;
            }
            let front = self.consumer_buffer.borrow().front().copied();
            match front {
                Some(v) => {
                    self.received.push(v);
                    self.consumer_buffer.borrow_mut().pop(kernel);
                    if self.received.len() == 8 {
                        kernel.deactivate_process(process);
                    }
                    ProcessResult::Success
                }
                None => ProcessResult::Success,
            }
        }
    }

    fn arbitrate(&mut self, _kernel: &mut Kernel, _arbitrator: ArbitratorId) {}

    fn update_storage(&mut self, kernel: &mut Kernel, storage: StorageId) {
        if storage == self.source.sender_buffer(self.sk) {
            self.source.commit_sender(kernel, self.sk, "src");
        } else if storage == self.consumer_buffer.borrow().id() {
            self.consumer_buffer.borrow_mut().commit(kernel, "dst");
        }
    }
}

#[test]
fn cross_domain_messages_arrive_in_order_and_back_pressure_the_sender() {
    let mut kernel = Kernel::new();
    let root = kernel.create_root_object("sys");
    let sender_clock = kernel.create_clock(400);
    let receiver_clock = kernel.create_clock(300);

    let net: WireNet<u32> = WireNet::new();
    let mut source = SourceBuffering::new(root, sender_clock, 2, net);
    let rk = source.register_receiver(&mut kernel, "dst");

    let consumer_buffer = Rc::new(RefCell::new(Buffer::new(&mut kernel, root, receiver_clock, 8, 1)));
    let cb_for_closure = Rc::clone(&consumer_buffer);
    source.connect_receiver(
        &mut kernel,
        rk,
        ReceiverEndpoint {
            deliver: Box::new(move |kernel, msg: u32| cb_for_closure.borrow_mut().push(kernel, msg, 1)),
            traces: StorageTraceSet::empty(),
            broadcast_enabled: false,
        },
    );

    let sk = source.register_sender(&mut kernel, "src");
    let drain = source.drain_process(sk);
    source.connect_sender(&mut kernel, sk, drain);

    let sender = kernel.register_process("src.producer", root, sender_clock);
    let consumer = kernel.register_process("dst.consumer", root, receiver_clock);
    kernel.activate_process(sender);
    kernel.activate_process(consumer);
    // `drain` wakes on its own via the source buffer's sensitivity once
    // the first message is staged.

    let mut components =
        CrossDomain { source, consumer_buffer, sender, drain, consumer, sk, next_value: 0, sender_stalls: 0, received: Vec::new() };
    let state = kernel.step(INFINITE_CYCLES, &mut components).unwrap();

    assert_eq!(state, RunState::Idle);
    assert_eq!(components.received, vec![0, 1, 2, 3, 4, 5, 6, 7]);
    assert!(components.sender_stalls >= 1, "the 2-deep source buffer should have forced at least one stall");
}

// --------------------------------------------------------------------
// Scenario 6: a circular buffer dependency is idle when nothing is
// injected, and deadlocked (not idle-by-absence) once both sides start
// holding a token the other needs.
// --------------------------------------------------------------------

struct CircularDependency {
    a: Buffer<u32>,
    b: Buffer<u32>,
    p1: ProcessId,
    #[allow(dead_code)]
    p2: ProcessId,
    p1_attempts: u32,
    p2_attempts: u32,
}

impl Components for CircularDependency {
    fn run_process(&mut self, kernel: &mut Kernel, process: ProcessId) -> ProcessResult {
        if kernel.cycle_phase() != CyclePhase::Acquire {
            return ProcessResult::Success;
        }
        if process == self.p1 {
            self.p1_attempts += 1;
            if self.a.is_empty() || self.b.len() >= self.b.max_size() {
                return ProcessResult::Failed;
            }
            let v = *self.a.front().expect("checked non-empty above");
            self.a.pop(kernel);
            self.b.push(kernel, v, 1);
            ProcessResult::Success
        } else {
            self.p2_attempts += 1;
            if self.b.is_empty() || self.a.len() >= self.a.max_size() {
                return ProcessResult::Failed;
            }
            let v = *self.b.front().expect("checked non-empty above");
            self.b.pop(kernel);
            self.a.push(kernel, v, 1);
            ProcessResult::Success
        }
    }

    fn arbitrate(&mut self, _kernel: &mut Kernel, _arbitrator: ArbitratorId) {}

    fn update_storage(&mut self, kernel: &mut Kernel, storage: StorageId) {
        if storage == self.a.id() {
            self.a.commit(kernel, "a");
        } else if storage == self.b.id() {
            self.b.commit(kernel, "b");
        }
    }
}

#[test]
fn circular_buffer_dependency_reports_deadlock_without_injected_tokens() {
    let mut kernel = Kernel::new();
    let root = kernel.create_root_object("sys");
    let clock = kernel.create_clock(100);
    let a = Buffer::new(&mut kernel, root, clock, 1, 1);
    let b = Buffer::new(&mut kernel, root, clock, 1, 1);
    let p1 = kernel.register_process("p1", root, clock);
    let p2 = kernel.register_process("p2", root, clock);
    kernel.activate_process(p1);
    kernel.activate_process(p2);

    let mut components = CircularDependency { a, b, p1, p2, p1_attempts: 0, p2_attempts: 0 };
    let state = kernel.step(INFINITE_CYCLES, &mut components).unwrap();

    // Neither process ever has anything to consume, so both report
    // `Failed` on every `Acquire` forever: a kernel-detected deadlock,
    // not mere natural convergence to idle.
    assert_eq!(state, RunState::Deadlock);
    let mut deadlocked = kernel.deadlocked_processes();
    deadlocked.sort_by_key(|p| format!("{p:?}"));
    let mut expected = vec![p1, p2];
    expected.sort_by_key(|p| format!("{p:?}"));
    assert_eq!(deadlocked, expected);
    assert_eq!(components.p1_attempts, 1);
    assert_eq!(components.p2_attempts, 1);
    assert!(components.a.is_empty());
    assert!(components.b.is_empty());
}

#[test]
fn circular_buffer_dependency_deadlocks_when_both_sides_start_full() {
    let mut kernel = Kernel::new();
    let root = kernel.create_root_object("sys");
    let clock = kernel.create_clock(100);
    let mut a = Buffer::new(&mut kernel, root, clock, 1, 1);
    let mut b = Buffer::new(&mut kernel, root, clock, 1, 1);
    assert!(a.push(&mut kernel, 1u32, 1));
    assert!(b.push(&mut kernel, 2u32, 1));

    let p1 = kernel.register_process("p1", root, clock);
    let p2 = kernel.register_process("p2", root, clock);
    kernel.activate_process(p1);
    kernel.activate_process(p2);

    let mut components = CircularDependency { a, b, p1, p2, p1_attempts: 0, p2_attempts: 0 };
    let state = kernel.step(INFINITE_CYCLES, &mut components).unwrap();

    // Both sides are stuck holding a token the other would need to make
    // room for: each side has work it cannot complete, the textbook
    // circular-wait deadlock the kernel is meant to surface.
    assert_eq!(state, RunState::Deadlock);
    let mut deadlocked = kernel.deadlocked_processes();
    deadlocked.sort_by_key(|p| format!("{p:?}"));
    let mut expected = vec![p1, p2];
    expected.sort_by_key(|p| format!("{p:?}"));
    assert_eq!(deadlocked, expected);
    assert_eq!(components.p1_attempts, 1);
    assert_eq!(components.p2_attempts, 1);
    assert_eq!(components.a.len(), 1);
    assert_eq!(components.b.len(), 1);
}
