//! Shared structures with arbitrated read and/or write ports (e.g. a
//! register file). Distinct from a plain [`super::ArbitratedService`]:
//! a structure also resolves *index* conflicts between its write ports,
//! since two ports landing on the same element in the same cycle must
//! still be serialized even though each was independently granted
//! access to the port itself.

use std::collections::HashMap;
use std::hash::Hash;

use crate::ids::{ArbitratorId, ObjectId, ProcessId};
use crate::kernel::{CyclePhase, Kernel};
use crate::ports::PriorityArbitratedPort;

/// Tracks a single pending write request's target index until arbitration
/// decides whether it goes through.
pub struct WritePort<I> {
    index: Option<I>,
    chosen: bool,
}

impl<I> Default for WritePort<I> {
    fn default() -> Self {
        WritePort { index: None, chosen: false }
    }
}

impl<I> WritePort<I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_request_index(&mut self, index: I) {
        debug_assert!(self.index.is_none(), "WritePort already has a pending request");
        self.index = Some(index);
    }

    pub fn get_index(&self) -> Option<&I> {
        self.index.as_ref()
    }

    pub fn is_chosen(&self) -> bool {
        self.chosen
    }

    /// Called once per cycle by the owning structure's arbitration pass.
    pub fn notify(&mut self, chosen: bool) {
        self.chosen = chosen;
        self.index = None;
    }
}

/// A priority-arbitrated read port bound to a [`ReadOnlyStructure`]'s own
/// per-cycle arbitration schedule.
pub struct ArbitratedReadPort {
    port: PriorityArbitratedPort,
}

impl ArbitratedReadPort {
    pub fn new(object: ObjectId, name: String, arbitrator: ArbitratorId) -> Self {
        ArbitratedReadPort { port: PriorityArbitratedPort::new(object, name, arbitrator) }
    }

    pub fn add_process(&mut self, process: ProcessId) {
        self.port.add_process(process);
    }

    pub fn selected(&self) -> Option<ProcessId> {
        self.port.selected()
    }

    pub(crate) fn arbitrate(&mut self) {
        self.port.arbitrate();
    }

    /// Issue a read request on behalf of the kernel's active process.
    /// Returns `true` during `Acquire`, or once arbitrated, whether this
    /// process was granted the port.
    pub fn read(&mut self, kernel: &mut Kernel, structure_arbitrator: ArbitratorId) -> bool {
        let process = kernel.active_process().expect("Read() called outside a process context");
        debug_assert!(self.port.can_access(process), "process not registered with this read port");

        if kernel.cycle_phase() == CyclePhase::Acquire {
            self.port.add_request(process);
            kernel.request_arbitration(structure_arbitrator);
            true
        } else {
            self.port.selected() == Some(process)
        }
    }
}

/// A shared structure with zero or more read ports. Arbitration for all
/// of them is decided together, once per cycle, under a single
/// arbitrator registered with the kernel.
pub struct ReadOnlyStructure {
    object: ObjectId,
    arbitrator: ArbitratorId,
    read_ports: Vec<ArbitratedReadPort>,
}

impl ReadOnlyStructure {
    pub fn new(object: ObjectId, arbitrator: ArbitratorId) -> Self {
        ReadOnlyStructure { object, arbitrator, read_ports: Vec::new() }
    }

    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn arbitrator(&self) -> ArbitratorId {
        self.arbitrator
    }

    pub fn register_read_port(&mut self, port: ArbitratedReadPort) -> usize {
        self.read_ports.push(port);
        self.read_ports.len() - 1
    }

    pub fn read_port_mut(&mut self, index: usize) -> &mut ArbitratedReadPort {
        &mut self.read_ports[index]
    }

    pub(crate) fn arbitrate_read_ports(&mut self) {
        for port in &mut self.read_ports {
            port.arbitrate();
        }
    }

    /// Runs when the kernel invokes this structure's arbitrator.
    pub fn on_arbitrate(&mut self) {
        self.arbitrate_read_ports();
    }
}

/// A priority-arbitrated write port bound to a [`ReadWriteStructure`].
/// Winning the port only grants a process the *chance* to write; the
/// structure still resolves conflicts between write ports landing on
/// the same index before confirming via [`WritePort::notify`].
pub struct ArbitratedWritePort<I> {
    port: PriorityArbitratedPort,
    write: WritePort<I>,
    indices: HashMap<ProcessId, I>,
}

impl<I> ArbitratedWritePort<I> {
    pub fn new(object: ObjectId, name: String, arbitrator: ArbitratorId) -> Self {
        ArbitratedWritePort {
            port: PriorityArbitratedPort::new(object, name, arbitrator),
            write: WritePort::new(),
            indices: HashMap::new(),
        }
    }

    pub fn add_process(&mut self, process: ProcessId) {
        self.port.add_process(process);
    }

    pub fn get_index(&self) -> Option<&I> {
        self.write.get_index()
    }

    pub fn is_chosen(&self) -> bool {
        self.write.is_chosen()
    }

    pub(crate) fn notify(&mut self, chosen: bool) {
        self.write.notify(chosen);
    }

    pub(crate) fn arbitrate(&mut self) {
        self.port.arbitrate();
        if let Some(process) = self.port.selected() {
            let index = self.indices.remove(&process).expect("selected process must have a recorded index");
            self.write.set_request_index(index);
        }
    }

    /// Issue a write request to `index` on behalf of the kernel's active
    /// process. Returns `true` during `Acquire`; once arbitrated, `true`
    /// only if this process both won the port and won the index conflict.
    pub fn write(&mut self, kernel: &mut Kernel, structure_arbitrator: ArbitratorId, index: I) -> bool {
        let process = kernel.active_process().expect("Write() called outside a process context");
        debug_assert!(self.port.can_access(process), "process not registered with this write port");

        if kernel.cycle_phase() == CyclePhase::Acquire {
            self.port.add_request(process);
            self.indices.insert(process, index);
            kernel.request_arbitration(structure_arbitrator);
            true
        } else {
            self.write.is_chosen() && self.port.selected() == Some(process)
        }
    }
}

/// A shared structure with read and write ports. Write ports are
/// arbitrated in two stages: first for the port itself (one process per
/// port per cycle), then across ports for any index two of them landed
/// on simultaneously, broken by registration priority.
pub struct ReadWriteStructure<I> {
    read: ReadOnlyStructure,
    write_ports: Vec<ArbitratedWritePort<I>>,
    priorities: Vec<usize>,
}

impl<I: Copy + Eq + Hash> ReadWriteStructure<I> {
    pub fn new(object: ObjectId, arbitrator: ArbitratorId) -> Self {
        ReadWriteStructure { read: ReadOnlyStructure::new(object, arbitrator), write_ports: Vec::new(), priorities: Vec::new() }
    }

    pub fn object(&self) -> ObjectId {
        self.read.object()
    }

    pub fn arbitrator(&self) -> ArbitratorId {
        self.read.arbitrator()
    }

    pub fn register_read_port(&mut self, port: ArbitratedReadPort) -> usize {
        self.read.register_read_port(port)
    }

    pub fn read_port_mut(&mut self, index: usize) -> &mut ArbitratedReadPort {
        self.read.read_port_mut(index)
    }

    pub fn register_write_port(&mut self, port: ArbitratedWritePort<I>) -> usize {
        self.write_ports.push(port);
        self.write_ports.len() - 1
    }

    pub fn write_port_mut(&mut self, index: usize) -> &mut ArbitratedWritePort<I> {
        &mut self.write_ports[index]
    }

    /// Ports added earlier win ties over the same index.
    pub fn add_port_priority(&mut self, index: usize) {
        debug_assert!(!self.priorities.contains(&index), "port already has a priority");
        self.priorities.push(index);
    }

    /// Runs when the kernel invokes this structure's arbitrator.
    pub fn on_arbitrate(&mut self) {
        self.read.arbitrate_read_ports();
        for port in &mut self.write_ports {
            port.arbitrate();
        }

        let mut requests: HashMap<I, Vec<usize>> = HashMap::new();
        for (i, port) in self.write_ports.iter().enumerate() {
            if let Some(index) = port.get_index() {
                requests.entry(*index).or_default().push(i);
            }
        }

        for (_, ports) in requests {
            let mut selected = None;
            let mut best = self.priorities.len();
            for &i in &ports {
                if let Some(prio) = self.priorities.iter().position(|&p| p == i) {
                    if prio < best {
                        best = prio;
                        selected = Some(i);
                    }
                }
            }
            for &i in &ports {
                self.write_ports[i].notify(selected == Some(i));
            }
        }
    }
}
