//! Arbitrated ports.
//!
//! A shared resource (a register file write port, a bus) can receive
//! requests from several processes in the same cycle; at most one can be
//! granted. The three policies here mirror the original's three
//! concrete arbitrated-port classes rather than one generic port
//! parameterized over a policy trait, since each keeps materially
//! different bookkeeping (a priority list, a round-robin cursor, or
//! both).

mod service;
mod structure;

pub use service::ArbitratedService;
pub use structure::{ArbitratedReadPort, ArbitratedWritePort, ReadOnlyStructure, ReadWriteStructure, WritePort};

use crate::ids::{ArbitratorId, ObjectId, ProcessId};

/// Shared surface used by [`ArbitratedService`] to stay generic over which
/// concrete arbitration policy backs it.
pub trait ArbitrationPolicy {
    fn can_access(&self, process: ProcessId) -> bool;
    fn add_request(&mut self, process: ProcessId);
    fn selected(&self) -> Option<ProcessId>;
    fn arbitrate(&mut self);
    fn arbitrator(&self) -> ArbitratorId;
    fn name(&self) -> &str;
}

/// Lets a generic bus or crossbar layer build and populate a port without
/// knowing its concrete type. Deliberately not part of
/// [`ArbitrationPolicy`] itself: [`PriorityCyclicArbitratedPort`] has two
/// separate registration lists (priority and cyclic) rather than one, so
/// no single `add_process` could describe it, and it is never used as a
/// bus/crossbar arbitrator in practice.
pub trait RegisterPort: ArbitrationPolicy {
    fn new_port(object: ObjectId, name: String, arbitrator: ArbitratorId) -> Self;
    fn add_process(&mut self, process: ProcessId);
}

impl RegisterPort for PriorityArbitratedPort {
    fn new_port(object: ObjectId, name: String, arbitrator: ArbitratorId) -> Self {
        PriorityArbitratedPort::new(object, name, arbitrator)
    }
    fn add_process(&mut self, process: ProcessId) {
        PriorityArbitratedPort::add_process(self, process)
    }
}

impl RegisterPort for CyclicArbitratedPort {
    fn new_port(object: ObjectId, name: String, arbitrator: ArbitratorId) -> Self {
        CyclicArbitratedPort::new(object, name, arbitrator)
    }
    fn add_process(&mut self, process: ProcessId) {
        CyclicArbitratedPort::add_process(self, process)
    }
}

/// Fields shared by every arbitrated port flavor.
struct PortCore {
    object: ObjectId,
    name: String,
    arbitrator: ArbitratorId,
    requests: Vec<ProcessId>,
    selected: Option<ProcessId>,
    busy_cycles: u64,
}

impl PortCore {
    fn new(object: ObjectId, name: String, arbitrator: ArbitratorId) -> Self {
        PortCore { object, name, arbitrator, requests: Vec::new(), selected: None, busy_cycles: 0 }
    }

    /// A process may request more than once in a cycle only if it sits in
    /// a higher-frequency domain than the port (it would otherwise be a
    /// bug — asserted by the caller, which holds clock identities).
    fn add_request(&mut self, process: ProcessId) {
        if !self.requests.contains(&process) {
            self.requests.push(process);
        }
    }

    fn clear(&mut self) {
        self.requests.clear();
    }
}

/// Strict priority: the process earliest in `processes` always wins.
pub struct PriorityArbitratedPort {
    core: PortCore,
    processes: Vec<ProcessId>,
}

impl PriorityArbitratedPort {
    pub fn new(object: ObjectId, name: String, arbitrator: ArbitratorId) -> Self {
        PriorityArbitratedPort { core: PortCore::new(object, name, arbitrator), processes: Vec::new() }
    }

    pub fn add_process(&mut self, process: ProcessId) {
        self.processes.push(process);
    }

    pub fn add_request(&mut self, process: ProcessId) {
        self.core.add_request(process);
    }

    pub fn can_access(&self, process: ProcessId) -> bool {
        self.processes.contains(&process)
    }

    pub fn object(&self) -> ObjectId {
        self.core.object
    }

    pub fn arbitrator(&self) -> ArbitratorId {
        self.core.arbitrator
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn busy_cycles(&self) -> u64 {
        self.core.busy_cycles
    }

    pub fn selected(&self) -> Option<ProcessId> {
        self.core.selected
    }

    pub fn arbitrate(&mut self) {
        self.core.selected = None;
        if self.core.requests.is_empty() {
            return;
        }
        if self.core.requests.len() == 1 {
            self.core.selected = Some(self.core.requests[0]);
        } else {
            let mut highest = usize::MAX;
            for &req in &self.core.requests {
                if let Some(priority) = self.processes.iter().position(|p| *p == req) {
                    if priority < highest {
                        highest = priority;
                        self.core.selected = Some(req);
                    }
                }
            }
        }
        self.core.clear();
        self.core.busy_cycles += 1;
    }
}

impl ArbitrationPolicy for PriorityArbitratedPort {
    fn can_access(&self, process: ProcessId) -> bool {
        PriorityArbitratedPort::can_access(self, process)
    }
    fn add_request(&mut self, process: ProcessId) {
        PriorityArbitratedPort::add_request(self, process)
    }
    fn selected(&self) -> Option<ProcessId> {
        PriorityArbitratedPort::selected(self)
    }
    fn arbitrate(&mut self) {
        PriorityArbitratedPort::arbitrate(self)
    }
    fn arbitrator(&self) -> ArbitratorId {
        PriorityArbitratedPort::arbitrator(self)
    }
    fn name(&self) -> &str {
        PriorityArbitratedPort::name(self)
    }
}

/// Round-robin among `processes`, fair across cycles by tracking the last
/// winner and picking the nearest requester strictly after it.
pub struct CyclicArbitratedPort {
    core: PortCore,
    processes: Vec<ProcessId>,
    last_selected: usize,
}

impl CyclicArbitratedPort {
    pub fn new(object: ObjectId, name: String, arbitrator: ArbitratorId) -> Self {
        CyclicArbitratedPort { core: PortCore::new(object, name, arbitrator), processes: Vec::new(), last_selected: 0 }
    }

    pub fn add_process(&mut self, process: ProcessId) {
        self.processes.push(process);
    }

    pub fn add_request(&mut self, process: ProcessId) {
        self.core.add_request(process);
    }

    pub fn object(&self) -> ObjectId {
        self.core.object
    }

    pub fn arbitrator(&self) -> ArbitratorId {
        self.core.arbitrator
    }

    pub fn selected(&self) -> Option<ProcessId> {
        self.core.selected
    }

    pub fn can_access(&self, process: ProcessId) -> bool {
        self.processes.contains(&process)
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn arbitrate(&mut self) {
        debug_assert!(self.last_selected <= self.processes.len());
        self.core.selected = None;
        if self.core.requests.is_empty() {
            return;
        }
        let n = self.processes.len();
        if self.core.requests.len() == 1 {
            let req = self.core.requests[0];
            self.core.selected = Some(req);
            self.last_selected = self.processes.iter().position(|p| *p == req).expect("requester must be registered");
        } else {
            let mut lowest = usize::MAX;
            for &req in &self.core.requests {
                let pos = self.processes.iter().position(|p| *p == req).expect("requester must be registered");
                let dist = (pos + n - self.last_selected) % n;
                if dist != 0 && dist < lowest {
                    lowest = dist;
                    self.core.selected = Some(req);
                }
            }
            self.last_selected = (self.last_selected + lowest) % n;
        }
        self.core.clear();
        self.core.busy_cycles += 1;
    }
}

impl ArbitrationPolicy for CyclicArbitratedPort {
    fn can_access(&self, process: ProcessId) -> bool {
        CyclicArbitratedPort::can_access(self, process)
    }
    fn add_request(&mut self, process: ProcessId) {
        CyclicArbitratedPort::add_request(self, process)
    }
    fn selected(&self) -> Option<ProcessId> {
        CyclicArbitratedPort::selected(self)
    }
    fn arbitrate(&mut self) {
        CyclicArbitratedPort::arbitrate(self)
    }
    fn arbitrator(&self) -> ArbitratorId {
        self.core.arbitrator
    }
    fn name(&self) -> &str {
        CyclicArbitratedPort::name(self)
    }
}

/// Strict priority among `processes`, falling back to round-robin among
/// `cyclic_processes` when none of the priority requesters asked.
pub struct PriorityCyclicArbitratedPort {
    core: PortCore,
    processes: Vec<ProcessId>,
    cyclic_processes: Vec<ProcessId>,
    last_selected: usize,
}

impl PriorityCyclicArbitratedPort {
    pub fn new(object: ObjectId, name: String, arbitrator: ArbitratorId) -> Self {
        PriorityCyclicArbitratedPort {
            core: PortCore::new(object, name, arbitrator),
            processes: Vec::new(),
            cyclic_processes: Vec::new(),
            last_selected: 0,
        }
    }

    pub fn add_priority_process(&mut self, process: ProcessId) {
        self.processes.push(process);
    }

    pub fn add_cyclic_process(&mut self, process: ProcessId) {
        self.cyclic_processes.push(process);
    }

    pub fn add_request(&mut self, process: ProcessId) {
        self.core.add_request(process);
    }

    pub fn selected(&self) -> Option<ProcessId> {
        self.core.selected
    }

    pub fn can_access(&self, process: ProcessId) -> bool {
        self.processes.contains(&process) || self.cyclic_processes.contains(&process)
    }

    pub fn arbitrator(&self) -> ArbitratorId {
        self.core.arbitrator
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn arbitrate(&mut self) {
        self.core.selected = None;
        if self.core.requests.is_empty() {
            return;
        }
        if self.core.requests.len() == 1 {
            let req = self.core.requests[0];
            self.core.selected = Some(req);
            if let Some(pos) = self.cyclic_processes.iter().position(|p| *p == req) {
                self.last_selected = pos;
            }
        } else {
            let mut highest = usize::MAX;
            for &req in &self.core.requests {
                if let Some(priority) = self.processes.iter().position(|p| *p == req) {
                    if priority < highest {
                        highest = priority;
                        self.core.selected = Some(req);
                    }
                }
            }
            if self.core.selected.is_none() {
                let n = self.cyclic_processes.len();
                let mut lowest = usize::MAX;
                for &req in &self.core.requests {
                    let pos = self
                        .cyclic_processes
                        .iter()
                        .position(|p| *p == req)
                        .expect("non-priority requester must be a cyclic requester");
                    let dist = (pos + n - self.last_selected) % n;
                    if dist != 0 && dist < lowest {
                        lowest = dist;
                        self.core.selected = Some(req);
                    }
                }
                self.last_selected = (self.last_selected + lowest) % n;
            }
        }
        self.core.clear();
        self.core.busy_cycles += 1;
    }
}

impl ArbitrationPolicy for PriorityCyclicArbitratedPort {
    fn can_access(&self, process: ProcessId) -> bool {
        PriorityCyclicArbitratedPort::can_access(self, process)
    }
    fn add_request(&mut self, process: ProcessId) {
        PriorityCyclicArbitratedPort::add_request(self, process)
    }
    fn selected(&self) -> Option<ProcessId> {
        PriorityCyclicArbitratedPort::selected(self)
    }
    fn arbitrate(&mut self) {
        PriorityCyclicArbitratedPort::arbitrate(self)
    }
    fn arbitrator(&self) -> ArbitratorId {
        PriorityCyclicArbitratedPort::arbitrator(self)
    }
    fn name(&self) -> &str {
        PriorityCyclicArbitratedPort::name(self)
    }
}
