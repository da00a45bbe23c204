use crate::kernel::{CyclePhase, Kernel};
use crate::ports::{ArbitrationPolicy, PriorityArbitratedPort};

/// Arbitrates access to a single feature of a component (or group of
/// components) with no structure attached — just "only one process may
/// do this per cycle". `P` selects the policy (defaults to strict
/// priority, matching the original's default template argument).
pub struct ArbitratedService<P: ArbitrationPolicy = PriorityArbitratedPort> {
    port: P,
}

impl<P: ArbitrationPolicy> ArbitratedService<P> {
    pub fn new(port: P) -> Self {
        ArbitratedService { port }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Request access to the service on behalf of the kernel's currently
    /// active process. Returns `true` during `Acquire` (the request was
    /// accepted for arbitration) or, once arbitration has run, whether
    /// this process was the one granted access.
    pub fn invoke(&mut self, kernel: &mut Kernel) -> bool {
        let process = kernel.active_process().expect("Invoke() called outside a process context");
        debug_assert!(self.port.can_access(process), "process not registered with this service");

        if kernel.cycle_phase() == CyclePhase::Acquire {
            self.port.add_request(process);
            kernel.request_arbitration(self.port.arbitrator());
            true
        } else {
            self.port.selected() == Some(process)
        }
    }
}
