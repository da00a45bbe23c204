//! Simulation diagnostics.
//!
//! All diagnostic output funnels through a single **backend** function
//! pointer, the same shape as a conventional kernel log backend except that
//! the filter is a bitmask of categories rather than a severity ladder: a
//! simulated component can be interesting for `DEADLOCK` analysis without
//! being interesting for `NET` tracing, and a run typically wants several
//! categories active at once.
//!
//! # Backend contract
//!
//! The backend receives the already-guarded, pre-formatted arguments for a
//! single diagnostic line and is responsible for writing them out (to
//! stderr, a log file, a test sink, whatever the embedding driver wants).
//! Unlike a severity logger, the guard check happens at the *call site*
//! inside the `sim_debug_*!` macros, not inside the backend: the backend is
//! never invoked, and the format arguments are never evaluated, when the
//! category is not in the active mask.
//!
//! # Registration
//!
//! ```ignore
//! sim_lib::diag::register_backend(my_backend_fn);
//! ```

use core::fmt;
use std::sync::atomic::{AtomicPtr, Ordering};

bitflags::bitflags! {
    /// Diagnostic categories, one bit per subsystem. Mirrors the debug
    /// category bitmask used throughout the kernel's `Debug*Write` family.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct DebugMask: u32 {
        const SIM      = 1 << 0;
        const PROG     = 1 << 1;
        const DEADLOCK = 1 << 2;
        const FLOW     = 1 << 3;
        const MEM      = 1 << 4;
        const IO       = 1 << 5;
        const REG      = 1 << 6;
        const NET      = 1 << 7;
        const IONET    = 1 << 8;
        const FPU      = 1 << 9;
        const PIPE     = 1 << 10;
        const MEMNET   = 1 << 11;
    }
}

impl Default for DebugMask {
    fn default() -> Self {
        DebugMask::empty()
    }
}

/// Anything that can supply the context a diagnostic line needs: which
/// cycle it fired on, which object emitted it, which process (if any) was
/// active at the time, and the mask currently in effect for that object.
///
/// `Object` (in `sim-kernel`) is the canonical implementor; tests may
/// implement it directly on a stub for unit-level macro exercises.
pub trait DiagContext {
    fn master_cycle(&self) -> u64;
    fn fqn(&self) -> &str;
    fn active_process_name(&self) -> Option<&str>;
    fn debug_mask(&self) -> DebugMask;
}

/// Signature of a diagnostics backend.
pub type DiagBackend = fn(u64, &str, Option<&str>, DebugMask, fmt::Arguments<'_>);

/// Stored as a raw pointer; `null` means "use the default stderr backend".
static BACKEND: AtomicPtr<()> = AtomicPtr::new(std::ptr::null_mut());

fn default_backend(cycle: u64, fqn: &str, process: Option<&str>, category: DebugMask, args: fmt::Arguments<'_>) {
    match process {
        Some(p) => eprintln!("[{cycle:>10}] ({category:?}) {fqn} ({p}): {args}"),
        None => eprintln!("[{cycle:>10}] ({category:?}) {fqn}: {args}"),
    }
}

/// Replace the diagnostics backend. Typically called once by the embedding
/// driver during setup (e.g. to redirect into a test sink or a log file).
pub fn register_backend(backend: DiagBackend) {
    BACKEND.store(backend as *mut (), Ordering::Release);
}

/// Restore the default stderr backend.
pub fn reset_backend() {
    BACKEND.store(std::ptr::null_mut(), Ordering::Release);
}

/// Dispatch a pre-formatted diagnostic line. Called only from the
/// `sim_debug_*!` macros, after the category guard has already passed —
/// never call this directly from guard-less code.
#[doc(hidden)]
pub fn dispatch(cycle: u64, fqn: &str, process: Option<&str>, category: DebugMask, args: fmt::Arguments<'_>) {
    let ptr = BACKEND.load(Ordering::Acquire);
    if ptr.is_null() {
        default_backend(cycle, fqn, process, category, args);
    } else {
        // SAFETY: `register_backend` only stores valid `DiagBackend` fn
        // pointers, which are the same size as `*mut ()`.
        let backend: DiagBackend = unsafe { core::mem::transmute(ptr) };
        backend(cycle, fqn, process, category, args);
    }
}

/// Emit a diagnostic line in category `$cat` if `$ctx`'s active mask
/// contains it. The guard wraps the `format_args!` call itself, so the
/// format arguments are never evaluated when the category is disabled.
#[macro_export]
macro_rules! sim_debug {
    ($cat:expr, $ctx:expr, $($arg:tt)*) => {{
        let cat = $cat;
        if $ctx.debug_mask().contains(cat) {
            $crate::diag::dispatch(
                $ctx.master_cycle(),
                $ctx.fqn(),
                $ctx.active_process_name(),
                cat,
                ::core::format_args!($($arg)*),
            );
        }
    }};
}

#[macro_export]
macro_rules! sim_debug_sim {
    ($ctx:expr, $($arg:tt)*) => { $crate::sim_debug!($crate::diag::DebugMask::SIM, $ctx, $($arg)*) };
}
#[macro_export]
macro_rules! sim_debug_prog {
    ($ctx:expr, $($arg:tt)*) => { $crate::sim_debug!($crate::diag::DebugMask::PROG, $ctx, $($arg)*) };
}
#[macro_export]
macro_rules! sim_debug_deadlock {
    ($ctx:expr, $($arg:tt)*) => { $crate::sim_debug!($crate::diag::DebugMask::DEADLOCK, $ctx, $($arg)*) };
}
#[macro_export]
macro_rules! sim_debug_flow {
    ($ctx:expr, $($arg:tt)*) => { $crate::sim_debug!($crate::diag::DebugMask::FLOW, $ctx, $($arg)*) };
}
#[macro_export]
macro_rules! sim_debug_mem {
    ($ctx:expr, $($arg:tt)*) => { $crate::sim_debug!($crate::diag::DebugMask::MEM, $ctx, $($arg)*) };
}
#[macro_export]
macro_rules! sim_debug_io {
    ($ctx:expr, $($arg:tt)*) => { $crate::sim_debug!($crate::diag::DebugMask::IO, $ctx, $($arg)*) };
}
#[macro_export]
macro_rules! sim_debug_reg {
    ($ctx:expr, $($arg:tt)*) => { $crate::sim_debug!($crate::diag::DebugMask::REG, $ctx, $($arg)*) };
}
#[macro_export]
macro_rules! sim_debug_net {
    ($ctx:expr, $($arg:tt)*) => { $crate::sim_debug!($crate::diag::DebugMask::NET, $ctx, $($arg)*) };
}

/// Output that is always written regardless of the active mask, used for
/// the architecture-level trace a simulated program prints through its own
/// I/O (mirrors the original's unconditional `OutputWrite`).
#[macro_export]
macro_rules! sim_output {
    ($ctx:expr, $($arg:tt)*) => {{
        $crate::diag::dispatch(
            $ctx.master_cycle(),
            $ctx.fqn(),
            $ctx.active_process_name(),
            $crate::diag::DebugMask::empty(),
            ::core::format_args!($($arg)*),
        );
    }};
}

#[cfg(test)]
mod diag_tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as O};

    static CALLS: AtomicUsize = AtomicUsize::new(0);

    fn counting_backend(_c: u64, _f: &str, _p: Option<&str>, _cat: DebugMask, _a: fmt::Arguments<'_>) {
        CALLS.fetch_add(1, O::SeqCst);
    }

    struct Stub {
        mask: DebugMask,
    }
    impl DiagContext for Stub {
        fn master_cycle(&self) -> u64 { 7 }
        fn fqn(&self) -> &str { "stub" }
        fn active_process_name(&self) -> Option<&str> { None }
        fn debug_mask(&self) -> DebugMask { self.mask }
    }

    // Tracks whether the argument expression passed to a disabled macro
    // invocation actually ran.
    struct EvalSentinel(std::rc::Rc<std::cell::Cell<bool>>);
    impl std::fmt::Display for EvalSentinel {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            self.0.set(true);
            write!(f, "evaluated")
        }
    }

    #[test]
    fn disabled_category_never_evaluates_args_or_dispatches() {
        register_backend(counting_backend);
        CALLS.store(0, O::SeqCst);
        let ctx = Stub { mask: DebugMask::SIM };
        let evaluated = std::rc::Rc::new(std::cell::Cell::new(false));
        let sentinel = EvalSentinel(evaluated.clone());
        sim_debug_net!(ctx, "{}", sentinel);
        assert_eq!(CALLS.load(O::SeqCst), 0);
        assert!(!evaluated.get(), "format argument was evaluated despite disabled category");
        reset_backend();
    }

    #[test]
    fn enabled_category_dispatches_exactly_once() {
        register_backend(counting_backend);
        CALLS.store(0, O::SeqCst);
        let ctx = Stub { mask: DebugMask::SIM | DebugMask::DEADLOCK };
        sim_debug_deadlock!(ctx, "hello {}", 1);
        assert_eq!(CALLS.load(O::SeqCst), 1);
        reset_backend();
    }
}
