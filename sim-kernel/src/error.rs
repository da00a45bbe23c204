//! Error types for the simulation kernel.
//!
//! Mirrors the unified-enum idiom used for memory-management errors
//! elsewhere in the stack: one flat enum per concern, a manual
//! `Display` impl with a human-readable message, no `thiserror`.

use std::fmt;

use crate::clock::CycleNo;
use crate::ids::{ClockId, ObjectId};

/// What went wrong, independent of when or in whose process body it
/// happened. [`SimulationException`] wraps one of these with the
/// `(master cycle, active process name)` pair the kernel attaches at the
/// point the exception unwinds out of [`crate::kernel::Kernel::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationExceptionKind {
    /// A process declared a storage access that was not in its declared
    /// `StorageTraceSet`, or otherwise violated the arbitration protocol.
    InvalidArgument { object: ObjectId, message: String },
    /// A component reported an illegal operation against its own
    /// semantics (e.g. pushing to a buffer already at `Push` capacity for
    /// the cycle from outside its own clock domain).
    IllegalOperation { object: ObjectId, message: String },
    /// Two clocks that must share a rational frequency ratio do not.
    IncompatibleClockRatio { a: ClockId, b: ClockId },
    /// The simulated program asked to terminate the simulation cleanly
    /// (not a kernel bug — carries an exit status for the driver to
    /// report).
    ProgramTermination { exit_code: i32 },
}

impl fmt::Display for SimulationExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument { message, .. } => write!(f, "invalid argument: {message}"),
            Self::IllegalOperation { message, .. } => write!(f, "illegal operation: {message}"),
            Self::IncompatibleClockRatio { a, b } => {
                write!(f, "clocks {a:?} and {b:?} do not share an integer frequency ratio")
            }
            Self::ProgramTermination { exit_code } => {
                write!(f, "program terminated with exit code {exit_code}")
            }
        }
    }
}

/// Everything that can stop the kernel's `step` loop short of a clean
/// `RunState`, annotated with the point at which it unwound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationException {
    pub kind: SimulationExceptionKind,
    pub master_cycle: CycleNo,
    pub process: Option<String>,
}

impl fmt::Display for SimulationException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at cycle {}", self.kind, self.master_cycle)?;
        if let Some(process) = &self.process {
            write!(f, " (active process: {process})")?;
        }
        Ok(())
    }
}

impl std::error::Error for SimulationException {}

pub type SimResult<T = ()> = Result<T, SimulationException>;
