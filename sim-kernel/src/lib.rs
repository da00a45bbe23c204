//! Cycle-accurate discrete-event scheduling kernel for a many-core
//! microthreaded architecture simulator.
//!
//! [`kernel::Kernel`] runs the three-phase Acquire/Check/Commit protocol
//! across clock domains; [`flag::Flag`], [`buffer::Buffer`] and the
//! [`ports`] module's arbitrated ports and structures are the storage
//! and arbitration primitives components are built from.

pub mod arena;
pub mod buffer;
pub mod clock;
pub mod error;
pub mod flag;
pub mod ids;
pub mod interconnect;
pub mod kernel;
pub mod message_pool;
pub mod object;
pub mod ports;
pub mod process;
pub mod storage;
pub mod trace;

pub use buffer::Buffer;
pub use clock::{CycleNo, Frequency, INFINITE_CYCLES};
pub use error::{SimResult, SimulationException, SimulationExceptionKind};
pub use flag::Flag;
pub use ids::{ArbitratorId, ClockId, ObjectId, ProcessId, StorageId};
pub use kernel::{Components, CyclePhase, Kernel, RunState};
pub use object::ObjectDiag;
pub use process::{ProcessResult, ProcessState};
pub use trace::{StorageTrace, StorageTraceSet};
