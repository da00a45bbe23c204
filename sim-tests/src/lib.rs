//! Integration test crate for the simulation kernel and its ambient
//! diagnostics/trace libraries. No runtime code of its own — the
//! scenarios under `tests/` exercise `sim-kernel` and `sim-lib` the way
//! an embedder would, driving whole `Kernel::step` runs rather than
//! individual methods.
