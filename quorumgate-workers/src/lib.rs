//! Concrete worker implementations and the fault-injection harness.
//!
//! The consensus engine only ever sees `dyn Worker` trait objects; this
//! crate is where the concrete behavior behind that trait lives, including
//! the decorator that turns a well-behaved worker into a demonstrably
//! Byzantine one without changing its signing identity.

pub mod fault;
pub mod simulated;

pub use fault::{FaultConfig, FaultInjector, FaultType, FaultyWorker};
pub use simulated::SimulatedWorker;
