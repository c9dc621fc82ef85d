//! Trap delivery machinery
//!
//! This crate holds the platform independent part of the trap delivery self-test: the watched
//! cell, the trap gate which admits traps to the handler, the trap entry logic computing where to
//! resume, and the self-test sequence itself.
//!
//! Everything here is plain Rust without inline assembly, the bare-metal glue lives in
//! `traptest_abi`. This lets us run the exact same code against a simulated machine in host unit
//! tests.

// Mark the crate as no_std, but only when not running tests.
#![cfg_attr(not(test), no_std)]

mod cause;
mod cell;
mod context;
mod gate;

pub mod entry;
pub mod selftest;

#[cfg(test)]
mod host;

pub use cause::MCause;
pub use cell::{CellBus, Mmio, WatchedCell};
pub use context::{TrapContext, TrapHandler};
pub use entry::{Platform, TrapOutcome};
pub use gate::{BindError, Delivery, HandlerState, TrapGate};
