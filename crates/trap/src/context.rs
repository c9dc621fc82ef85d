//! Trap context

use crate::MCause;

/// Signature of the trap handler.
///
/// The handler receives the address of the interrupted instruction and the raw cause code, both
/// by value: nothing outlives a single invocation.
pub type TrapHandler = fn(epc: usize, cause: usize);

/// Information written by the hardware when a trap is taken.
///
/// Lives on the trap entry stack for the duration of one trap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrapContext {
    pub epc: usize,
    pub cause: usize,
}

impl TrapContext {
    pub fn new(epc: usize, cause: usize) -> Self {
        TrapContext { epc, cause }
    }

    pub fn mcause(&self) -> MCause {
        MCause::from(self.cause)
    }
}
