//! Trap causes

const INTERRUPT_BIT: usize = 1 << (usize::BITS - 1);

// ————————————————————————————————— mcause ————————————————————————————————— //

/// The causes the trap entry tells apart, any other cause is kept raw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MCause {
    InstrAddrMisaligned,
    InstrAccessFault,
    StoreAccessFault,
    InstrPageFault,
    MachineTimerInt,
    /// Raw mcause value.
    Other(usize),
}

impl MCause {
    pub fn is_interrupt(self) -> bool {
        match self {
            MCause::MachineTimerInt => true,
            MCause::Other(cause) => cause & INTERRUPT_BIT != 0,
            _ => false,
        }
    }

    /// Whether the trap was raised while fetching the instruction at `epc`.
    ///
    /// Execution can not resume after such a trap, as there is no instruction to skip.
    pub fn is_fetch_fault(self) -> bool {
        matches!(
            self,
            MCause::InstrAddrMisaligned | MCause::InstrAccessFault | MCause::InstrPageFault
        )
    }
}

impl From<usize> for MCause {
    fn from(cause: usize) -> Self {
        match cause {
            0 => MCause::InstrAddrMisaligned,
            1 => MCause::InstrAccessFault,
            7 => MCause::StoreAccessFault,
            12 => MCause::InstrPageFault,
            c if c == INTERRUPT_BIT | 7 => MCause::MachineTimerInt,
            other => MCause::Other(other),
        }
    }
}
