//! Traptest core definitions
//!
//! This crate holds the constants shared by the firmware, the trap machinery and the host-side
//! runner: the sentinel values, the default location of the watched cell and the addresses of the
//! QEMU virt devices we rely on. It is `no_std` and holds almost no code, so that it can be used
//! from bare-metal code as well as from external tooling.

#![cfg_attr(not(test), no_std)]

use core::fmt;

// ——————————————————————————————— Sentinels ———————————————————————————————— //

/// Value written by the driver before trap enablement.
pub const DRIVER_SENTINEL: u32 = 0xDEAD_BEEF;

/// Value written by the trap handler, proof that a trap has been delivered.
pub const HANDLER_SENTINEL: u32 = 0x2022;

/// Content of the watched cell on a fresh reset.
pub const RESET_VALUE: u32 = 0x0;

/// Default address of the watched cell.
pub const DEFAULT_CELL_ADDRESS: usize = 0x4;

// ——————————————————————————————— Platform ————————————————————————————————— //

/// Device addresses of the QEMU virt board.
pub mod virt {
    /// UART 16550 base address.
    pub const UART_BASE: usize = 0x1000_0000;
    /// SiFive test device, used to exit QEMU.
    pub const TEST_DEVICE_BASE: usize = 0x10_0000;
    /// CLINT base address.
    pub const CLINT_BASE: usize = 0x200_0000;
    /// Offset of the `mtime` register within the CLINT.
    pub const MTIME_OFFSET: usize = 0xBFF8;
    /// Offset of the `mtimecmp` register of hart 0 within the CLINT.
    pub const MTIMECMP_OFFSET: usize = 0x4000;

    /// Test device code for a failed exit, the exit code goes in the upper 16 bits.
    pub const EXIT_FAILURE: u32 = 0x3333;
}

// —————————————————————————————— Cell State ———————————————————————————————— //

/// Interpretation of a value read from the watched cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellState {
    /// The cell still holds its reset value.
    Reset,
    /// Only the driver wrote to the cell.
    DriverSentinel,
    /// The trap handler ran.
    HandlerSentinel,
    /// Something else wrote to the cell.
    Unknown(u32),
}

impl CellState {
    pub const fn classify(value: u32) -> Self {
        match value {
            RESET_VALUE => CellState::Reset,
            DRIVER_SENTINEL => CellState::DriverSentinel,
            HANDLER_SENTINEL => CellState::HandlerSentinel,
            other => CellState::Unknown(other),
        }
    }

    /// Whether the cell proves that the trap handler executed.
    pub const fn is_delivered(self) -> bool {
        matches!(self, CellState::HandlerSentinel)
    }
}

impl fmt::Display for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellState::Reset => write!(f, "reset value (0x{:x})", RESET_VALUE),
            CellState::DriverSentinel => write!(f, "driver sentinel (0x{:x})", DRIVER_SENTINEL),
            CellState::HandlerSentinel => {
                write!(f, "handler sentinel (0x{:x})", HANDLER_SENTINEL)
            }
            CellState::Unknown(value) => write!(f, "unexpected value (0x{:x})", value),
        }
    }
}
