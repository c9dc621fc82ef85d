//! The watched memory cell
//!
//! The cell is the only communication channel between the driver and the trap handler: a single
//! 32 bit word at a fixed address. All accesses go through [WatchedCell], which performs volatile
//! loads and stores so that the compiler never elides or reorders them.
//!
//! Building a cell on top of raw memory is the one place where the address is trusted, hence
//! [WatchedCell::new] is unsafe while reads and writes are not.

use core::ptr;

// ——————————————————————————————— Cell Bus ————————————————————————————————— //

/// The bus through which the cell is accessed.
pub trait CellBus {
    fn load(&self, address: usize) -> u32;
    fn store(&self, address: usize, value: u32);
}

/// Memory-mapped access using volatile operations.
///
/// Can only be obtained through [WatchedCell::new].
#[derive(Debug)]
pub struct Mmio {
    _private: (),
}

impl CellBus for Mmio {
    fn load(&self, address: usize) -> u32 {
        // SAFETY: the address was validated by the caller of `WatchedCell::new`, which is the
        // only way to obtain an `Mmio` bus.
        unsafe { ptr::read_volatile(address as *const u32) }
    }

    fn store(&self, address: usize, value: u32) {
        // SAFETY: see `load`.
        unsafe { ptr::write_volatile(address as *mut u32, value) }
    }
}

// ————————————————————————————— Watched Cell ——————————————————————————————— //

#[derive(Debug)]
pub struct WatchedCell<B: CellBus = Mmio> {
    address: usize,
    bus: B,
}

impl WatchedCell<Mmio> {
    /// Create a cell backed by physical memory at `address`.
    ///
    /// # Safety
    ///
    /// `address` must be 4-byte aligned and volatile 32 bit accesses to it must not violate Rust
    /// memory safety (no live Rust reference may point to it). The access is allowed to trap.
    pub const unsafe fn new(address: usize) -> Self {
        WatchedCell {
            address,
            bus: Mmio { _private: () },
        }
    }
}

impl<B: CellBus> WatchedCell<B> {
    /// Create a cell accessed through a custom bus.
    pub const fn with_bus(address: usize, bus: B) -> Self {
        WatchedCell { address, bus }
    }

    pub fn address(&self) -> usize {
        self.address
    }

    pub fn read(&self) -> u32 {
        self.bus.load(self.address)
    }

    pub fn write(&self, value: u32) {
        self.bus.store(self.address, value)
    }
}
