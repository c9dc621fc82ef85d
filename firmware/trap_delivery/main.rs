#![no_std]
#![no_main]

use traptest_abi::{enable_interrupt, idle, setup_binary};
use traptest_config::CELL_ADDRESS;
use traptest_trap::{selftest, WatchedCell};

setup_binary!(main, trap_handler);

/// The cell inspected from the outside once the firmware idles.
///
/// SAFETY: nothing else in the firmware refers to this address, and the store is allowed to trap.
static CELL: WatchedCell = unsafe { WatchedCell::new(CELL_ADDRESS) };

fn main() -> ! {
    log::info!("Trap delivery test, watching 0x{:x}", CELL.address());

    // No access to the cell past this point: reading it back could trap again
    selftest::provoke(&CELL, enable_interrupt);

    log::info!(
        "Trap handler ran {} time(s), idling",
        traptest_abi::deliveries()
    );
    idle()
}

// —————————————————————————————— Trap Handler —————————————————————————————— //

fn trap_handler(_epc: usize, _cause: usize) {
    selftest::mark_delivered(&CELL);
}
