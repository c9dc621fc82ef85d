//! The trap delivery self-test
//!
//! The driver writes the driver sentinel to the watched cell, then enables traps. The handler
//! overwrites the cell with the handler sentinel. The final value of the cell, inspected from the
//! outside, tells whether a trap was delivered.

use traptest_core::{DRIVER_SENTINEL, HANDLER_SENTINEL};

use crate::{CellBus, WatchedCell};

/// Driver sequence, up to the idle loop.
///
/// The store to the cell may itself trap, before traps are enabled.
pub fn provoke<B: CellBus>(cell: &WatchedCell<B>, enable_interrupt: impl FnOnce()) {
    cell.write(DRIVER_SENTINEL);
    enable_interrupt();
}

/// Handler body: mark the cell as written by the handler.
pub fn mark_delivered<B: CellBus>(cell: &WatchedCell<B>) {
    cell.write(HANDLER_SENTINEL);
}
