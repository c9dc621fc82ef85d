//! Clint utilities
//!
//! The functions exposed in this modules assumes the CLINT is located at the same addresses as on
//! the QEMU virt platform, and only program the timer of hart 0.

use traptest_core::virt::{CLINT_BASE, MTIMECMP_OFFSET, MTIME_OFFSET};

/// Get the current mtime value
pub fn read_mtime() -> usize {
    let mtime_ptr = (CLINT_BASE + MTIME_OFFSET) as *const usize;
    unsafe { mtime_ptr.read_volatile() }
}

/// Set mtimecmp deadline in the future
pub fn set_mtimecmp_deadline(delta: usize) {
    let current_mtime = read_mtime();
    let future_time = current_mtime.saturating_add(delta);
    write_mtimecmp(future_time);
}

/// Push the deadline out of reach, clearing the pending timer interrupt.
pub fn disarm_mtimecmp() {
    write_mtimecmp(usize::MAX);
}

fn write_mtimecmp(value: usize) {
    let mtimecmp_ptr = (CLINT_BASE + MTIMECMP_OFFSET) as *mut usize;
    unsafe {
        mtimecmp_ptr.write_volatile(value);
    }
}
