//! Bare metal RISC-V
//!
//! All direct interaction with the hart lives here: control and status registers, the trap vector
//! and the implementation of the trap entry platform interface.

use core::arch::{asm, global_asm};
use core::ptr;

use traptest_trap::entry::{self, Platform};
use traptest_trap::TrapContext;

use crate::{clint, failure, GATE};

/// Machine interrupt enable bit in mstatus.
const MSTATUS_MIE: usize = 1 << 3;
/// Machine timer interrupt enable bit in mie.
const MIE_MTIE: usize = 1 << 7;

// ———————————————————————————————— Platform ———————————————————————————————— //

/// The hart we are running on.
pub struct MetalPlatform;

impl Platform for MetalPlatform {
    fn enable_interrupts(&self) {
        unsafe {
            asm!(
                "csrs mie, {mtie}",            // Enable machine timer interrupt (MTIE)
                "csrs mstatus, {mstatus_mie}", // Enable interrupts (MIE)
                mtie = in(reg) MIE_MTIE,
                mstatus_mie = in(reg) MSTATUS_MIE,
            );
        }
    }

    fn arm_timer(&self, delta: usize) {
        clint::set_mtimecmp_deadline(delta);
    }

    fn acknowledge_timer(&self) {
        clint::disarm_mtimecmp();
    }

    fn read_parcel(&self, pc: usize) -> u16 {
        // SAFETY: `pc` is the address of an instruction that has been fetched, and instructions
        // are always 2 bytes aligned.
        unsafe { ptr::read_volatile(pc as *const u16) }
    }
}

// ————————————————————————————— Trap Vector ———————————————————————————————— //

/// Point mtvec to the trap vector, in direct mode.
pub fn install_trap_vector() {
    let handler = _raw_trap_vector as usize;
    unsafe { write_mtvec(handler) };
    assert_eq!(handler, read_mtvec(), "Failed to set trap handler");
}

unsafe fn write_mtvec(value: usize) {
    asm!(
        "csrw mtvec, {x}",
        x = in(reg) value
    )
}

fn read_mtvec() -> usize {
    let mtvec: usize;
    unsafe {
        asm!(
            "csrr {x}, mtvec",
            x = out(reg) mtvec
        )
    }
    mtvec
}

/// Called from the trap vector, returns the address at which to resume.
extern "C" fn trap_entry(epc: usize, cause: usize) -> usize {
    let ctx = TrapContext::new(epc, cause);
    match entry::handle_trap(&GATE, &MetalPlatform, &ctx).resume {
        Some(pc) => pc,
        None => failure(),
    }
}

// The vector saves caller-saved registers on the current stack, along with mstatus: a nested trap
// overwrites mstatus.MPIE, restoring it keeps interrupts enabled once the outer trap returns.
global_asm!(
    r#"
.text
.align 4
.global _raw_trap_vector
_raw_trap_vector:
    addi sp, sp, -(8*18)
    sd ra, (8*0)(sp)
    sd t0, (8*1)(sp)
    sd t1, (8*2)(sp)
    sd t2, (8*3)(sp)
    sd t3, (8*4)(sp)
    sd t4, (8*5)(sp)
    sd t5, (8*6)(sp)
    sd t6, (8*7)(sp)
    sd a0, (8*8)(sp)
    sd a1, (8*9)(sp)
    sd a2, (8*10)(sp)
    sd a3, (8*11)(sp)
    sd a4, (8*12)(sp)
    sd a5, (8*13)(sp)
    sd a6, (8*14)(sp)
    sd a7, (8*15)(sp)
    csrr t0, mstatus
    sd t0, (8*16)(sp)

    csrr a0, mepc
    csrr a1, mcause
    call {trap_entry}
    csrw mepc, a0

    ld t0, (8*16)(sp)
    csrw mstatus, t0
    ld ra, (8*0)(sp)
    ld t0, (8*1)(sp)
    ld t1, (8*2)(sp)
    ld t2, (8*3)(sp)
    ld t3, (8*4)(sp)
    ld t4, (8*5)(sp)
    ld t5, (8*6)(sp)
    ld t6, (8*7)(sp)
    ld a0, (8*8)(sp)
    ld a1, (8*9)(sp)
    ld a2, (8*10)(sp)
    ld a3, (8*11)(sp)
    ld a4, (8*12)(sp)
    ld a5, (8*13)(sp)
    ld a6, (8*14)(sp)
    ld a7, (8*15)(sp)
    addi sp, sp, (8*18)
    mret
"#,
    trap_entry = sym trap_entry,
);

extern "C" {
    fn _raw_trap_vector();
}
