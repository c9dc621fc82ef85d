//! Trap entry and trap enablement
//!
//! The low level trap vector saves the interrupted context and calls into [handle_trap], which
//! routes the trap through the gate and computes where execution resumes. [enable] is the trap
//! enablement primitive. Both are generic over the [Platform], so that the same logic runs on
//! bare metal and in the simulated machine used by the tests.

use crate::{Delivery, MCause, TrapContext, TrapGate};

// ———————————————————————————————— Platform ———————————————————————————————— //

/// Platform operations needed around trap delivery.
pub trait Platform {
    /// Let interrupts be taken (global and machine timer enable bits).
    fn enable_interrupts(&self);

    /// Program the timer to fire in `delta` ticks.
    fn arm_timer(&self, delta: usize);

    /// Silence the timer interrupt, so that it does not fire again on return.
    fn acknowledge_timer(&self);

    /// Read the 16 bits instruction parcel at `pc`.
    fn read_parcel(&self, pc: usize) -> u16;
}

// ———————————————————————————— Trap Enablement ————————————————————————————— //

/// Arm the platform such that subsequent qualifying traps invoke the bound handler.
///
/// The gate is opened before interrupts are enabled: a timer already past its deadline fires as
/// soon as interrupts are enabled.
pub fn enable<P: Platform>(gate: &TrapGate, platform: &P, timer_delta: usize) {
    gate.enable();
    platform.arm_timer(timer_delta);
    platform.enable_interrupts();
}

// ——————————————————————————————— Trap Entry ——————————————————————————————— //

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrapOutcome {
    pub delivery: Delivery,
    /// Address at which to resume, `None` if execution can not continue.
    pub resume: Option<usize>,
}

/// Handle one trap: dispatch it to the handler and compute the resume address.
///
/// Must not log nor take locks: the interrupted code might hold them.
pub fn handle_trap<P: Platform>(gate: &TrapGate, platform: &P, ctx: &TrapContext) -> TrapOutcome {
    let delivery = gate.dispatch(ctx);

    let cause = ctx.mcause();
    if cause == MCause::MachineTimerInt {
        platform.acknowledge_timer();
    }

    TrapOutcome {
        delivery,
        resume: resume_address(ctx, |pc| platform.read_parcel(pc)),
    }
}

/// Address at which execution resumes after a trap.
///
/// Interrupts resume at the interrupted instruction. Exceptions resume after the faulting
/// instruction, otherwise it would trap again identically. Instruction fetch faults can not be
/// resumed from.
pub fn resume_address(ctx: &TrapContext, read_parcel: impl FnOnce(usize) -> u16) -> Option<usize> {
    let cause = ctx.mcause();
    if cause.is_interrupt() {
        return Some(ctx.epc);
    }
    if cause.is_fetch_fault() {
        return None;
    }

    let len = instruction_len(read_parcel(ctx.epc));
    Some(ctx.epc.wrapping_add(len))
}

/// Length in bytes of the instruction starting with `parcel`.
///
/// Standard instructions have their two lowest bits set, compressed ones do not.
pub fn instruction_len(parcel: u16) -> usize {
    if parcel & 0b11 == 0b11 {
        4
    } else {
        2
    }
}
