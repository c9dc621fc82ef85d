//! Trap gate
//!
//! The gate decides whether a trap reaches the handler. It holds the one-time handler binding, the
//! trap enablement state (disabled at reset, enabled once, never disabled again) and the handler
//! state machine (idle or handling). The handler is admitted at most once over the lifetime of the
//! gate, so the watched cell is written at most once by the handler.
//!
//! The gate is touched from the trap path, it must therefore never block: all state is kept in
//! atomics and the binding is written once before traps are enabled.

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use spin::Once;
use thiserror_no_std::Error;

use crate::{TrapContext, TrapHandler};

// ———————————————————————————————— Errors —————————————————————————————————— //

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindError {
    #[error("a trap handler is already bound")]
    AlreadyBound,
}

// ————————————————————————————— Handler State —————————————————————————————— //

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerState {
    Idle,
    Handling,
}

/// What happened to a trap that went through the gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// The handler ran to completion.
    Delivered,
    /// Traps are not enabled yet.
    Masked,
    /// The trap was raised while the handler was running.
    Nested,
    /// No handler is bound.
    Unbound,
    /// The handler already ran once, it never runs again.
    Spent,
}

// —————————————————————————————————— Gate —————————————————————————————————— //

pub struct TrapGate {
    handler: Once<TrapHandler>,
    enabled: AtomicBool,
    handling: AtomicBool,
    deliveries: AtomicUsize,
}

impl TrapGate {
    pub const fn new() -> Self {
        TrapGate {
            handler: Once::new(),
            enabled: AtomicBool::new(false),
            handling: AtomicBool::new(false),
            deliveries: AtomicUsize::new(0),
        }
    }

    /// Bind the trap handler. Only the first binding is accepted.
    pub fn bind(&self, handler: TrapHandler) -> Result<(), BindError> {
        let mut fresh = false;
        self.handler.call_once(|| {
            fresh = true;
            handler
        });

        if fresh {
            Ok(())
        } else {
            Err(BindError::AlreadyBound)
        }
    }

    pub fn is_bound(&self) -> bool {
        self.handler.is_completed()
    }

    /// Let subsequent traps reach the handler.
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn state(&self) -> HandlerState {
        if self.handling.load(Ordering::Acquire) {
            HandlerState::Handling
        } else {
            HandlerState::Idle
        }
    }

    /// Number of completed handler invocations.
    pub fn deliveries(&self) -> usize {
        self.deliveries.load(Ordering::Relaxed)
    }

    /// Route a trap to the handler, if the gate admits it.
    pub fn dispatch(&self, ctx: &TrapContext) -> Delivery {
        if !self.is_enabled() {
            return Delivery::Masked;
        }
        let Some(handler) = self.handler.get() else {
            return Delivery::Unbound;
        };
        if self.handling.swap(true, Ordering::AcqRel) {
            return Delivery::Nested;
        }
        if self.deliveries.load(Ordering::Acquire) > 0 {
            self.handling.store(false, Ordering::Release);
            return Delivery::Spent;
        }

        handler(ctx.epc, ctx.cause);

        self.deliveries.fetch_add(1, Ordering::Release);
        self.handling.store(false, Ordering::Release);
        Delivery::Delivered
    }
}

impl Default for TrapGate {
    fn default() -> Self {
        Self::new()
    }
}
