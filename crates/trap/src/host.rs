//! A simulated machine, running the self-test on the host.
//!
//! The machine models just enough of a hart for the self-test: the watched cell with a
//! configurable fault behavior, the global interrupt enable bit, a timer and trap nesting. Traps go
//! through the same gate and trap entry code as on bare metal, and the bound handler runs the same
//! body as the firmware handler.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use traptest_core::{DRIVER_SENTINEL, HANDLER_SENTINEL, RESET_VALUE};

use crate::entry::{self, Platform};
use crate::{selftest, CellBus, Delivery, MCause, TrapContext, TrapGate, WatchedCell};

const CELL_ADDRESS: usize = 0x4;
const DRIVER_START: usize = 0x8000_0000;
const HANDLER_PC: usize = 0x8000_1000;
const INTERRUPT_BIT: usize = 1 << (usize::BITS - 1);
const STORE_ACCESS_FAULT: usize = 7;

/// Every simulated instruction is a 4 bytes `sw`.
const SW_PARCEL: u16 = 0x2023;

// ————————————————————————————— Configuration —————————————————————————————— //

/// How stores to the watched cell behave.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Stores never fault.
    Never,
    /// Driver stores fault and are not performed, handler stores succeed.
    Driver,
    /// Driver stores fault, but the fault is only reported once interrupts are enabled.
    DriverLatched,
    /// All stores fault, including the handler's.
    Always,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Store {
        value: u32,
        from_handler: bool,
        performed: bool,
    },
    Enable,
    Trap {
        cause: MCause,
        epc: usize,
        delivery: Delivery,
        resume: Option<usize>,
    },
}

// ———————————————————————————————— Machine ————————————————————————————————— //

pub struct HostMachine {
    policy: FaultPolicy,
    has_timer: bool,
    gate: TrapGate,
    memory: Cell<u32>,
    pc: Cell<usize>,
    depth: Cell<usize>,
    now: Cell<usize>,
    interrupts_enabled: Cell<bool>,
    timer_deadline: Cell<Option<usize>>,
    pending_fault: Cell<Option<TrapContext>>,
    events: RefCell<Vec<Event>>,
}

thread_local! {
    static MACHINE: RefCell<Option<Rc<HostMachine>>> = const { RefCell::new(None) };
}

fn current() -> Rc<HostMachine> {
    MACHINE.with(|machine| machine.borrow().clone().expect("No machine booted on this thread"))
}

/// The handler bound in the simulated machine.
fn trap_handler(_epc: usize, _cause: usize) {
    let machine = current();
    selftest::mark_delivered(&machine.cell());
}

impl HostMachine {
    /// Boot a fresh machine on the current thread, with the handler bound.
    ///
    /// When `has_timer` is set trap enablement arms a timer that fires immediately, as on the
    /// QEMU virt board.
    pub fn boot(policy: FaultPolicy, has_timer: bool) -> Rc<HostMachine> {
        let machine = Rc::new(HostMachine {
            policy,
            has_timer,
            gate: TrapGate::new(),
            memory: Cell::new(RESET_VALUE),
            pc: Cell::new(DRIVER_START),
            depth: Cell::new(0),
            now: Cell::new(0),
            interrupts_enabled: Cell::new(false),
            timer_deadline: Cell::new(None),
            pending_fault: Cell::new(None),
            events: RefCell::new(Vec::new()),
        });
        machine.gate.bind(trap_handler).unwrap();
        MACHINE.with(|current| *current.borrow_mut() = Some(machine.clone()));
        machine
    }

    pub fn cell(&self) -> WatchedCell<&HostMachine> {
        WatchedCell::with_bus(CELL_ADDRESS, self)
    }

    /// Run the driver up to its idle loop, optionally with a no-op trap enablement.
    pub fn run_driver(&self, stub_enable: bool) {
        selftest::provoke(&self.cell(), || {
            if !stub_enable {
                self.enable_interrupt()
            }
        });
    }

    pub fn enable_interrupt(&self) {
        self.events.borrow_mut().push(Event::Enable);
        entry::enable(&self.gate, self, 0);
    }

    /// Spin in the idle loop for a number of ticks.
    pub fn idle(&self, ticks: usize) {
        for _ in 0..ticks {
            self.now.set(self.now.get() + 1);
            self.poll_interrupts();
        }
    }

    pub fn gate(&self) -> &TrapGate {
        &self.gate
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// The values that actually landed in the cell, in order.
    pub fn performed_writes(&self) -> Vec<u32> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Store {
                    value,
                    performed: true,
                    ..
                } => Some(*value),
                _ => None,
            })
            .collect()
    }

    pub fn traps(&self) -> Vec<Event> {
        self.events
            .borrow()
            .iter()
            .filter(|event| matches!(event, Event::Trap { .. }))
            .copied()
            .collect()
    }

    fn in_trap(&self) -> bool {
        self.depth.get() > 0
    }

    fn take_trap(&self, ctx: TrapContext) {
        self.depth.set(self.depth.get() + 1);
        let outcome = entry::handle_trap(&self.gate, self, &ctx);
        self.depth.set(self.depth.get() - 1);

        self.events.borrow_mut().push(Event::Trap {
            cause: ctx.mcause(),
            epc: ctx.epc,
            delivery: outcome.delivery,
            resume: outcome.resume,
        });
    }

    fn poll_interrupts(&self) {
        // Interrupts are disabled while a trap is being handled
        if !self.interrupts_enabled.get() || self.in_trap() {
            return;
        }

        if let Some(fault) = self.pending_fault.take() {
            self.take_trap(fault);
        }
        if let Some(deadline) = self.timer_deadline.get() {
            if self.now.get() >= deadline {
                let ctx = TrapContext::new(self.pc.get(), INTERRUPT_BIT | 7);
                self.take_trap(ctx);
            }
        }
    }
}

impl CellBus for &HostMachine {
    fn load(&self, address: usize) -> u32 {
        assert_eq!(address, CELL_ADDRESS, "Only the watched cell is simulated");
        self.memory.get()
    }

    fn store(&self, address: usize, value: u32) {
        assert_eq!(address, CELL_ADDRESS, "Only the watched cell is simulated");
        let from_handler = self.in_trap();
        let faults = match self.policy {
            FaultPolicy::Never => false,
            FaultPolicy::Driver | FaultPolicy::DriverLatched => !from_handler,
            FaultPolicy::Always => true,
        };

        self.events.borrow_mut().push(Event::Store {
            value,
            from_handler,
            performed: !faults,
        });

        let epc = if from_handler {
            HANDLER_PC
        } else {
            let pc = self.pc.get();
            self.pc.set(pc + 4);
            pc
        };

        if !faults {
            self.memory.set(value);
            return;
        }

        let ctx = TrapContext::new(epc, STORE_ACCESS_FAULT);
        if self.policy == FaultPolicy::DriverLatched && !self.interrupts_enabled.get() {
            self.pending_fault.set(Some(ctx));
        } else {
            self.take_trap(ctx);
        }
    }
}

impl Platform for HostMachine {
    fn enable_interrupts(&self) {
        self.interrupts_enabled.set(true);
        self.poll_interrupts();
    }

    fn arm_timer(&self, delta: usize) {
        if self.has_timer {
            self.timer_deadline.set(Some(self.now.get() + delta));
        }
    }

    fn acknowledge_timer(&self) {
        self.timer_deadline.set(None);
    }

    fn read_parcel(&self, _pc: usize) -> u16 {
        SW_PARCEL
    }
}

// ————————————————————————————————— Tests —————————————————————————————————— //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HandlerState;

    const ALL_POLICIES: [FaultPolicy; 4] = [
        FaultPolicy::Never,
        FaultPolicy::Driver,
        FaultPolicy::DriverLatched,
        FaultPolicy::Always,
    ];

    fn position(events: &[Event], predicate: impl Fn(&Event) -> bool) -> Option<usize> {
        events.iter().position(predicate)
    }

    #[test]
    fn fresh_reset_ends_with_handler_sentinel() {
        let machine = HostMachine::boot(FaultPolicy::Never, true);
        assert_eq!(machine.cell().read(), RESET_VALUE);

        machine.run_driver(false);
        machine.idle(100);

        assert_eq!(machine.cell().read(), HANDLER_SENTINEL);
        assert_eq!(
            machine.performed_writes(),
            vec![DRIVER_SENTINEL, HANDLER_SENTINEL]
        );
        assert_eq!(machine.gate().deliveries(), 1);
    }

    #[test]
    fn latched_driver_fault_is_delivered_after_enablement() {
        let machine = HostMachine::boot(FaultPolicy::DriverLatched, false);
        machine.run_driver(false);
        machine.idle(10);

        assert_eq!(machine.cell().read(), HANDLER_SENTINEL);
        assert_eq!(machine.performed_writes(), vec![HANDLER_SENTINEL]);
        assert_eq!(
            machine.traps(),
            vec![Event::Trap {
                cause: MCause::StoreAccessFault,
                epc: DRIVER_START,
                delivery: Delivery::Delivered,
                resume: Some(DRIVER_START + 4),
            }]
        );
    }

    #[test]
    fn driver_fault_before_enablement_is_masked() {
        let machine = HostMachine::boot(FaultPolicy::Driver, true);
        machine.run_driver(false);
        machine.idle(10);

        let traps = machine.traps();
        assert_eq!(traps.len(), 2);
        assert_eq!(
            traps[0],
            Event::Trap {
                cause: MCause::StoreAccessFault,
                epc: DRIVER_START,
                delivery: Delivery::Masked,
                resume: Some(DRIVER_START + 4),
            }
        );
        assert!(matches!(
            traps[1],
            Event::Trap {
                cause: MCause::MachineTimerInt,
                delivery: Delivery::Delivered,
                ..
            }
        ));

        // The driver sentinel never persisted
        assert_eq!(machine.performed_writes(), vec![HANDLER_SENTINEL]);
        assert_eq!(machine.cell().read(), HANDLER_SENTINEL);
    }

    #[test]
    fn cell_is_written_at_most_twice_in_order() {
        for policy in ALL_POLICIES {
            for has_timer in [false, true] {
                let machine = HostMachine::boot(policy, has_timer);
                machine.run_driver(false);
                machine.idle(50);

                let stores: Vec<Event> = machine
                    .events()
                    .into_iter()
                    .filter(|event| matches!(event, Event::Store { .. }))
                    .collect();
                let handler_stores = stores
                    .iter()
                    .filter(|event| matches!(event, Event::Store { from_handler: true, .. }))
                    .count();
                assert!(stores.len() <= 2, "{:?}: too many stores {:x?}", policy, stores);
                assert!(handler_stores <= 1, "{:?}: handler ran {} times", policy, handler_stores);
                assert!(machine.gate().deliveries() <= 1);

                let writes = machine.performed_writes();
                if let Some(last) = writes.last() {
                    assert_eq!(*last, machine.cell().read());
                }
                if writes.len() == 2 {
                    assert_eq!(writes, vec![DRIVER_SENTINEL, HANDLER_SENTINEL]);
                }
            }
        }
    }

    #[test]
    fn latched_fault_and_timer_deliver_once() {
        let machine = HostMachine::boot(FaultPolicy::DriverLatched, true);
        machine.run_driver(false);
        machine.idle(10);

        assert_eq!(machine.gate().deliveries(), 1);
        assert_eq!(machine.performed_writes(), vec![HANDLER_SENTINEL]);

        let traps = machine.traps();
        assert_eq!(traps.len(), 2);
        assert!(matches!(
            traps[0],
            Event::Trap {
                cause: MCause::StoreAccessFault,
                delivery: Delivery::Delivered,
                ..
            }
        ));
        assert!(matches!(
            traps[1],
            Event::Trap {
                cause: MCause::MachineTimerInt,
                delivery: Delivery::Spent,
                ..
            }
        ));
    }

    #[test]
    fn handler_never_writes_before_enablement() {
        for policy in ALL_POLICIES {
            for stub_enable in [false, true] {
                let machine = HostMachine::boot(policy, true);
                machine.run_driver(stub_enable);
                machine.idle(50);

                let events = machine.events();
                let enable = position(&events, |e| *e == Event::Enable);
                let first_handler_store = position(&events, |e| {
                    matches!(
                        e,
                        Event::Store {
                            from_handler: true,
                            ..
                        }
                    )
                });

                match (enable, first_handler_store) {
                    (_, None) => (),
                    (Some(enable), Some(store)) => assert!(enable < store),
                    (None, Some(_)) => panic!("{:?}: handler ran without enablement", policy),
                }
            }
        }
    }

    #[test]
    fn stubbed_enablement_never_runs_the_handler() {
        let machine = HostMachine::boot(FaultPolicy::Never, true);
        machine.run_driver(true);
        machine.idle(100);
        assert_eq!(machine.cell().read(), DRIVER_SENTINEL);
        assert_eq!(machine.gate().deliveries(), 0);
        assert!(machine.traps().is_empty());

        let machine = HostMachine::boot(FaultPolicy::Driver, true);
        machine.run_driver(true);
        machine.idle(100);
        assert_eq!(machine.cell().read(), RESET_VALUE);
        assert_eq!(machine.gate().deliveries(), 0);
        assert!(machine
            .traps()
            .iter()
            .all(|trap| matches!(trap, Event::Trap { delivery: Delivery::Masked, .. })));
    }

    #[test]
    fn handler_returns_and_execution_resumes() {
        for policy in ALL_POLICIES {
            let machine = HostMachine::boot(policy, true);
            machine.run_driver(false);
            machine.idle(10);

            assert_eq!(machine.gate().state(), HandlerState::Idle);
            for trap in machine.traps() {
                let Event::Trap {
                    cause, epc, resume, ..
                } = trap
                else {
                    unreachable!()
                };
                if cause.is_interrupt() {
                    assert_eq!(resume, Some(epc));
                } else {
                    assert_eq!(resume, Some(epc + 4));
                }
            }
        }
    }

    #[test]
    fn idle_loop_is_quiescent() {
        for policy in ALL_POLICIES {
            let machine = HostMachine::boot(policy, true);
            machine.run_driver(false);
            machine.idle(1);

            let events = machine.events().len();
            let value = machine.cell().read();
            machine.idle(10_000);
            assert_eq!(machine.events().len(), events);
            assert_eq!(machine.cell().read(), value);
        }
    }

    #[test]
    fn nested_fault_does_not_reenter_the_handler() {
        let machine = HostMachine::boot(FaultPolicy::Always, true);
        machine.run_driver(false);
        machine.idle(10);

        let traps = machine.traps();
        // Masked driver fault, then the handler's own fault nested in the timer interrupt
        assert_eq!(traps.len(), 3);
        assert!(matches!(
            traps[1],
            Event::Trap {
                cause: MCause::StoreAccessFault,
                epc: HANDLER_PC,
                delivery: Delivery::Nested,
                ..
            }
        ));
        assert!(matches!(
            traps[2],
            Event::Trap {
                cause: MCause::MachineTimerInt,
                delivery: Delivery::Delivered,
                ..
            }
        ));
        assert_eq!(machine.gate().deliveries(), 1);
        assert_eq!(machine.cell().read(), RESET_VALUE);
        assert!(machine.performed_writes().is_empty());
    }
}
