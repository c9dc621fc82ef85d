//! Traptest ABI
//!
//! Boot code, trap vector and platform services for the self-test firmware, running bare metal in
//! M-mode on the QEMU virt board.
//!
//! A firmware only needs to call [setup_binary!] with its entry point and its trap handler, and can
//! then use [enable_interrupt] and [idle].
#![no_std]

use core::hint;
use core::ptr;

use traptest_config as config;
use traptest_core::virt;
use traptest_trap::entry;
pub use traptest_trap::TrapHandler;
use traptest_trap::{BindError, TrapGate};

mod arch;
mod clint;
pub mod logger;

pub use log;

use crate::arch::MetalPlatform;

// ——————————————————————————————— Trap Gate ———————————————————————————————— //

/// The gate through which all traps go.
static GATE: TrapGate = TrapGate::new();

/// Bind the firmware trap handler, can only be done once.
///
/// This is called by `setup_binary!`, which also checks the signature of the handler.
pub fn bind_trap_handler(handler: TrapHandler) -> Result<(), BindError> {
    GATE.bind(handler)
}

/// Arm the platform such that subsequent traps invoke the bound trap handler.
///
/// On the QEMU virt board this enables machine interrupts and programs the CLINT deadline, so
/// that a machine timer interrupt becomes pending. When the configuration selects the stub, this
/// is a no-op and traps never reach the handler.
pub fn enable_interrupt() {
    if config::ENABLE_STUB {
        log::warn!("Trap enablement is stubbed out");
        return;
    }

    entry::enable(&GATE, &MetalPlatform, config::TIMER_DELTA);
}

/// Number of completed trap handler invocations.
pub fn deliveries() -> usize {
    GATE.deliveries()
}

// —————————————————————————————— Termination ——————————————————————————————— //

/// Spin forever, without ever yielding.
pub fn idle() -> ! {
    loop {
        hint::spin_loop();
    }
}

/// Exit QEMU with a failure error code.
pub fn failure() -> ! {
    let code = (1 << 16) | virt::EXIT_FAILURE;

    unsafe {
        ptr::write_volatile(virt::TEST_DEVICE_BASE as *mut u32, code);
    }

    // Loop forever if shutdown failed
    idle()
}

// ————————————————————————————— Firmware Setup ————————————————————————————— //

/// Early platform initialization, called by `setup_binary!` before the entry point.
#[doc(hidden)]
pub fn init() {
    logger::init();
    log::debug!(
        "Loaded at 0x{:x} with a 0x{:x} bytes stack",
        config::TARGET_START_ADDRESS,
        config::TARGET_STACK_SIZE
    );
    arch::install_trap_vector();
}

/// Configure the firmware entry point, trap handler and panic handler.
///
/// This macro prepares all the boiler plate required by the self-test firmware: a boot sequence
/// that sets up the stack and clears `.bss`, the platform initialization, and the binding of the
/// trap handler.
#[macro_export]
macro_rules! setup_binary {
    ($path:path, $handler:path) => {
        // The assembly entry point
        core::arch::global_asm!(
            r#"
            .section .text.init
            .align 4
            .global _start
            _start:
                // Park all harts but the first one
                csrr t0, mhartid
                bnez t0, 3f

                // Zero out the bss section
                ld t0, __bss_start
                ld t1, __bss_stop
            1:
                bgeu t0, t1, 2f
                sd zero, 0(t0)
                addi t0, t0, 8
                j 1b
            2:
                // Load the stack pointer and jump into main
                ld sp, __stack_top
                j {entry}
            3:
                wfi
                j 3b

                // Store the addresses in memory
                // That way they can be loaded as absolute values
                .align 3
                __stack_top:
                    .dword {stack_top}
                __bss_start:
                    .dword {bss_start}
                __bss_stop:
                    .dword {bss_stop}
            "#,
            entry = sym _firmware_start,
            stack_top = sym _stack_top,
            bss_start = sym _bss_start,
            bss_stop = sym _bss_stop,
        );

        pub extern "C" fn _firmware_start() -> ! {
            // Validate the signature of the entry point and trap handler.
            let f: fn() -> ! = $path;
            let handler: $crate::TrapHandler = $handler;

            $crate::init();
            if let Err(err) = $crate::bind_trap_handler(handler) {
                panic!("Failed to bind trap handler: {}", err);
            }

            f();
        }

        // Defined in the linker script
        extern "C" {
            pub(crate) static _stack_top: u8;
            pub(crate) static _bss_start: u8;
            pub(crate) static _bss_stop: u8;
        }

        // Also include the panic handler
        $crate::firmware_panic!();
    };
}

/// Configure a panic handler for the firmware.
///
/// The handler logs the panic and exits QEMU with an error.
#[macro_export]
macro_rules! firmware_panic {
    () => {
        #[panic_handler]
        fn panic(info: &core::panic::PanicInfo) -> ! {
            $crate::log::error!("Firmware panicked: {:#?} ", info);
            $crate::failure();
        }
    };
}
