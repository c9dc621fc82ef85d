//! Serial logger
//!
//! This is a logger implementation that prints to the UART of the QEMU virt board. The log level
//! and colors are selected at build time through the configuration.
//!
//! The logger must never be called from the trap path: the serial port is protected by a spin
//! lock, which the interrupted code might be holding.

use core::fmt::Write;
use core::sync::atomic::{AtomicBool, Ordering};

use log::{Level, LevelFilter, Metadata, Record};
use spin::Mutex;
use traptest_config as config;
use traptest_core::virt::UART_BASE;
use uart_16550::MmioSerialPort;

// ————————————————————————————————— Logger ————————————————————————————————— //

static SERIAL_PORT: Mutex<Option<MmioSerialPort>> = Mutex::new(None);

pub struct Logger {}

impl Logger {
    const GLOBAL_LOG_LEVEL: LevelFilter = match config::LOG_LEVEL.as_bytes() {
        b"trace" => LevelFilter::Trace,
        b"debug" => LevelFilter::Debug,
        b"info" => LevelFilter::Info,
        b"warn" => LevelFilter::Warn,
        b"error" => LevelFilter::Error,
        b"off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    };
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Self::GLOBAL_LOG_LEVEL
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut serial_port = SERIAL_PORT.lock();
        if let Some(serial_port) = serial_port.as_mut() {
            // Nowhere to report a failure to print
            writeln!(
                serial_port,
                "[{} | {}] {}",
                level_display(record.level()),
                record.target(),
                record.args()
            )
            .ok();
        }
    }

    fn flush(&self) {}
}

/// Initialize the serial port and install the logger.
///
/// This function is called automatically by `setup_binary!`.
pub fn init() {
    static IS_INITIALIZED: AtomicBool = AtomicBool::new(false);
    static LOGGER: Logger = Logger {};

    if IS_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        log::warn!("Logger is already initialized, skipping init");
        return;
    }

    let mut mmio = unsafe { MmioSerialPort::new(UART_BASE) };
    mmio.init();
    *SERIAL_PORT.lock() = Some(mmio);

    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(Logger::GLOBAL_LOG_LEVEL);
}

// ————————————————————————————————— Utils —————————————————————————————————— //

fn level_display(level: Level) -> &'static str {
    if config::LOG_COLOR {
        // We log with colors, using ANSI escape sequences
        match level {
            Level::Error => "\x1b[31;1mError\x1b[0m",
            Level::Warn => "\x1b[33;1mWarn\x1b[0m ",
            Level::Info => "\x1b[32;1mInfo\x1b[0m ",
            Level::Debug => "\x1b[34;1mDebug\x1b[0m",
            Level::Trace => "\x1b[35;1mTrace\x1b[0m",
        }
    } else {
        match level {
            Level::Error => "Error",
            Level::Warn => "Warn ",
            Level::Info => "Info ",
            Level::Debug => "Debug",
            Level::Trace => "Trace",
        }
    }
}
