//! Traptest Configuration
//!
//! This crate hosts the environment variables used to configure the firmware at build time, and
//! the values they resolve to. The runner sets those variables from its TOML configuration when
//! invoking cargo.

#![no_std]

use config_helpers::{is_enabled, is_enabled_default_false, parse_str_or, parse_usize_or};
use traptest_core::DEFAULT_CELL_ADDRESS;

// ———————————————————————————————— Logging ————————————————————————————————— //

/// The desired log level, one of `trace`, `debug`, `info`, `warn`, `error` or `off`.
pub const LOG_LEVEL: &str = parse_str_or(option_env!("TRAPTEST_LOG_LEVEL"), "info");
pub const LOG_LEVEL_ENV: &str = "TRAPTEST_LOG_LEVEL";

/// If colors in logs are enabled.
pub const LOG_COLOR: bool = is_enabled!("TRAPTEST_LOG_COLOR");
pub const LOG_COLOR_ENV: &str = "TRAPTEST_LOG_COLOR";

// —————————————————————————————— Watched Cell —————————————————————————————— //

/// Address of the watched memory cell.
pub const CELL_ADDRESS: usize =
    parse_usize_or(option_env!("TRAPTEST_CELL_ADDRESS"), DEFAULT_CELL_ADDRESS);
pub const CELL_ADDRESS_ENV: &str = "TRAPTEST_CELL_ADDRESS";

// —————————————————————————————————— Trap —————————————————————————————————— //

/// Number of timer ticks between trap enablement and the timer deadline.
pub const TIMER_DELTA: usize = parse_usize_or(option_env!("TRAPTEST_TIMER_DELTA"), 0);
pub const TIMER_DELTA_ENV: &str = "TRAPTEST_TIMER_DELTA";

/// Replace trap enablement with a no-op.
pub const ENABLE_STUB: bool = is_enabled_default_false!("TRAPTEST_ENABLE_STUB");
pub const ENABLE_STUB_ENV: &str = "TRAPTEST_ENABLE_STUB";

// ————————————————————————————————— Target ————————————————————————————————— //

/// Start address of the firmware
pub const TARGET_START_ADDRESS: usize =
    parse_usize_or(option_env!("TRAPTEST_TARGET_START_ADDRESS"), 0x80000000);
pub const TARGET_START_ADDRESS_ENV: &str = "TRAPTEST_TARGET_START_ADDRESS";

/// The firmware stack size
pub const TARGET_STACK_SIZE: usize =
    parse_usize_or(option_env!("TRAPTEST_TARGET_STACK_SIZE"), 0x8000);
pub const TARGET_STACK_SIZE_ENV: &str = "TRAPTEST_TARGET_STACK_SIZE";
