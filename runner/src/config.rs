//! Traptest configuration
//!
//! The configuration is read from a TOML file by the runner, which sets the appropriate
//! environment variables when building the firmware. Runner-only settings (QEMU and the cell
//! inspection) are consumed directly.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use traptest_config as env;

// ——————————————————————————— Config Definition ———————————————————————————— //

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub log: Log,
    #[serde(default)]
    pub cell: Cell,
    #[serde(default)]
    pub target: Target,
    #[serde(default)]
    pub trap: Trap,
    #[serde(default)]
    pub qemu: Qemu,
    #[serde(default)]
    pub inspect: Inspect,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct Log {
    pub level: Option<String>,
    pub color: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct Cell {
    pub address: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct Target {
    pub start_address: Option<usize>,
    pub stack_size: Option<usize>,
    pub profile: Option<Profiles>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct Trap {
    pub timer_delta: Option<usize>,
    pub enable_stub: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct Qemu {
    pub machine: Option<String>,
    pub cpu: Option<String>,
    pub memory: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct Inspect {
    /// Time given to the firmware to reach its idle loop before reading the cell.
    pub settle_ms: Option<u64>,
    /// Maximum time spent waiting on the QEMU monitor.
    pub timeout_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Profiles {
    #[default]
    Debug,
    Release,
}

// ———————————————————————————————— Defaults ———————————————————————————————— //

impl Config {
    pub fn cell_address(&self) -> usize {
        self.cell.address.unwrap_or(traptest_core::DEFAULT_CELL_ADDRESS)
    }

    pub fn start_address(&self) -> usize {
        self.target.start_address.unwrap_or(0x80000000)
    }

    pub fn stack_size(&self) -> usize {
        self.target.stack_size.unwrap_or(0x8000)
    }

    pub fn profile(&self) -> Profiles {
        self.target.profile.unwrap_or_default()
    }
}

impl Inspect {
    pub fn settle_ms(&self) -> u64 {
        self.settle_ms.unwrap_or(500)
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(5000)
    }
}

// ————————————————————————— Environment Variables —————————————————————————— //

impl Config {
    pub fn build_envs(&self) -> HashMap<String, String> {
        let mut envs = HashMap::new();
        envs.extend(self.log.build_envs());
        envs.extend(self.build_target_envs());
        envs.extend(self.trap.build_envs());
        envs
    }

    fn build_target_envs(&self) -> HashMap<String, String> {
        let mut envs = HashMap::new();
        envs.insert(
            String::from(env::CELL_ADDRESS_ENV),
            format!("0x{:x}", self.cell_address()),
        );
        envs.insert(
            String::from(env::TARGET_START_ADDRESS_ENV),
            format!("0x{:x}", self.start_address()),
        );
        envs.insert(
            String::from(env::TARGET_STACK_SIZE_ENV),
            format!("0x{:x}", self.stack_size()),
        );
        envs
    }
}

impl Log {
    fn build_envs(&self) -> HashMap<String, String> {
        let mut envs = HashMap::new();
        if let Some(level) = &self.level {
            envs.insert(String::from(env::LOG_LEVEL_ENV), level.clone());
        }
        if let Some(color) = self.color {
            envs.insert(String::from(env::LOG_COLOR_ENV), format!("{}", color));
        }
        envs
    }
}

impl Trap {
    fn build_envs(&self) -> HashMap<String, String> {
        let mut envs = HashMap::new();
        if let Some(timer_delta) = self.timer_delta {
            envs.insert(
                String::from(env::TIMER_DELTA_ENV),
                format!("{}", timer_delta),
            );
        }
        // Always set, otherwise a previous stubbed build could be reused
        envs.insert(
            String::from(env::ENABLE_STUB_ENV),
            format!("{}", self.enable_stub.unwrap_or(false)),
        );
        envs
    }
}

// ————————————————————————————— Config Loader —————————————————————————————— //

/// Read the configuration, or the default configuration if no path is provided.
///
/// Errors are logged and reported as `None`.
pub fn read_config<P: AsRef<Path>>(path: &Option<P>) -> Option<Config> {
    let config = match path {
        Some(path) => match fs::read_to_string(path.as_ref()) {
            Ok(config) => config,
            Err(err) => {
                log::error!(
                    "Could not read config '{}': {}",
                    path.as_ref().display(),
                    err
                );
                return None;
            }
        },
        None => {
            log::debug!("No config file provided, using defaults");
            String::from("")
        }
    };

    parse_config(&config)
}

fn parse_config(config: &str) -> Option<Config> {
    match toml::from_str::<Config>(config) {
        Ok(config) => Some(config),
        Err(err) => {
            log::error!("Failed to parse configuration:\n{}", err.message());
            None
        }
    }
}

// —————————————————————————————————— Tests ————————————————————————————————— //
