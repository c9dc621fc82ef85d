//! Global project configuration

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Deserialize;
use traptest_core::CellState;

/// The global project configuration file
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub config: IndexMap<String, Config>,
    #[serde(default)]
    pub test: IndexMap<String, Test>,
}

/// A configuration file
#[derive(Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub path: PathBuf,
}

/// A test scenario
#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(deny_unknown_fields)]
pub struct Test {
    pub config: String,
    pub description: Option<String>,
    pub expect: Expectation,
}

/// The expected outcome of a scenario, as observed in the watched cell.
#[derive(Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub enum Expectation {
    /// The trap handler ran.
    Delivered,
    /// The trap handler never ran, the cell holds the reset value or the driver sentinel.
    NotDelivered,
}

impl Expectation {
    pub fn is_met_by(self, state: CellState) -> bool {
        match self {
            Expectation::Delivered => state == CellState::HandlerSentinel,
            Expectation::NotDelivered => {
                matches!(state, CellState::Reset | CellState::DriverSentinel)
            }
        }
    }
}
