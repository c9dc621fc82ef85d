//! Build

use std::process::ExitCode;

use crate::artifacts::build_firmware;
use crate::config::read_config;
use crate::BuildArgs;

pub fn build(args: &BuildArgs) -> ExitCode {
    let Some(cfg) = read_config(&args.config) else {
        return ExitCode::FAILURE;
    };
    let Some(firmware) = build_firmware(&cfg) else {
        return ExitCode::FAILURE;
    };

    if let Some(config) = &args.config {
        log::info!(
            "Built firmware with config '{}', binary available at:",
            config.display()
        );
    } else {
        log::info!("Built firmware, binary available at:");
    }
    log::info!("{}", firmware.display());
    ExitCode::SUCCESS
}
