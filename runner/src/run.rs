//! Run subcommand
//!
//! The run subcommand launches the trap delivery firmware in QEMU, then reads the watched cell
//! through the QEMU monitor once the firmware idles.

use std::path::Path;
use std::process::{Command, ExitCode, Stdio};

use traptest_core::CellState;

use crate::artifacts::build_firmware;
use crate::config::{read_config, Config};
use crate::inspect::launch_and_inspect;
use crate::path::get_default_config_path;
use crate::RunArgs;

// ————————————————————————————— QEMU Arguments ————————————————————————————— //

pub const QEMU: &str = "qemu-system-riscv64";

#[rustfmt::skip]
const QEMU_ARGS: &[&str] = &[
    "--no-reboot",
    "-nographic",
];

// —————————————————————————————————— Run ——————————————————————————————————— //

/// Run the firmware on QEMU
pub fn run(args: &RunArgs) -> ExitCode {
    let Some(cfg) = get_config(args) else {
        return ExitCode::FAILURE;
    };

    log::info!(
        "Running trap delivery firmware, watching cell 0x{:x}",
        cfg.cell_address()
    );
    let Some(firmware) = build_firmware(&cfg) else {
        return ExitCode::FAILURE;
    };

    let mut qemu_cmd = get_qemu_cmd(&cfg, &firmware, args.debug, args.stop);
    log::debug!("{}", format_cmd(&qemu_cmd));

    if args.stop {
        // The firmware waits for a debugger, there is nothing to inspect
        return match qemu_cmd.status() {
            Ok(status) => exit_code(status.success(), status.code()),
            Err(err) => {
                log::error!("Failed to run QEMU: {}", err);
                ExitCode::FAILURE
            }
        };
    }

    match launch_and_inspect(qemu_cmd, &cfg) {
        Ok(value) => {
            let state = CellState::classify(value);
            log::info!("Cell 0x{:x} holds the {}", cfg.cell_address(), state);
            if state.is_delivered() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            log::error!("Failed to inspect the cell: {}", err);
            ExitCode::FAILURE
        }
    }
}

/// Forward the exit code of QEMU, any code that does not fit is reported as a failure.
fn exit_code(success: bool, code: Option<i32>) -> ExitCode {
    ExitCode::from(exit_code_value(success, code))
}

fn exit_code_value(success: bool, code: Option<i32>) -> u8 {
    if success {
        return 0;
    }
    match code {
        Some(code @ 1..=255) => code as u8,
        _ => 1,
    }
}

fn get_config(args: &RunArgs) -> Option<Config> {
    let cfg = match &args.config {
        Some(_) => read_config(&args.config),
        None => {
            let default = get_default_config_path();
            log::info!("No config provided, using '{}'", default.display());
            read_config(&Some(default))
        }
    };
    let mut cfg = cfg?;

    // Override some aspect of the config, if required by the arguments
    if args.stub_enable {
        cfg.trap.enable_stub = Some(true);
    }

    Some(cfg)
}

// ————————————————————————————————— QEMU ——————————————————————————————————— //

/// Build the QEMU command booting the firmware image.
pub fn get_qemu_cmd(cfg: &Config, firmware: &Path, debug: bool, stop: bool) -> Command {
    let mut qemu_cmd = Command::new(QEMU);
    qemu_cmd.args(QEMU_ARGS);
    qemu_cmd
        .arg("-machine")
        .arg(cfg.qemu.machine.as_deref().unwrap_or("virt"));
    if let Some(cpu) = &cfg.qemu.cpu {
        qemu_cmd.arg("-cpu").arg(cpu);
    }
    if let Some(memory) = &cfg.qemu.memory {
        qemu_cmd.arg("-m").arg(memory);
    }
    qemu_cmd.arg("-bios").arg(firmware);

    if debug {
        qemu_cmd.arg("-s");
    }
    if stop {
        qemu_cmd.arg("-S");
    }

    // The firmware output goes to the terminal, the monitor is attached separately
    qemu_cmd.stdin(Stdio::null());
    qemu_cmd
}

/// Return true if QEMU can be invoked.
pub fn qemu_is_available() -> bool {
    Command::new(QEMU)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Format a command so that it can be copied into a shell.
pub fn format_cmd(cmd: &Command) -> String {
    format!(
        "{} {}",
        cmd.get_program().to_string_lossy(),
        cmd.get_args()
            .map(|arg| arg.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    )
}
