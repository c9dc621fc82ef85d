//! GDB subcommand
//!
//! The gdb subcommand launches a GDB session and attach it to a QEMU instance started with
//! `run --debug`.

use std::io;
use std::process::{exit, Command, Stdio};

use crate::artifacts::get_firmware_elf_path;
use crate::config::{read_config, Profiles};
use crate::GdbArgs;

// ——————————————————————————————— Constants ———————————————————————————————— //

/// A list of GDB executables that support RISC-V 64
static GDB_EXECUTABLES: &[&str] = &[
    "gdb-multiarch",
    "riscv64-elf-gdb",
    "riscv64-unknown-elf-gdb",
    "riscv64-unknown-linux-gnu-gdb",
];

/// The port opened by QEMU with `-s`.
const GDB_REMOTE: &str = "target remote :1234";

// —————————————————————————————————— GDB ——————————————————————————————————— //

/// Build a command to invoke GDB using the provided executable.
///
/// GDB can be distributed under different names, depending on the available targets, hence the
/// need for such a function.
fn build_gdb_command(gdb_executable: &str, mode: Profiles) -> Command {
    let firmware_path = get_firmware_elf_path(mode);

    let mut gdb_cmd = Command::new(gdb_executable);
    gdb_cmd
        .arg(&firmware_path)
        .arg("-q")
        .args(["-ex", GDB_REMOTE]);
    gdb_cmd
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    gdb_cmd
}

/// Start a GDB session
pub fn gdb(args: &GdbArgs) -> ! {
    let Some(cfg) = read_config(&args.config) else {
        exit(1);
    };
    let mode = cfg.profile();

    for gdb in GDB_EXECUTABLES {
        let mut gdb_cmd = build_gdb_command(gdb, mode);

        // On Unix systems we can exec into the GDB command, so that signals are delivered to GDB
        // rather than to the runner.
        #[cfg(target_family = "unix")]
        {
            use std::os::unix::process::CommandExt;
            let err = gdb_cmd.exec();
            if let io::ErrorKind::NotFound = err.kind() {
                // This GDB executable is not installed, try another one
                continue;
            } else {
                log::error!("Failed to run GDB: {:?}", err);
                exit(1);
            }
        }

        #[allow(unreachable_code)]
        match gdb_cmd.status() {
            Ok(_) => exit(0),
            Err(err) => {
                if let io::ErrorKind::NotFound = err.kind() {
                    // This GDB executable is not installed, try another one
                    continue;
                } else {
                    log::error!("Failed to run GDB: {:?}", err);
                    exit(1);
                }
            }
        }
    }

    // No GDB executable available.
    log::error!("Could not find a GDB binary with RISC-V support, try installing one of:");
    for gdb in GDB_EXECUTABLES {
        log::error!("  - {}", gdb);
    }

    exit(1);
}
