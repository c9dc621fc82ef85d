//! # Artifacts Management
//!
//! Build the firmware from sources and extract the raw image loaded by QEMU.

use std::path::PathBuf;
use std::process::Command;

use crate::config::{Config, Profiles};
use crate::path::{get_target_config_path, get_target_dir_path, get_workspace_path, is_older};

// —————————————————————————— Target & Build Info ——————————————————————————— //

/// Target triple used to build the firmware.
pub const FIRMWARE_TARGET: &str = "riscv-unknown-traptest";

/// The firmware package.
pub const FIRMWARE_PACKAGE: &str = "trap_delivery";

/// Extra cargo arguments.
const CARGO_ARGS: &[&str] = &[
    "-Zbuild-std=core",
    "-Zbuild-std-features=compiler-builtins-mem",
];

// ————————————————————————————————— Build —————————————————————————————————— //

/// Build the firmware by invoking cargo.
///
/// Returns the path of the raw binary image, or `None` if the build failed.
pub fn build_firmware(cfg: &Config) -> Option<PathBuf> {
    let mode = cfg.profile();

    let mut build_cmd = Command::new(env!("CARGO"));
    build_cmd
        .current_dir(get_workspace_path())
        .arg("build")
        .args(CARGO_ARGS)
        .arg("--target")
        .arg(get_target_config_path())
        .arg("--package")
        .arg(FIRMWARE_PACKAGE);

    build_cmd.arg("--profile");
    match mode {
        Profiles::Debug => {
            build_cmd.arg("dev");
        }
        Profiles::Release => {
            build_cmd.arg("release");
        }
    }

    // Linker arguments
    let linker_args = format!(
        "-C link-arg=-Tmisc/linker-script.x -C link-arg=--defsym=_start_address={} -C link-arg=--defsym=_stack_size={}",
        cfg.start_address(),
        cfg.stack_size()
    );
    build_cmd.env("RUSTFLAGS", linker_args);

    // Environment variables
    build_cmd.envs(cfg.build_envs());

    match build_cmd.status() {
        Ok(status) if status.success() => (),
        Ok(_) => {
            log::error!("Build failed with command: {:?}", build_cmd);
            return None;
        }
        Err(err) => {
            log::error!("Failed to invoke cargo: {}", err);
            return None;
        }
    }
    objcopy(mode)
}

/// Return the path of the firmware ELF.
pub fn get_firmware_elf_path(mode: Profiles) -> PathBuf {
    let mut path = get_target_dir_path(mode);
    path.push(FIRMWARE_PACKAGE);
    path
}

/// Extract raw binary from elf file.
///
/// Returns the path of the resulting binary.
fn objcopy(mode: Profiles) -> Option<PathBuf> {
    let elf_path = get_firmware_elf_path(mode);
    let mut bin_path = get_target_dir_path(mode);
    bin_path.push(format!("{}.img", FIRMWARE_PACKAGE));

    if is_older(&elf_path, &bin_path) {
        // No change since last objcopy, skipping
        return Some(bin_path);
    }

    let mut objcopy_cmd = Command::new("rust-objcopy");
    objcopy_cmd
        .arg("-O")
        .arg("binary")
        .arg(elf_path)
        .arg(&bin_path);

    match objcopy_cmd.status() {
        Ok(status) if status.success() => Some(bin_path),
        Ok(_) => {
            log::error!("objcopy failed");
            None
        }
        Err(_) => {
            log::error!("objcopy failed. Is `rust-objcopy` installed?");
            None
        }
    }
}
