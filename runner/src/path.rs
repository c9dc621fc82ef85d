//! Path helper functions

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::artifacts::FIRMWARE_TARGET;
use crate::config::Profiles;

/// Return the root of the workspace.
pub fn get_workspace_path() -> PathBuf {
    let Ok(runner_manifest) = std::env::var("CARGO_MANIFEST_DIR") else {
        panic!("Could not locate workspace root");
    };
    let path = PathBuf::from_str(&runner_manifest).unwrap();
    path.parent().unwrap().to_owned()
}

/// Return the target directory for the firmware.
pub fn get_target_dir_path(mode: Profiles) -> PathBuf {
    let mut path = get_workspace_path();
    path.push("target");
    path.push(FIRMWARE_TARGET);
    match mode {
        Profiles::Debug => path.push("debug"),
        Profiles::Release => path.push("release"),
    }
    path
}

/// Return the path to the misc directory.
fn get_misc_path() -> PathBuf {
    let mut path = get_workspace_path();
    path.push("misc");
    path
}

/// Return the target triple definition path.
pub fn get_target_config_path() -> PathBuf {
    let mut path = get_misc_path();
    path.push(format!("{}.json", FIRMWARE_TARGET));
    path
}

/// Return the configuration used by `run` when none is provided.
///
/// The default cell address is not mapped on the QEMU virt board, this configuration moves it to
/// RAM.
pub fn get_default_config_path() -> PathBuf {
    let mut path = get_workspace_path();
    path.push("config");
    path.push("qemu-virt.toml");
    path
}

/// Return the path of the project configuration, listing the test scenarios.
pub fn get_project_config_path() -> PathBuf {
    let mut path = get_misc_path();
    path.push("tests.toml");
    path
}

/// Paths in the project configuration are relative to the workspace root.
pub fn make_path_relative_to_root(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_owned();
    }
    let mut root = get_workspace_path();
    root.push(path);
    root
}

/// Return true if `a` is older than `b`
pub fn is_older(a: &Path, b: &Path) -> bool {
    let Ok(a_meta) = a.metadata() else {
        return false;
    };
    let Ok(b_meta) = b.metadata() else {
        return false;
    };

    match (a_meta.modified(), b_meta.modified()) {
        (Ok(a), Ok(b)) => a <= b,
        _ => false,
    }
}
