#![cfg_attr(not(test), no_std)]

// ———————————————————————————————— Helpers ————————————————————————————————— //

/// Helper macro to check is boolean choice is enabled by the configuration, defaulting to yes.
///
/// The current implementation works around the limitation of const functions in rust at the
/// time of writing.
#[macro_export]
macro_rules! is_enabled {
    ($env_var: tt) => {
        match option_env!($env_var) {
            Some(env_var) => match env_var.as_bytes() {
                b"false" => false,
                _ => true,
            },
            None => true,
        }
    };
}

/// Same as `is_enabled!`, but defaulting to no.
#[macro_export]
macro_rules! is_enabled_default_false {
    ($env_var: tt) => {
        match option_env!($env_var) {
            Some(env_var) => match env_var.as_bytes() {
                b"true" => true,
                _ => false,
            },
            None => false,
        }
    };
}

// ————————————————————————————— String Parsing ————————————————————————————— //

/// Parse an integer, either in decimal or in hexadecimal when prefixed by `0x`.
pub const fn parse_usize(env_var: Option<&str>) -> Option<usize> {
    let value = match env_var {
        Some(value) => value,
        None => return None,
    };

    let bytes = value.as_bytes();
    let (radix, digits) = if bytes.len() > 2 && bytes[0] == b'0' && bytes[1] == b'x' {
        (16, bytes.split_at(2).1)
    } else {
        (10, bytes)
    };

    let digits = match core::str::from_utf8(digits) {
        Ok(digits) => digits,
        Err(_) => panic!("Invalid integer in configuration"),
    };
    match usize::from_str_radix(digits, radix) {
        Ok(value) => Some(value),
        Err(_) => panic!("Failed to parse integer from configuration"),
    }
}

pub const fn parse_str_or(env_var: Option<&'static str>, default: &'static str) -> &'static str {
    match env_var {
        Some(var) => var,
        None => default,
    }
}

pub const fn parse_usize_or(env_var: Option<&str>, default: usize) -> usize {
    match parse_usize(env_var) {
        Some(value) => value,
        None => default,
    }
}
