//! Cell inspection
//!
//! Once the firmware idles, the watched cell is read from the outside through the QEMU monitor,
//! using the `xp` command on the guest physical address.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::Config;

/// Delay between two connection attempts to the monitor.
const RETRY_DELAY: Duration = Duration::from_millis(50);

// ————————————————————————————————— Errors ————————————————————————————————— //

#[derive(Debug, PartialEq, Eq)]
pub enum InspectError {
    /// The monitor could not be reached or the connection broke.
    Monitor(String),
    /// QEMU exited before the cell could be inspected.
    Exited(Option<i32>),
    /// The monitor did not answer in time.
    Timeout,
    /// The monitor answer does not contain the cell value.
    MissingValue,
    /// The monitor answered with something that is not a 32 bits value.
    Malformed(String),
}

impl fmt::Display for InspectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InspectError::Monitor(err) => write!(f, "QEMU monitor error: {}", err),
            InspectError::Exited(Some(code)) => {
                write!(f, "QEMU exited with code {} before inspection", code)
            }
            InspectError::Exited(None) => write!(f, "QEMU was killed before inspection"),
            InspectError::Timeout => write!(f, "QEMU monitor did not answer in time"),
            InspectError::MissingValue => write!(f, "cell value not found in monitor output"),
            InspectError::Malformed(value) => write!(f, "invalid cell value '{}'", value),
        }
    }
}

impl From<io::Error> for InspectError {
    fn from(err: io::Error) -> Self {
        InspectError::Monitor(err.to_string())
    }
}

// ——————————————————————————————— Inspection ——————————————————————————————— //

/// Launch QEMU, let the firmware settle, and read the watched cell.
///
/// The command is given a monitor on a local TCP port. QEMU is terminated once the cell has been
/// read, whatever the outcome.
pub fn launch_and_inspect(mut cmd: Command, cfg: &Config) -> Result<u32, InspectError> {
    let port = free_local_port()?;
    cmd.arg("-monitor")
        .arg(format!("tcp:127.0.0.1:{},server=on,wait=off", port));

    let mut child = cmd.spawn()?;
    let result = inspect_child(&mut child, port, cfg);

    // QEMU never exits on its own once the firmware idles
    if let Ok(None) = child.try_wait() {
        child.kill().ok();
    }
    child.wait().ok();

    result
}

fn inspect_child(child: &mut Child, port: u16, cfg: &Config) -> Result<u32, InspectError> {
    thread::sleep(Duration::from_millis(cfg.inspect.settle_ms()));
    if let Some(status) = child.try_wait()? {
        return Err(InspectError::Exited(status.code()));
    }

    let deadline = Instant::now() + Duration::from_millis(cfg.inspect.timeout_ms());
    let mut monitor = connect(port, deadline)?;
    let address = cfg.cell_address();

    // Drain the banner and the first prompt
    read_until(&mut monitor, deadline, |out| out.contains("(qemu)"))?;

    monitor.write_all(format!("xp /1wx 0x{:x}\n", address).as_bytes())?;
    let output = read_until(&mut monitor, deadline, |out| {
        parse_xp_output(out, address) != Err(InspectError::MissingValue)
    })?;
    monitor.write_all(b"quit\n").ok();

    parse_xp_output(&output, address)
}

fn free_local_port() -> Result<u16, InspectError> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

fn connect(port: u16, deadline: Instant) -> Result<TcpStream, InspectError> {
    loop {
        match TcpStream::connect(("127.0.0.1", port)) {
            Ok(stream) => {
                stream.set_read_timeout(Some(RETRY_DELAY))?;
                return Ok(stream);
            }
            Err(err) if Instant::now() >= deadline => return Err(err.into()),
            Err(_) => thread::sleep(RETRY_DELAY),
        }
    }
}

/// Read from the monitor until `done` accepts the output received so far.
fn read_until<F>(stream: &mut TcpStream, deadline: Instant, done: F) -> Result<String, InspectError>
where
    F: Fn(&str) -> bool,
{
    let mut output = String::new();
    let mut buff = [0u8; 512];
    while Instant::now() < deadline {
        match stream.read(&mut buff) {
            Ok(0) => return Err(InspectError::Monitor(String::from("connection closed"))),
            Ok(n) => {
                output.push_str(&String::from_utf8_lossy(&buff[..n]));
                if done(&output) {
                    return Ok(output);
                }
            }
            Err(err)
                if err.kind() == io::ErrorKind::WouldBlock
                    || err.kind() == io::ErrorKind::TimedOut =>
            {
                continue
            }
            Err(err) => return Err(err.into()),
        }
    }
    Err(InspectError::Timeout)
}

// ———————————————————————————————— Parsing ————————————————————————————————— //

/// Extract the value of the cell from the output of the monitor `xp /1wx` command.
///
/// The monitor answers with a line such as `0000000080100000: 0x00002022`, possibly surrounded
/// by the echo of the command and terminal escape sequences. The value must be followed by a line
/// terminator, otherwise the answer is considered incomplete.
pub fn parse_xp_output(output: &str, address: usize) -> Result<u32, InspectError> {
    let prefix = format!("{:016x}:", address);
    let Some(start) = output.find(&prefix) else {
        return Err(InspectError::MissingValue);
    };

    let rest = output[start + prefix.len()..].trim_start_matches(' ');
    let Some(end) = rest.find(|c: char| c == '\r' || c == '\n') else {
        return Err(InspectError::MissingValue);
    };

    let token = rest[..end].trim();
    let Some(digits) = token.strip_prefix("0x") else {
        return Err(InspectError::Malformed(token.to_string()));
    };
    u32::from_str_radix(digits, 16).map_err(|_| InspectError::Malformed(token.to_string()))
}

// —————————————————————————————————— Tests ————————————————————————————————— //
