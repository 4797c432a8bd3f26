// SPDX-License-Identifier: GPL-3.0-only

//! Shared plumbing for the `camera-reader` and `camera-cataloger` binaries
//!
//! Flags common to both tools, logging setup, user-facing messages on stderr
//! and the mapping from errors to sysexits codes.

use crate::errors::CaptureError;
use clap::Args;
use std::fmt;
use std::io;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit codes from `sysexits.h`
pub mod sysexits {
    pub const EX_OK: u8 = 0;
    pub const EX_USAGE: u8 = 64;
    pub const EX_UNAVAILABLE: u8 = 69;
    pub const EX_SOFTWARE: u8 = 70;
    pub const EX_IOERR: u8 = 74;
}

/// Flags every binary accepts
#[derive(Debug, Clone, Default, Args)]
pub struct StandardOptions {
    /// Enable debugging output
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Show license information
    #[arg(long)]
    pub license: bool,

    /// Enable verbose output (may be repeated for more verbosity)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl StandardOptions {
    /// Default log filter when `RUST_LOG` is unset
    pub fn log_level(&self) -> &'static str {
        match (self.debug, self.verbose) {
            (_, v) if v >= 3 => "trace",
            (true, _) | (_, 2) => "debug",
            (_, 1) => "info",
            _ => "warn",
        }
    }

    /// Whether `INFO:`/`WARN:` messages are shown
    pub fn chatty(&self) -> bool {
        self.debug || self.verbose >= 1
    }

    /// Whether error cause chains are shown
    pub fn detailed(&self) -> bool {
        self.debug || self.verbose >= 2
    }
}

/// Install the stderr subscriber
///
/// `RUST_LOG` takes precedence over the level derived from the flags, e.g.
/// `RUST_LOG=camera_capture=trace`.
pub fn init_tracing(flags: &StandardOptions) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(flags.log_level()));

    // Another subscriber may already be installed (tests, embedding hosts)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .with_level(true)
        .try_init();
}

pub fn info_user(flags: &StandardOptions, msg: &str) {
    if flags.chatty() {
        eprintln!("INFO: {msg}");
    }
    info!("{msg}");
}

pub fn warn_user(flags: &StandardOptions, msg: &str) {
    if flags.chatty() {
        eprintln!("WARN: {msg}");
    }
    warn!("{msg}");
}

/// Failure of a command-line tool
#[derive(Debug)]
pub enum CommandError {
    Capture(CaptureError),
    Io(io::Error),
    /// Ctrl-C handler could not be installed
    Signal(String),
    /// The device went away while capturing
    DeviceLost(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Capture(e) => write!(f, "{}", e),
            CommandError::Io(e) => write!(f, "I/O error: {}", e),
            CommandError::Signal(msg) => write!(f, "Cannot install signal handler: {}", msg),
            CommandError::DeviceLost(device) => write!(f, "Capture device {} was lost", device),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Capture(e) => Some(e),
            CommandError::Io(e) => Some(e),
            CommandError::Signal(_) | CommandError::DeviceLost(_) => None,
        }
    }
}

impl From<CaptureError> for CommandError {
    fn from(err: CaptureError) -> Self {
        CommandError::Capture(err)
    }
}

impl From<io::Error> for CommandError {
    fn from(err: io::Error) -> Self {
        CommandError::Io(err)
    }
}

impl From<ctrlc::Error> for CommandError {
    fn from(err: ctrlc::Error) -> Self {
        CommandError::Signal(err.to_string())
    }
}

/// sysexits code for an error
pub fn exit_code(err: &CommandError) -> u8 {
    match err {
        CommandError::Capture(e) => match e {
            CaptureError::DeviceNotFound(_) | CaptureError::UnsupportedFormat(_) => {
                sysexits::EX_USAGE
            }
            CaptureError::EnumerationUnavailable(_)
            | CaptureError::BackendInitFailed(_)
            | CaptureError::BackendStartFailed(_) => sysexits::EX_UNAVAILABLE,
            CaptureError::InvalidState(_) | CaptureError::BackendRuntimeError(_) => {
                sysexits::EX_SOFTWARE
            }
        },
        CommandError::Io(_) => sysexits::EX_IOERR,
        CommandError::Signal(_) => sysexits::EX_SOFTWARE,
        CommandError::DeviceLost(_) => sysexits::EX_UNAVAILABLE,
    }
}

/// Report `err` on stderr and pick the exit code
pub fn handle_error(err: &CommandError, flags: &StandardOptions) -> ExitCode {
    use std::error::Error as _;

    error!(error = %err, "Command failed");
    eprintln!("ERROR: {err}");

    if flags.detailed() {
        debug!(?err, "Detailed error");
        // The capture variant displays its own message already
        let mut source = match err {
            CommandError::Capture(e) => e.source(),
            _ => err.source(),
        };
        while let Some(cause) = source {
            eprintln!("  Caused by: {cause}");
            source = cause.source();
        }
    }

    ExitCode::from(exit_code(err))
}

/// Print the license notice
pub fn print_license() {
    print!("{}", crate::constants::LICENSE_NOTICE);
}

/// Parse `WxH` (also `W×H`) within the supported limits
pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    use crate::constants::limits;

    let normalized = value.trim().replace('×', "x");
    let Some((w, h)) = normalized.split_once('x') else {
        return Err(format!("Invalid size '{value}'. Use WxH (e.g., 1920x1080)"));
    };
    let (w, h) = (w.trim(), h.trim());
    let width: u32 = w.parse().map_err(|_| format!("Invalid width: {w}"))?;
    let height: u32 = h.parse().map_err(|_| format!("Invalid height: {h}"))?;

    if !limits::WIDTH.contains(&width) {
        return Err(format!(
            "Width {width} is out of range ({}-{})",
            limits::WIDTH.start(),
            limits::WIDTH.end()
        ));
    }
    if !limits::HEIGHT.contains(&height) {
        return Err(format!(
            "Height {height} is out of range ({}-{})",
            limits::HEIGHT.start(),
            limits::HEIGHT.end()
        ));
    }
    Ok((width, height))
}

/// Parse a frequency in Hz within the supported limits
pub fn parse_frequency(value: &str) -> Result<f64, String> {
    use crate::constants::limits::{MAX_FREQUENCY, MIN_FREQUENCY};

    let freq: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("Invalid frequency: {value}"))?;
    if !freq.is_finite() || freq <= 0.0 {
        return Err("Frequency must be positive".to_string());
    }
    if freq < MIN_FREQUENCY {
        return Err(format!("Frequency {freq} Hz is below the minimum ({MIN_FREQUENCY} Hz)"));
    }
    if freq > MAX_FREQUENCY {
        return Err(format!("Frequency {freq} Hz exceeds the maximum ({MAX_FREQUENCY} Hz)"));
    }
    Ok(freq)
}
