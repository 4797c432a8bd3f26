// SPDX-License-Identifier: GPL-3.0-only

//! camera-cataloger: list capture devices and their formats

use camera_capture::catalog;
use camera_capture::cli::{self, CommandError, StandardOptions, sysexits};
use camera_capture::constants::app_info;
use clap::{Parser, ValueEnum};
use std::io::{self, Write};
use std::process::ExitCode;

/// List the capture devices this machine offers
#[derive(Debug, Parser)]
#[command(name = "camera-cataloger", version = app_info::version())]
struct Options {
    #[command(flatten)]
    flags: StandardOptions,

    /// Output format
    #[arg(value_name = "FORMAT", short = 'o', long = "output", value_enum, default_value = "text")]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable listing
    Text,
    /// One JSON object per device
    Jsonl,
}

fn main() -> ExitCode {
    let options = Options::parse();

    if options.flags.license {
        cli::print_license();
        return ExitCode::from(sysexits::EX_OK);
    }

    cli::init_tracing(&options.flags);

    match run(&options) {
        Ok(()) => ExitCode::from(sysexits::EX_OK),
        Err(err) => cli::handle_error(&err, &options.flags),
    }
}

fn run(options: &Options) -> Result<(), CommandError> {
    cli::info_user(&options.flags, "enumerating camera devices");

    let devices = catalog::enumerate()?;
    if devices.is_empty() {
        cli::warn_user(&options.flags, "no camera devices found");
        return Ok(());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = match options.output {
        OutputFormat::Text => catalog::write_text(&mut out, &devices, options.flags.chatty()),
        OutputFormat::Jsonl => catalog::write_jsonl(&mut out, &devices),
    }
    .and_then(|_| out.flush());

    match result {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => Ok(other?),
    }
}
