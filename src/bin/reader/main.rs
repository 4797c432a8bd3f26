// SPDX-License-Identifier: GPL-3.0-only

//! camera-reader: stream camera frames to stdout as JSON-LD image records

use camera_capture::cli::{self, CommandError, StandardOptions, sysexits};
use camera_capture::constants::{DEFAULT_DEVICE, app_info, timing};
use camera_capture::{CaptureConfig, CaptureEvent, CaptureHandle, Frame, FrameSink, ImageRecord};
use clap::Parser;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, warn};

/// Capture frames from a camera and print one JSON-LD image record per line
#[derive(Debug, Parser)]
#[command(name = "camera-reader", version = app_info::version())]
struct Options {
    #[command(flatten)]
    flags: StandardOptions,

    /// Device to read from (file:/dev/videoN, /dev/videoN or N)
    #[arg(value_name = "DEVICE", default_value = DEFAULT_DEVICE)]
    device: String,

    /// Requested frame size
    #[arg(short, long, value_name = "WxH", value_parser = cli::parse_size, default_value = "640x480")]
    size: (u32, u32),

    /// Capture rate in Hz; records are emitted at most this often
    #[arg(short, long, value_name = "HZ", value_parser = cli::parse_frequency, default_value = "30")]
    frequency: f64,

    /// Drop frames that look like the previous one (repeat to loosen)
    #[arg(short = 'D', long, action = clap::ArgAction::Count)]
    debounce: u8,
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

/// Writes one record per delivered frame to stdout
struct RecordWriter {
    /// Resolved device id, set once the device is open
    source: OnceLock<String>,
    quit: Arc<AtomicBool>,
    failure: Mutex<Option<io::Error>>,
}

impl RecordWriter {
    fn write(&self, frame: &Frame) {
        if self.quit.load(Ordering::SeqCst) {
            return;
        }

        let Some(source) = self.source.get() else {
            return;
        };
        let record = ImageRecord::from_frame(frame, source);
        let mut out = io::stdout().lock();
        let result = record.write_line(&mut out).and_then(|_| out.flush());

        match result {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!("stdout closed, stopping");
                self.quit.store(true, Ordering::SeqCst);
            }
            Err(e) => {
                warn!(error = %e, "Failed to write image record");
                *self.failure.lock().unwrap_or_else(|p| p.into_inner()) = Some(e);
                self.quit.store(true, Ordering::SeqCst);
            }
        }
    }
}

fn run(options: &Options) -> Result<(), CommandError> {
    let flags = &options.flags;
    cli::info_user(flags, "starting camera reader");

    let quit = Arc::new(AtomicBool::new(false));
    {
        let quit = Arc::clone(&quit);
        ctrlc::set_handler(move || quit.store(true, Ordering::SeqCst))?;
    }

    let (width, height) = options.size;
    let config = CaptureConfig::new(width, height, options.frequency)
        .with_device(options.device.as_str())
        .with_debounce(options.debounce)
        .with_max_rate(options.frequency);

    let writer = Arc::new(RecordWriter {
        source: OnceLock::new(),
        quit: Arc::clone(&quit),
        failure: Mutex::new(None),
    });
    let sink: FrameSink = {
        let writer = Arc::clone(&writer);
        Arc::new(move |frame: &Frame| writer.write(frame))
    };

    let mut handle = CaptureHandle::open(&config, sink)?;
    cli::info_user(
        flags,
        &format!(
            "selected device: {} ({}) at {}",
            handle.device().id,
            handle.device().name,
            handle.format()
        ),
    );
    if !handle.device().matches(&options.device) {
        cli::warn_user(
            flags,
            &format!("{} not found, using {}", options.device, handle.device().id),
        );
    }

    let _ = writer.source.set(handle.device().id.clone());
    handle.start()?;

    let mut lost = false;
    while !quit.load(Ordering::SeqCst) && !lost {
        for event in handle.events().try_iter() {
            match event {
                CaptureEvent::Disconnected => lost = true,
                CaptureEvent::FrameError(e) => debug!(error = %e, "Frame skipped"),
                CaptureEvent::SinkPanicked { sequence } => {
                    warn!(sequence, "Record writer panicked")
                }
                CaptureEvent::Started | CaptureEvent::Stopped => {}
            }
        }
        if !lost {
            std::thread::sleep(timing::READER_POLL_INTERVAL);
        }
    }

    let stopped = handle.stop();
    let stats = handle.stats();
    handle.free();
    debug!(
        delivered = stats.delivered,
        debounced = stats.debounced,
        throttled = stats.throttled,
        failed = stats.failed,
        "Reader finished"
    );
    stopped?;

    if lost {
        return Err(CommandError::DeviceLost(handle.device().id.clone()));
    }

    let failure = writer
        .failure
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .take();
    match failure {
        Some(e) => Err(CommandError::Io(e)),
        None => Ok(()),
    }
}
