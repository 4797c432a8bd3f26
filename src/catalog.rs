// SPDX-License-Identifier: GPL-3.0-only

//! Device catalog
//!
//! Stateless enumeration of capture devices plus the text and JSON Lines
//! renderings used by the cataloger.

use crate::backends::{Backend, DeviceDescriptor, NativeBackend};
use crate::errors::CaptureResult;
use std::io::{self, BufRead, Write};
use tracing::debug;

/// Enumerate devices through the native backend
pub fn enumerate() -> CaptureResult<Vec<DeviceDescriptor>> {
    let backend = NativeBackend::new()?;
    enumerate_with(&backend)
}

/// Enumerate devices through `backend`, in the backend's order
pub fn enumerate_with<B: Backend>(backend: &B) -> CaptureResult<Vec<DeviceDescriptor>> {
    let devices = backend.enumerate()?;
    debug!(backend = backend.name(), count = devices.len(), "Catalog enumerated");
    Ok(devices)
}

/// Human-readable listing
///
/// One `id: name` line per device; `verbose` adds driver details and every
/// resolution with its frame rates.
pub fn write_text<W: Write>(
    out: &mut W,
    devices: &[DeviceDescriptor],
    verbose: bool,
) -> io::Result<()> {
    for device in devices {
        writeln!(out, "{}: {}", device.id, device.name)?;
        if !verbose {
            continue;
        }

        if let Some(description) = &device.description {
            writeln!(out, "\t{}", description)?;
        }
        if let Some(misc) = &device.misc {
            writeln!(out, "\t{}", misc)?;
        }
        writeln!(out, "\tAvailable formats:")?;
        for format in &device.formats {
            writeln!(out, "\t\tResolution {}x{}", format.width, format.height)?;
            for rate in &format.frame_rates {
                writeln!(out, "\t\t\tFrame rate: {}", rate)?;
            }
        }
    }
    Ok(())
}

/// One JSON object per device per line
pub fn write_jsonl<W: Write>(out: &mut W, devices: &[DeviceDescriptor]) -> io::Result<()> {
    for device in devices {
        serde_json::to_writer(&mut *out, device)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Parse the output of [`write_jsonl`]; blank lines are skipped
pub fn parse_jsonl<R: BufRead>(input: R) -> io::Result<Vec<DeviceDescriptor>> {
    let mut devices = Vec::new();
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        devices.push(serde_json::from_str(&line)?);
    }
    Ok(devices)
}
