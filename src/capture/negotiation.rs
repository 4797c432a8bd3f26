// SPDX-License-Identifier: GPL-3.0-only

//! Device resolution and format negotiation

use crate::backends::{Backend, DeviceDescriptor, FrameRate, NegotiatedFormat};
use crate::constants::negotiation::MAX_SCALE_FACTOR;
use crate::errors::{CaptureError, CaptureResult};
use tracing::{debug, warn};

/// Pick the device for `identifier`, falling back to the backend's default
///
/// Only an empty device list is an error; an identifier that does not resolve
/// is logged and replaced by the default device.
pub fn resolve_device<'a, B: Backend>(
    backend: &B,
    devices: &'a [DeviceDescriptor],
    identifier: Option<&str>,
) -> CaptureResult<&'a DeviceDescriptor> {
    if devices.is_empty() {
        return Err(CaptureError::DeviceNotFound(match identifier {
            Some(id) => format!("{}: no capture devices present", id),
            None => "no capture devices present".to_string(),
        }));
    }

    if let Some(id) = identifier.map(str::trim).filter(|id| !id.is_empty()) {
        if let Some(device) = devices.iter().find(|d| d.id == id) {
            return Ok(device);
        }
        if let Some(device) = devices.iter().find(|d| d.matches(id)) {
            return Ok(device);
        }
        warn!(
            requested = %id,
            backend = backend.name(),
            "Device not found, falling back to default device"
        );
    }

    backend
        .default_device(devices)
        .or_else(|| devices.first())
        .ok_or_else(|| CaptureError::DeviceNotFound("no default device".to_string()))
}

fn within_tolerance(actual: u32, requested: u32) -> bool {
    let actual = u64::from(actual);
    let requested = u64::from(requested);
    let factor = u64::from(MAX_SCALE_FACTOR);
    actual * factor >= requested && actual <= requested * factor
}

/// Choose the supported format closest to the request
///
/// The resolution minimising `|w - W| + |h - H|` wins (first reported on ties),
/// then the closest frame rate within it. Formats without rates are skipped.
pub fn negotiate(
    device: &DeviceDescriptor,
    width: u32,
    height: u32,
    fps: f64,
) -> CaptureResult<NegotiatedFormat> {
    let best = device
        .formats
        .iter()
        .filter(|f| !f.frame_rates.is_empty())
        .min_by_key(|f| f.width.abs_diff(width) as u64 + f.height.abs_diff(height) as u64)
        .ok_or_else(|| {
            CaptureError::UnsupportedFormat(format!("{} reports no usable formats", device.id))
        })?;

    if !within_tolerance(best.width, width) || !within_tolerance(best.height, height) {
        return Err(CaptureError::UnsupportedFormat(format!(
            "{}: closest format {}x{} is too far from requested {}x{}",
            device.id, best.width, best.height, width, height
        )));
    }

    let mut frame_rate: Option<FrameRate> = None;
    for rate in &best.frame_rates {
        let closer = match frame_rate {
            Some(current) => (rate.as_f64() - fps).abs() < (current.as_f64() - fps).abs(),
            None => true,
        };
        if closer {
            frame_rate = Some(*rate);
        }
    }
    let frame_rate = frame_rate.ok_or_else(|| {
        CaptureError::UnsupportedFormat(format!("{} lists no frame rates", device.id))
    })?;

    let format = NegotiatedFormat {
        width: best.width,
        height: best.height,
        frame_rate,
    };
    debug!(
        device = %device.id,
        requested = %format!("{}x{}@{}", width, height, fps),
        negotiated = %format,
        "Negotiated capture format"
    );
    Ok(format)
}
