// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer device discovery
//!
//! Devices come from the platform device provider through a `DeviceMonitor`.
//! When the provider lists nothing, the platform's camera source element is
//! probed directly and reported as a single default device.

use crate::backends::{DeviceDescriptor, FormatDescriptor, FrameRate, merge_format};
use crate::constants::negotiation::{COMMON_FRAMERATES, COMMON_RESOLUTIONS};
use crate::constants::timing;
use crate::errors::{CaptureError, CaptureResult};
use gstreamer::prelude::*;
use tracing::{debug, info, warn};

/// Camera source element of the current platform
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub const PLATFORM_SOURCE: Option<&str> = Some("avfvideosrc");
#[cfg(target_os = "windows")]
pub const PLATFORM_SOURCE: Option<&str> = Some("mfvideosrc");
#[cfg(target_os = "android")]
pub const PLATFORM_SOURCE: Option<&str> = Some("ahc2src");
#[cfg(not(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "windows",
    target_os = "android"
)))]
pub const PLATFORM_SOURCE: Option<&str> = None;

/// Where frames for one enumerated device come from
#[derive(Debug, Clone)]
pub enum Source {
    /// A device reported by the platform device provider
    Device(gstreamer::Device),
    /// The platform source element with its default camera
    Element(&'static str),
}

impl Source {
    /// Create the source element for a pipeline
    pub fn create_element(&self) -> CaptureResult<gstreamer::Element> {
        match self {
            Source::Device(device) => device.create_element(None).map_err(|e| {
                CaptureError::BackendInitFailed(format!(
                    "{}: cannot create source element: {}",
                    device.display_name(),
                    e
                ))
            }),
            Source::Element(factory) => gstreamer::ElementFactory::make(factory)
                .build()
                .map_err(|e| {
                    CaptureError::BackendInitFailed(format!("cannot create {}: {}", factory, e))
                }),
        }
    }

    /// Caps the source can produce, if it reports any
    pub fn caps(&self) -> Option<gstreamer::Caps> {
        match self {
            Source::Device(device) => device.caps(),
            Source::Element(factory) => element_caps(factory),
        }
    }
}

/// List sources in provider order together with their descriptors
///
/// The position in this list is the device index used in identifiers.
pub fn list_sources() -> CaptureResult<Vec<(DeviceDescriptor, Source)>> {
    let monitor = gstreamer::DeviceMonitor::new();
    monitor.add_filter(Some("Video/Source"), None);

    let mut sources = Vec::new();
    match monitor.start() {
        Ok(()) => {
            for (index, device) in monitor.devices().into_iter().enumerate() {
                let descriptor = describe_device(index as u32, &device);
                debug!(id = %descriptor.id, name = %descriptor.name, "Found GStreamer video source");
                sources.push((descriptor, Source::Device(device)));
            }
            monitor.stop();
        }
        Err(e) => {
            if PLATFORM_SOURCE.is_none() {
                return Err(CaptureError::EnumerationUnavailable(format!(
                    "device monitor failed to start: {}",
                    e
                )));
            }
            warn!(error = %e, "Device monitor failed to start, probing platform source");
        }
    }

    if sources.is_empty()
        && let Some(factory) = PLATFORM_SOURCE
        && let Some(descriptor) = probe_element(factory)
    {
        sources.push((descriptor, Source::Element(factory)));
    }

    info!(count = sources.len(), "Enumerated GStreamer video sources");
    Ok(sources)
}

fn describe_device(index: u32, device: &gstreamer::Device) -> DeviceDescriptor {
    let mut descriptor = DeviceDescriptor::new(index, device.display_name().to_string());
    descriptor.description = Some(device.device_class().to_string());

    if let Some(props) = device.properties() {
        // Provider specific; e.g. device.path on some platforms, api names on others
        descriptor.misc = ["device.path", "device.api", "device.strid"]
            .iter()
            .find_map(|key| props.get::<String>(*key).ok());
    }

    if let Some(caps) = device.caps() {
        descriptor.formats = formats_from_caps(&caps);
    }
    descriptor
}

/// Source pad caps of a fresh element brought to READY
fn element_caps(factory: &str) -> Option<gstreamer::Caps> {
    let element = gstreamer::ElementFactory::make(factory).build().ok()?;
    if element.set_state(gstreamer::State::Ready).is_err() {
        warn!(element = factory, "Platform source refused READY state");
        let _ = element.set_state(gstreamer::State::Null);
        return None;
    }
    let _ = element.state(gstreamer::ClockTime::from_seconds(
        timing::START_TIMEOUT_SECS,
    ));

    let caps = element.static_pad("src").map(|pad| pad.query_caps(None));
    let _ = element.set_state(gstreamer::State::Null);
    caps
}

/// Query the default camera of a source element
fn probe_element(factory: &'static str) -> Option<DeviceDescriptor> {
    let formats = formats_from_caps(&element_caps(factory)?);

    let mut descriptor = DeviceDescriptor::new(0, "Default camera");
    descriptor.description = Some(factory.to_string());
    descriptor.formats = formats;
    Some(descriptor)
}

/// Sizes and rates of the raw and JPEG structures in `caps`
pub fn formats_from_caps(caps: &gstreamer::CapsRef) -> Vec<FormatDescriptor> {
    let mut formats = Vec::new();

    for structure in caps.iter() {
        if !structure.has_name("video/x-raw") && !structure.has_name("image/jpeg") {
            continue;
        }
        let rates = frame_rates(structure);

        match (structure.get::<i32>("width"), structure.get::<i32>("height")) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => {
                merge_format(&mut formats, w as u32, h as u32, &rates);
            }
            _ => {
                let (Ok(w), Ok(h)) = (
                    structure.get::<gstreamer::IntRange<i32>>("width"),
                    structure.get::<gstreamer::IntRange<i32>>("height"),
                ) else {
                    continue;
                };
                for &(cw, ch) in COMMON_RESOLUTIONS {
                    let (cw_i, ch_i) = (cw as i32, ch as i32);
                    if (w.min()..=w.max()).contains(&cw_i) && (h.min()..=h.max()).contains(&ch_i) {
                        merge_format(&mut formats, cw, ch, &rates);
                    }
                }
            }
        }
    }

    formats
}

/// Whether `structure` can produce a `width`x`height` frame
fn offers_size(structure: &gstreamer::StructureRef, width: u32, height: u32) -> bool {
    let fits = |field: &str, value: u32| {
        let value = value as i32;
        if let Ok(fixed) = structure.get::<i32>(field) {
            return fixed == value;
        }
        structure
            .get::<gstreamer::IntRange<i32>>(field)
            .is_ok_and(|range| (range.min()..=range.max()).contains(&value))
    };
    fits("width", width) && fits("height", height)
}

/// True when only JPEG structures offer the size, so the pipeline must decode
pub fn needs_jpeg_decode(caps: &gstreamer::CapsRef, width: u32, height: u32) -> bool {
    let offered_as = |name: &str| {
        caps.iter()
            .any(|structure| structure.has_name(name) && offers_size(structure, width, height))
    };
    !offered_as("video/x-raw") && offered_as("image/jpeg")
}

fn to_rate(fraction: gstreamer::Fraction) -> Option<FrameRate> {
    let (num, denom) = (fraction.numer(), fraction.denom());
    (num > 0 && denom > 0).then(|| FrameRate::new(num as u32, denom as u32))
}

fn frame_rates(structure: &gstreamer::StructureRef) -> Vec<FrameRate> {
    if let Ok(fraction) = structure.get::<gstreamer::Fraction>("framerate") {
        return to_rate(fraction).into_iter().collect();
    }

    if let Ok(list) = structure.get::<gstreamer::List>("framerate") {
        return list
            .iter()
            .filter_map(|value| value.get::<gstreamer::Fraction>().ok())
            .filter_map(to_rate)
            .collect();
    }

    if let Ok(range) = structure.get::<gstreamer::FractionRange>("framerate") {
        let (min, max) = (range.min(), range.max());
        let as_f64 = |f: gstreamer::Fraction| f.numer() as f64 / f.denom().max(1) as f64;
        let (low, high) = (as_f64(min), as_f64(max));
        return COMMON_FRAMERATES
            .iter()
            .filter(|fps| (low..=high).contains(&f64::from(**fps)))
            .map(|fps| FrameRate::from_int(*fps))
            .collect();
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formats_from_fixed_caps() {
        gstreamer::init().unwrap();
        let caps = gstreamer::Caps::builder("video/x-raw")
            .field("width", 640i32)
            .field("height", 480i32)
            .field("framerate", gstreamer::Fraction::new(30000, 1001))
            .build();

        let formats = formats_from_caps(&caps);
        assert_eq!(formats.len(), 1);
        assert_eq!(formats[0].frame_rates, vec![FrameRate::new(30000, 1001)]);
    }

    #[test]
    fn test_formats_from_ranges() {
        gstreamer::init().unwrap();
        let caps = gstreamer::Caps::builder("image/jpeg")
            .field("width", gstreamer::IntRange::new(320i32, 1280))
            .field("height", gstreamer::IntRange::new(240i32, 720))
            .field(
                "framerate",
                gstreamer::FractionRange::new(
                    gstreamer::Fraction::new(1, 1),
                    gstreamer::Fraction::new(30, 1),
                ),
            )
            .build();

        let formats = formats_from_caps(&caps);
        let sizes: Vec<_> = formats.iter().map(|f| (f.width, f.height)).collect();
        assert_eq!(sizes, vec![(320, 240), (640, 480), (800, 600), (1280, 720)]);
        assert!(formats[0].frame_rates.contains(&FrameRate::from_int(30)));
        assert!(!formats[0].frame_rates.contains(&FrameRate::from_int(60)));
    }

    #[test]
    fn test_jpeg_only_sizes_need_decoding() {
        gstreamer::init().unwrap();
        let mut caps = gstreamer::Caps::builder("video/x-raw")
            .field("width", 640i32)
            .field("height", 480i32)
            .field("framerate", gstreamer::Fraction::new(30, 1))
            .build();
        caps.make_mut().append_structure(
            gstreamer::Structure::builder("image/jpeg")
                .field("width", gstreamer::IntRange::new(320i32, 1920))
                .field("height", gstreamer::IntRange::new(240i32, 1080))
                .build(),
        );

        assert!(!needs_jpeg_decode(&caps, 640, 480));
        assert!(needs_jpeg_decode(&caps, 1280, 720));
        assert!(!needs_jpeg_decode(&caps, 3840, 2160));
    }
}
