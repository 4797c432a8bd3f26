// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 capture backend (Linux)
//!
//! Devices are the `/dev/videoN` nodes with the video capture capability; the
//! logical identifier uses the kernel's node number. Frames are streamed with
//! memory-mapped buffers and converted to RGB24 on the capture thread.

use super::format_converters::{self, SourceFormat};
use super::{
    Backend, BackendSession, DeviceDescriptor, FormatDescriptor, Frame, FramePoll, FrameRate,
    NegotiatedFormat, merge_format,
};
use crate::constants::capture::STREAM_BUFFERS;
use crate::constants::negotiation::{COMMON_FRAMERATES, COMMON_RESOLUTIONS};
use crate::errors::{CaptureError, CaptureResult};
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::frameinterval::FrameIntervalEnum;
use v4l::framesize::FrameSizeEnum;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::video::capture::Parameters;
use v4l::{Format, FourCC, Fraction};

/// Backend over the kernel's V4L2 API
#[derive(Debug, Clone, Default)]
pub struct V4l2Backend;

impl V4l2Backend {
    pub fn new() -> CaptureResult<Self> {
        Ok(Self)
    }
}

impl Backend for V4l2Backend {
    type Session = V4l2Session;

    fn name(&self) -> &'static str {
        "v4l2"
    }

    fn enumerate(&self) -> CaptureResult<Vec<DeviceDescriptor>> {
        // enum_devices() silently returns nothing when /dev is unreadable
        Path::new("/dev").read_dir().map_err(|e| {
            CaptureError::EnumerationUnavailable(format!("cannot list /dev: {}", e))
        })?;

        let mut nodes = v4l::context::enum_devices();
        nodes.sort_by_key(|node| node.index());

        let mut devices = Vec::new();
        for node in nodes {
            let index = node.index();
            let dev = match Device::new(index) {
                Ok(dev) => dev,
                Err(e) => {
                    debug!(path = %node.path().display(), error = %e, "Skipping unopenable video node");
                    continue;
                }
            };
            let caps = match dev.query_caps() {
                Ok(caps) => caps,
                Err(e) => {
                    debug!(path = %node.path().display(), error = %e, "Skipping video node without capabilities");
                    continue;
                }
            };
            if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
                debug!(path = %node.path().display(), "Skipping non-capture video node");
                continue;
            }

            let mut device = DeviceDescriptor::new(index as u32, caps.card.clone());
            device.description = Some(caps.driver.clone()).filter(|s| !s.is_empty());
            device.misc = Some(caps.bus.clone()).filter(|s| !s.is_empty());
            device.formats = probe_formats(&dev);

            debug!(
                id = %device.id,
                name = %device.name,
                formats = device.formats.len(),
                "Found V4L2 capture device"
            );
            devices.push(device);
        }

        info!(count = devices.len(), "Enumerated V4L2 devices");
        Ok(devices)
    }

    /// First USB-attached device, else the first enumerated one
    fn default_device<'a>(&self, devices: &'a [DeviceDescriptor]) -> Option<&'a DeviceDescriptor> {
        devices
            .iter()
            .find(|device| is_usb_device(device))
            .or_else(|| devices.first())
    }

    fn open(
        &self,
        device: &DeviceDescriptor,
        format: &NegotiatedFormat,
    ) -> CaptureResult<Self::Session> {
        let index = device.index().ok_or_else(|| {
            CaptureError::BackendInitFailed(format!("{} is not a V4L2 node", device.id))
        })?;
        let dev = Device::new(index as usize)
            .map_err(|e| CaptureError::BackendInitFailed(format!("{}: {}", device.id, e)))?;

        let source = pick_source_format(&dev, format.width, format.height).ok_or_else(|| {
            CaptureError::BackendInitFailed(format!(
                "{}: no convertible pixel format at {}x{}",
                device.id, format.width, format.height
            ))
        })?;

        let requested = Format::new(format.width, format.height, FourCC::new(&source.fourcc()));
        let actual = dev
            .set_format(&requested)
            .map_err(|e| CaptureError::BackendInitFailed(format!("{}: set format: {}", device.id, e)))?;

        if actual.width != format.width || actual.height != format.height {
            return Err(CaptureError::BackendInitFailed(format!(
                "{}: driver chose {}x{} instead of {}x{}",
                device.id, actual.width, actual.height, format.width, format.height
            )));
        }
        let source = SourceFormat::from_fourcc(&actual.fourcc.repr).ok_or_else(|| {
            CaptureError::BackendInitFailed(format!(
                "{}: driver switched to unsupported pixel format {}",
                device.id, actual.fourcc
            ))
        })?;

        // Frame interval is the inverse of the frame rate
        let interval = Fraction::new(format.frame_rate.denom, format.frame_rate.num);
        if let Err(e) = dev.set_params(&Parameters::new(interval)) {
            warn!(device = %device.id, error = %e, "Could not set frame interval, using driver default");
        }

        info!(
            device = %device.id,
            fourcc = %actual.fourcc,
            width = actual.width,
            height = actual.height,
            stride = actual.stride,
            "Configured V4L2 format"
        );

        Ok(V4l2Session {
            id: device.id.clone(),
            device: dev,
            stream: None,
            source,
            width: actual.width,
            height: actual.height,
            stride: actual.stride,
            sequence: 0,
        })
    }
}

/// An opened `/dev/videoN` node
pub struct V4l2Session {
    id: String,
    device: Device,
    stream: Option<Stream<'static>>,
    source: SourceFormat,
    width: u32,
    height: u32,
    stride: u32,
    sequence: u64,
}

impl BackendSession for V4l2Session {
    fn start(&mut self) -> CaptureResult<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        // Streaming begins with the first dequeue
        let stream = Stream::with_buffers(&self.device, Type::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| CaptureError::BackendStartFailed(format!("{}: {}", self.id, e)))?;

        debug!(device = %self.id, buffers = STREAM_BUFFERS, "Created mmap stream");
        self.stream = Some(stream);
        self.sequence = 0;
        Ok(())
    }

    fn next_frame(&mut self, timeout: Duration) -> CaptureResult<FramePoll> {
        let stream = self.stream.as_mut().ok_or_else(|| {
            CaptureError::BackendRuntimeError(format!("{}: not streaming", self.id))
        })?;
        stream.set_timeout(timeout);

        let (buf, meta) = match stream.next() {
            Ok(frame) => frame,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(FramePoll::Timeout),
            Err(e) if is_disconnect(&e) => {
                warn!(device = %self.id, error = %e, "V4L2 device went away");
                return Ok(FramePoll::Disconnected);
            }
            Err(e) => {
                return Err(CaptureError::BackendRuntimeError(format!(
                    "{}: {}",
                    self.id, e
                )));
            }
        };

        let used = match meta.bytesused as usize {
            0 => buf.len(),
            n => n.min(buf.len()),
        };
        let (data, stride) = format_converters::to_rgb24(
            self.source,
            &buf[..used],
            self.width,
            self.height,
            self.stride,
        )?;

        let sequence = self.sequence;
        self.sequence += 1;

        Ok(FramePoll::Frame(Frame {
            data,
            width: self.width,
            height: self.height,
            stride,
            captured_at: SystemTime::now(),
            sequence,
        }))
    }

    fn stop(&mut self) {
        // Dropping the stream issues STREAMOFF and unmaps the buffers
        if self.stream.take().is_some() {
            debug!(device = %self.id, "Stopped V4L2 stream");
        }
    }
}

fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::ENODEV) | Some(libc::ENXIO) | Some(libc::EIO)
    )
}

fn is_usb_device(device: &DeviceDescriptor) -> bool {
    if device
        .misc
        .as_deref()
        .is_some_and(|bus| bus.starts_with("usb"))
    {
        return true;
    }

    // Fall back to the sysfs device link, e.g. ../../devices/pci0000:00/.../usb1/1-2/...
    device.index().is_some_and(|index| {
        std::fs::read_link(format!("/sys/class/video4linux/video{}/device", index))
            .map(|target| target.to_string_lossy().contains("/usb"))
            .unwrap_or(false)
    })
}

/// Rates offered at one size, in driver order
fn interval_rates(dev: &Device, fourcc: FourCC, width: u32, height: u32) -> Vec<FrameRate> {
    let Ok(intervals) = dev.enum_frameintervals(fourcc, width, height) else {
        return Vec::new();
    };

    let mut rates = Vec::new();
    for interval in intervals {
        match interval.interval {
            FrameIntervalEnum::Discrete(frac) => {
                if frac.numerator > 0 && frac.denominator > 0 {
                    rates.push(FrameRate::new(frac.denominator, frac.numerator));
                }
            }
            FrameIntervalEnum::Stepwise(step) => {
                // Interval range [min, max] maps to fps range [1/max, 1/min]
                let fps_of = |f: Fraction| {
                    if f.numerator == 0 {
                        f64::INFINITY
                    } else {
                        f.denominator as f64 / f.numerator as f64
                    }
                };
                let (lowest, highest) = (fps_of(step.max), fps_of(step.min));
                for fps in COMMON_FRAMERATES {
                    let fps_f = f64::from(*fps);
                    if fps_f >= lowest && fps_f <= highest {
                        rates.push(FrameRate::from_int(*fps));
                    }
                }
            }
        }
    }
    rates
}

/// Sizes and rates over all convertible pixel formats, merged per resolution
fn probe_formats(dev: &Device) -> Vec<FormatDescriptor> {
    let mut formats = Vec::new();

    let descriptions = match dev.enum_formats() {
        Ok(descriptions) => descriptions,
        Err(e) => {
            warn!(error = %e, "Failed to enumerate pixel formats");
            return formats;
        }
    };

    for description in descriptions {
        if SourceFormat::from_fourcc(&description.fourcc.repr).is_none() {
            continue;
        }
        let Ok(sizes) = dev.enum_framesizes(description.fourcc) else {
            continue;
        };

        for size in sizes {
            match size.size {
                FrameSizeEnum::Discrete(discrete) => {
                    let rates =
                        interval_rates(dev, description.fourcc, discrete.width, discrete.height);
                    merge_format(&mut formats, discrete.width, discrete.height, &rates);
                }
                FrameSizeEnum::Stepwise(step) => {
                    for &(w, h) in COMMON_RESOLUTIONS {
                        if w >= step.min_width
                            && w <= step.max_width
                            && h >= step.min_height
                            && h <= step.max_height
                        {
                            let rates = interval_rates(dev, description.fourcc, w, h);
                            merge_format(&mut formats, w, h, &rates);
                        }
                    }
                }
            }
        }
    }

    formats
}

/// Cheapest-to-convert pixel format offering `width`x`height`
fn pick_source_format(dev: &Device, width: u32, height: u32) -> Option<SourceFormat> {
    let descriptions = dev.enum_formats().ok()?;

    descriptions
        .iter()
        .filter_map(|description| {
            let source = SourceFormat::from_fourcc(&description.fourcc.repr)?;
            let sizes = dev.enum_framesizes(description.fourcc).ok()?;
            let offered = sizes.iter().any(|size| match &size.size {
                FrameSizeEnum::Discrete(d) => d.width == width && d.height == height,
                FrameSizeEnum::Stepwise(s) => {
                    (s.min_width..=s.max_width).contains(&width)
                        && (s.min_height..=s.max_height).contains(&height)
                }
            });
            offered.then_some(source)
        })
        .min_by_key(SourceFormat::preference)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_errors() {
        assert!(is_disconnect(&io::Error::from_raw_os_error(libc::ENODEV)));
        assert!(is_disconnect(&io::Error::from_raw_os_error(libc::EIO)));
        assert!(!is_disconnect(&io::Error::from_raw_os_error(libc::EAGAIN)));
        assert!(!is_disconnect(&io::Error::new(io::ErrorKind::TimedOut, "poll")));
    }

    #[test]
    fn test_default_prefers_usb_bus() {
        let mut builtin = DeviceDescriptor::new(0, "Integrated");
        builtin.misc = Some("platform:vivid-000".to_string());
        let mut usb = DeviceDescriptor::new(2, "USB Webcam");
        usb.misc = Some("usb-0000:00:14.0-1".to_string());

        let devices = vec![builtin, usb];
        let chosen = V4l2Backend.default_device(&devices).unwrap();
        assert_eq!(chosen.name, "USB Webcam");
    }
}
