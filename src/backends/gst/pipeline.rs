// SPDX-License-Identifier: GPL-3.0-only

//! Capture pipeline
//!
//! ```text
//! source ! video/x-raw,WxH                ! videoconvert ! videoscale ! RGB ! appsink
//! source ! image/jpeg,WxH     ! jpegdec   ! videoconvert ! videoscale ! RGB ! appsink
//! ```
//!
//! The second form is used when the negotiated size is only offered as JPEG.

use super::enumeration::Source;
use crate::backends::NegotiatedFormat;
use crate::constants::capture::MAX_QUEUED_BUFFERS;
use crate::errors::{CaptureError, CaptureResult};
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use tracing::debug;

fn make(factory: &str) -> CaptureResult<gstreamer::Element> {
    gstreamer::ElementFactory::make(factory)
        .build()
        .map_err(|e| CaptureError::BackendInitFailed(format!("cannot create {}: {}", factory, e)))
}

fn capsfilter(caps: &gstreamer::Caps) -> CaptureResult<gstreamer::Element> {
    gstreamer::ElementFactory::make("capsfilter")
        .property("caps", caps)
        .build()
        .map_err(|e| CaptureError::BackendInitFailed(format!("cannot create capsfilter: {}", e)))
}

/// Caps pinning the source to the negotiated size
pub fn source_caps(format: &NegotiatedFormat, jpeg: bool) -> gstreamer::Caps {
    gstreamer::Caps::builder(if jpeg { "image/jpeg" } else { "video/x-raw" })
        .field("width", format.width as i32)
        .field("height", format.height as i32)
        .build()
}

/// Caps every pipeline converts to
pub fn rgb_caps(format: &NegotiatedFormat) -> gstreamer::Caps {
    gstreamer_video::VideoCapsBuilder::new()
        .format(gstreamer_video::VideoFormat::Rgb)
        .width(format.width as i32)
        .height(format.height as i32)
        .framerate(gstreamer::Fraction::new(
            format.frame_rate.num as i32,
            format.frame_rate.denom as i32,
        ))
        .build()
}

/// Build the pipeline in NULL state
///
/// `decode_jpeg` inserts `jpegdec` after the source.
pub fn build(
    source: &Source,
    format: &NegotiatedFormat,
    decode_jpeg: bool,
) -> CaptureResult<(gstreamer::Pipeline, AppSink)> {
    let src = source.create_element()?;
    let src_filter = capsfilter(&source_caps(format, decode_jpeg))?;
    let decoder = if decode_jpeg {
        Some(make("jpegdec")?)
    } else {
        None
    };
    let convert = make("videoconvert")?;
    let scale = make("videoscale")?;
    let caps = rgb_caps(format);
    let rgb_filter = capsfilter(&caps)?;

    // Keep the queue short and never block the source on a slow consumer
    let appsink = AppSink::builder()
        .name("sink")
        .caps(&caps)
        .max_buffers(MAX_QUEUED_BUFFERS)
        .drop(true)
        .sync(false)
        .build();

    let mut chain = vec![&src, &src_filter];
    chain.extend(decoder.as_ref());
    chain.extend([&convert, &scale, &rgb_filter, appsink.upcast_ref()]);

    let pipeline = gstreamer::Pipeline::new();
    pipeline
        .add_many(chain.iter().copied())
        .map_err(|e| CaptureError::BackendInitFailed(format!("cannot assemble pipeline: {}", e)))?;
    gstreamer::Element::link_many(chain.iter().copied())
        .map_err(|e| CaptureError::BackendInitFailed(format!("cannot link pipeline: {}", e)))?;

    debug!(caps = %caps, decode_jpeg, "Built capture pipeline");
    Ok((pipeline, appsink))
}
