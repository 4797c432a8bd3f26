// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer capture backend (macOS, iOS, Windows, Android)
//!
//! Devices come from the platform device provider (AVFoundation, Media
//! Foundation, Camera2). Identifiers use the position in the provider's list,
//! which is only stable within one enumeration.

pub mod enumeration;
pub mod pipeline;

use super::{
    Backend, BackendSession, DeviceDescriptor, Frame, FramePoll, NativeSession, NegotiatedFormat,
};
use crate::constants::timing;
use crate::errors::{CaptureError, CaptureResult};
use gstreamer::glib::object::ObjectType;
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use std::ffi::c_void;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Backend over the platform's GStreamer camera source
#[derive(Debug, Clone)]
pub struct GstBackend;

impl GstBackend {
    pub fn new() -> CaptureResult<Self> {
        gstreamer::init().map_err(|e| {
            CaptureError::BackendInitFailed(format!("GStreamer initialization failed: {}", e))
        })?;
        Ok(Self)
    }
}

impl Backend for GstBackend {
    type Session = GstSession;

    fn name(&self) -> &'static str {
        "gstreamer"
    }

    fn enumerate(&self) -> CaptureResult<Vec<DeviceDescriptor>> {
        Ok(enumeration::list_sources()?
            .into_iter()
            .map(|(descriptor, _)| descriptor)
            .collect())
    }

    fn open(
        &self,
        device: &DeviceDescriptor,
        format: &NegotiatedFormat,
    ) -> CaptureResult<Self::Session> {
        // Sources are re-listed; the positional index picks the device
        let source = enumeration::list_sources()
            .map_err(|e| CaptureError::BackendInitFailed(e.to_string()))?
            .into_iter()
            .find(|(descriptor, _)| descriptor.id == device.id)
            .map(|(_, source)| source)
            .ok_or_else(|| {
                CaptureError::BackendInitFailed(format!("{} disappeared before open", device.id))
            })?;

        let decode_jpeg = source.caps().is_some_and(|caps| {
            enumeration::needs_jpeg_decode(&caps, format.width, format.height)
        });
        let (pipeline, appsink) = pipeline::build(&source, format, decode_jpeg)?;
        pipeline.set_state(gstreamer::State::Ready).map_err(|e| {
            let _ = pipeline.set_state(gstreamer::State::Null);
            CaptureError::BackendInitFailed(format!("{}: cannot acquire device: {}", device.id, e))
        })?;

        info!(device = %device.id, format = %format, decode_jpeg, "Created GStreamer capture pipeline");

        Ok(GstSession {
            id: device.id.clone(),
            pipeline,
            appsink,
            width: format.width,
            height: format.height,
            sequence: 0,
        })
    }
}

/// An acquired GStreamer pipeline
pub struct GstSession {
    id: String,
    pipeline: gstreamer::Pipeline,
    appsink: AppSink,
    width: u32,
    height: u32,
    sequence: u64,
}

impl GstSession {
    /// Pending error or EOS on the bus
    fn bus_failure(&self) -> Option<String> {
        let bus = self.pipeline.bus()?;
        let msg = bus.pop_filtered(&[gstreamer::MessageType::Error, gstreamer::MessageType::Eos])?;
        match msg.view() {
            gstreamer::MessageView::Error(err) => Some(format!(
                "{} ({})",
                err.error(),
                err.debug().map(|d| d.to_string()).unwrap_or_default()
            )),
            _ => Some("end of stream".to_string()),
        }
    }

    fn sample_to_frame(&mut self, sample: &gstreamer::Sample) -> CaptureResult<Frame> {
        let caps = sample.caps().ok_or_else(|| {
            CaptureError::BackendRuntimeError(format!("{}: sample without caps", self.id))
        })?;
        let info = gstreamer_video::VideoInfo::from_caps(caps).map_err(|e| {
            CaptureError::BackendRuntimeError(format!("{}: bad caps: {}", self.id, e))
        })?;
        let buffer = sample.buffer().ok_or_else(|| {
            CaptureError::BackendRuntimeError(format!("{}: sample without buffer", self.id))
        })?;
        if buffer.flags().contains(gstreamer::BufferFlags::CORRUPTED) {
            return Err(CaptureError::BackendRuntimeError(format!(
                "{}: corrupted buffer",
                self.id
            )));
        }
        let map = buffer.map_readable().map_err(|e| {
            CaptureError::BackendRuntimeError(format!("{}: cannot map buffer: {}", self.id, e))
        })?;

        let sequence = self.sequence;
        self.sequence += 1;

        Ok(Frame {
            data: map.as_slice().to_vec(),
            width: info.width(),
            height: info.height(),
            stride: info.stride()[0] as u32,
            captured_at: SystemTime::now(),
            sequence,
        })
    }
}

impl BackendSession for GstSession {
    fn start(&mut self) -> CaptureResult<()> {
        self.pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| CaptureError::BackendStartFailed(format!("{}: {}", self.id, e)))?;

        let (result, state, _) = self.pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::START_TIMEOUT_SECS,
        ));
        if let Some(failure) = self.bus_failure() {
            let _ = self.pipeline.set_state(gstreamer::State::Ready);
            return Err(CaptureError::BackendStartFailed(format!(
                "{}: {}",
                self.id, failure
            )));
        }
        if result.is_err() {
            let _ = self.pipeline.set_state(gstreamer::State::Ready);
            return Err(CaptureError::BackendStartFailed(format!(
                "{}: pipeline did not reach PLAYING (state {:?})",
                self.id, state
            )));
        }

        debug!(device = %self.id, ?state, width = self.width, height = self.height, "Pipeline playing");
        self.sequence = 0;
        Ok(())
    }

    fn next_frame(&mut self, timeout: Duration) -> CaptureResult<FramePoll> {
        if let Some(failure) = self.bus_failure() {
            warn!(device = %self.id, failure = %failure, "Capture pipeline failed");
            return Ok(FramePoll::Disconnected);
        }

        let wait = gstreamer::ClockTime::from_mseconds(timeout.as_millis() as u64);
        match self.appsink.try_pull_sample(wait) {
            Some(sample) => self.sample_to_frame(&sample).map(FramePoll::Frame),
            None if self.appsink.is_eos() => Ok(FramePoll::Disconnected),
            None => Ok(FramePoll::Timeout),
        }
    }

    fn stop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Ready) {
            warn!(device = %self.id, error = %e, "Failed to pause capture pipeline");
        }
        let _ = self.pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::STOP_TIMEOUT_SECS,
        ));
    }

    /// The `GstPipeline*`, valid while the session lives
    fn native_handle(&self) -> Option<NativeSession> {
        NativeSession::new(self.pipeline.as_ptr() as *mut c_void)
    }
}

impl Drop for GstSession {
    fn drop(&mut self) {
        // Release the device immediately
        let _ = self.pipeline.set_state(gstreamer::State::Null);
        debug!(device = %self.id, "GStreamer capture pipeline released");
    }
}
