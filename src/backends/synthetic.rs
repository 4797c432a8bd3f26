// SPDX-License-Identifier: GPL-3.0-only

//! In-memory backend producing scripted frames
//!
//! Used for hardware-free testing and dry runs of embedding hosts. Frames are
//! served from a cyclic script (or a moving gradient when the script is empty)
//! and failure modes can be injected per device session.

use super::{
    Backend, BackendSession, DeviceDescriptor, FormatDescriptor, Frame, FramePoll, FrameRate,
    NegotiatedFormat,
};
use crate::errors::{CaptureError, CaptureResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// Counters shared between a backend and all of its sessions
#[derive(Debug, Default)]
pub struct SyntheticCounters {
    pub opened: AtomicUsize,
    pub started: AtomicUsize,
    pub stopped: AtomicUsize,
    pub closed: AtomicUsize,
}

#[derive(Debug, Clone, Default)]
struct Behaviour {
    frames: Vec<Vec<u8>>,
    failing_frames: Vec<u64>,
    disconnect_after: Option<u64>,
    frame_interval: Duration,
    row_padding: u32,
    refuse_start: bool,
    fail_open: bool,
    unavailable: bool,
}

/// Deterministic backend with configurable devices and frames
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    devices: Vec<DeviceDescriptor>,
    behaviour: Behaviour,
    counters: Arc<SyntheticCounters>,
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticBackend {
    /// One device (`file:/dev/video0`) offering 640x480 and 1280x720
    pub fn new() -> Self {
        let mut device = DeviceDescriptor::new(0, "Synthetic Camera");
        device.description = Some("synthetic".to_string());
        device.formats = vec![
            FormatDescriptor::new(
                640,
                480,
                vec![FrameRate::from_int(30), FrameRate::from_int(15)],
            ),
            FormatDescriptor::new(1280, 720, vec![FrameRate::from_int(30)]),
        ];
        Self::with_devices(vec![device])
    }

    pub fn with_devices(devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            devices,
            behaviour: Behaviour::default(),
            counters: Arc::new(SyntheticCounters::default()),
        }
    }

    /// Packed RGB24 frames served in a cycle; each must match the negotiated size
    pub fn frames(mut self, frames: Vec<Vec<u8>>) -> Self {
        self.behaviour.frames = frames;
        self
    }

    /// Sequence numbers that report a transient runtime error instead of a frame
    pub fn failing_frames(mut self, sequences: Vec<u64>) -> Self {
        self.behaviour.failing_frames = sequences;
        self
    }

    /// Report `Disconnected` once `count` frames have been produced
    pub fn disconnect_after(mut self, count: u64) -> Self {
        self.behaviour.disconnect_after = Some(count);
        self
    }

    /// Simulated time between frames
    pub fn frame_interval(mut self, interval: Duration) -> Self {
        self.behaviour.frame_interval = interval;
        self
    }

    /// Extra bytes appended to every row of produced frames
    pub fn row_padding(mut self, padding: u32) -> Self {
        self.behaviour.row_padding = padding;
        self
    }

    pub fn refuse_start(mut self) -> Self {
        self.behaviour.refuse_start = true;
        self
    }

    pub fn fail_open(mut self) -> Self {
        self.behaviour.fail_open = true;
        self
    }

    /// Make enumeration itself fail
    pub fn unavailable(mut self) -> Self {
        self.behaviour.unavailable = true;
        self
    }

    pub fn counters(&self) -> Arc<SyntheticCounters> {
        Arc::clone(&self.counters)
    }
}

impl Backend for SyntheticBackend {
    type Session = SyntheticSession;

    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn enumerate(&self) -> CaptureResult<Vec<DeviceDescriptor>> {
        if self.behaviour.unavailable {
            return Err(CaptureError::EnumerationUnavailable(
                "synthetic capture subsystem disabled".to_string(),
            ));
        }
        Ok(self.devices.clone())
    }

    fn open(
        &self,
        device: &DeviceDescriptor,
        format: &NegotiatedFormat,
    ) -> CaptureResult<Self::Session> {
        if self.behaviour.fail_open {
            return Err(CaptureError::BackendInitFailed(format!(
                "{}: device busy",
                device.id
            )));
        }

        debug!(device = %device.id, format = %format, "Opening synthetic session");
        self.counters.opened.fetch_add(1, Ordering::SeqCst);

        Ok(SyntheticSession {
            format: *format,
            behaviour: self.behaviour.clone(),
            counters: Arc::clone(&self.counters),
            streaming: false,
            unplugged: false,
            sequence: 0,
        })
    }
}

/// Session created by [`SyntheticBackend::open`]
pub struct SyntheticSession {
    format: NegotiatedFormat,
    behaviour: Behaviour,
    counters: Arc<SyntheticCounters>,
    streaming: bool,
    /// Set once the session reported `Disconnected`; never cleared
    unplugged: bool,
    sequence: u64,
}

impl SyntheticSession {
    fn render(&self, sequence: u64) -> CaptureResult<Vec<u8>> {
        let width = self.format.width as usize;
        let height = self.format.height as usize;
        let row = width * 3;

        let packed = if self.behaviour.frames.is_empty() {
            // Horizontal gradient shifted by one column per frame
            let mut data = Vec::with_capacity(row * height);
            for _ in 0..height {
                for x in 0..width {
                    let v = ((x as u64 + sequence) % 256) as u8;
                    data.extend_from_slice(&[v, v / 2, 255 - v]);
                }
            }
            data
        } else {
            let index = (sequence % self.behaviour.frames.len() as u64) as usize;
            let frame = &self.behaviour.frames[index];
            if frame.len() != row * height {
                return Err(CaptureError::BackendRuntimeError(format!(
                    "scripted frame {} has {} bytes, expected {}",
                    index,
                    frame.len(),
                    row * height
                )));
            }
            frame.clone()
        };

        let padding = self.behaviour.row_padding as usize;
        if padding == 0 {
            return Ok(packed);
        }

        let mut padded = Vec::with_capacity((row + padding) * height);
        for line in packed.chunks_exact(row) {
            padded.extend_from_slice(line);
            padded.resize(padded.len() + padding, 0);
        }
        Ok(padded)
    }
}

impl BackendSession for SyntheticSession {
    fn start(&mut self) -> CaptureResult<()> {
        if self.unplugged {
            return Err(CaptureError::BackendStartFailed(
                "device was disconnected".to_string(),
            ));
        }
        if self.behaviour.refuse_start {
            return Err(CaptureError::BackendStartFailed(
                "permission denied".to_string(),
            ));
        }
        self.counters.started.fetch_add(1, Ordering::SeqCst);
        self.streaming = true;
        self.sequence = 0;
        Ok(())
    }

    fn next_frame(&mut self, timeout: Duration) -> CaptureResult<FramePoll> {
        if !self.streaming {
            return Err(CaptureError::BackendRuntimeError(
                "session is not streaming".to_string(),
            ));
        }

        if self.unplugged {
            return Ok(FramePoll::Disconnected);
        }
        if let Some(limit) = self.behaviour.disconnect_after
            && self.sequence >= limit
        {
            self.unplugged = true;
            return Ok(FramePoll::Disconnected);
        }

        if self.behaviour.frame_interval > timeout {
            std::thread::sleep(timeout);
            return Ok(FramePoll::Timeout);
        }
        if !self.behaviour.frame_interval.is_zero() {
            std::thread::sleep(self.behaviour.frame_interval);
        }

        let sequence = self.sequence;
        self.sequence += 1;

        if self.behaviour.failing_frames.contains(&sequence) {
            return Err(CaptureError::BackendRuntimeError(format!(
                "synthetic failure at frame {}",
                sequence
            )));
        }

        let frame = Frame::new(self.render(sequence)?, self.format.width, self.format.height)
            .with_stride(self.format.width * 3 + self.behaviour.row_padding)
            .with_sequence(sequence);
        Ok(FramePoll::Frame(frame))
    }

    fn stop(&mut self) {
        if self.streaming {
            self.counters.stopped.fetch_add(1, Ordering::SeqCst);
        }
        self.streaming = false;
    }
}

impl Drop for SyntheticSession {
    fn drop(&mut self) {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
    }
}
