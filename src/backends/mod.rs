// SPDX-License-Identifier: GPL-3.0-only

//! Platform capture backends
//!
//! Each target compiles exactly one native backend behind the [`Backend`] /
//! [`BackendSession`] traits:
//!
//! ```text
//! ┌─────────────────────┐
//! │   CaptureHandle     │  ← Lifecycle, negotiation, capture loop
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │   Backend trait     │  ← enumerate / open
//! └──────────┬──────────┘
//!            │
//!     ┌──────┴───────┐
//!     ▼              ▼
//! ┌────────┐   ┌───────────┐
//! │  V4L2  │   │ GStreamer │  (avfvideosrc, mfvideosrc, ahc2src)
//! └────────┘   └───────────┘
//! ```
//!
//! The [`synthetic`] backend is available everywhere and produces frames from
//! memory.

pub mod format_converters;
pub mod synthetic;
pub mod types;

#[cfg(target_os = "linux")]
pub mod v4l2;

#[cfg(not(target_os = "linux"))]
pub mod gst;

pub use types::*;

use crate::errors::CaptureResult;
use std::ffi::c_void;
use std::time::Duration;

/// Backend compiled in for the current target
#[cfg(target_os = "linux")]
pub type NativeBackend = v4l2::V4l2Backend;

/// Backend compiled in for the current target
#[cfg(not(target_os = "linux"))]
pub type NativeBackend = gst::GstBackend;

/// Result of waiting for one frame
#[derive(Debug)]
pub enum FramePoll {
    Frame(Frame),
    /// Nothing arrived within the wait bound
    Timeout,
    /// The device went away; no further frames will arrive
    Disconnected,
}

/// Opaque reference to the OS-level capture session
///
/// Handed to hosts for preview embedding. The pointee is owned by the backend
/// session and is only valid while that session is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeSession(*mut c_void);

// The pointer is only handed out, never dereferenced by this crate.
unsafe impl Send for NativeSession {}
unsafe impl Sync for NativeSession {}

impl NativeSession {
    pub fn new(ptr: *mut c_void) -> Option<Self> {
        if ptr.is_null() { None } else { Some(Self(ptr)) }
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0
    }
}

/// A platform capture API
pub trait Backend: Send + 'static {
    type Session: BackendSession;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// List capture devices in the platform's order
    ///
    /// An empty list is not an error. Failure to query the capture subsystem
    /// itself is `EnumerationUnavailable`.
    fn enumerate(&self) -> CaptureResult<Vec<DeviceDescriptor>>;

    /// Device used when no identifier was given or it did not resolve
    fn default_device<'a>(&self, devices: &'a [DeviceDescriptor]) -> Option<&'a DeviceDescriptor> {
        devices.first()
    }

    /// Acquire the device for the negotiated format without streaming
    fn open(
        &self,
        device: &DeviceDescriptor,
        format: &NegotiatedFormat,
    ) -> CaptureResult<Self::Session>;
}

/// An opened device
///
/// Dropping the session closes the device.
pub trait BackendSession: Send + 'static {
    /// Begin streaming
    fn start(&mut self) -> CaptureResult<()>;

    /// Wait up to `timeout` for the next RGB24 frame
    fn next_frame(&mut self, timeout: Duration) -> CaptureResult<FramePoll>;

    /// Stop streaming; the session may be started again
    fn stop(&mut self);

    fn native_handle(&self) -> Option<NativeSession> {
        None
    }
}
