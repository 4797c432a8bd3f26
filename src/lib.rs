// SPDX-License-Identifier: GPL-3.0-only

//! Camera capture driver
//!
//! Opens a video capture device, negotiates a resolution and frame rate close
//! to the request, and delivers RGB24 frames to a callback on a dedicated
//! capture thread until stopped.
//!
//! # Architecture
//!
//! - [`backends`]: platform capture backends (V4L2 on Linux, GStreamer elsewhere)
//! - [`capture`]: the capture handle, format negotiation and debouncing
//! - [`catalog`]: device enumeration and its text / JSON Lines renderings
//! - [`record`]: JSON-LD records for delivered frames
//! - [`ffi`]: C ABI for embedding hosts
//! - [`cli`]: shared plumbing for the `camera-reader` and `camera-cataloger` tools
//!
//! # Example
//!
//! ```no_run
//! use camera_capture::{CaptureConfig, CaptureHandle, Frame};
//! use std::sync::Arc;
//!
//! let config = CaptureConfig::new(640, 480, 30.0).with_device("file:/dev/video0");
//! let sink = Arc::new(|frame: &Frame| println!("{}x{}", frame.width, frame.height));
//!
//! let mut handle = CaptureHandle::open(&config, sink)?;
//! handle.start()?;
//! std::thread::sleep(std::time::Duration::from_secs(1));
//! handle.stop()?;
//! # Ok::<(), camera_capture::CaptureError>(())
//! ```

pub mod backends;
pub mod capture;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod ffi;
pub mod record;

// Re-export commonly used types
pub use backends::{
    Backend, BackendSession, DeviceDescriptor, FormatDescriptor, Frame, FrameRate,
    NegotiatedFormat,
};
pub use capture::{CaptureEvent, CaptureHandle, CaptureStats, FrameSink, State};
pub use config::CaptureConfig;
pub use errors::{CameraStatus, CaptureError, CaptureResult};
pub use record::ImageRecord;
