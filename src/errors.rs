// SPDX-License-Identifier: GPL-3.0-only

//! Error types for camera capture
//!
//! Every component reports failures through [`CaptureError`], a small closed set
//! of kinds. The C ABI flattens them into [`CameraStatus`] codes so nothing ever
//! unwinds across the FFI boundary.

use std::fmt;

/// Result type alias using CaptureError
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Camera capture error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The requested device could not be resolved and no fallback exists
    DeviceNotFound(String),
    /// No supported format is close enough to the requested one
    UnsupportedFormat(String),
    /// The OS or driver refused to open the device
    BackendInitFailed(String),
    /// The OS refused to start streaming (permission revoked, unplugged, ...)
    BackendStartFailed(String),
    /// Operation not valid in the handle's current lifecycle state
    InvalidState(String),
    /// The capture subsystem itself cannot be queried
    EnumerationUnavailable(String),
    /// Transient per-frame failure from the OS capture layer
    BackendRuntimeError(String),
}

impl CaptureError {
    /// Short machine-friendly name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureError::DeviceNotFound(_) => "DeviceNotFound",
            CaptureError::UnsupportedFormat(_) => "UnsupportedFormat",
            CaptureError::BackendInitFailed(_) => "BackendInitFailed",
            CaptureError::BackendStartFailed(_) => "BackendStartFailed",
            CaptureError::InvalidState(_) => "InvalidState",
            CaptureError::EnumerationUnavailable(_) => "EnumerationUnavailable",
            CaptureError::BackendRuntimeError(_) => "BackendRuntimeError",
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            CaptureError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            CaptureError::BackendInitFailed(msg) => {
                write!(f, "Backend initialization failed: {}", msg)
            }
            CaptureError::BackendStartFailed(msg) => write!(f, "Failed to start capture: {}", msg),
            CaptureError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            CaptureError::EnumerationUnavailable(msg) => {
                write!(f, "Device enumeration unavailable: {}", msg)
            }
            CaptureError::BackendRuntimeError(msg) => write!(f, "Capture error: {}", msg),
        }
    }
}

impl std::error::Error for CaptureError {}

/// Status codes returned across the C ABI
///
/// `Ok` is always zero; every [`CaptureError`] kind has its own code.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraStatus {
    Ok = 0,
    DeviceNotFound = 1,
    UnsupportedFormat = 2,
    BackendInitFailed = 3,
    BackendStartFailed = 4,
    InvalidState = 5,
    EnumerationUnavailable = 6,
    BackendRuntimeError = 7,
    /// Null or malformed argument passed by the host
    InvalidArgument = 8,
}

impl From<&CaptureError> for CameraStatus {
    fn from(err: &CaptureError) -> Self {
        match err {
            CaptureError::DeviceNotFound(_) => CameraStatus::DeviceNotFound,
            CaptureError::UnsupportedFormat(_) => CameraStatus::UnsupportedFormat,
            CaptureError::BackendInitFailed(_) => CameraStatus::BackendInitFailed,
            CaptureError::BackendStartFailed(_) => CameraStatus::BackendStartFailed,
            CaptureError::InvalidState(_) => CameraStatus::InvalidState,
            CaptureError::EnumerationUnavailable(_) => CameraStatus::EnumerationUnavailable,
            CaptureError::BackendRuntimeError(_) => CameraStatus::BackendRuntimeError,
        }
    }
}

impl From<CaptureError> for CameraStatus {
    fn from(err: CaptureError) -> Self {
        CameraStatus::from(&err)
    }
}

impl<T> From<CaptureResult<T>> for CameraStatus {
    fn from(result: CaptureResult<T>) -> Self {
        match result {
            Ok(_) => CameraStatus::Ok,
            Err(e) => e.into(),
        }
    }
}
