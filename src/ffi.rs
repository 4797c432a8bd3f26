// SPDX-License-Identifier: GPL-3.0-only

//! C ABI for embedding hosts
//!
//! Every entry point returns a [`CameraStatus`] and never unwinds into the
//! caller. A handle must not be used from several threads at once.
//!
//! The frame callback runs on the capture thread. Its `data` pointer is only
//! valid during the call; hosts that keep pixels must copy them. The `context`
//! pointer is never dereferenced here and must stay valid until
//! `camera_capture_stop` (or `camera_capture_free`) has returned.

use crate::backends::{Backend, Frame, NativeBackend, NativeSession};
use crate::capture::{CaptureHandle, FrameSink};
use crate::config::CaptureConfig;
use crate::errors::{CameraStatus, CaptureError, CaptureResult};
use std::ffi::{CStr, c_char, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::Arc;
use tracing::error;

/// Frame callback implemented by the host
///
/// Receives RGB24 pixels; rows are `stride` bytes apart.
pub type CameraFrameCallback = extern "C" fn(
    data: *const u8,
    len: usize,
    width: u32,
    height: u32,
    stride: u32,
    context: *mut c_void,
);

/// Opaque handle given to hosts
pub struct CameraHandle {
    inner: Box<dyn HostCapture>,
}

/// Lifecycle operations the C entry points need, independent of the backend
trait HostCapture {
    fn start(&mut self) -> CaptureResult<()>;
    fn stop(&mut self) -> CaptureResult<()>;
    fn free(&mut self);
    fn native_session(&self) -> Option<NativeSession>;
}

impl<B: Backend> HostCapture for CaptureHandle<B> {
    fn start(&mut self) -> CaptureResult<()> {
        CaptureHandle::start(self)
    }

    fn stop(&mut self) -> CaptureResult<()> {
        CaptureHandle::stop(self)
    }

    fn free(&mut self) {
        CaptureHandle::free(self)
    }

    fn native_session(&self) -> Option<NativeSession> {
        CaptureHandle::native_session(self)
    }
}

/// Host context pointer carried into the capture thread
struct HostContext(*mut c_void);

// The pointer is only passed back to the host's callback.
unsafe impl Send for HostContext {}
unsafe impl Sync for HostContext {}

impl HostContext {
    fn get(&self) -> *mut c_void {
        self.0
    }
}

fn host_sink(callback: CameraFrameCallback, context: *mut c_void) -> FrameSink {
    let context = HostContext(context);
    Arc::new(move |frame: &Frame| {
        callback(
            frame.data.as_ptr(),
            frame.data.len(),
            frame.width,
            frame.height,
            frame.stride,
            context.get(),
        );
    })
}

/// Run `f`, turning a panic into a status code
fn guarded(name: &str, f: impl FnOnce() -> CameraStatus) -> CameraStatus {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        error!(function = name, "Panic caught at the C boundary");
        CameraStatus::BackendRuntimeError
    })
}

/// `NULL` and `""` select the default device
unsafe fn device_arg(device: *const c_char) -> Result<Option<String>, CameraStatus> {
    if device.is_null() {
        return Ok(None);
    }
    let device = unsafe { CStr::from_ptr(device) }
        .to_str()
        .map_err(|_| CameraStatus::InvalidArgument)?
        .trim();
    Ok(if device.is_empty() {
        None
    } else {
        Some(device.to_string())
    })
}

/// Open a camera without starting it
///
/// On success `*out_handle` receives a handle that must be released with
/// [`camera_capture_free`].
///
/// # Safety
///
/// `device` must be null or a NUL-terminated string, `out_handle` must be a
/// valid pointer to writable storage.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn camera_capture_open(
    device: *const c_char,
    width: u32,
    height: u32,
    fps: f64,
    callback: Option<CameraFrameCallback>,
    context: *mut c_void,
    out_handle: *mut *mut CameraHandle,
) -> CameraStatus {
    guarded("camera_capture_open", || unsafe {
        open_raw(
            NativeBackend::new,
            device,
            width,
            height,
            fps,
            callback,
            context,
            out_handle,
        )
    })
}

/// Body of [`camera_capture_open`] over any backend
///
/// `backend` is only constructed once the arguments have been checked.
///
/// # Safety
///
/// Same contract as [`camera_capture_open`].
#[allow(clippy::too_many_arguments)]
pub(crate) unsafe fn open_raw<B: Backend>(
    backend: impl FnOnce() -> CaptureResult<B>,
    device: *const c_char,
    width: u32,
    height: u32,
    fps: f64,
    callback: Option<CameraFrameCallback>,
    context: *mut c_void,
    out_handle: *mut *mut CameraHandle,
) -> CameraStatus {
    if out_handle.is_null() {
        return CameraStatus::InvalidArgument;
    }
    unsafe { *out_handle = ptr::null_mut() };

    let Some(callback) = callback else {
        return CameraStatus::InvalidArgument;
    };
    let device = match unsafe { device_arg(device) } {
        Ok(device) => device,
        Err(status) => return status,
    };

    let mut config = CaptureConfig::new(width, height, fps);
    config.device = device;

    let opened = backend()
        .and_then(|backend| CaptureHandle::open_with(backend, &config, host_sink(callback, context)));
    match opened {
        Ok(inner) => {
            let handle = Box::new(CameraHandle {
                inner: Box::new(inner),
            });
            unsafe { *out_handle = Box::into_raw(handle) };
            CameraStatus::Ok
        }
        Err(e) => {
            error!(error = %e, "camera_capture_open failed");
            e.into()
        }
    }
}

/// Start delivering frames; idempotent
///
/// # Safety
///
/// `handle` must be null or a live handle from [`camera_capture_open`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn camera_capture_start(handle: *mut CameraHandle) -> CameraStatus {
    guarded("camera_capture_start", || {
        match unsafe { handle.as_mut() } {
            Some(handle) => handle.inner.start().into(),
            None => CaptureError::InvalidState("null handle".to_string()).into(),
        }
    })
}

/// Stop delivering frames; blocks until the capture thread exits
///
/// # Safety
///
/// `handle` must be null or a live handle from [`camera_capture_open`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn camera_capture_stop(handle: *mut CameraHandle) -> CameraStatus {
    guarded("camera_capture_stop", || {
        match unsafe { handle.as_mut() } {
            Some(handle) => handle.inner.stop().into(),
            None => CaptureError::InvalidState("null handle".to_string()).into(),
        }
    })
}

/// Stop if needed and release the handle; null is a no-op
///
/// # Safety
///
/// `handle` must be null or a handle from [`camera_capture_open`] that has
/// not been freed yet. It is invalid after this call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn camera_capture_free(handle: *mut CameraHandle) {
    if handle.is_null() {
        return;
    }
    guarded("camera_capture_free", || {
        let mut handle = unsafe { Box::from_raw(handle) };
        handle.inner.free();
        CameraStatus::Ok
    });
}

/// OS-level session for preview embedding, or null
///
/// On the GStreamer backend this is the `GstPipeline*`; V4L2 has none. The
/// pointer is owned by the handle and valid until it is freed.
///
/// # Safety
///
/// `handle` must be null or a live handle from [`camera_capture_open`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn camera_capture_get_native_session(
    handle: *const CameraHandle,
) -> *mut c_void {
    match unsafe { handle.as_ref() } {
        Some(handle) => handle
            .inner
            .native_session()
            .map(|session| session.as_ptr())
            .unwrap_or(ptr::null_mut()),
        None => ptr::null_mut(),
    }
}
