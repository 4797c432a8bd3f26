// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for capture loops
//!
//! The loop thread owns its state (the backend session and per-loop filters)
//! and hands it back when joined, so a stopped handle can be started again.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Action returned by the capture loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a capture loop running in a separate thread
///
/// # Example
///
/// ```ignore
/// let mut controller = CaptureLoopController::start("capture", session, |session| {
///     match session.next_frame(FRAME_WAIT) {
///         Ok(FramePoll::Disconnected) => LoopAction::Stop,
///         _ => LoopAction::Continue,
///     }
/// })?;
///
/// // Later, stop the loop and take the session back
/// let session = controller.stop();
/// ```
pub struct CaptureLoopController<S> {
    /// Thread handle for joining; yields the loop state
    thread_handle: Option<JoinHandle<S>>,
    /// Signal to stop the loop
    stop_signal: Arc<AtomicBool>,
    /// Name for logging
    name: String,
}

impl<S: Send + 'static> CaptureLoopController<S> {
    /// Start a new capture loop in a separate thread
    ///
    /// `loop_fn` is called repeatedly with the state until it returns
    /// `LoopAction::Stop` or the stop signal is raised. The stop signal is
    /// checked before every iteration.
    pub fn start<F>(name: &str, state: S, mut loop_fn: F) -> io::Result<Self>
    where
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, "Starting capture loop");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(name = %name_clone, "Capture loop thread started");
                let mut state = state;

                loop {
                    if stop_signal_clone.load(Ordering::SeqCst) {
                        debug!(name = %name_clone, "Stop signal received");
                        break;
                    }

                    match loop_fn(&mut state) {
                        LoopAction::Continue => {}
                        LoopAction::Stop => {
                            debug!(name = %name_clone, "Loop requested stop");
                            break;
                        }
                    }
                }

                info!(name = %name_clone, "Capture loop thread exiting");
                state
            })?;

        Ok(Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        })
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop (non-blocking)
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop, wait for the thread and return its state
    pub fn stop(&mut self) -> Option<S> {
        self.request_stop();
        self.join()
    }

    /// Wait for the thread to finish without sending stop signal
    ///
    /// Returns `None` if the thread already was joined or panicked.
    pub fn join(&mut self) -> Option<S> {
        let handle = self.thread_handle.take()?;
        debug!(name = %self.name, "Waiting for capture loop thread to finish");
        match handle.join() {
            Ok(state) => {
                debug!(name = %self.name, "Capture loop thread finished");
                Some(state)
            }
            Err(e) => {
                warn!(name = %self.name, "Capture loop thread panicked: {:?}", e);
                None
            }
        }
    }
}

impl<S> Drop for CaptureLoopController<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            debug!(name = %self.name, "CaptureLoopController dropped, stopping loop");
            self.stop_signal.store(true, Ordering::SeqCst);
            let _ = handle.join();
        }
    }
}
