// SPDX-License-Identifier: GPL-3.0-only

//! Capture handle lifecycle
//!
//! ```text
//!  open ──► Opened ──start──► Running ──stop──► Opened
//!             │                  │
//!             └──────free────────┴──────► Freed
//! ```
//!
//! `open` resolves the device, negotiates a format and acquires the backend
//! session without streaming. `start` moves the session onto a dedicated
//! capture thread; `stop` joins that thread and takes the session back, so a
//! handle can be started and stopped any number of times until `free`. A
//! session that reported a disconnect is dropped when the thread is joined and
//! the next `start` acquires the device again.

pub mod debounce;
pub mod frame_loop;
pub mod negotiation;

use crate::backends::{
    Backend, BackendSession, DeviceDescriptor, Frame, FramePoll, NativeBackend, NativeSession,
    NegotiatedFormat,
};
use crate::config::CaptureConfig;
use crate::constants::{capture, timing};
use crate::errors::{CaptureError, CaptureResult};
use debounce::DebounceFilter;
use frame_loop::{CaptureLoopController, LoopAction};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::sync::{Arc, Barrier};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Receives every delivered frame on the capture thread
///
/// The frame is borrowed for the duration of the call only. Implementations
/// must return quickly; a slow sink makes the backend drop frames.
pub type FrameSink = Arc<dyn Fn(&Frame) + Send + Sync>;

/// Lifecycle state of a [`CaptureHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Device acquired, not streaming
    Opened,
    /// Capture loop running
    Running,
    /// Resources released; every further operation fails
    Freed,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Opened => write!(f, "opened"),
            State::Running => write!(f, "running"),
            State::Freed => write!(f, "freed"),
        }
    }
}

/// Notification about a handle, read from [`CaptureHandle::events`]
///
/// The queue is bounded; events are dropped while it is full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// `start` committed the running state
    Started,
    /// `stop` or `free` ended a running capture
    Stopped,
    /// The device went away; the loop has ended
    Disconnected,
    /// The backend failed to produce one frame
    FrameError(CaptureError),
    /// The sink panicked while handling frame `sequence`
    SinkPanicked { sequence: u64 },
}

fn emit(events: &SyncSender<CaptureEvent>, event: CaptureEvent) {
    // Full or abandoned queues lose the event
    let _ = events.try_send(event);
}

/// Frame counters accumulated over the lifetime of a handle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Frames handed to the sink
    pub delivered: u64,
    /// Frames suppressed by the debounce filter
    pub debounced: u64,
    /// Frames skipped to honour the delivery rate limit
    pub throttled: u64,
    /// Frames lost to backend errors or a panicking sink
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    debounced: AtomicU64,
    throttled: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            debounced: self.debounced.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// State owned by the capture thread while running
struct LoopState<S> {
    session: S,
    filter: DebounceFilter,
    sink: FrameSink,
    counters: Arc<Counters>,
    events: SyncSender<CaptureEvent>,
    device_id: String,
    /// Held until `start` has committed the running state
    release: Option<Arc<Barrier>>,
    min_interval: Option<Duration>,
    last_delivery: Option<Instant>,
    /// The session reported `Disconnected` and must not be reused
    disconnected: bool,
    errors: u64,
}

impl<S: BackendSession> LoopState<S> {
    fn iterate(&mut self) -> LoopAction {
        if let Some(release) = self.release.take() {
            release.wait();
        }

        match self.session.next_frame(capture::FRAME_WAIT) {
            Ok(FramePoll::Frame(frame)) => {
                self.deliver(&frame);
                LoopAction::Continue
            }
            Ok(FramePoll::Timeout) => LoopAction::Continue,
            Ok(FramePoll::Disconnected) => {
                warn!(device = %self.device_id, "Capture device disconnected, stopping capture loop");
                self.disconnected = true;
                emit(&self.events, CaptureEvent::Disconnected);
                LoopAction::Stop
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                self.errors += 1;
                if self.errors == 1 || self.errors % timing::FRAME_LOG_INTERVAL == 0 {
                    warn!(
                        device = %self.device_id,
                        errors = self.errors,
                        error = %e,
                        "Failed to capture frame"
                    );
                }
                emit(&self.events, CaptureEvent::FrameError(e));
                LoopAction::Continue
            }
        }
    }

    /// Rate limit, then debounce, then hand to the sink
    ///
    /// A throttled frame never reaches the debounce filter, so the filter's
    /// reference is always a frame the sink actually received.
    fn deliver(&mut self, frame: &Frame) {
        let now = Instant::now();
        if let (Some(interval), Some(last)) = (self.min_interval, self.last_delivery)
            && now.duration_since(last) < interval
        {
            self.counters.throttled.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if !self.filter.accept(frame) {
            self.counters.debounced.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.last_delivery = Some(now);

        let sink = &self.sink;
        if panic::catch_unwind(AssertUnwindSafe(|| sink(frame))).is_err() {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
            error!(device = %self.device_id, sequence = frame.sequence, "Frame sink panicked");
            emit(
                &self.events,
                CaptureEvent::SinkPanicked {
                    sequence: frame.sequence,
                },
            );
            return;
        }

        let delivered = self.counters.delivered.fetch_add(1, Ordering::Relaxed) + 1;
        if delivered % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(
                device = %self.device_id,
                delivered,
                width = frame.width,
                height = frame.height,
                "Delivered frames"
            );
        }
    }
}

/// One open capture device
///
/// Lifecycle operations take `&mut self`; the handle is not meant to be driven
/// from several threads at once. Dropping the handle frees it.
pub struct CaptureHandle<B: Backend = NativeBackend> {
    backend: B,
    device: DeviceDescriptor,
    format: NegotiatedFormat,
    config: CaptureConfig,
    /// Present while opened and not running
    session: Option<B::Session>,
    /// Present while running
    controller: Option<CaptureLoopController<LoopState<B::Session>>>,
    sink: FrameSink,
    native_session: Option<NativeSession>,
    state: State,
    counters: Arc<Counters>,
    events_tx: SyncSender<CaptureEvent>,
    events_rx: Receiver<CaptureEvent>,
}

impl CaptureHandle<NativeBackend> {
    /// Open a device through the platform's native backend
    pub fn open(config: &CaptureConfig, sink: FrameSink) -> CaptureResult<Self> {
        let backend = NativeBackend::new()?;
        Self::open_with(backend, config, sink)
    }
}

impl<B: Backend> CaptureHandle<B> {
    /// Open a device through `backend`
    ///
    /// Falls back to the backend's default device when `config.device` is
    /// absent or does not resolve. Does not start streaming.
    pub fn open_with(backend: B, config: &CaptureConfig, sink: FrameSink) -> CaptureResult<Self> {
        config.validate()?;

        let devices = backend.enumerate().map_err(|e| match e {
            CaptureError::EnumerationUnavailable(msg) => CaptureError::BackendInitFailed(msg),
            other => other,
        })?;
        let device =
            negotiation::resolve_device(&backend, &devices, config.device.as_deref())?.clone();
        let format = negotiation::negotiate(&device, config.width, config.height, config.fps)?;

        let session = backend.open(&device, &format)?;
        let native_session = session.native_handle();

        info!(
            backend = backend.name(),
            device = %device.id,
            name = %device.name,
            format = %format,
            "Opened capture device"
        );

        let (events_tx, events_rx) = sync_channel(capture::EVENT_QUEUE);
        Ok(Self {
            backend,
            device,
            format,
            config: config.clone(),
            session: Some(session),
            controller: None,
            sink,
            native_session,
            state: State::Opened,
            counters: Arc::new(Counters::default()),
            events_tx,
            events_rx,
        })
    }

    /// Begin delivering frames to the sink
    ///
    /// Idempotent while running. A loop that ended on its own (device loss)
    /// is restarted, re-acquiring the device. Frames are only delivered once
    /// this call has committed the running state.
    pub fn start(&mut self) -> CaptureResult<()> {
        match self.state {
            State::Freed => {
                return Err(CaptureError::InvalidState(
                    "start called on a freed handle".to_string(),
                ));
            }
            State::Running if self.is_running() => return Ok(()),
            State::Running => {
                debug!(device = %self.device.id, "Capture loop ended on its own, restarting");
                self.reclaim_session();
            }
            State::Opened => {}
        }

        let mut session = match self.session.take() {
            Some(session) => session,
            None => {
                info!(device = %self.device.id, "Re-acquiring capture device");
                self.backend
                    .open(&self.device, &self.format)
                    .map_err(|e| CaptureError::BackendStartFailed(e.to_string()))?
            }
        };

        if let Err(e) = session.start() {
            self.session = Some(session);
            return Err(match e {
                CaptureError::BackendStartFailed(msg) => CaptureError::BackendStartFailed(msg),
                other => CaptureError::BackendStartFailed(other.to_string()),
            });
        }
        self.native_session = session.native_handle();

        let release = Arc::new(Barrier::new(2));
        let loop_state = LoopState {
            session,
            filter: DebounceFilter::new(self.config.debounce_threshold()),
            sink: Arc::clone(&self.sink),
            counters: Arc::clone(&self.counters),
            events: self.events_tx.clone(),
            device_id: self.device.id.clone(),
            release: Some(Arc::clone(&release)),
            min_interval: self.config.min_interval(),
            last_delivery: None,
            disconnected: false,
            errors: 0,
        };

        let controller =
            CaptureLoopController::start(capture::THREAD_NAME, loop_state, LoopState::<B::Session>::iterate)
                .map_err(|e| {
                    CaptureError::BackendStartFailed(format!("failed to spawn capture thread: {}", e))
                })?;

        self.controller = Some(controller);
        self.state = State::Running;
        info!(device = %self.device.id, format = %self.format, "Capture started");
        emit(&self.events_tx, CaptureEvent::Started);

        release.wait();
        Ok(())
    }

    /// Stop delivering frames
    ///
    /// Blocks until the capture thread has exited; no sink call happens after
    /// this returns. Idempotent.
    pub fn stop(&mut self) -> CaptureResult<()> {
        match self.state {
            State::Freed => Err(CaptureError::InvalidState(
                "stop called on a freed handle".to_string(),
            )),
            State::Opened => Ok(()),
            State::Running => {
                self.reclaim_session();
                info!(device = %self.device.id, "Capture stopped");
                emit(&self.events_tx, CaptureEvent::Stopped);
                Ok(())
            }
        }
    }

    /// Join the capture thread and take the session back
    ///
    /// A disconnected session is closed instead; `start` reopens the device.
    fn reclaim_session(&mut self) {
        if let Some(mut controller) = self.controller.take() {
            match controller.stop() {
                Some(mut loop_state) => {
                    loop_state.session.stop();
                    if loop_state.disconnected {
                        debug!(device = %self.device.id, "Closing disconnected capture session");
                        self.native_session = None;
                    } else {
                        self.session = Some(loop_state.session);
                    }
                }
                None => {
                    warn!(device = %self.device.id, "Capture session lost, it will be reopened on start");
                    self.native_session = None;
                }
            }
        }
        self.state = State::Opened;
    }

    /// Stop if running and release the device
    ///
    /// Safe to call any number of times.
    pub fn free(&mut self) {
        if self.state == State::Freed {
            return;
        }
        if self.state == State::Running {
            self.reclaim_session();
            emit(&self.events_tx, CaptureEvent::Stopped);
        }
        self.session = None;
        self.native_session = None;
        self.state = State::Freed;
        info!(device = %self.device.id, "Capture handle freed");
    }

    /// Current lifecycle state
    ///
    /// A loop that ended after device loss reports `Opened`.
    pub fn state(&self) -> State {
        match self.state {
            State::Running if !self.is_running() => State::Opened,
            state => state,
        }
    }

    fn is_running(&self) -> bool {
        self.controller
            .as_ref()
            .map(|c| c.is_running())
            .unwrap_or(false)
    }

    /// Device the handle resolved to
    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    /// Negotiated format
    pub fn format(&self) -> NegotiatedFormat {
        self.format
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// OS-level session for preview embedding, if the backend exposes one
    pub fn native_session(&self) -> Option<NativeSession> {
        if self.state == State::Freed {
            return None;
        }
        self.native_session
    }

    pub fn stats(&self) -> CaptureStats {
        self.counters.snapshot()
    }

    /// Lifecycle and error notifications, oldest first
    ///
    /// Poll with `try_recv`; the queue outlives `free` so the final
    /// `Stopped` can still be read.
    pub fn events(&self) -> &Receiver<CaptureEvent> {
        &self.events_rx
    }
}

impl<B: Backend> Drop for CaptureHandle<B> {
    fn drop(&mut self) {
        self.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::synthetic::SyntheticBackend;
    use crate::backends::{DeviceDescriptor, FormatDescriptor, FrameRate};
    use std::sync::Mutex;
    use std::time::Duration;

    fn tiny_camera() -> DeviceDescriptor {
        let mut device = DeviceDescriptor::new(0, "Tiny Camera");
        device.formats = vec![FormatDescriptor::new(16, 4, vec![FrameRate::from_int(30)])];
        device
    }

    fn gradient(rising: bool) -> Vec<u8> {
        let mut data = Vec::with_capacity(16 * 4 * 3);
        for _ in 0..4 {
            for x in 0..16u8 {
                let v = if rising { x * 16 } else { 255 - x * 16 };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        data
    }

    fn drain(handle: &CaptureHandle<SyntheticBackend>) -> Vec<CaptureEvent> {
        handle.events().try_iter().collect()
    }

    fn counting_sink() -> (FrameSink, Arc<AtomicU64>) {
        let count = Arc::new(AtomicU64::new(0));
        let count_clone = Arc::clone(&count);
        let sink: FrameSink = Arc::new(move |_frame: &Frame| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        (sink, count)
    }

    fn wait_for(count: &AtomicU64, target: u64) {
        for _ in 0..500 {
            if count.load(Ordering::SeqCst) >= target {
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("timed out waiting for {} frames", target);
    }

    fn wait_until_stopped<B: Backend>(handle: &CaptureHandle<B>) {
        for _ in 0..500 {
            if handle.state() == State::Opened {
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("capture loop did not end");
    }

    #[test]
    fn test_open_does_not_stream() {
        let backend = SyntheticBackend::new();
        let counters = backend.counters();
        let (sink, count) = counting_sink();

        let handle = CaptureHandle::open_with(backend, &CaptureConfig::default(), sink).unwrap();
        assert_eq!(handle.state(), State::Opened);
        assert_eq!(handle.format().width, 640);
        assert_eq!(counters.started.load(Ordering::SeqCst), 0);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_start_stop_restart() {
        let backend = SyntheticBackend::new().frame_interval(Duration::from_millis(1));
        let counters = backend.counters();
        let (sink, count) = counting_sink();
        let mut handle =
            CaptureHandle::open_with(backend, &CaptureConfig::default(), sink).unwrap();

        handle.start().unwrap();
        handle.start().unwrap();
        assert_eq!(handle.state(), State::Running);
        wait_for(&count, 3);
        handle.stop().unwrap();
        handle.stop().unwrap();
        assert_eq!(handle.state(), State::Opened);

        let after_stop = count.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);

        handle.start().unwrap();
        wait_for(&count, after_stop + 3);
        handle.free();

        assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
        assert_eq!(counters.started.load(Ordering::SeqCst), 2);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_freed_handle_rejects_operations() {
        let (sink, _) = counting_sink();
        let mut handle =
            CaptureHandle::open_with(SyntheticBackend::new(), &CaptureConfig::default(), sink)
                .unwrap();
        handle.free();
        handle.free();
        assert_eq!(handle.state(), State::Freed);
        assert!(matches!(handle.start(), Err(CaptureError::InvalidState(_))));
        assert!(matches!(handle.stop(), Err(CaptureError::InvalidState(_))));
        assert!(handle.native_session().is_none());
    }

    #[test]
    fn test_refused_start() {
        let (sink, _) = counting_sink();
        let mut handle = CaptureHandle::open_with(
            SyntheticBackend::new().refuse_start(),
            &CaptureConfig::default(),
            sink,
        )
        .unwrap();
        assert!(matches!(
            handle.start(),
            Err(CaptureError::BackendStartFailed(_))
        ));
        assert_eq!(handle.state(), State::Opened);
    }

    #[test]
    fn test_runtime_errors_are_counted_and_skipped() {
        let backend = SyntheticBackend::new()
            .failing_frames(vec![0, 2])
            .disconnect_after(5);
        let (sink, count) = counting_sink();
        let mut handle =
            CaptureHandle::open_with(backend, &CaptureConfig::default(), sink).unwrap();

        handle.start().unwrap();
        // Disconnect ends the loop on its own
        wait_until_stopped(&handle);
        handle.stop().unwrap();

        let stats = handle.stats();
        assert_eq!(stats.delivered, 3);
        assert_eq!(stats.failed, 2);
    }

    #[test]
    fn test_restart_after_disconnect() {
        let backend = SyntheticBackend::new().disconnect_after(2);
        let counters = backend.counters();
        let (sink, count) = counting_sink();
        let mut handle =
            CaptureHandle::open_with(backend, &CaptureConfig::default(), sink).unwrap();

        handle.start().unwrap();
        wait_until_stopped(&handle);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        handle.start().unwrap();
        wait_until_stopped(&handle);
        assert_eq!(count.load(Ordering::SeqCst), 4);
        handle.free();

        // The dead session was closed and the device acquired again
        assert_eq!(counters.opened.load(Ordering::SeqCst), 2);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_sink_does_not_kill_loop() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sink: FrameSink = Arc::new(move |frame: &Frame| {
            seen_clone.lock().unwrap().push(frame.sequence);
            if frame.sequence == 0 {
                panic!("sink failure");
            }
        });

        let backend = SyntheticBackend::new().disconnect_after(3);
        let mut handle =
            CaptureHandle::open_with(backend, &CaptureConfig::default(), sink).unwrap();
        handle.start().unwrap();
        wait_until_stopped(&handle);
        handle.stop().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(handle.stats().failed, 1);
        assert_eq!(handle.stats().delivered, 2);
    }

    #[test]
    fn test_rate_limit_runs_before_debounce() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sink: FrameSink = Arc::new(move |frame: &Frame| {
            seen_clone.lock().unwrap().push(frame.sequence);
        });

        // One frame of the first scene, then the scene changes and stays
        // changed. Frames arrive every 5ms but at most one is delivered per 12ms.
        let mut frames = vec![gradient(true)];
        frames.extend(std::iter::repeat_n(gradient(false), 7));
        let backend = SyntheticBackend::with_devices(vec![tiny_camera()])
            .frames(frames)
            .frame_interval(Duration::from_millis(5))
            .disconnect_after(8);
        let config = CaptureConfig::new(16, 4, 30.0)
            .with_debounce(1)
            .with_max_rate(1.0 / 0.012);
        let mut handle = CaptureHandle::open_with(backend, &config, sink).unwrap();

        handle.start().unwrap();
        wait_until_stopped(&handle);
        handle.stop().unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2, "changed scene must be delivered once: {:?}", seen);
        assert_eq!(seen[0], 0);
        assert!(seen[1] >= 1);

        let stats = handle.stats();
        assert_eq!(stats.delivered, 2);
        assert!(stats.throttled >= 1);
        assert_eq!(stats.delivered + stats.debounced + stats.throttled, 8);
    }

    #[test]
    fn test_lifecycle_events() {
        let backend = SyntheticBackend::new()
            .failing_frames(vec![1])
            .disconnect_after(3);
        let (sink, _) = counting_sink();
        let mut handle =
            CaptureHandle::open_with(backend, &CaptureConfig::default(), sink).unwrap();
        assert!(drain(&handle).is_empty());

        handle.start().unwrap();
        wait_until_stopped(&handle);
        handle.stop().unwrap();

        let events = drain(&handle);
        assert_eq!(events.len(), 4, "{:?}", events);
        assert_eq!(events[0], CaptureEvent::Started);
        assert!(matches!(
            events[1],
            CaptureEvent::FrameError(CaptureError::BackendRuntimeError(_))
        ));
        assert_eq!(events[2], CaptureEvent::Disconnected);
        assert_eq!(events[3], CaptureEvent::Stopped);

        handle.free();
        assert!(drain(&handle).is_empty(), "free after stop emits nothing");
    }

    #[test]
    fn test_free_while_running_reports_stopped() {
        let backend = SyntheticBackend::new().frame_interval(Duration::from_millis(1));
        let (sink, count) = counting_sink();
        let mut handle =
            CaptureHandle::open_with(backend, &CaptureConfig::default(), sink).unwrap();

        handle.start().unwrap();
        wait_for(&count, 1);
        handle.free();

        assert_eq!(
            drain(&handle),
            vec![CaptureEvent::Started, CaptureEvent::Stopped]
        );
    }

    #[test]
    fn test_sink_panic_is_reported() {
        let sink: FrameSink = Arc::new(|frame: &Frame| {
            if frame.sequence == 1 {
                panic!("sink failure");
            }
        });
        let backend = SyntheticBackend::new().disconnect_after(2);
        let mut handle =
            CaptureHandle::open_with(backend, &CaptureConfig::default(), sink).unwrap();
        handle.start().unwrap();
        wait_until_stopped(&handle);

        assert!(drain(&handle).contains(&CaptureEvent::SinkPanicked { sequence: 1 }));
    }

    #[test]
    fn test_full_event_queue_drops_events() {
        let backend = SyntheticBackend::new()
            .failing_frames((0..capture::EVENT_QUEUE as u64 + 10).collect())
            .disconnect_after(capture::EVENT_QUEUE as u64 + 10);
        let (sink, _) = counting_sink();
        let mut handle =
            CaptureHandle::open_with(backend, &CaptureConfig::default(), sink).unwrap();

        handle.start().unwrap();
        wait_until_stopped(&handle);
        handle.stop().unwrap();

        assert_eq!(drain(&handle).len(), capture::EVENT_QUEUE);
        assert_eq!(handle.stats().failed, capture::EVENT_QUEUE as u64 + 10);
    }
}
