// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the capture handle lifecycle

use camera_capture::backends::synthetic::SyntheticBackend;
use camera_capture::{
    Backend, CaptureConfig, CaptureError, CaptureHandle, DeviceDescriptor, FormatDescriptor,
    Frame, FrameRate, FrameSink, State,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const WIDTH: u32 = 32;
const HEIGHT: u32 = 8;

fn small_camera() -> DeviceDescriptor {
    let mut device = DeviceDescriptor::new(0, "Small Camera");
    device.formats = vec![FormatDescriptor::new(
        WIDTH,
        HEIGHT,
        vec![FrameRate::from_int(30)],
    )];
    device
}

fn gradient(rising: bool) -> Vec<u8> {
    let mut data = Vec::with_capacity((WIDTH * HEIGHT * 3) as usize);
    for _ in 0..HEIGHT {
        for x in 0..WIDTH {
            let v = (x * 8) as u8;
            let v = if rising { v } else { 255 - v };
            data.extend_from_slice(&[v, v, v]);
        }
    }
    data
}

fn recording_sink() -> (FrameSink, Arc<Mutex<Vec<u64>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let sink: FrameSink = Arc::new(move |frame: &Frame| {
        seen_clone.lock().unwrap().push(frame.sequence);
    });
    (sink, seen)
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
    for _ in 0..1000 {
        if count.load(Ordering::SeqCst) >= target {
            return;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("timed out waiting for {} frames", target);
}

fn wait_until_stopped<B: Backend>(handle: &CaptureHandle<B>) {
    for _ in 0..1000 {
        if handle.state() != State::Running {
            return;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("capture loop never stopped");
}

#[test]
fn test_default_request_opens_device_zero() {
    let (sink, _) = counting_sink();
    let config = CaptureConfig::new(640, 480, 30.0).with_device("file:/dev/video0");
    let handle = CaptureHandle::open_with(SyntheticBackend::new(), &config, sink).unwrap();

    assert_eq!(handle.device().id, "file:/dev/video0");
    assert_eq!(handle.format().width, 640);
    assert_eq!(handle.format().height, 480);
    assert_eq!(handle.format().frame_rate, FrameRate::from_int(30));
    assert_eq!(handle.state(), State::Opened);
    assert_eq!(handle.backend_name(), "synthetic");
}

#[test]
fn test_unknown_device_falls_back_to_default() {
    let (sink, _) = counting_sink();
    let config = CaptureConfig::default().with_device("file:/dev/video9");
    let handle = CaptureHandle::open_with(SyntheticBackend::new(), &config, sink).unwrap();

    assert_eq!(handle.device().id, "file:/dev/video0");
}

#[test]
fn test_negotiated_format_is_reported_by_device() {
    let (sink, _) = counting_sink();
    let backend = SyntheticBackend::new();
    let device = backend.enumerate().unwrap().remove(0);

    let config = CaptureConfig::new(1200, 700, 24.0);
    let handle = CaptureHandle::open_with(backend, &config, sink).unwrap();
    let format = handle.format();

    let offered = device
        .formats
        .iter()
        .find(|f| f.width == format.width && f.height == format.height)
        .expect("negotiated resolution must be offered");
    assert!(offered.frame_rates.contains(&format.frame_rate));
    assert_eq!((format.width, format.height), (1280, 720));
}

#[test]
fn test_open_errors() {
    let (sink, _) = counting_sink();

    let err = CaptureHandle::open_with(
        SyntheticBackend::with_devices(Vec::new()),
        &CaptureConfig::default(),
        Arc::clone(&sink),
    )
    .err()
    .unwrap();
    assert!(matches!(err, CaptureError::DeviceNotFound(_)));

    let err = CaptureHandle::open_with(
        SyntheticBackend::new(),
        &CaptureConfig::new(7680, 4320, 30.0),
        Arc::clone(&sink),
    )
    .err()
    .unwrap();
    assert!(matches!(err, CaptureError::UnsupportedFormat(_)));

    let err = CaptureHandle::open_with(
        SyntheticBackend::new(),
        &CaptureConfig::new(640, 480, 0.0),
        Arc::clone(&sink),
    )
    .err()
    .unwrap();
    assert!(matches!(err, CaptureError::UnsupportedFormat(_)));

    let err = CaptureHandle::open_with(
        SyntheticBackend::new().unavailable(),
        &CaptureConfig::default(),
        Arc::clone(&sink),
    )
    .err()
    .unwrap();
    assert!(matches!(err, CaptureError::BackendInitFailed(_)));

    let err = CaptureHandle::open_with(
        SyntheticBackend::new().fail_open(),
        &CaptureConfig::default(),
        sink,
    )
    .err()
    .unwrap();
    assert!(matches!(err, CaptureError::BackendInitFailed(_)));
}

#[test]
fn test_no_callbacks_outside_running_window() {
    let (sink, count) = counting_sink();
    let backend = SyntheticBackend::with_devices(vec![small_camera()])
        .frame_interval(Duration::from_millis(1));
    let mut handle =
        CaptureHandle::open_with(backend, &CaptureConfig::new(WIDTH, HEIGHT, 30.0), sink).unwrap();

    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(count.load(Ordering::SeqCst), 0, "open must not stream");

    handle.start().unwrap();
    wait_for(&count, 3);
    handle.stop().unwrap();

    let after_stop = count.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(count.load(Ordering::SeqCst), after_stop);
    assert_eq!(handle.stats().delivered, after_stop);
}

#[test]
fn test_free_is_safe_in_any_state() {
    let (sink, count) = counting_sink();
    let backend = SyntheticBackend::with_devices(vec![small_camera()])
        .frame_interval(Duration::from_millis(1));
    let counters = backend.counters();
    let mut handle =
        CaptureHandle::open_with(backend, &CaptureConfig::new(WIDTH, HEIGHT, 30.0), sink).unwrap();

    handle.start().unwrap();
    wait_for(&count, 1);

    // free without stop
    handle.free();
    let after_free = count.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(count.load(Ordering::SeqCst), after_free);
    assert_eq!(counters.closed.load(Ordering::SeqCst), 1);

    handle.free();
    assert_eq!(handle.state(), State::Freed);
    assert!(handle.native_session().is_none());
    assert!(matches!(handle.start(), Err(CaptureError::InvalidState(_))));
    assert!(matches!(handle.stop(), Err(CaptureError::InvalidState(_))));
}

#[test]
fn test_stop_then_free() {
    let (sink, _) = counting_sink();
    let backend = SyntheticBackend::new().frame_interval(Duration::from_millis(1));
    let counters = backend.counters();
    let mut handle = CaptureHandle::open_with(backend, &CaptureConfig::default(), sink).unwrap();

    handle.start().unwrap();
    handle.start().unwrap();
    handle.stop().unwrap();
    handle.stop().unwrap();
    drop(handle);

    assert_eq!(counters.started.load(Ordering::SeqCst), 1);
    assert_eq!(counters.stopped.load(Ordering::SeqCst), 1);
    assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_debounce_drops_repeated_frames() {
    let (sink, seen) = recording_sink();
    let backend = SyntheticBackend::with_devices(vec![small_camera()])
        .frames(vec![
            gradient(true),
            gradient(true),
            gradient(true),
            gradient(false),
        ])
        .disconnect_after(4);
    let config = CaptureConfig::new(WIDTH, HEIGHT, 30.0).with_debounce(1);
    let mut handle = CaptureHandle::open_with(backend, &config, sink).unwrap();

    handle.start().unwrap();
    wait_until_stopped(&handle);

    assert_eq!(*seen.lock().unwrap(), vec![0, 3]);
    let stats = handle.stats();
    assert_eq!(stats.delivered, 2);
    assert_eq!(stats.debounced, 2);
}

#[test]
fn test_debounce_disabled_delivers_everything() {
    let (sink, seen) = recording_sink();
    let backend = SyntheticBackend::with_devices(vec![small_camera()])
        .frames(vec![gradient(true)])
        .disconnect_after(5);
    let config = CaptureConfig::new(WIDTH, HEIGHT, 30.0);
    let mut handle = CaptureHandle::open_with(backend, &config, sink).unwrap();

    handle.start().unwrap();
    wait_until_stopped(&handle);

    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    assert_eq!(handle.stats().debounced, 0);
}

#[test]
fn test_padded_frames_reach_sink_with_stride() {
    let strides = Arc::new(Mutex::new(Vec::new()));
    let strides_clone = Arc::clone(&strides);
    let sink: FrameSink = Arc::new(move |frame: &Frame| {
        strides_clone
            .lock()
            .unwrap()
            .push((frame.stride, frame.data.len(), frame.packed_rgb().len()));
    });
    let backend = SyntheticBackend::with_devices(vec![small_camera()])
        .row_padding(4)
        .disconnect_after(1);
    let mut handle =
        CaptureHandle::open_with(backend, &CaptureConfig::new(WIDTH, HEIGHT, 30.0), sink).unwrap();

    handle.start().unwrap();
    wait_until_stopped(&handle);

    let row = WIDTH * 3;
    assert_eq!(
        *strides.lock().unwrap(),
        vec![(
            row + 4,
            ((row + 4) * HEIGHT) as usize,
            (row * HEIGHT) as usize
        )]
    );
}

#[test]
fn test_repeated_cycles_deliver_only_inside_windows() {
    let stamps = Arc::new(Mutex::new(Vec::new()));
    let stamps_clone = Arc::clone(&stamps);
    let sink: FrameSink = Arc::new(move |_frame: &Frame| {
        stamps_clone.lock().unwrap().push(Instant::now());
    });
    let backend = SyntheticBackend::with_devices(vec![small_camera()])
        .frame_interval(Duration::from_micros(100));
    let counters = backend.counters();
    let mut handle =
        CaptureHandle::open_with(backend, &CaptureConfig::new(WIDTH, HEIGHT, 30.0), sink).unwrap();

    let mut windows = Vec::new();
    for cycle in 0..50u64 {
        let opened = Instant::now();
        handle.start().unwrap();
        std::thread::sleep(Duration::from_millis(cycle % 2));
        handle.stop().unwrap();
        windows.push((opened, Instant::now()));
        // Gap between windows where nothing may be delivered
        std::thread::sleep(Duration::from_micros(200));
    }
    handle.free();

    let stamps = stamps.lock().unwrap();
    for stamp in stamps.iter() {
        assert!(
            windows
                .iter()
                .any(|(opened, closed)| stamp >= opened && stamp <= closed),
            "frame delivered outside every start/stop window"
        );
    }
    assert_eq!(stamps.len() as u64, handle.stats().delivered);
    assert_eq!(counters.started.load(Ordering::SeqCst), 50);
    assert_eq!(counters.stopped.load(Ordering::SeqCst), 50);
    assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
}
