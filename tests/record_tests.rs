// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for JSON-LD frame records

use camera_capture::{Frame, ImageRecord};
use std::time::{Duration, UNIX_EPOCH};

fn frame_at(millis: u64) -> Frame {
    let mut frame = Frame::new(vec![10, 20, 30, 40, 50, 60], 2, 1);
    frame.captured_at = UNIX_EPOCH + Duration::from_millis(millis);
    frame
}

#[test]
fn test_record_json_shape() {
    let record = ImageRecord::from_frame(&frame_at(1_000), "file:/dev/video0");
    let value = serde_json::to_value(&record).unwrap();

    assert_eq!(value["@type"], "Image");
    assert_eq!(value["@id"], "file:/dev/video0#1000");
    assert_eq!(value["width"], 2);
    assert_eq!(value["height"], 1);
    assert_eq!(value["source"], "file:/dev/video0");
    // base64 of [10, 20, 30, 40, 50, 60]
    assert_eq!(value["data"], "data:image/x-raw-rgb;base64,ChQeKDI8");
}

#[test]
fn test_record_round_trips_through_json() {
    let record = ImageRecord::from_frame(&frame_at(42), "file:/dev/video3");
    let mut line = Vec::new();
    record.write_line(&mut line).unwrap();

    let parsed: ImageRecord = serde_json::from_slice(&line).unwrap();
    assert_eq!(parsed, record);
    assert_eq!(parsed.pixels().unwrap(), vec![10, 20, 30, 40, 50, 60]);
}

#[test]
fn test_ids_distinguish_capture_times() {
    let a = ImageRecord::from_frame(&frame_at(1_000), "file:/dev/video0");
    let b = ImageRecord::from_frame(&frame_at(1_001), "file:/dev/video0");
    assert_ne!(a.id, b.id);
}
