// SPDX-License-Identifier: GPL-3.0-only

//! JSON-LD frame records
//!
//! One self-contained JSON object per delivered frame, carrying the raw RGB24
//! pixels as a base64 data URL. Row padding is removed before encoding.

use crate::backends::Frame;
use crate::constants::record::{IMAGE_TYPE, RAW_RGB_MEDIA_TYPE};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// Serialized form of one frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    #[serde(rename = "@type")]
    pub record_type: String,
    #[serde(rename = "@id")]
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub source: String,
    pub data: String,
}

impl ImageRecord {
    /// Build the record for a frame captured from `source`
    pub fn from_frame(frame: &Frame, source: &str) -> Self {
        let captured: DateTime<Utc> = frame.captured_at.into();
        let encoded = STANDARD.encode(frame.packed_rgb());

        Self {
            record_type: IMAGE_TYPE.to_string(),
            id: format!("{}#{}", source, captured.timestamp_millis()),
            width: frame.width,
            height: frame.height,
            source: source.to_string(),
            data: format!("data:{};base64,{}", RAW_RGB_MEDIA_TYPE, encoded),
        }
    }

    /// Decode the pixel payload back to packed RGB24 bytes
    pub fn pixels(&self) -> Option<Vec<u8>> {
        let payload = self
            .data
            .strip_prefix("data:")?
            .strip_prefix(RAW_RGB_MEDIA_TYPE)?
            .strip_prefix(";base64,")?;
        STANDARD.decode(payload).ok()
    }

    /// Write the record as a single line
    pub fn write_line<W: Write>(&self, out: &mut W) -> io::Result<()> {
        serde_json::to_writer(&mut *out, self)?;
        out.write_all(b"\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn padded_frame() -> Frame {
        // 2x2 RGB, stride 8
        let data = vec![1, 2, 3, 4, 5, 6, 0xEE, 0xEE, 7, 8, 9, 10, 11, 12, 0xEE, 0xEE];
        let mut frame = Frame::new(data, 2, 2).with_stride(8);
        frame.captured_at = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        frame
    }

    #[test]
    fn test_record_fields() {
        let record = ImageRecord::from_frame(&padded_frame(), "file:/dev/video0");
        assert_eq!(record.record_type, "Image");
        assert_eq!(record.id, "file:/dev/video0#1700000000123");
        assert_eq!((record.width, record.height), (2, 2));
        assert!(record.data.starts_with("data:image/x-raw-rgb;base64,"));
    }

    #[test]
    fn test_padding_never_encoded() {
        let record = ImageRecord::from_frame(&padded_frame(), "file:/dev/video0");
        let pixels = record.pixels().unwrap();
        assert_eq!(pixels.len(), 12);
        assert_eq!(pixels, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn test_write_line_is_one_json_object() {
        let record = ImageRecord::from_frame(&padded_frame(), "file:/dev/video0");
        let mut out = Vec::new();
        record.write_line(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.matches('\n').count(), 1);

        let value: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(value["@type"], "Image");
        assert_eq!(value["source"], "file:/dev/video0");
    }
}
