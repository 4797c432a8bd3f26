// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for capture backends

use crate::constants::DEVICE_ID_SCHEME;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::SystemTime;

/// Build the logical identifier for a device index (`file:/dev/video{N}`)
pub fn device_id(index: u32) -> String {
    format!("{}{}", DEVICE_ID_SCHEME, index)
}

/// Extract the device index from any accepted identifier form
///
/// Accepts `file:/dev/videoN`, `/dev/videoN` and a bare `N`.
pub fn parse_device_index(identifier: &str) -> Option<u32> {
    let identifier = identifier.trim();
    let digits = identifier
        .strip_prefix(DEVICE_ID_SCHEME)
        .or_else(|| identifier.strip_prefix("/dev/video"))
        .unwrap_or(identifier);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Frame rate as a fraction (numerator/denominator)
///
/// Stores the exact rate so NTSC rates like 29.97fps (30000/1001) survive
/// enumeration, negotiation and serialization without rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "FrameRateRepr", try_from = "FrameRateRepr")]
pub struct FrameRate {
    pub num: u32,
    pub denom: u32,
}

impl FrameRate {
    /// Create a frame rate, reduced to lowest terms
    pub fn new(num: u32, denom: u32) -> Self {
        let denom = if denom == 0 { 1 } else { denom };
        let divisor = gcd(num, denom).max(1);
        Self {
            num: num / divisor,
            denom: denom / divisor,
        }
    }

    /// Create a frame rate from an integer (e.g., 30 becomes 30/1)
    pub fn from_int(fps: u32) -> Self {
        Self { num: fps, denom: 1 }
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Parse `"30"`, `"30000/1001"` or `"29.97"`
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();

        if let Some((num, denom)) = value.split_once('/') {
            let num = num.trim().parse().ok()?;
            let denom: u32 = denom.trim().parse().ok()?;
            if denom == 0 {
                return None;
            }
            return Some(Self::new(num, denom));
        }

        if let Some((whole, frac)) = value.split_once('.') {
            // Decimal rates are kept exact up to 6 fractional digits
            let frac = &frac[..frac.len().min(6)];
            if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let scale = 10u32.pow(frac.len() as u32);
            let whole: u32 = if whole.is_empty() {
                0
            } else {
                whole.parse().ok()?
            };
            let frac: u32 = frac.parse().ok()?;
            let num = whole.checked_mul(scale)?.checked_add(frac)?;
            return Some(Self::new(num, scale));
        }

        value.parse().ok().map(Self::from_int)
    }

    /// Serialized form: `"30"` or `"30000/1001"`
    pub fn to_value_string(&self) -> String {
        if self.denom == 1 {
            self.num.to_string()
        } else {
            format!("{}/{}", self.num, self.denom)
        }
    }
}

impl std::fmt::Display for FrameRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show decimal for non-integer framerates (NTSC)
        if self.denom != 1 {
            write!(f, "{:.2}", self.as_f64())
        } else {
            write!(f, "{}", self.num)
        }
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self { num: 30, denom: 1 }
    }
}

#[derive(Serialize, Deserialize)]
struct FrameRateRepr {
    value: String,
}

impl From<FrameRate> for FrameRateRepr {
    fn from(rate: FrameRate) -> Self {
        Self {
            value: rate.to_value_string(),
        }
    }
}

impl TryFrom<FrameRateRepr> for FrameRate {
    type Error = String;

    fn try_from(repr: FrameRateRepr) -> Result<Self, Self::Error> {
        FrameRate::parse(&repr.value).ok_or_else(|| format!("invalid frame rate {:?}", repr.value))
    }
}

/// One supported resolution and the rates available at it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub frame_rates: Vec<FrameRate>,
}

impl FormatDescriptor {
    pub fn new(width: u32, height: u32, frame_rates: Vec<FrameRate>) -> Self {
        Self {
            width,
            height,
            frame_rates,
        }
    }

    /// Add a rate unless it is already listed, keeping first-seen order
    pub fn push_rate(&mut self, rate: FrameRate) {
        if !self.frame_rates.contains(&rate) {
            self.frame_rates.push(rate);
        }
    }
}

/// Merge a `(size, rates)` pair into a format list keyed by resolution
///
/// Resolutions keep the order in which they were first seen; rates from later
/// pixel formats are appended to the existing entry.
pub fn merge_format(formats: &mut Vec<FormatDescriptor>, width: u32, height: u32, rates: &[FrameRate]) {
    let entry = match formats
        .iter()
        .position(|f| f.width == width && f.height == height)
    {
        Some(i) => &mut formats[i],
        None => {
            formats.push(FormatDescriptor::new(width, height, Vec::new()));
            let last = formats.len() - 1;
            &mut formats[last]
        }
    };
    for rate in rates {
        entry.push_rate(*rate);
    }
}

/// A camera device as reported by enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Logical identifier (`file:/dev/videoN`)
    pub id: String,
    /// Human-readable device name
    pub name: String,
    /// Longer description (driver name on V4L2)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Platform-specific extra information (bus info on V4L2)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub misc: Option<String>,
    /// Supported formats in backend order
    #[serde(default)]
    pub formats: Vec<FormatDescriptor>,
}

impl DeviceDescriptor {
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        Self {
            id: device_id(index),
            name: name.into(),
            description: None,
            misc: None,
            formats: Vec::new(),
        }
    }

    /// Index encoded in the identifier
    pub fn index(&self) -> Option<u32> {
        parse_device_index(&self.id)
    }

    /// Whether `identifier` names this device in any accepted form
    pub fn matches(&self, identifier: &str) -> bool {
        let identifier = identifier.trim();
        if self.id == identifier {
            return true;
        }
        match (parse_device_index(identifier), self.index()) {
            (Some(wanted), Some(own)) => wanted == own,
            _ => false,
        }
    }
}

/// Outcome of format negotiation; always a triple the backend reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedFormat {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
}

impl std::fmt::Display for NegotiatedFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} @ {}fps", self.width, self.height, self.frame_rate)
    }
}

/// A decoded RGB24 frame
///
/// Rows may be padded: `stride >= width * 3`. Frames handed to a sink are only
/// borrowed for the duration of the call.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Bytes per row
    pub stride: u32,
    pub captured_at: SystemTime,
    /// Position in the backend's stream, starting at 0 for each start
    pub sequence: u64,
}

impl Frame {
    /// Tightly packed frame captured now
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            stride: width * 3,
            captured_at: SystemTime::now(),
            sequence: 0,
        }
    }

    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Bytes of one packed row
    pub fn row_bytes(&self) -> usize {
        self.width as usize * 3
    }

    /// Pixel data without row padding (`width * height * 3` bytes)
    ///
    /// Borrows when the frame is already packed.
    pub fn packed_rgb(&self) -> Cow<'_, [u8]> {
        let row = self.row_bytes();
        let stride = self.stride as usize;
        let packed_len = row * self.height as usize;

        if stride == row && self.data.len() >= packed_len {
            return Cow::Borrowed(&self.data[..packed_len]);
        }

        let mut packed = Vec::with_capacity(packed_len);
        for y in 0..self.height as usize {
            let start = y * stride;
            let end = (start + row).min(self.data.len());
            if start >= end {
                break;
            }
            packed.extend_from_slice(&self.data[start..end]);
        }
        packed.resize(packed_len, 0);
        Cow::Owned(packed)
    }

    /// View as an `image` buffer (copies the packed pixels)
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.packed_rgb().into_owned())
    }
}
