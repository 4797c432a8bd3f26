// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::{DEFAULT_FPS, DEFAULT_HEIGHT, DEFAULT_WIDTH, debounce};
use crate::errors::{CaptureError, CaptureResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Capture request passed to [`CaptureHandle::open`](crate::capture::CaptureHandle::open)
///
/// The requested size and rate are negotiated against what the device reports;
/// the handle exposes the outcome via `format()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Logical device identifier (`file:/dev/videoN`); `None` selects the default device
    pub device: Option<String>,
    /// Requested width in pixels
    pub width: u32,
    /// Requested height in pixels
    pub height: u32,
    /// Requested frame rate
    pub fps: f64,
    /// Debounce level (0 = every frame is delivered)
    pub debounce: u8,
    /// Upper bound on deliveries per second, applied before debouncing
    pub max_rate: Option<f64>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fps: DEFAULT_FPS,
            debounce: 0,
            max_rate: None,
        }
    }
}

impl CaptureConfig {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            width,
            height,
            fps,
            ..Self::default()
        }
    }

    /// Select a device; empty strings mean "default device"
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        let device = device.into();
        let trimmed = device.trim();
        self.device = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }

    pub fn with_debounce(mut self, level: u8) -> Self {
        self.debounce = level;
        self
    }

    /// Deliver at most `rate` frames per second
    pub fn with_max_rate(mut self, rate: f64) -> Self {
        self.max_rate = Some(rate);
        self
    }

    /// Minimum spacing between delivered frames, if rate limited
    pub fn min_interval(&self) -> Option<Duration> {
        self.max_rate
            .filter(|rate| rate.is_finite() && *rate > 0.0)
            .map(|rate| Duration::from_secs_f64(1.0 / rate))
    }

    /// Hamming-distance threshold for the configured debounce level
    pub fn debounce_threshold(&self) -> u32 {
        u32::from(self.debounce) * debounce::THRESHOLD_PER_LEVEL
    }

    /// Reject requests no backend could ever satisfy
    pub fn validate(&self) -> CaptureResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::UnsupportedFormat(format!(
                "invalid resolution {}x{}",
                self.width, self.height
            )));
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(CaptureError::UnsupportedFormat(format!(
                "invalid frame rate {}",
                self.fps
            )));
        }
        if let Some(rate) = self.max_rate
            && (!rate.is_finite() || rate <= 0.0)
        {
            return Err(CaptureError::UnsupportedFormat(format!(
                "invalid delivery rate {}",
                rate
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_device_means_default() {
        let config = CaptureConfig::default().with_device("  ");
        assert_eq!(config.device, None);

        let config = CaptureConfig::default().with_device("file:/dev/video2");
        assert_eq!(config.device.as_deref(), Some("file:/dev/video2"));
    }

    #[test]
    fn test_validate() {
        assert!(CaptureConfig::default().validate().is_ok());
        assert!(CaptureConfig::new(0, 480, 30.0).validate().is_err());
        assert!(CaptureConfig::new(640, 480, 0.0).validate().is_err());
        assert!(CaptureConfig::new(640, 480, f64::NAN).validate().is_err());
        assert!(CaptureConfig::default().with_max_rate(0.0).validate().is_err());
    }

    #[test]
    fn test_min_interval() {
        assert_eq!(CaptureConfig::default().min_interval(), None);
        assert_eq!(
            CaptureConfig::default().with_max_rate(4.0).min_interval(),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_threshold_grows_with_level() {
        let mut previous = 0;
        for level in 1..=5u8 {
            let threshold = CaptureConfig::default().with_debounce(level).debounce_threshold();
            assert!(threshold > previous);
            previous = threshold;
        }
        assert_eq!(CaptureConfig::default().debounce_threshold(), 0);
    }
}
