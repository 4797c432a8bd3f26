// SPDX-License-Identifier: GPL-3.0-only

//! Perceptual-hash frame debouncing
//!
//! A 64-bit gradient hash (dHash) summarises each frame: the luma image is
//! downsampled to 9x8 and every bit records whether a pixel is brighter than
//! its right neighbour. Frames whose hash is within the threshold of the last
//! delivered frame are dropped.

use crate::backends::Frame;
use crate::constants::debounce::{HASH_HEIGHT, HASH_WIDTH};
use image::imageops::{self, FilterType};

/// Gradient hash of a frame
pub fn gradient_hash(frame: &Frame) -> Option<u64> {
    let rgb = frame.to_rgb_image()?;
    let luma = image::DynamicImage::ImageRgb8(rgb).to_luma8();
    let small = imageops::resize(&luma, HASH_WIDTH, HASH_HEIGHT, FilterType::Triangle);

    let mut hash = 0u64;
    for y in 0..HASH_HEIGHT {
        for x in 0..HASH_WIDTH - 1 {
            let left = small.get_pixel(x, y)[0];
            let right = small.get_pixel(x + 1, y)[0];
            hash = (hash << 1) | u64::from(left > right);
        }
    }
    Some(hash)
}

/// Number of differing bits between two hashes
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Per-loop debounce state
#[derive(Debug)]
pub struct DebounceFilter {
    threshold: u32,
    last_hash: Option<u64>,
}

impl DebounceFilter {
    /// Threshold 0 disables filtering entirely
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            last_hash: None,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn is_enabled(&self) -> bool {
        self.threshold > 0
    }

    /// Decide whether `frame` is delivered
    ///
    /// Delivered frames become the new reference; dropped ones leave it
    /// unchanged.
    pub fn accept(&mut self, frame: &Frame) -> bool {
        if !self.is_enabled() {
            return true;
        }

        // Frames that cannot be hashed are never suppressed
        let Some(hash) = gradient_hash(frame) else {
            return true;
        };

        match self.last_hash {
            Some(last) if hamming_distance(hash, last) <= self.threshold => false,
            _ => {
                self.last_hash = Some(hash);
                true
            }
        }
    }
}
