// SPDX-License-Identifier: GPL-3.0-only

//! Crate-wide constants

use std::time::Duration;

/// Scheme token prefixed to every logical device identifier
pub const DEVICE_ID_SCHEME: &str = "file:/dev/video";

/// Device used by the reader when none is given on the command line
pub const DEFAULT_DEVICE: &str = "file:/dev/video0";

/// Default requested resolution width
pub const DEFAULT_WIDTH: u32 = 640;

/// Default requested resolution height
pub const DEFAULT_HEIGHT: u32 = 480;

/// Default requested frame rate
pub const DEFAULT_FPS: f64 = 30.0;

/// License notice printed by `--license`
pub const LICENSE_NOTICE: &str = "\
camera-capture is free software: you can redistribute it and/or modify it
under the terms of the GNU General Public License as published by the Free
Software Foundation, version 3.

This program is distributed in the hope that it will be useful, but WITHOUT
ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.

You should have received a copy of the GNU General Public License along with
this program. If not, see <https://www.gnu.org/licenses/>.
";

/// Capture loop constants
pub mod capture {
    use super::Duration;

    /// Upper bound on a single backend frame wait.
    ///
    /// The stop signal is checked between waits, so this is also the worst-case
    /// latency of `stop()` on a live device.
    pub const FRAME_WAIT: Duration = Duration::from_millis(200);

    /// Number of kernel/driver buffers requested for streaming
    pub const STREAM_BUFFERS: u32 = 4;

    /// Maximum buffers queued in a GStreamer appsink (keep small for low latency)
    pub const MAX_QUEUED_BUFFERS: u32 = 2;

    /// Name given to capture threads
    pub const THREAD_NAME: &str = "camera-capture";

    /// Capacity of a handle's event queue; events beyond it are dropped
    pub const EVENT_QUEUE: usize = 128;
}

/// Format negotiation constants
pub mod negotiation {
    /// A negotiated dimension may differ from the requested one by at most
    /// this factor in either direction
    pub const MAX_SCALE_FACTOR: u32 = 4;

    /// Resolutions offered for devices that report stepwise/continuous sizes
    pub const COMMON_RESOLUTIONS: &[(u32, u32)] = &[
        (320, 240),
        (640, 480),
        (800, 600),
        (1280, 720),
        (1920, 1080),
        (2560, 1440),
        (3840, 2160),
    ];

    /// Frame rates offered for stepwise/continuous interval ranges
    pub const COMMON_FRAMERATES: &[u32] = &[15, 24, 30, 60];
}

/// Debounce filter constants
pub mod debounce {
    /// Hamming threshold added per debounce level
    pub const THRESHOLD_PER_LEVEL: u32 = 1;

    /// Width of the downsampled luma image used for the gradient hash
    pub const HASH_WIDTH: u32 = 9;

    /// Height of the downsampled luma image used for the gradient hash
    pub const HASH_HEIGHT: u32 = 8;
}

/// Reader front-end limits
pub mod limits {
    /// Accepted `--size` width range
    pub const WIDTH: std::ops::RangeInclusive<u32> = 160..=7680;

    /// Accepted `--size` height range
    pub const HEIGHT: std::ops::RangeInclusive<u32> = 120..=4320;

    /// Lowest accepted `--frequency`
    pub const MIN_FREQUENCY: f64 = 0.1;

    /// Highest accepted `--frequency`
    pub const MAX_FREQUENCY: f64 = 240.0;
}

/// Frame record constants
pub mod record {
    /// JSON-LD type tag of emitted frame records
    pub const IMAGE_TYPE: &str = "Image";

    /// Media type used in the base64 data URL of raw RGB payloads
    pub const RAW_RGB_MEDIA_TYPE: &str = "image/x-raw-rgb";
}

/// Timing constants
pub mod timing {
    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// GStreamer pipeline state change timeout on start
    pub const START_TIMEOUT_SECS: u64 = 5;

    /// GStreamer pipeline state change timeout on stop
    pub const STOP_TIMEOUT_SECS: u64 = 2;

    /// Poll interval of the reader's main thread while frames stream
    pub const READER_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(50);
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
