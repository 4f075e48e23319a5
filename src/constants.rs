// SPDX-License-Identifier: GPL-3.0-only

//! Engine-wide constants
//!
//! These are the defaults behind [`crate::config::ScanConfig`]. Every value
//! that changed between revisions of the scanner is configurable; the
//! numbers here are only the starting point.

use std::time::Duration;

/// Frame quality heuristic
pub mod quality {
    /// Side of the square window sampled at the frame centre (pixels)
    pub const WINDOW_SIZE: u32 = 64;

    /// Luminance below this counts as an edge pixel
    pub const LOW_LUMA_THRESHOLD: u8 = 48;

    /// Luminance above this counts as an edge pixel
    pub const HIGH_LUMA_THRESHOLD: u8 = 208;

    /// Consecutive low-quality frames before the lens is considered degraded
    pub const LOW_QUALITY_FRAME_THRESHOLD: u32 = 50;
}

/// QR decode path
pub mod decode {
    /// Luminance copies are downscaled so neither side exceeds this
    pub const MAX_DIMENSION: u32 = 640;
}

/// Result debouncing
pub mod debounce {
    /// Minimum interval between two emissions of the same value (milliseconds)
    pub const INTERVAL_MS: u64 = 100;
}

/// Preview stream
pub mod preview {
    /// Requested preview width
    pub const WIDTH: u32 = 1920;

    /// Requested preview height
    pub const HEIGHT: u32 = 1080;
}

/// Background workers
pub mod workers {
    use super::Duration;

    /// How long a worker waits for a job before re-checking its stop signal
    pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

    /// Queued quality samples before new ones are dropped
    pub const QUALITY_QUEUE_DEPTH: usize = 2;

    /// Thread name of the decode worker
    pub const DECODE_WORKER_NAME: &str = "qr-decode";

    /// Thread name of the quality worker
    pub const QUALITY_WORKER_NAME: &str = "frame-quality";
}

/// Replay backend used by the diagnostic binary
pub mod replay {
    use super::Duration;

    /// Interval between two replayed frames (~30 fps)
    pub const FRAME_INTERVAL: Duration = Duration::from_millis(33);

    /// Image file extensions accepted for replay
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if an extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}
