// SPDX-License-Identifier: GPL-3.0-only

//! Core types for frame processing results
//!
//! These are the owned values that cross from the capture thread to the
//! decode and quality workers, and the results those workers produce.

use crate::backends::camera::FrameSample;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// A rectangular region within a frame
///
/// Coordinates are normalized (0.0 to 1.0) relative to the frame dimensions,
/// so the same region applies whatever resolution the active lens delivers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionOfInterest {
    /// Left edge (0.0 = left of frame, 1.0 = right of frame)
    pub x: f32,
    /// Top edge (0.0 = top of frame, 1.0 = bottom of frame)
    pub y: f32,
    /// Width as fraction of frame width
    pub width: f32,
    /// Height as fraction of frame height
    pub height: f32,
}

impl RegionOfInterest {
    /// The whole frame
    pub const FULL: RegionOfInterest = RegionOfInterest {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    /// Whether the region is non-empty and inside the unit square
    pub fn is_valid(&self) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.width > 0.0
            && self.height > 0.0
            && self.x + self.width <= 1.0 + f32::EPSILON
            && self.y + self.height <= 1.0 + f32::EPSILON
    }

    /// Convert to pixel coordinates `(x, y, width, height)`, clipped to the frame
    pub fn to_pixels(&self, frame_width: u32, frame_height: u32) -> (u32, u32, u32, u32) {
        let x = ((self.x * frame_width as f32) as u32).min(frame_width);
        let y = ((self.y * frame_height as f32) as u32).min(frame_height);
        let width = ((self.width * frame_width as f32).round() as u32).min(frame_width - x);
        let height = ((self.height * frame_height as f32).round() as u32).min(frame_height - y);
        (x, y, width, height)
    }
}

/// Owned 8-bit luminance image
///
/// Copied out of a [`FrameSample`] on the capture thread so the decode
/// worker never touches backend memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LumaImage {
    pub width: u32,
    pub height: u32,
    /// Row-major, tightly packed
    pub data: Vec<u8>,
}

impl LumaImage {
    /// Copy the luminance of a frame region, box-downscaled so neither side
    /// exceeds `max_dimension`
    ///
    /// Returns `None` when the region is empty or the frame is incomplete.
    pub fn from_frame(
        frame: &FrameSample<'_>,
        region: &RegionOfInterest,
        max_dimension: u32,
    ) -> Option<Self> {
        if !frame.is_complete() {
            return None;
        }
        let (rx, ry, rw, rh) = region.to_pixels(frame.width, frame.height);
        if rw == 0 || rh == 0 {
            return None;
        }

        // Integer box factor keeps every output pixel an average of whole input pixels
        let factor = rw.max(rh).div_ceil(max_dimension.max(1)).max(1);
        let width = rw / factor;
        let height = rh / factor;
        if width == 0 || height == 0 {
            return None;
        }

        let mut data = Vec::with_capacity((width * height) as usize);
        let area = factor * factor;
        for oy in 0..height {
            for ox in 0..width {
                let mut sum = 0u32;
                for dy in 0..factor {
                    for dx in 0..factor {
                        let x = rx + ox * factor + dx;
                        let y = ry + oy * factor + dy;
                        sum += frame.luma(x, y).unwrap_or(0) as u32;
                    }
                }
                data.push((sum / area) as u8);
            }
        }

        Some(Self {
            width,
            height,
            data,
        })
    }

    /// Expected buffer length for the declared geometry
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// A decoded QR payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeResult {
    pub value: String,
    /// When the decode finished
    pub timestamp: Instant,
}

impl DecodeResult {
    pub fn new(value: impl Into<String>, timestamp: Instant) -> Self {
        Self {
            value: value.into(),
            timestamp,
        }
    }
}

/// Outcome of the sharpness heuristic for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityScore {
    /// Pixels in the central window past either luminance threshold
    pub edge_count: u32,
    /// Pixels actually sampled (window clipped to the frame)
    pub sampled: u32,
    /// Mean luminance of the window
    pub mean_luma: f32,
    /// Presentation timestamp of the frame
    pub timestamp: Duration,
}

impl QualityScore {
    /// Fraction of sampled pixels that are edge pixels
    pub fn edge_ratio(&self) -> f32 {
        if self.sampled == 0 {
            0.0
        } else {
            self.edge_count as f32 / self.sampled as f32
        }
    }

    /// Flat or blurry: nothing in the window went past either threshold
    pub fn is_low_quality(&self) -> bool {
        self.edge_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::PixelFormat;

    #[test]
    fn test_region_to_pixels() {
        let region = RegionOfInterest {
            x: 0.1,
            y: 0.1,
            width: 0.2,
            height: 0.2,
        };
        assert_eq!(region.to_pixels(1000, 500), (100, 50, 200, 100));
        assert_eq!(RegionOfInterest::FULL.to_pixels(640, 480), (0, 0, 640, 480));
    }

    #[test]
    fn test_luma_copy_downscales() {
        // 4x2 gradient, downscaled by 2 in each direction
        let data: Vec<u8> = vec![0, 100, 200, 250, 0, 100, 200, 250];
        let frame = FrameSample::new(&data, 4, 2, PixelFormat::Gray8, Duration::ZERO);

        let image = LumaImage::from_frame(&frame, &RegionOfInterest::FULL, 2).unwrap();
        assert_eq!((image.width, image.height), (2, 1));
        assert_eq!(image.data, vec![50, 225]);
    }

    #[test]
    fn test_luma_copy_respects_region() {
        let data: Vec<u8> = (0..16).collect();
        let frame = FrameSample::new(&data, 4, 4, PixelFormat::Gray8, Duration::ZERO);
        let region = RegionOfInterest {
            x: 0.5,
            y: 0.5,
            width: 0.5,
            height: 0.5,
        };

        let image = LumaImage::from_frame(&frame, &region, 640).unwrap();
        assert_eq!(image.data, vec![10, 11, 14, 15]);
    }

    #[test]
    fn test_quality_score_low_quality_only_without_edges() {
        let flat = QualityScore {
            edge_count: 0,
            sampled: 100,
            mean_luma: 128.0,
            timestamp: Duration::ZERO,
        };
        assert!(flat.is_low_quality());
        assert_eq!(flat.edge_ratio(), 0.0);

        let sharp = QualityScore {
            edge_count: 1,
            ..flat
        };
        assert!(!sharp.is_low_quality());
    }
}
