// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pixel format of the frames delivered by a backend
///
/// Planar YUV formats carry the luminance plane first, which is all the
/// engine ever reads. Packed RGB formats have luminance computed per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Gray8 - 8-bit luminance only
    Gray8,
    /// NV12 - Y plane followed by interleaved UV
    NV12,
    /// NV21 - Y plane followed by interleaved VU
    NV21,
    /// I420 - Y plane followed by separate U and V planes
    I420,
    /// RGBA - 4 bytes per pixel
    RGBA,
    /// BGRA - 4 bytes per pixel, blue first
    BGRA,
}

impl PixelFormat {
    /// Whether the first plane of the buffer is 8-bit luminance
    pub fn is_luma_planar(&self) -> bool {
        matches!(self, Self::Gray8 | Self::NV12 | Self::NV21 | Self::I420)
    }

    /// Bytes occupied by one pixel of the first plane
    pub fn first_plane_bytes_per_pixel(&self) -> u32 {
        match self {
            Self::Gray8 | Self::NV12 | Self::NV21 | Self::I420 => 1,
            Self::RGBA | Self::BGRA => 4,
        }
    }

    /// Parse a FourCC / platform format string
    pub fn from_fourcc(format: &str) -> Option<Self> {
        match format {
            "GRAY8" | "GREY" | "Y8" | "Y800" => Some(Self::Gray8),
            "NV12" | "420v" | "420f" => Some(Self::NV12),
            "NV21" => Some(Self::NV21),
            "I420" | "YUV_420_888" => Some(Self::I420),
            "RGBA" | "RGBx" => Some(Self::RGBA),
            "BGRA" | "BGRx" => Some(Self::BGRA),
            _ => None,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Gray8 => "GRAY8",
            Self::NV12 => "NV12",
            Self::NV21 => "NV21",
            Self::I420 => "I420",
            Self::RGBA => "RGBA",
            Self::BGRA => "BGRA",
        };
        write!(f, "{}", name)
    }
}

/// A single frame borrowed from the backend for the duration of one callback
///
/// The engine never keeps a `FrameSample` past the callback that delivered
/// it. Anything a worker needs later is copied out first.
#[derive(Debug, Clone, Copy)]
pub struct FrameSample<'a> {
    /// Pixel data, first plane at offset 0
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    /// Bytes per row of the first plane (may include padding)
    pub stride: u32,
    pub format: PixelFormat,
    /// Presentation timestamp reported by the backend
    pub timestamp: Duration,
}

impl<'a> FrameSample<'a> {
    /// Create a frame with a tightly packed first plane
    pub fn new(
        data: &'a [u8],
        width: u32,
        height: u32,
        format: PixelFormat,
        timestamp: Duration,
    ) -> Self {
        Self {
            data,
            width,
            height,
            stride: width * format.first_plane_bytes_per_pixel(),
            format,
            timestamp,
        }
    }

    /// Override the row stride
    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }

    /// Minimum buffer length needed to read every luminance sample
    pub fn required_len(&self) -> usize {
        if self.width == 0 || self.height == 0 {
            return 0;
        }
        let row = (self.width * self.format.first_plane_bytes_per_pixel()) as usize;
        (self.height as usize - 1) * self.stride as usize + row
    }

    /// Whether the buffer covers the declared geometry
    pub fn is_complete(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.stride >= self.width * self.format.first_plane_bytes_per_pixel()
            && self.data.len() >= self.required_len()
    }

    /// Luminance at a pixel, `None` outside the frame or buffer
    pub fn luma(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let row = y as usize * self.stride as usize;
        match self.format {
            PixelFormat::Gray8 | PixelFormat::NV12 | PixelFormat::NV21 | PixelFormat::I420 => {
                self.data.get(row + x as usize).copied()
            }
            PixelFormat::RGBA => {
                let offset = row + x as usize * 4;
                let px = self.data.get(offset..offset + 3)?;
                Some(rgb_to_luma(px[0], px[1], px[2]))
            }
            PixelFormat::BGRA => {
                let offset = row + x as usize * 4;
                let px = self.data.get(offset..offset + 3)?;
                Some(rgb_to_luma(px[2], px[1], px[0]))
            }
        }
    }
}

/// BT.601 luma with integer weights
pub fn rgb_to_luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 77 + g as u32 * 150 + b as u32 * 29) >> 8) as u8
}

/// Which side of the device a lens faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LensPosition {
    #[default]
    Back,
    Front,
    External,
}

/// Focal-length class of a physical lens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocalClass {
    /// The platform's default camera
    Standard,
    /// Wide-angle lens
    Wide,
    /// Ultra-wide lens; tolerates short focus distances
    UltraWide,
    /// Telephoto lens
    Telephoto,
}

impl std::fmt::Display for FocalClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FocalClass::Standard => write!(f, "standard"),
            FocalClass::Wide => write!(f, "wide"),
            FocalClass::UltraWide => write!(f, "ultra-wide"),
            FocalClass::Telephoto => write!(f, "telephoto"),
        }
    }
}

/// Lens requested by the caller when starting a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LensPreference {
    #[default]
    Standard,
    Wide,
    UltraWide,
}

impl LensPreference {
    pub fn focal_class(&self) -> FocalClass {
        match self {
            LensPreference::Standard => FocalClass::Standard,
            LensPreference::Wide => FocalClass::Wide,
            LensPreference::UltraWide => FocalClass::UltraWide,
        }
    }
}

/// Capture resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether this resolution fits inside `other` in both dimensions
    pub fn fits_within(&self, other: &Resolution) -> bool {
        self.width <= other.width && self.height <= other.height
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Supported zoom factor range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomRange {
    pub min: f32,
    pub max: f32,
}

impl ZoomRange {
    pub fn clamp(&self, zoom: f32) -> f32 {
        zoom.clamp(self.min, self.max.max(self.min))
    }
}

impl Default for ZoomRange {
    fn default() -> Self {
        Self { min: 1.0, max: 1.0 }
    }
}

/// Immutable description of one physical camera
///
/// Snapshotted from the backend when lenses are enumerated and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct LensDescriptor {
    /// Backend-specific identifier (camera id, device unique id)
    pub id: String,
    /// Human-readable name
    pub name: String,
    pub position: LensPosition,
    pub focal_class: FocalClass,
    /// True if the lens has an associated torch
    pub has_torch: bool,
    /// Supported capture resolutions
    pub resolutions: Vec<Resolution>,
    pub zoom: ZoomRange,
}

impl LensDescriptor {
    /// Pick the largest resolution that fits the preview size, or the
    /// smallest available one if none fits.
    pub fn best_resolution(&self, preview: Resolution) -> Option<Resolution> {
        self.resolutions
            .iter()
            .filter(|r| r.fits_within(&preview))
            .max_by_key(|r| r.pixels())
            .or_else(|| self.resolutions.iter().min_by_key(|r| r.pixels()))
            .copied()
    }
}

impl std::fmt::Display for LensDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.focal_class, self.id)
    }
}

/// Focus behaviour applied when a lens is configured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusMode {
    ContinuousAuto,
    /// Continuous autofocus restricted to the near range
    ContinuousNear,
}

/// Exposure behaviour applied when a lens is configured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExposureMode {
    ContinuousAuto,
}

/// Per-lens configuration reapplied after every acquisition or hot-swap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LensSettings {
    pub zoom: f32,
    pub focus: FocusMode,
    pub exposure: ExposureMode,
    pub resolution: Option<Resolution>,
}

impl LensSettings {
    /// Settings appropriate for scanning with the given lens
    pub fn for_lens(lens: &LensDescriptor, preview: Resolution) -> Self {
        let focus = match lens.focal_class {
            FocalClass::UltraWide => FocusMode::ContinuousNear,
            _ => FocusMode::ContinuousAuto,
        };
        Self {
            zoom: lens.zoom.clamp(1.0),
            focus,
            exposure: ExposureMode::ContinuousAuto,
            resolution: lens.best_resolution(preview),
        }
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Capture hardware is not available on this system
    NotAvailable(String),
    /// Camera permission was denied
    PermissionDenied,
    /// Hardware is claimed by another client
    Busy,
    /// Requested camera device not found
    DeviceNotFound(String),
    /// Lens configuration could not be locked
    ConfigurationLocked(String),
    /// The capture graph refused the input
    InputRejected(String),
    /// Frame delivery could not be started
    DeliveryFailed(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::PermissionDenied => write!(f, "Camera permission denied"),
            BackendError::Busy => write!(f, "Camera is busy"),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::ConfigurationLocked(msg) => {
                write!(f, "Could not lock lens configuration: {}", msg)
            }
            BackendError::InputRejected(msg) => write!(f, "Input rejected: {}", msg),
            BackendError::DeliveryFailed(msg) => write!(f, "Frame delivery failed: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}
