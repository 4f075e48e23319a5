// SPDX-License-Identifier: GPL-3.0-only

//! Engine configuration
//!
//! All tunables of the scanner live in [`ScanConfig`]. It deserializes from
//! JSON with every field optional, so hosts only override what they need.

use crate::backends::camera::{FocalClass, LensPosition, LensPreference, Resolution};
use crate::constants;
use crate::errors::{ScanError, ScanResult};
use crate::frame_processor::RegionOfInterest;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// When a run of low-quality frames counts as a degraded lens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradeTrigger {
    /// After this many consecutive low-quality frames
    Frames(u32),
    /// After low-quality frames have lasted this long (milliseconds)
    Elapsed(u64),
}

impl Default for DegradeTrigger {
    fn default() -> Self {
        DegradeTrigger::Frames(constants::quality::LOW_QUALITY_FRAME_THRESHOLD)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Which side of the device to scan with
    pub lens_position: LensPosition,
    /// Lens used when `start` gives no preference
    pub default_lens: LensPreference,
    /// Order in which lenses are tried when the active one degrades
    pub rescue_order: Vec<FocalClass>,
    /// Hot-swap lenses automatically on sustained low quality
    pub auto_lens_switch: bool,
    /// Requested preview size
    pub preview: Resolution,
    /// Minimum interval between two emissions of the same code
    pub debounce_interval_ms: u64,
    /// Low-quality run that triggers a lens switch
    pub degrade_trigger: DegradeTrigger,
    /// Side of the central quality window in pixels
    pub quality_window: u32,
    /// Luminance below this is an edge pixel
    pub low_luma_threshold: u8,
    /// Luminance above this is an edge pixel
    pub high_luma_threshold: u8,
    /// Longest side of the luminance copy handed to the decoder
    pub max_decode_dimension: u32,
    /// Region of the frame searched for codes (whole frame when unset)
    pub decode_region: Option<RegionOfInterest>,
    /// Quality samples queued before new ones are dropped
    pub quality_queue_depth: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            lens_position: LensPosition::Back,
            default_lens: LensPreference::Standard,
            rescue_order: vec![
                FocalClass::UltraWide,
                FocalClass::Wide,
                FocalClass::Standard,
                FocalClass::Telephoto,
            ],
            auto_lens_switch: true,
            preview: Resolution::new(constants::preview::WIDTH, constants::preview::HEIGHT),
            debounce_interval_ms: constants::debounce::INTERVAL_MS,
            degrade_trigger: DegradeTrigger::default(),
            quality_window: constants::quality::WINDOW_SIZE,
            low_luma_threshold: constants::quality::LOW_LUMA_THRESHOLD,
            high_luma_threshold: constants::quality::HIGH_LUMA_THRESHOLD,
            max_decode_dimension: constants::decode::MAX_DIMENSION,
            decode_region: None,
            quality_queue_depth: constants::workers::QUALITY_QUEUE_DEPTH,
        }
    }
}

impl ScanConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> ScanResult<Self> {
        let config: ScanConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> ScanResult<Self> {
        info!(path = %path.display(), "Loading scan configuration");
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_string(&self) -> ScanResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Debounce interval as a Duration
    pub fn debounce_interval(&self) -> Duration {
        Duration::from_millis(self.debounce_interval_ms)
    }

    /// Check that the values are usable together
    pub fn validate(&self) -> ScanResult<()> {
        if self.low_luma_threshold >= self.high_luma_threshold {
            return Err(ScanError::Config(format!(
                "low_luma_threshold ({}) must be below high_luma_threshold ({})",
                self.low_luma_threshold, self.high_luma_threshold
            )));
        }
        if self.quality_window == 0 {
            return Err(ScanError::Config("quality_window must be non-zero".into()));
        }
        match self.degrade_trigger {
            DegradeTrigger::Frames(0) | DegradeTrigger::Elapsed(0) => {
                return Err(ScanError::Config(
                    "degrade_trigger must be non-zero".into(),
                ));
            }
            _ => {}
        }
        if self.max_decode_dimension == 0 {
            return Err(ScanError::Config(
                "max_decode_dimension must be non-zero".into(),
            ));
        }
        if self.quality_queue_depth == 0 {
            return Err(ScanError::Config(
                "quality_queue_depth must be non-zero".into(),
            ));
        }
        if self.preview.width == 0 || self.preview.height == 0 {
            return Err(ScanError::Config("preview size must be non-zero".into()));
        }
        if let Some(region) = &self.decode_region
            && !region.is_valid()
        {
            return Err(ScanError::Config(format!(
                "decode_region {:?} must lie inside the unit square",
                region
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ScanConfig::from_json_str(r#"{ "debounce_interval_ms": 2000 }"#).unwrap();
        assert_eq!(config.debounce_interval(), Duration::from_millis(2000));
        assert_eq!(config.degrade_trigger, DegradeTrigger::Frames(50));
        assert_eq!(config.preview, Resolution::new(1920, 1080));
    }

    #[test]
    fn test_elapsed_trigger_parses() {
        let config =
            ScanConfig::from_json_str(r#"{ "degrade_trigger": { "elapsed": 1500 } }"#).unwrap();
        assert_eq!(config.degrade_trigger, DegradeTrigger::Elapsed(1500));
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let result = ScanConfig::from_json_str(
            r#"{ "low_luma_threshold": 200, "high_luma_threshold": 100 }"#,
        );
        assert!(matches!(result, Err(ScanError::Config(_))));
    }

    #[test]
    fn test_region_outside_frame_rejected() {
        let mut config = ScanConfig::default();
        config.decode_region = Some(RegionOfInterest {
            x: 0.5,
            y: 0.5,
            width: 0.8,
            height: 0.2,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_round_trip_default() {
        let json = ScanConfig::default().to_json_string().unwrap();
        assert_eq!(ScanConfig::from_json_str(&json).unwrap(), ScanConfig::default());
    }
}
