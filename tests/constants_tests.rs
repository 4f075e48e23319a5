// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for engine constants

use qrcode_reading::constants::{debounce, decode, quality, replay, workers};

#[test]
fn test_luma_thresholds_ordered() {
    assert!(
        quality::LOW_LUMA_THRESHOLD < quality::HIGH_LUMA_THRESHOLD,
        "Low edge threshold must be below the high one"
    );
}

#[test]
fn test_degradation_threshold() {
    assert_eq!(quality::LOW_QUALITY_FRAME_THRESHOLD, 50);
}

#[test]
fn test_quality_window_fits_decode_size() {
    assert!(quality::WINDOW_SIZE <= decode::MAX_DIMENSION);
}

#[test]
fn test_debounce_interval_is_short() {
    assert!(debounce::INTERVAL_MS >= 50 && debounce::INTERVAL_MS <= 2_000);
}

#[test]
fn test_worker_names_distinct() {
    assert_ne!(workers::DECODE_WORKER_NAME, workers::QUALITY_WORKER_NAME);
    assert!(workers::QUALITY_QUEUE_DEPTH > 0);
}

#[test]
fn test_image_extension_detection() {
    assert!(replay::is_image_extension("png"));
    assert!(replay::is_image_extension("JPG"));
    assert!(!replay::is_image_extension("mp4"));
    assert!(!replay::is_image_extension(""));
}
