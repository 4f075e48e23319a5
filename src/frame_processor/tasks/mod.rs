// SPDX-License-Identifier: GPL-3.0-only

//! Frame processing tasks
//!
//! Each task analyses an owned copy of frame data and runs on its own
//! worker thread.

pub mod qr_detector;
pub mod quality;

pub use qr_detector::QrDecodeEngine;
pub use quality::{FrameQualityMonitor, LensSwitchLatch, QualityOutcome, QualitySample};
