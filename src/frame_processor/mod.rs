// SPDX-License-Identifier: GPL-3.0-only

//! Frame processing
//!
//! Everything that happens to a frame after the capture thread has copied
//! what it needs out of it: QR decoding, the sharpness heuristic, result
//! debouncing and the worker threads these run on.

pub mod debounce;
pub mod tasks;
pub mod types;
pub mod worker;

pub use debounce::ResultDebouncer;
pub use tasks::{
    FrameQualityMonitor, LensSwitchLatch, QrDecodeEngine, QualityOutcome, QualitySample,
};
pub use types::{DecodeResult, LumaImage, QualityScore, RegionOfInterest};
pub use worker::{LoopAction, WorkerLoop};
