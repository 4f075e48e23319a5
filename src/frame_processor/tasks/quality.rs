// SPDX-License-Identifier: GPL-3.0-only

//! Frame quality monitoring
//!
//! Sharpness is approximated on a small square window at the frame centre:
//! a focused scene with a code in it has pixels past both luminance thresholds,
//! a blurry or flat one does not. A run of frames without a single extreme
//! pixel means the active lens is struggling (usually too close to focus)
//! and raises a one-shot `lens degraded` signal.

use crate::backends::camera::FrameSample;
use crate::config::{DegradeTrigger, ScanConfig};
use crate::frame_processor::types::QualityScore;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

/// Armed/cooldown latch shared by the quality monitor and the lens selector
///
/// The monitor may only raise a degradation signal while the latch is armed;
/// raising it moves the latch to cooldown until the lens selector has
/// finished (or abandoned) the resulting switch and re-arms it.
#[derive(Debug)]
pub struct LensSwitchLatch {
    cooling_down: AtomicBool,
}

impl LensSwitchLatch {
    pub fn new() -> Self {
        Self {
            cooling_down: AtomicBool::new(false),
        }
    }

    /// Move from armed to cooldown. Returns false if already cooling down.
    pub fn try_trigger(&self) -> bool {
        !self.cooling_down.swap(true, Ordering::AcqRel)
    }

    /// Return to armed
    pub fn rearm(&self) {
        self.cooling_down.store(false, Ordering::Release);
    }

    pub fn is_armed(&self) -> bool {
        !self.cooling_down.load(Ordering::Acquire)
    }
}

impl Default for LensSwitchLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Owned copy of the central quality window of one frame
///
/// Taken on the capture thread so analysis can run later on the quality
/// worker without borrowing backend memory.
#[derive(Debug, Clone, PartialEq)]
pub struct QualitySample {
    pub luma: Vec<u8>,
    pub timestamp: Duration,
}

impl QualitySample {
    /// Copy the `window` x `window` square centred on the frame
    ///
    /// The window is clipped to the frame. Returns `None` for incomplete or
    /// empty frames.
    pub fn capture(frame: &FrameSample<'_>, window: u32) -> Option<Self> {
        if !frame.is_complete() {
            return None;
        }
        let side_x = window.min(frame.width);
        let side_y = window.min(frame.height);
        if side_x == 0 || side_y == 0 {
            return None;
        }
        let x0 = (frame.width - side_x) / 2;
        let y0 = (frame.height - side_y) / 2;

        let mut luma = Vec::with_capacity((side_x * side_y) as usize);
        for y in y0..y0 + side_y {
            for x in x0..x0 + side_x {
                luma.push(frame.luma(x, y)?);
            }
        }

        Some(Self {
            luma,
            timestamp: frame.timestamp,
        })
    }
}

/// Result of feeding one sample to the monitor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityOutcome {
    pub score: QualityScore,
    /// True exactly once per degradation, when the latch allowed it
    pub lens_degraded: bool,
}

/// Tracks consecutive low-quality frames and raises `lens degraded`
#[derive(Debug)]
pub struct FrameQualityMonitor {
    low_threshold: u8,
    high_threshold: u8,
    trigger: DegradeTrigger,
    consecutive_low_quality: u32,
    /// Timestamp of the first frame in the current low-quality run
    run_started_at: Option<Duration>,
    latch: Arc<LensSwitchLatch>,
}

impl FrameQualityMonitor {
    pub fn new(config: &ScanConfig, latch: Arc<LensSwitchLatch>) -> Self {
        Self {
            low_threshold: config.low_luma_threshold,
            high_threshold: config.high_luma_threshold,
            trigger: config.degrade_trigger,
            consecutive_low_quality: 0,
            run_started_at: None,
            latch,
        }
    }

    /// Consecutive low-quality frames seen so far
    pub fn consecutive_low_quality_frames(&self) -> u32 {
        self.consecutive_low_quality
    }

    /// Score one window without touching the counters
    pub fn score(&self, sample: &QualitySample) -> QualityScore {
        let mut edge_count = 0u32;
        let mut sum = 0u64;
        for &value in &sample.luma {
            if value < self.low_threshold || value > self.high_threshold {
                edge_count += 1;
            }
            sum += value as u64;
        }
        let sampled = sample.luma.len() as u32;
        let mean_luma = if sampled == 0 {
            0.0
        } else {
            sum as f32 / sampled as f32
        };

        QualityScore {
            edge_count,
            sampled,
            mean_luma,
            timestamp: sample.timestamp,
        }
    }

    /// Score a sample and update the low-quality run
    pub fn observe(&mut self, sample: &QualitySample) -> QualityOutcome {
        let score = self.score(sample);

        if !score.is_low_quality() {
            if self.consecutive_low_quality > 0 {
                trace!(
                    run = self.consecutive_low_quality,
                    edge_count = score.edge_count,
                    "Low-quality run broken"
                );
            }
            self.consecutive_low_quality = 0;
            self.run_started_at = None;
            return QualityOutcome {
                score,
                lens_degraded: false,
            };
        }

        self.consecutive_low_quality += 1;
        let started = *self.run_started_at.get_or_insert(score.timestamp);

        let reached = match self.trigger {
            DegradeTrigger::Frames(limit) => self.consecutive_low_quality >= limit,
            DegradeTrigger::Elapsed(ms) => {
                score.timestamp.saturating_sub(started) >= Duration::from_millis(ms)
            }
        };
        if !reached {
            return QualityOutcome {
                score,
                lens_degraded: false,
            };
        }

        // Reset whether or not a signal goes out, so a pending switch
        // does not see a storm of repeated triggers
        let run = self.consecutive_low_quality;
        self.consecutive_low_quality = 0;
        self.run_started_at = None;

        let lens_degraded = self.latch.try_trigger();
        if lens_degraded {
            debug!(run, mean_luma = score.mean_luma, "Lens degraded");
        } else {
            trace!(run, "Degradation suppressed, switch already pending");
        }

        QualityOutcome {
            score,
            lens_degraded,
        }
    }
}
