// SPDX-License-Identifier: GPL-3.0-only

//! Decode result debouncing
//!
//! A code held steady in front of the lens decodes on every frame. Only a
//! changed value, or the same value once the interval has passed since it
//! was last emitted, is worth reporting.

use crate::frame_processor::types::DecodeResult;
use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug)]
pub struct ResultDebouncer {
    interval: Duration,
    last_value: Option<String>,
    last_emit: Option<Instant>,
}

impl ResultDebouncer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_value: None,
            last_emit: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Last value that passed the filter
    pub fn last_value(&self) -> Option<&str> {
        self.last_value.as_deref()
    }

    /// Offer a raw result. Returns true if it should be emitted.
    ///
    /// Uses the result's own timestamp, so the decision does not depend on
    /// when the caller gets around to asking.
    pub fn offer(&mut self, result: &DecodeResult) -> bool {
        let same_value = self.last_value.as_deref() == Some(result.value.as_str());
        if same_value
            && let Some(last) = self.last_emit
            && result.timestamp.saturating_duration_since(last) < self.interval
        {
            trace!(value = %result.value, "Suppressed repeated code");
            return false;
        }

        if !same_value {
            self.last_value = Some(result.value.clone());
        }
        self.last_emit = Some(result.timestamp);
        true
    }

    /// Forget the last emission
    pub fn reset(&mut self) {
        self.last_value = None;
        self.last_emit = None;
    }
}
