// SPDX-License-Identifier: GPL-3.0-only

//! Lens selection and hot-swap
//!
//! At start the preferred lens is picked from the lenses facing the
//! configured direction. When the active lens degrades, the next lens in
//! the rescue order that has not been tried since the last successful
//! decode takes over. Ultra-wide comes first by default because it copes
//! with the close focus distances that blur the standard lens.

use crate::backends::camera::{
    BackendError, CameraBackend, FocalClass, LensDescriptor, LensPosition, LensPreference,
    LensSettings, Resolution,
};
use crate::config::ScanConfig;
use crate::frame_processor::LensSwitchLatch;
use crate::session::events::SessionEmitter;
use crate::session::pump::FrameSink;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// What a switch request ended up doing
#[derive(Debug, Clone, PartialEq)]
pub enum SwitchOutcome {
    /// The target lens is now the active input
    Switched(LensDescriptor),
    /// Another switch was executing; this request was ignored
    InProgress,
    /// The target is already the active lens
    AlreadyActive,
    /// The target lens cannot be opened; the current lens stays
    Unavailable,
    /// The capture graph refused the target input; the previous lens was restored
    Rejected,
    /// No untried lens is left to switch to
    NoCandidate,
}

/// Lenses tried since the last successful decode
#[derive(Debug, Default, Clone)]
pub struct RescueHistory {
    tried: Vec<String>,
}

impl RescueHistory {
    pub fn mark_tried(&mut self, lens: &LensDescriptor) {
        if !self.was_tried(lens) {
            self.tried.push(lens.id.clone());
        }
    }

    pub fn was_tried(&self, lens: &LensDescriptor) -> bool {
        self.tried.iter().any(|id| *id == lens.id)
    }

    pub fn clear(&mut self) {
        self.tried.clear();
    }
}

/// Marks a switch as executing; dropping it ends the switch and re-arms
/// the degradation latch
#[derive(Debug)]
pub struct SwitchGuard<'a> {
    selector: &'a LensSelector,
}

impl Drop for SwitchGuard<'_> {
    fn drop(&mut self) {
        self.selector.in_flight.store(false, Ordering::Release);
        self.selector.latch.rearm();
    }
}

#[derive(Debug)]
pub struct LensSelector {
    position: LensPosition,
    rescue_order: Vec<FocalClass>,
    preview: Resolution,
    in_flight: AtomicBool,
    latch: Arc<LensSwitchLatch>,
}

impl LensSelector {
    pub fn new(config: &ScanConfig, latch: Arc<LensSwitchLatch>) -> Self {
        Self {
            position: config.lens_position,
            rescue_order: config.rescue_order.clone(),
            preview: config.preview,
            in_flight: AtomicBool::new(false),
            latch,
        }
    }

    pub fn latch(&self) -> &Arc<LensSwitchLatch> {
        &self.latch
    }

    /// Claim the right to switch. `None` while another switch is executing.
    pub fn try_begin(&self) -> Option<SwitchGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SwitchGuard { selector: self })
    }

    /// Available lenses facing the configured direction
    pub fn discover(&self, backend: &dyn CameraBackend) -> Vec<LensDescriptor> {
        let lenses: Vec<LensDescriptor> = backend
            .enumerate_lenses(self.position)
            .into_iter()
            .filter(|lens| backend.is_lens_available(lens))
            .collect();
        debug!(
            position = ?self.position,
            count = lenses.len(),
            "Discovered lenses"
        );
        lenses
    }

    /// Lens to open at session start
    ///
    /// The requested class if present, otherwise the standard lens, then
    /// the wide one, then whatever comes first.
    pub fn initial_lens(
        &self,
        lenses: &[LensDescriptor],
        preference: LensPreference,
    ) -> Option<LensDescriptor> {
        [
            preference.focal_class(),
            FocalClass::Standard,
            FocalClass::Wide,
        ]
        .into_iter()
        .find_map(|class| find_lens(lenses, class))
        .or_else(|| lenses.first())
        .cloned()
    }

    /// Next lens to rescue a degraded session with
    ///
    /// `None` once every candidate has been tried; the history is only
    /// cleared by a successful decode, so a device that cannot read the
    /// code on any lens settles instead of cycling.
    pub fn next_rescue_lens(
        &self,
        lenses: &[LensDescriptor],
        current: &LensDescriptor,
        history: &RescueHistory,
    ) -> Option<LensDescriptor> {
        self.rescue_order
            .iter()
            .flat_map(|class| lenses.iter().filter(move |l| l.focal_class == *class))
            .find(|lens| lens.id != current.id && !history.was_tried(lens))
            .cloned()
    }

    /// Move the capture input from `current` to `target`
    ///
    /// Frames pause for the duration; the session keeps running. An
    /// unavailable target or a rejected input leaves the session on the
    /// current lens. `Err` means delivery could not be restarted on any
    /// lens and the session cannot continue.
    pub fn switch_lens(
        &self,
        _guard: &SwitchGuard<'_>,
        backend: &mut dyn CameraBackend,
        current: &LensDescriptor,
        target: &LensDescriptor,
        sink: &FrameSink,
        events: &SessionEmitter,
    ) -> Result<SwitchOutcome, BackendError> {
        if target.id == current.id {
            return Ok(SwitchOutcome::AlreadyActive);
        }
        if !backend.is_lens_available(target) {
            warn!(lens = %target.id, "Target lens unavailable, staying on current lens");
            return Ok(SwitchOutcome::Unavailable);
        }

        info!(from = %current.id, to = %target.id, "Switching lens");
        backend.stop_delivery();
        backend.detach_input();

        if let Err(e) = backend.attach_input(target) {
            warn!(lens = %target.id, error = %e, "Input rejected, restoring previous lens");
            backend.attach_input(current).inspect_err(|e| {
                error!(lens = %current.id, error = %e, "Failed to restore previous lens");
            })?;
            configure_lens(backend, current, self.preview, events);
            backend.start_delivery(sink.clone())?;
            return Ok(SwitchOutcome::Rejected);
        }

        configure_lens(backend, target, self.preview, events);
        backend.start_delivery(sink.clone()).inspect_err(|e| {
            error!(lens = %target.id, error = %e, "Failed to restart delivery after switch");
        })?;

        info!(lens = %target, "Lens switched");
        Ok(SwitchOutcome::Switched(target.clone()))
    }
}

/// First lens of the given focal class
pub fn find_lens(lenses: &[LensDescriptor], class: FocalClass) -> Option<&LensDescriptor> {
    lenses.iter().find(|lens| lens.focal_class == class)
}

/// Apply scanning settings to a freshly attached lens
///
/// A lock failure is reported as a non-fatal error and the lens runs with
/// its defaults.
pub fn configure_lens(
    backend: &mut dyn CameraBackend,
    lens: &LensDescriptor,
    preview: Resolution,
    events: &SessionEmitter,
) {
    let settings = LensSettings::for_lens(lens, preview);
    if let Err(e) = backend.lock_configuration() {
        warn!(lens = %lens.id, error = %e, "Cannot lock lens configuration, using defaults");
        events.error(format!("Cannot configure {}: {}", lens.name, e));
        return;
    }
    if let Err(e) = backend.apply_settings(&settings) {
        warn!(lens = %lens.id, error = %e, "Failed to apply lens settings");
        events.error(format!("Cannot configure {}: {}", lens.name, e));
    } else {
        debug!(lens = %lens.id, ?settings, "Lens configured");
    }
    backend.unlock_configuration();
}
