// SPDX-License-Identifier: GPL-3.0-only

//! Torch (continuous illumination) control
//!
//! The torch belongs to a lens, not to the session: it goes dark whenever
//! the input is swapped. The controller remembers what the host asked for
//! and reapplies it to each newly attached lens that has a torch.

use crate::backends::camera::{CameraBackend, LensDescriptor};
use crate::session::SessionEmitter;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
pub struct TorchController {
    /// Last state requested by the host
    requested: bool,
    /// State actually applied to the active lens
    is_on: bool,
}

impl TorchController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    pub fn requested(&self) -> bool {
        self.requested
    }

    /// Turn the torch of `lens` on or off
    ///
    /// A lens without a torch makes this a silent no-op. A configuration
    /// lock failure is reported as a non-fatal error and leaves the torch
    /// as it was.
    pub fn set_torch(
        &mut self,
        backend: &mut dyn CameraBackend,
        lens: &LensDescriptor,
        on: bool,
        events: &SessionEmitter,
    ) {
        self.requested = on;
        if !lens.has_torch {
            debug!(lens = %lens.id, on, "Lens has no torch, ignoring");
            return;
        }
        if self.is_on == on {
            return;
        }
        self.apply(backend, lens, on, events);
    }

    /// Reapply the requested state after the input moved to `lens`
    pub fn on_lens_changed(
        &mut self,
        backend: &mut dyn CameraBackend,
        lens: &LensDescriptor,
        events: &SessionEmitter,
    ) {
        self.is_on = false;
        if self.requested && lens.has_torch {
            debug!(lens = %lens.id, "Reapplying torch after lens switch");
            self.apply(backend, lens, true, events);
        }
    }

    /// Turn the torch off for teardown and forget the request
    pub fn shutdown(&mut self, backend: &mut dyn CameraBackend) {
        if self.is_on {
            match backend.lock_configuration() {
                Ok(()) => {
                    if let Err(e) = backend.set_torch_mode(false) {
                        warn!(error = %e, "Failed to turn torch off");
                    }
                    backend.unlock_configuration();
                }
                Err(e) => warn!(error = %e, "Failed to lock configuration to turn torch off"),
            }
        }
        self.is_on = false;
        self.requested = false;
    }

    fn apply(
        &mut self,
        backend: &mut dyn CameraBackend,
        lens: &LensDescriptor,
        on: bool,
        events: &SessionEmitter,
    ) {
        if let Err(e) = backend.lock_configuration() {
            warn!(lens = %lens.id, error = %e, "Cannot lock configuration for torch");
            events.error(format!("Torch unavailable: {}", e));
            return;
        }

        match backend.set_torch_mode(on) {
            Ok(()) => {
                self.is_on = on;
                info!(lens = %lens.id, on, "Torch set");
            }
            Err(e) => {
                warn!(lens = %lens.id, on, error = %e, "Failed to set torch");
                events.error(format!("Failed to set torch: {}", e));
            }
        }

        backend.unlock_configuration();
    }
}
