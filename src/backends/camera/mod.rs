// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! The platform layer (Android camera2, AVFoundation, a file replay, a test
//! double) implements [`CameraBackend`]. The engine owns the backend behind
//! the session controller and only touches it from serialized lifecycle
//! operations; workers never see it.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────┐
//! │  Plugin transport (host)  │
//! └─────────────┬─────────────┘
//!               │ start / pause / resume / stop / set_torch
//!               ▼
//! ┌───────────────────────────┐
//! │ CaptureSessionController  │  ← lifecycle, lens hot-swap, torch
//! └─────────────┬─────────────┘
//!               │
//!               ▼
//! ┌───────────────────────────┐        FrameSink::on_frame
//! │   CameraBackend trait     │ ─────────────────────────────► pump
//! └───────────────────────────┘
//! ```

pub mod types;

pub use types::*;

use crate::session::FrameSink;

/// Hardware-facing frame source
///
/// Calls arrive in this order for a session:
/// `enumerate_lenses` → `acquire` → `attach_input` → configuration
/// (`lock_configuration`, `apply_settings`, `set_torch_mode`,
/// `unlock_configuration`) → `start_delivery` → … → `stop_delivery` →
/// `detach_input` → `release`.
///
/// A lens hot-swap runs `stop_delivery` → `detach_input` → `attach_input`
/// → configuration → `start_delivery` on an already acquired backend.
pub trait CameraBackend: Send {
    // ===== Enumeration =====

    /// Enumerate the lenses facing the given direction
    fn enumerate_lenses(&self, position: LensPosition) -> Vec<LensDescriptor>;

    /// Check whether a lens can currently be opened
    fn is_lens_available(&self, lens: &LensDescriptor) -> bool;

    // ===== Lifecycle =====

    /// Claim the capture hardware
    ///
    /// # Returns
    /// * `Err(BackendError::Busy)` - another client holds the camera
    /// * `Err(BackendError::PermissionDenied)` - camera access not granted
    fn acquire(&mut self) -> BackendResult<()>;

    /// Release every hardware handle. Must be safe to call more than once.
    fn release(&mut self);

    // ===== Inputs =====

    /// Attach a lens as the capture input
    fn attach_input(&mut self, lens: &LensDescriptor) -> BackendResult<()>;

    /// Detach the current capture input. A no-op without one.
    fn detach_input(&mut self);

    // ===== Configuration =====

    /// Lock the active lens for configuration
    fn lock_configuration(&mut self) -> BackendResult<()>;

    /// Unlock the active lens
    fn unlock_configuration(&mut self);

    /// Apply zoom, focus, exposure and resolution to the locked lens
    fn apply_settings(&mut self, settings: &LensSettings) -> BackendResult<()>;

    /// Switch the torch of the locked lens on or off
    fn set_torch_mode(&mut self, on: bool) -> BackendResult<()>;

    // ===== Delivery =====

    /// Start delivering frames to the sink
    ///
    /// The backend calls [`FrameSink::on_frame`] from its own capture thread
    /// and must not hold on to the borrowed pixels afterwards.
    fn start_delivery(&mut self, sink: FrameSink) -> BackendResult<()>;

    /// Stop delivering frames. Hardware handles stay open.
    ///
    /// Returns once the sink will not be called again. A no-op when not
    /// delivering.
    fn stop_delivery(&mut self);
}
