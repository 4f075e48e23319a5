// SPDX-License-Identifier: GPL-3.0-only

//! Adaptive QR capture and decode engine
//!
//! Drives a camera through a scanning session, decodes QR codes off the
//! frame stream and hot-swaps lenses when the active one cannot focus.
//!
//! # Architecture
//!
//! - [`session`]: the [`CaptureSessionController`] state machine, lens
//!   selection, the frame pump and event delivery
//! - [`frame_processor`]: QR decoding, the frame quality heuristic, result
//!   debouncing and the worker threads they run on
//! - [`backends`]: the [`backends::camera::CameraBackend`] trait the
//!   platform layer implements, plus an image replay backend
//! - [`torch`]: torch control that survives lens switches
//! - [`config`]: tunables, loadable from JSON
//!
//! # Example
//!
//! ```ignore
//! let (controller, mut events) = CaptureSessionController::new(backend, ScanConfig::default())?;
//! controller.start(None, false)?;
//! while let Some(event) = events.blocking_recv() {
//!     if let ScanEvent::CodeRead(value) = event {
//!         println!("{value}");
//!     }
//! }
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod frame_processor;
pub mod session;
pub mod torch;

// Re-export commonly used types
pub use config::{DegradeTrigger, ScanConfig};
pub use errors::{AcquisitionError, DecodeError, ScanError, ScanResult};
pub use session::{
    CaptureSessionController, EventStream, ScanEvent, SessionHandle, SessionSnapshot,
    SessionState, StartOptions, SwitchOutcome,
};
