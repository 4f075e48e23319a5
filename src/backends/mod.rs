// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for frame capture
//!
//! # Modules
//!
//! - [`camera`]: the [`camera::CameraBackend`] trait and the frame and lens
//!   types every backend speaks
//! - [`replay`]: a backend that replays image files, for the diagnostic
//!   binary and offline runs

pub mod camera;
pub mod replay;
