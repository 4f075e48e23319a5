// SPDX-License-Identifier: GPL-3.0-only

//! Session lifecycle state

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of the capture session
///
/// ```text
/// Idle -> Starting -> Running <-> Paused -> Stopping -> Idle
///            |           |
///            +-> Error <-+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Starting,
    Running,
    Paused,
    Stopping,
    Error,
}

impl SessionState {
    /// Whether per-frame work may still act on its results
    pub fn accepts_frames(self) -> bool {
        self == SessionState::Running
    }

    fn to_u8(self) -> u8 {
        match self {
            SessionState::Idle => 0,
            SessionState::Starting => 1,
            SessionState::Running => 2,
            SessionState::Paused => 3,
            SessionState::Stopping => 4,
            SessionState::Error => 5,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::Starting,
            2 => SessionState::Running,
            3 => SessionState::Paused,
            4 => SessionState::Stopping,
            5 => SessionState::Error,
            _ => SessionState::Idle,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Running => "running",
            SessionState::Paused => "paused",
            SessionState::Stopping => "stopping",
            SessionState::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// Lock-free state readable from frame callbacks and workers
///
/// Only the controller writes it, and only while holding the control lock.
#[derive(Debug, Default)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: SessionState) -> Self {
        Self(AtomicU8::new(state.to_u8()))
    }

    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Store a new state, returning the previous one
    pub fn set(&self, state: SessionState) -> SessionState {
        SessionState::from_u8(self.0.swap(state.to_u8(), Ordering::AcqRel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_round_trips_every_state() {
        let cell = StateCell::default();
        assert_eq!(cell.get(), SessionState::Idle);
        for state in [
            SessionState::Starting,
            SessionState::Running,
            SessionState::Paused,
            SessionState::Stopping,
            SessionState::Error,
            SessionState::Idle,
        ] {
            let before = cell.get();
            assert_eq!(cell.set(state), before);
            assert_eq!(cell.get(), state);
        }
    }

    #[test]
    fn test_only_running_accepts_frames() {
        assert!(SessionState::Running.accepts_frames());
        assert!(!SessionState::Paused.accepts_frames());
        assert!(!SessionState::Stopping.accepts_frames());
    }

    #[test]
    fn test_display_is_lowercase() {
        assert_eq!(SessionState::Running.to_string(), "running");
        assert_eq!(SessionState::Error.to_string(), "error");
    }
}
