// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture and decode engine

use crate::backends::camera::BackendError;
use crate::session::SessionState;
use std::fmt;

/// Result type alias using ScanError
pub type ScanResult<T> = Result<T, ScanError>;

/// Main engine error type
#[derive(Debug, Clone, PartialEq)]
pub enum ScanError {
    /// Hardware could not be acquired when starting a session
    Acquisition(AcquisitionError),
    /// Operation not valid in the current session state
    InvalidTransition {
        from: SessionState,
        operation: &'static str,
    },
    /// Decoder fault
    Decode(DecodeError),
    /// Configuration errors
    Config(String),
    /// Backend error outside of acquisition
    Backend(BackendError),
}

/// Errors that make `start` fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    /// No lens found for the requested facing
    NoCamera,
    /// Camera already claimed by another client
    HardwareBusy,
    /// Camera permission not granted
    PermissionDenied,
    /// Any other backend failure during acquisition
    Backend(String),
}

impl AcquisitionError {
    /// Stable code reported to the plugin transport
    pub fn code(&self) -> &'static str {
        match self {
            AcquisitionError::NoCamera => "NO_CAMERA",
            AcquisitionError::HardwareBusy => "HARDWARE_BUSY",
            AcquisitionError::PermissionDenied => "PERMISSION_DENIED",
            AcquisitionError::Backend(_) => "ACQUISITION_FAILED",
        }
    }
}

/// Decoder faults
///
/// "No code found" is not an error and never shows up here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Luminance buffer does not match its declared geometry
    MalformedFrame { expected: usize, actual: usize },
    /// The decoder itself failed (panicked)
    DecoderFault(String),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Acquisition(e) => write!(f, "Acquisition error: {}", e),
            ScanError::InvalidTransition { from, operation } => {
                write!(f, "Cannot {} while session is {}", operation, from)
            }
            ScanError::Decode(e) => write!(f, "Decode error: {}", e),
            ScanError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ScanError::Backend(e) => write!(f, "Backend error: {}", e),
        }
    }
}

impl fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionError::NoCamera => write!(f, "No camera found"),
            AcquisitionError::HardwareBusy => write!(f, "Camera is busy"),
            AcquisitionError::PermissionDenied => write!(f, "Camera permission denied"),
            AcquisitionError::Backend(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::MalformedFrame { expected, actual } => write!(
                f,
                "Malformed frame: expected {} bytes, got {}",
                expected, actual
            ),
            DecodeError::DecoderFault(msg) => write!(f, "Decoder fault: {}", msg),
        }
    }
}

impl std::error::Error for ScanError {}
impl std::error::Error for AcquisitionError {}
impl std::error::Error for DecodeError {}

impl From<AcquisitionError> for ScanError {
    fn from(err: AcquisitionError) -> Self {
        ScanError::Acquisition(err)
    }
}

impl From<DecodeError> for ScanError {
    fn from(err: DecodeError) -> Self {
        ScanError::Decode(err)
    }
}

impl From<BackendError> for ScanError {
    fn from(err: BackendError) -> Self {
        ScanError::Backend(err)
    }
}

impl From<BackendError> for AcquisitionError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Busy => AcquisitionError::HardwareBusy,
            BackendError::PermissionDenied => AcquisitionError::PermissionDenied,
            BackendError::DeviceNotFound(_) => AcquisitionError::NoCamera,
            other => AcquisitionError::Backend(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::Config(err.to_string())
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        ScanError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_errors_map_to_acquisition_codes() {
        assert_eq!(
            AcquisitionError::from(BackendError::Busy).code(),
            "HARDWARE_BUSY"
        );
        assert_eq!(
            AcquisitionError::from(BackendError::DeviceNotFound("0".into())).code(),
            "NO_CAMERA"
        );
        assert_eq!(
            AcquisitionError::from(BackendError::InputRejected("graph".into())).code(),
            "ACQUISITION_FAILED"
        );
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = ScanError::InvalidTransition {
            from: SessionState::Running,
            operation: "start",
        };
        assert_eq!(err.to_string(), "Cannot start while session is running");
    }
}
