// SPDX-License-Identifier: GPL-3.0-only

//! QR code decode task
//!
//! Wraps rqrr: the luminance copy is binarized by rqrr's adaptive threshold,
//! grids are located, and the first grid that decodes wins. Finding nothing
//! is the normal outcome for most frames and is not an error.

use crate::errors::DecodeError;
use crate::frame_processor::types::{DecodeResult, LumaImage};
use rqrr::PreparedImage;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, trace};

/// QR code decoder
///
/// Stateless between calls; one instance lives on the decode worker.
#[derive(Debug, Default, Clone, Copy)]
pub struct QrDecodeEngine;

impl QrDecodeEngine {
    /// Create a new decoder
    pub fn new() -> Self {
        Self
    }

    /// Try to extract a QR payload from one luminance image
    ///
    /// # Returns
    /// * `Ok(Some(result))` - a code was decoded
    /// * `Ok(None)` - no code in the frame, or none that decoded cleanly
    /// * `Err(DecodeError)` - the input or the decoder itself is broken
    pub fn decode(&self, image: &LumaImage) -> Result<Option<DecodeResult>, DecodeError> {
        let expected = image.expected_len();
        if image.data.len() != expected {
            return Err(DecodeError::MalformedFrame {
                expected,
                actual: image.data.len(),
            });
        }
        if expected == 0 {
            return Ok(None);
        }

        let start = Instant::now();
        let width = image.width as usize;
        let height = image.height as usize;

        let content = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut prepared =
                PreparedImage::prepare_from_greyscale(width, height, |x, y| {
                    image.data[y * width + x]
                });
            let grids = prepared.detect_grids();
            trace!(count = grids.len(), "QR grids located");

            grids.iter().find_map(|grid| match grid.decode() {
                Ok((_, content)) => Some(content),
                Err(e) => {
                    trace!(error = ?e, "Failed to decode QR grid");
                    None
                }
            })
        }))
        .map_err(|payload| DecodeError::DecoderFault(panic_message(payload.as_ref())))?;

        let elapsed_ms = start.elapsed().as_millis();
        Ok(content.map(|value| {
            debug!(content = %value, elapsed_ms, "Decoded QR code");
            DecodeResult::new(value, Instant::now())
        }))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "decoder panicked".to_string()
    }
}
