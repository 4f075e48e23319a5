// SPDX-License-Identifier: GPL-3.0-only

//! Image replay backend
//!
//! Presents a list of still images as a single rear camera and delivers
//! them in order from a background thread at roughly camera frame rate.
//! Used by the diagnostic binary to run the full engine against files.

use crate::backends::camera::{
    BackendError, BackendResult, CameraBackend, FocalClass, FrameSample, LensDescriptor,
    LensPosition, LensSettings, PixelFormat, Resolution, ZoomRange,
};
use crate::constants::replay::{FRAME_INTERVAL, is_image_extension};
use crate::frame_processor::{LoopAction, WorkerLoop};
use crate::session::FrameSink;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const REPLAY_LENS_ID: &str = "replay:0";
const REPLAY_WORKER_NAME: &str = "replay-capture";

/// One decoded still image, kept as RGBA
#[derive(Debug, Clone)]
pub struct ReplayFrame {
    pub data: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
}

/// Load an image file as an RGBA frame
pub fn load_image_as_frame(path: &Path) -> BackendResult<ReplayFrame> {
    info!(path = %path.display(), "Loading image file");

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    if !is_image_extension(extension) {
        return Err(BackendError::Other(format!(
            "Unsupported file format: {}",
            path.display()
        )));
    }

    let img = image::open(path).map_err(|e| {
        BackendError::Other(format!("Failed to load image '{}': {}", path.display(), e))
    })?;
    let rgba = img.to_rgba8();
    let width = rgba.width();
    let height = rgba.height();
    let data: Vec<u8> = rgba.into_raw();

    debug!(width, height, "Image loaded");

    Ok(ReplayFrame {
        data: Arc::from(data.into_boxed_slice()),
        width,
        height,
    })
}

pub struct ReplayBackend {
    frames: Arc<[ReplayFrame]>,
    /// How many times the whole list is delivered
    passes: u32,
    acquired: bool,
    attached: Option<String>,
    /// Next frame to deliver, kept across pause/resume
    cursor: Arc<AtomicUsize>,
    finished: Arc<AtomicBool>,
    delivery: Option<WorkerLoop>,
}

impl ReplayBackend {
    pub fn new(frames: Vec<ReplayFrame>, passes: u32) -> Self {
        Self {
            frames: Arc::from(frames.into_boxed_slice()),
            passes: passes.max(1),
            acquired: false,
            attached: None,
            cursor: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(AtomicBool::new(false)),
            delivery: None,
        }
    }

    /// Load every file, skipping the ones that fail
    pub fn from_paths<P: AsRef<Path>>(paths: &[P], passes: u32) -> Self {
        let frames = paths
            .iter()
            .filter_map(|path| match load_image_as_frame(path.as_ref()) {
                Ok(frame) => Some(frame),
                Err(e) => {
                    warn!(error = %e, "Skipping replay file");
                    None
                }
            })
            .collect();
        Self::new(frames, passes)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Set once every pass has been delivered
    pub fn finished_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.finished)
    }

    fn lens(&self) -> LensDescriptor {
        let max = self
            .frames
            .iter()
            .map(|f| Resolution::new(f.width, f.height))
            .max_by_key(Resolution::pixels)
            .unwrap_or_else(|| Resolution::new(0, 0));
        LensDescriptor {
            id: REPLAY_LENS_ID.to_string(),
            name: "Image replay".to_string(),
            position: LensPosition::Back,
            focal_class: FocalClass::Standard,
            has_torch: false,
            resolutions: vec![max],
            zoom: ZoomRange::default(),
        }
    }
}

impl CameraBackend for ReplayBackend {
    fn enumerate_lenses(&self, position: LensPosition) -> Vec<LensDescriptor> {
        if position == LensPosition::Back && !self.frames.is_empty() {
            vec![self.lens()]
        } else {
            Vec::new()
        }
    }

    fn is_lens_available(&self, lens: &LensDescriptor) -> bool {
        lens.id == REPLAY_LENS_ID && !self.frames.is_empty()
    }

    fn acquire(&mut self) -> BackendResult<()> {
        if self.acquired {
            return Err(BackendError::Busy);
        }
        if self.frames.is_empty() {
            return Err(BackendError::DeviceNotFound("no replay frames".into()));
        }
        self.acquired = true;
        self.cursor.store(0, Ordering::Release);
        self.finished.store(false, Ordering::Release);
        Ok(())
    }

    fn release(&mut self) {
        self.stop_delivery();
        self.attached = None;
        self.acquired = false;
    }

    fn attach_input(&mut self, lens: &LensDescriptor) -> BackendResult<()> {
        if !self.is_lens_available(lens) {
            return Err(BackendError::InputRejected(lens.id.clone()));
        }
        self.attached = Some(lens.id.clone());
        Ok(())
    }

    fn detach_input(&mut self) {
        self.attached = None;
    }

    fn lock_configuration(&mut self) -> BackendResult<()> {
        if self.attached.is_none() {
            return Err(BackendError::ConfigurationLocked("no input attached".into()));
        }
        Ok(())
    }

    fn unlock_configuration(&mut self) {}

    fn apply_settings(&mut self, settings: &LensSettings) -> BackendResult<()> {
        debug!(?settings, "Replay lens settings ignored");
        Ok(())
    }

    fn set_torch_mode(&mut self, _on: bool) -> BackendResult<()> {
        Err(BackendError::NotAvailable("replay lens has no torch".into()))
    }

    fn start_delivery(&mut self, sink: FrameSink) -> BackendResult<()> {
        if self.attached.is_none() {
            return Err(BackendError::DeliveryFailed("no input attached".into()));
        }
        self.stop_delivery();

        let frames = Arc::clone(&self.frames);
        let cursor = Arc::clone(&self.cursor);
        let finished = Arc::clone(&self.finished);
        let total = frames.len() * self.passes as usize;

        let worker = WorkerLoop::start(REPLAY_WORKER_NAME, move || {
            let index = cursor.fetch_add(1, Ordering::AcqRel);
            if index >= total {
                finished.store(true, Ordering::Release);
                return LoopAction::Stop;
            }
            let frame = &frames[index % frames.len()];
            let timestamp = FRAME_INTERVAL * index as u32;
            sink.on_frame(&FrameSample::new(
                &frame.data,
                frame.width,
                frame.height,
                PixelFormat::RGBA,
                timestamp,
            ));
            thread::sleep(FRAME_INTERVAL);
            LoopAction::Continue
        })
        .map_err(|e| BackendError::DeliveryFailed(e.to_string()))?;

        self.delivery = Some(worker);
        Ok(())
    }

    fn stop_delivery(&mut self) {
        if let Some(mut worker) = self.delivery.take() {
            worker.stop();
        }
    }
}

impl Drop for ReplayBackend {
    fn drop(&mut self) {
        self.release();
    }
}

/// Time to replay `frames` frames once
pub fn replay_duration(frames: usize) -> Duration {
    FRAME_INTERVAL * frames as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> ReplayFrame {
        ReplayFrame {
            data: Arc::from(vec![0u8; 16].into_boxed_slice()),
            width: 2,
            height: 2,
        }
    }

    #[test]
    fn test_empty_replay_has_no_camera() {
        let mut backend = ReplayBackend::new(Vec::new(), 1);
        assert!(backend.enumerate_lenses(LensPosition::Back).is_empty());
        assert_eq!(
            backend.acquire(),
            Err(BackendError::DeviceNotFound("no replay frames".into()))
        );
    }

    #[test]
    fn test_single_rear_lens_without_torch() {
        let backend = ReplayBackend::new(vec![frame()], 1);
        let lenses = backend.enumerate_lenses(LensPosition::Back);
        assert_eq!(lenses.len(), 1);
        assert!(!lenses[0].has_torch);
        assert_eq!(lenses[0].resolutions, vec![Resolution::new(2, 2)]);
        assert!(backend.enumerate_lenses(LensPosition::Front).is_empty());
    }

    #[test]
    fn test_second_acquire_is_busy() {
        let mut backend = ReplayBackend::new(vec![frame()], 1);
        assert!(backend.acquire().is_ok());
        assert_eq!(backend.acquire(), Err(BackendError::Busy));
        backend.release();
        assert!(backend.acquire().is_ok());
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let result = load_image_as_frame(Path::new("notes.txt"));
        assert!(matches!(result, Err(BackendError::Other(_))));
    }
}
