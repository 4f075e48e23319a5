// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the image replay backend

mod common;

use common::*;
use qrcode_reading::backends::replay::{ReplayBackend, ReplayFrame};
use qrcode_reading::{CaptureSessionController, ScanConfig, ScanEvent, SessionState};
use std::sync::Arc;
use std::sync::atomic::Ordering;

fn qr_replay_frame() -> ReplayFrame {
    let (gray, side) = qr_frame(6);
    ReplayFrame {
        data: Arc::from(to_rgba(&gray).into_boxed_slice()),
        width: side,
        height: side,
    }
}

#[test]
fn test_replayed_rgba_frames_are_decoded() {
    let backend = ReplayBackend::new(vec![qr_replay_frame()], 3);
    let finished = backend.finished_flag();
    let (controller, mut events) =
        CaptureSessionController::new(Box::new(backend), ScanConfig::default()).unwrap();

    controller.start(None, false).unwrap();
    let (found, _) = wait_for_event(&mut events, WAIT, |e| matches!(e, ScanEvent::CodeRead(_)));
    assert_eq!(found, Some(ScanEvent::CodeRead(FIXTURE_TEXT.into())));

    assert!(wait_until(WAIT, || finished.load(Ordering::Acquire)));
    controller.stop();
    assert_eq!(controller.state(), SessionState::Idle);
}

#[test]
fn test_replay_without_frames_has_no_camera() {
    let backend = ReplayBackend::new(Vec::new(), 1);
    let (controller, _events) =
        CaptureSessionController::new(Box::new(backend), ScanConfig::default()).unwrap();

    let result = controller.start(None, false);
    assert!(result.is_err());
    assert_eq!(controller.state(), SessionState::Error);
}

#[test]
fn test_replay_can_pause_and_resume() {
    let backend = ReplayBackend::new(vec![qr_replay_frame()], 1000);
    let (controller, _events) =
        CaptureSessionController::new(Box::new(backend), ScanConfig::default()).unwrap();

    controller.start(None, false).unwrap();
    assert!(wait_until(WAIT, || {
        controller.pump_stats().map(|s| s.frames).unwrap_or(0) > 0
    }));

    controller.pause().unwrap();
    let paused_at = controller.pump_stats().map(|s| s.frames);
    std::thread::sleep(std::time::Duration::from_millis(100));
    assert_eq!(controller.pump_stats().map(|s| s.frames), paused_at);

    controller.resume().unwrap();
    let resumed_from = paused_at.unwrap_or(0);
    assert!(wait_until(WAIT, || {
        controller.pump_stats().map(|s| s.frames).unwrap_or(0) > resumed_from
    }));
}
