// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - Replaying images through a full capture session
//! - One-shot decoding of images
//! - Printing the effective configuration

use qrcode_reading::backends::camera::{FrameSample, PixelFormat};
use qrcode_reading::backends::replay::{ReplayBackend, load_image_as_frame, replay_duration};
use qrcode_reading::frame_processor::{LumaImage, QrDecodeEngine, RegionOfInterest};
use qrcode_reading::{CaptureSessionController, ScanConfig, ScanEvent};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

/// Extra time allowed past the nominal replay length
const REPLAY_GRACE: Duration = Duration::from_secs(5);

/// Time left for the decode of the last frame to land before stopping
const DRAIN_DELAY: Duration = Duration::from_millis(250);

pub fn load_config(path: Option<&Path>) -> Result<ScanConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => ScanConfig::load(path)?,
        None => ScanConfig::default(),
    })
}

pub fn print_config(config: &ScanConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config.to_json_string()?);
    Ok(())
}

/// Replay images as camera frames and print every event of interest
pub fn replay(
    config: ScanConfig,
    files: &[PathBuf],
    passes: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend = ReplayBackend::from_paths(files, passes);
    let frame_count = backend.frame_count();
    if frame_count == 0 {
        println!("No readable images.");
        return Ok(());
    }
    let finished = backend.finished_flag();
    let deadline =
        Instant::now() + replay_duration(frame_count * passes.max(1) as usize) + REPLAY_GRACE;

    let (controller, mut events) = CaptureSessionController::new(Box::new(backend), config)?;
    let handle = controller.start(None, false)?;
    println!(
        "Replaying {} image(s) x {} on {}",
        frame_count,
        passes.max(1),
        handle.lens
    );
    println!();

    let mut codes = 0usize;
    while !finished.load(Ordering::Acquire) && Instant::now() < deadline {
        codes += print_events(events.drain());
        thread::sleep(Duration::from_millis(10));
    }
    thread::sleep(DRAIN_DELAY);
    codes += print_events(events.drain());

    let stats = controller.pump_stats();
    controller.stop();

    println!();
    if let Some(stats) = stats {
        println!(
            "Frames: {}  decoded: {}  skipped (decode busy): {}",
            stats.frames, stats.decode_submitted, stats.decode_skipped
        );
    }
    println!("{} code(s) read", codes);
    Ok(())
}

fn print_events(events: Vec<ScanEvent>) -> usize {
    let mut codes = 0;
    for event in events {
        match event {
            ScanEvent::CodeRead(value) => {
                codes += 1;
                println!("  {}", value);
            }
            ScanEvent::Error(message) => eprintln!("  error: {}", message),
            ScanEvent::FrameAvailable => {}
        }
    }
    codes
}

/// Decode each file once and print what was found
pub fn decode_files(
    config: &ScanConfig,
    files: &[PathBuf],
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = QrDecodeEngine::new();
    let region = config.decode_region.unwrap_or(RegionOfInterest::FULL);

    for path in files {
        let frame = match load_image_as_frame(path) {
            Ok(frame) => frame,
            Err(e) => {
                eprintln!("{}: {}", path.display(), e);
                continue;
            }
        };
        let sample = FrameSample::new(
            &frame.data,
            frame.width,
            frame.height,
            PixelFormat::RGBA,
            Duration::ZERO,
        );
        let Some(image) = LumaImage::from_frame(&sample, &region, config.max_decode_dimension)
        else {
            eprintln!("{}: empty image", path.display());
            continue;
        };

        match engine.decode(&image)? {
            Some(result) => println!("{}: {}", path.display(), result.value),
            None => println!("{}: no code found", path.display()),
        }
    }

    Ok(())
}
