// SPDX-License-Identifier: GPL-3.0-only

//! Shared test tooling: a scripted camera backend and frame fixtures

#![allow(dead_code)]

use qrcode_reading::backends::camera::{
    BackendError, BackendResult, CameraBackend, FocalClass, FrameSample, LensDescriptor,
    LensPosition, LensSettings, PixelFormat, Resolution, ZoomRange,
};
use qrcode_reading::session::{EventStream, FrameSink, ScanEvent};
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub const WAIT: Duration = Duration::from_secs(5);

/// Hardware call recorded by the fake backend
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Acquire,
    Release,
    Attach(String),
    Detach,
    Lock,
    Unlock,
    Apply(LensSettings),
    Torch(bool),
    StartDelivery,
    StopDelivery,
}

#[derive(Default)]
struct FakeState {
    calls: Vec<Call>,
    sink: Option<FrameSink>,
    acquire_error: Option<BackendError>,
    attach_errors: HashMap<String, BackendError>,
    unavailable: Vec<String>,
    lock_error: Option<BackendError>,
    attached: Option<String>,
    torch_on: bool,
}

#[derive(Default)]
struct GateState {
    armed: bool,
    entered: bool,
    open: bool,
}

/// Holds the next `attach_input` until opened
#[derive(Default)]
pub struct AttachGate {
    state: Mutex<GateState>,
    cv: Condvar,
}

impl AttachGate {
    fn pass(&self) {
        let mut state = self.state.lock().unwrap();
        if !state.armed {
            return;
        }
        state.entered = true;
        self.cv.notify_all();
        while !state.open {
            state = self.cv.wait(state).unwrap();
        }
        state.armed = false;
    }

    /// Wait until an attach is parked at the gate
    pub fn wait_entered(&self, timeout: Duration) -> bool {
        let state = self.state.lock().unwrap();
        let (state, _) = self
            .cv
            .wait_timeout_while(state, timeout, |s| !s.entered)
            .unwrap();
        state.entered
    }

    pub fn open(&self) {
        self.state.lock().unwrap().open = true;
        self.cv.notify_all();
    }
}

/// Test-side view of a [`FakeBackend`]
#[derive(Clone)]
pub struct FakeHandle {
    state: Arc<Mutex<FakeState>>,
    gate: Arc<AttachGate>,
}

impl FakeHandle {
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn attached(&self) -> Option<String> {
        self.state.lock().unwrap().attached.clone()
    }

    pub fn torch_on(&self) -> bool {
        self.state.lock().unwrap().torch_on
    }

    /// The sink handed over by the last `start_delivery`, if still delivering
    pub fn sink(&self) -> Option<FrameSink> {
        self.state.lock().unwrap().sink.clone()
    }

    pub fn is_delivering(&self) -> bool {
        self.state.lock().unwrap().sink.is_some()
    }

    pub fn fail_acquire(&self, error: BackendError) {
        self.state.lock().unwrap().acquire_error = Some(error);
    }

    pub fn reject_attach(&self, lens_id: &str, error: BackendError) {
        self.state
            .lock()
            .unwrap()
            .attach_errors
            .insert(lens_id.to_string(), error);
    }

    pub fn make_unavailable(&self, lens_id: &str) {
        self.state.lock().unwrap().unavailable.push(lens_id.to_string());
    }

    pub fn fail_lock(&self, error: Option<BackendError>) {
        self.state.lock().unwrap().lock_error = error;
    }

    /// Park the next `attach_input` until the returned gate is opened
    pub fn block_next_attach(&self) -> Arc<AttachGate> {
        *self.gate.state.lock().unwrap() = GateState {
            armed: true,
            entered: false,
            open: false,
        };
        Arc::clone(&self.gate)
    }

    /// Deliver a frame the way a capture thread would. Returns false when
    /// no delivery is running.
    pub fn push(&self, frame: &FrameSample<'_>) -> bool {
        let sink = self.state.lock().unwrap().sink.clone();
        match sink {
            Some(sink) => {
                sink.on_frame(frame);
                true
            }
            None => false,
        }
    }

    /// Push a frame and wait for its decode to finish
    pub fn push_and_settle(&self, frame: &FrameSample<'_>) -> bool {
        let sink = self.state.lock().unwrap().sink.clone();
        let Some(sink) = sink else {
            return false;
        };
        sink.on_frame(frame);
        wait_until(WAIT, || !sink.decode_in_flight())
    }
}

pub struct FakeBackend {
    lenses: Vec<LensDescriptor>,
    handle: FakeHandle,
}

impl FakeBackend {
    pub fn new(lenses: Vec<LensDescriptor>) -> (Self, FakeHandle) {
        let handle = FakeHandle {
            state: Arc::new(Mutex::new(FakeState::default())),
            gate: Arc::new(AttachGate::default()),
        };
        (
            Self {
                lenses,
                handle: handle.clone(),
            },
            handle,
        )
    }

    fn record(&self, call: Call) {
        self.handle.state.lock().unwrap().calls.push(call);
    }
}

impl CameraBackend for FakeBackend {
    fn enumerate_lenses(&self, position: LensPosition) -> Vec<LensDescriptor> {
        self.lenses
            .iter()
            .filter(|l| l.position == position)
            .cloned()
            .collect()
    }

    fn is_lens_available(&self, lens: &LensDescriptor) -> bool {
        !self.handle.state.lock().unwrap().unavailable.contains(&lens.id)
    }

    fn acquire(&mut self) -> BackendResult<()> {
        let error = self.handle.state.lock().unwrap().acquire_error.clone();
        if let Some(error) = error {
            return Err(error);
        }
        self.record(Call::Acquire);
        Ok(())
    }

    fn release(&mut self) {
        self.record(Call::Release);
    }

    fn attach_input(&mut self, lens: &LensDescriptor) -> BackendResult<()> {
        self.handle.gate.pass();
        let mut state = self.handle.state.lock().unwrap();
        if let Some(error) = state.attach_errors.get(&lens.id) {
            return Err(error.clone());
        }
        state.calls.push(Call::Attach(lens.id.clone()));
        state.attached = Some(lens.id.clone());
        Ok(())
    }

    fn detach_input(&mut self) {
        let mut state = self.handle.state.lock().unwrap();
        state.calls.push(Call::Detach);
        state.attached = None;
        state.torch_on = false;
    }

    fn lock_configuration(&mut self) -> BackendResult<()> {
        let mut state = self.handle.state.lock().unwrap();
        if let Some(error) = state.lock_error.clone() {
            return Err(error);
        }
        state.calls.push(Call::Lock);
        Ok(())
    }

    fn unlock_configuration(&mut self) {
        self.record(Call::Unlock);
    }

    fn apply_settings(&mut self, settings: &LensSettings) -> BackendResult<()> {
        self.record(Call::Apply(*settings));
        Ok(())
    }

    fn set_torch_mode(&mut self, on: bool) -> BackendResult<()> {
        let mut state = self.handle.state.lock().unwrap();
        state.calls.push(Call::Torch(on));
        state.torch_on = on;
        Ok(())
    }

    fn start_delivery(&mut self, sink: FrameSink) -> BackendResult<()> {
        let mut state = self.handle.state.lock().unwrap();
        state.calls.push(Call::StartDelivery);
        state.sink = Some(sink);
        Ok(())
    }

    fn stop_delivery(&mut self) {
        let mut state = self.handle.state.lock().unwrap();
        state.calls.push(Call::StopDelivery);
        state.sink = None;
    }
}

pub fn lens(id: &str, class: FocalClass, has_torch: bool) -> LensDescriptor {
    LensDescriptor {
        id: id.to_string(),
        name: id.to_string(),
        position: LensPosition::Back,
        focal_class: class,
        has_torch,
        resolutions: vec![Resolution::new(1920, 1080), Resolution::new(1280, 720)],
        zoom: ZoomRange { min: 1.0, max: 8.0 },
    }
}

/// Standard (torch), wide (no torch), ultra-wide (torch)
pub fn rear_lenses() -> Vec<LensDescriptor> {
    vec![
        lens("main", FocalClass::Standard, true),
        lens("wide", FocalClass::Wide, false),
        lens("ultra", FocalClass::UltraWide, true),
    ]
}

// ===== Frames =====

pub const FRAME_SIDE: u32 = 64;

/// Uniform mid-grey: no edge pixels anywhere
pub fn flat_frame() -> Vec<u8> {
    vec![128; (FRAME_SIDE * FRAME_SIDE) as usize]
}

pub fn gray(data: &[u8], side: u32) -> FrameSample<'_> {
    FrameSample::new(data, side, side, PixelFormat::Gray8, Duration::ZERO)
}

/// Version 1-L byte-mode symbol for "qrcode_reading", mask pattern 0
pub const FIXTURE_TEXT: &str = "qrcode_reading";
const FIXTURE_MODULES: [&str; 21] = [
    "#######...#.#.#######",
    "#.....#.....#.#.....#",
    "#.###.#.#.#...#.###.#",
    "#.###.#.....#.#.###.#",
    "#.###.#..#..#.#.###.#",
    "#.....#..###..#.....#",
    "#######.#.#.#.#######",
    "........#.#.#........",
    "###.#####.#####...#..",
    ".#...#..#.####..##..#",
    "#####.###..##..##..##",
    "..####.#...##...#....",
    "..#.###..###...#....#",
    "........##.##....#..#",
    "#######.##.#######.##",
    "#.....#.##.........##",
    "#.###.#.###....##..#.",
    "#.###.#...####.##.##.",
    "#.###.#.#..#######..#",
    "#.....#.#..#...#...#.",
    "#######.#####..##..##",
];

/// Render the fixture as a square 8-bit image with a 4-module quiet zone
///
/// Returns the pixels and the side length.
pub fn qr_frame(module_px: u32) -> (Vec<u8>, u32) {
    let modules = FIXTURE_MODULES.len() as u32;
    let side = (modules + 8) * module_px;
    let mut data = vec![255u8; (side * side) as usize];
    for (my, row) in FIXTURE_MODULES.iter().enumerate() {
        for (mx, cell) in row.bytes().enumerate() {
            if cell != b'#' {
                continue;
            }
            let x0 = (mx as u32 + 4) * module_px;
            let y0 = (my as u32 + 4) * module_px;
            for y in y0..y0 + module_px {
                for x in x0..x0 + module_px {
                    data[(y * side + x) as usize] = 0;
                }
            }
        }
    }
    (data, side)
}

/// Expand an 8-bit image to RGBA
pub fn to_rgba(gray: &[u8]) -> Vec<u8> {
    gray.iter().flat_map(|&v| [v, v, v, 255]).collect()
}

// ===== Waiting =====

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Wait for the first event matching `predicate`, collecting everything seen
pub fn wait_for_event(
    events: &mut EventStream,
    timeout: Duration,
    mut predicate: impl FnMut(&ScanEvent) -> bool,
) -> (Option<ScanEvent>, Vec<ScanEvent>) {
    let deadline = Instant::now() + timeout;
    let mut seen = Vec::new();
    loop {
        while let Some(event) = events.try_recv() {
            if predicate(&event) {
                return (Some(event), seen);
            }
            seen.push(event);
        }
        if Instant::now() >= deadline {
            return (None, seen);
        }
        thread::sleep(Duration::from_millis(2));
    }
}

pub fn codes(events: &[ScanEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ScanEvent::CodeRead(v) => Some(v.clone()),
            _ => None,
        })
        .collect()
}

pub fn errors(events: &[ScanEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ScanEvent::Error(m) => Some(m.clone()),
            _ => None,
        })
        .collect()
}
