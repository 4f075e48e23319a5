// SPDX-License-Identifier: GPL-3.0-only

//! Frame pump
//!
//! The backend calls [`FrameSink::on_frame`] from its capture thread. The
//! sink signals the renderer, copies what the workers need out of the
//! borrowed frame and hands the copies over without ever blocking:
//!
//! - the quality window goes into a small bounded queue, dropped when full
//! - the decode copy is only made when no decode is in flight
//!
//! Decode copies carry the lens generation they were taken under. A result
//! that finishes after a lens switch belongs to the old lens and is dropped.

use crate::backends::camera::FrameSample;
use crate::config::ScanConfig;
use crate::constants::workers::{DECODE_WORKER_NAME, POLL_INTERVAL, QUALITY_WORKER_NAME};
use crate::errors::DecodeError;
use crate::frame_processor::{
    DecodeResult, FrameQualityMonitor, LensSwitchLatch, LoopAction, LumaImage, QrDecodeEngine,
    QualitySample, RegionOfInterest, ResultDebouncer, WorkerLoop,
};
use crate::session::events::SessionEmitter;
use crate::session::state::StateCell;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, trace};

/// Counters kept by the frame sink
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PumpStats {
    /// Frames accepted while running
    pub frames: u64,
    /// Frames handed to the decode worker
    pub decode_submitted: u64,
    /// Frames skipped for decoding because a decode was in flight
    pub decode_skipped: u64,
    /// Quality samples dropped on a full queue
    pub quality_dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    frames: AtomicU64,
    decode_submitted: AtomicU64,
    decode_skipped: AtomicU64,
    quality_dropped: AtomicU64,
}

/// Luminance copy queued for the decode worker
struct DecodeJob {
    image: LumaImage,
    /// Lens generation the frame was captured under
    generation: u64,
}

struct SinkShared {
    state: Arc<StateCell>,
    events: SessionEmitter,
    decode_tx: SyncSender<DecodeJob>,
    lens_generation: Arc<AtomicU64>,
    decode_in_flight: Arc<AtomicBool>,
    quality_tx: SyncSender<QualitySample>,
    decode_region: RegionOfInterest,
    max_decode_dimension: u32,
    quality_window: u32,
    counters: Counters,
}

/// Entry point for frames from the backend
///
/// Cheap to clone; every clone feeds the same session. Once the session
/// leaves `Running` every call is a no-op, so a backend that delivers a
/// late frame after `stop()` has begun does no harm.
#[derive(Clone)]
pub struct FrameSink {
    shared: Arc<SinkShared>,
}

impl FrameSink {
    /// Process one borrowed frame. Never blocks.
    pub fn on_frame(&self, frame: &FrameSample<'_>) {
        let shared = &*self.shared;
        if !shared.state.get().accepts_frames() {
            trace!("Discarding frame, session not running");
            return;
        }
        if !frame.is_complete() {
            trace!(
                width = frame.width,
                height = frame.height,
                len = frame.data.len(),
                "Discarding incomplete frame"
            );
            return;
        }
        shared.counters.frames.fetch_add(1, Ordering::Relaxed);

        shared.events.frame_available();

        if let Some(sample) = QualitySample::capture(frame, shared.quality_window)
            && shared.quality_tx.try_send(sample).is_err()
        {
            shared.counters.quality_dropped.fetch_add(1, Ordering::Relaxed);
        }

        if shared
            .decode_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            shared.counters.decode_skipped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let generation = shared.lens_generation.load(Ordering::Acquire);
        let submitted =
            LumaImage::from_frame(frame, &shared.decode_region, shared.max_decode_dimension)
                .map(|image| shared.decode_tx.try_send(DecodeJob { image, generation }).is_ok())
                .unwrap_or(false);
        if submitted {
            shared.counters.decode_submitted.fetch_add(1, Ordering::Relaxed);
        } else {
            shared.decode_in_flight.store(false, Ordering::Release);
        }
    }

    pub fn stats(&self) -> PumpStats {
        let c = &self.shared.counters;
        PumpStats {
            frames: c.frames.load(Ordering::Relaxed),
            decode_submitted: c.decode_submitted.load(Ordering::Relaxed),
            decode_skipped: c.decode_skipped.load(Ordering::Relaxed),
            quality_dropped: c.quality_dropped.load(Ordering::Relaxed),
        }
    }

    /// True while a decode is queued or running
    pub fn decode_in_flight(&self) -> bool {
        self.shared.decode_in_flight.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for FrameSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSink")
            .field("session", &self.shared.events.session())
            .finish_non_exhaustive()
    }
}

/// Called on the quality worker when the lens is degraded
pub(crate) type DegradedHandler = Box<dyn Fn() + Send>;

/// Sink plus the two workers behind it, for one session
pub(crate) struct Pump {
    pub sink: FrameSink,
    /// Last emitted code
    pub last_decode: Arc<Mutex<Option<DecodeResult>>>,
    /// Set by a successful decode on the current lens
    pub decoded_since_switch: Arc<AtomicBool>,
    lens_generation: Arc<AtomicU64>,
    decode_worker: WorkerLoop,
    quality_worker: WorkerLoop,
}

impl Pump {
    pub fn spawn(
        config: &ScanConfig,
        state: Arc<StateCell>,
        events: SessionEmitter,
        latch: Arc<LensSwitchLatch>,
        on_degraded: DegradedHandler,
    ) -> io::Result<Self> {
        let (decode_tx, decode_rx) = mpsc::sync_channel(1);
        let (quality_tx, quality_rx) = mpsc::sync_channel(config.quality_queue_depth);
        let decode_in_flight = Arc::new(AtomicBool::new(false));
        let last_decode = Arc::new(Mutex::new(None));
        let decoded_since_switch = Arc::new(AtomicBool::new(false));
        let lens_generation = Arc::new(AtomicU64::new(0));

        let decoder = DecodeContext {
            rx: decode_rx,
            engine: QrDecodeEngine::new(),
            debouncer: ResultDebouncer::new(config.debounce_interval()),
            in_flight: Arc::clone(&decode_in_flight),
            state: Arc::clone(&state),
            events: events.clone(),
            last_decode: Arc::clone(&last_decode),
            decoded_since_switch: Arc::clone(&decoded_since_switch),
            lens_generation: Arc::clone(&lens_generation),
        };
        let decode_worker = WorkerLoop::start_with_init(
            DECODE_WORKER_NAME,
            move || Ok(decoder),
            |decoder: &mut DecodeContext| decoder.poll(),
        )?;

        let monitor_config = config.clone();
        let auto_switch = config.auto_lens_switch;
        let quality_state = Arc::clone(&state);
        let quality_latch = Arc::clone(&latch);
        let quality_worker = WorkerLoop::start_with_init(
            QUALITY_WORKER_NAME,
            move || {
                Ok(QualityContext {
                    rx: quality_rx,
                    monitor: FrameQualityMonitor::new(&monitor_config, Arc::clone(&quality_latch)),
                    latch: quality_latch,
                    state: quality_state,
                    auto_switch,
                    on_degraded,
                })
            },
            |quality: &mut QualityContext| quality.poll(),
        )?;

        let sink = FrameSink {
            shared: Arc::new(SinkShared {
                state,
                events,
                decode_tx,
                lens_generation: Arc::clone(&lens_generation),
                decode_in_flight,
                quality_tx,
                decode_region: config.decode_region.unwrap_or(RegionOfInterest::FULL),
                max_decode_dimension: config.max_decode_dimension,
                quality_window: config.quality_window,
                counters: Counters::default(),
            }),
        };

        Ok(Self {
            sink,
            last_decode,
            decoded_since_switch,
            lens_generation,
            decode_worker,
            quality_worker,
        })
    }

    pub fn last_decode(&self) -> Option<DecodeResult> {
        self.last_decode
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Start a new lens generation after the input moved to another lens
    ///
    /// Decodes still in flight for the previous lens are dropped and no
    /// longer count as a decode since the switch.
    pub fn lens_switched(&self) {
        self.lens_generation.fetch_add(1, Ordering::AcqRel);
        self.decoded_since_switch.store(false, Ordering::Release);
    }

    /// Stop both workers and wait for them
    pub fn shutdown(&mut self) {
        self.decode_worker.request_stop();
        self.quality_worker.request_stop();
        self.decode_worker.join();
        self.quality_worker.join();
        debug!(stats = ?self.sink.stats(), "Frame pump stopped");
    }
}

struct DecodeContext {
    rx: Receiver<DecodeJob>,
    engine: QrDecodeEngine,
    debouncer: ResultDebouncer,
    in_flight: Arc<AtomicBool>,
    state: Arc<StateCell>,
    events: SessionEmitter,
    last_decode: Arc<Mutex<Option<DecodeResult>>>,
    decoded_since_switch: Arc<AtomicBool>,
    lens_generation: Arc<AtomicU64>,
}

impl DecodeContext {
    fn poll(&mut self) -> LoopAction {
        match self.rx.recv_timeout(POLL_INTERVAL) {
            Ok(job) => {
                self.handle(job);
                LoopAction::Continue
            }
            Err(RecvTimeoutError::Timeout) => LoopAction::Continue,
            Err(RecvTimeoutError::Disconnected) => LoopAction::Stop,
        }
    }

    fn handle(&mut self, job: DecodeJob) {
        let outcome = self.engine.decode(&job.image);
        self.in_flight.store(false, Ordering::Release);

        // Leaving Running cancels in-flight work
        if !self.state.get().accepts_frames() {
            trace!("Discarding decode result, session not running");
            return;
        }
        let current = self.lens_generation.load(Ordering::Acquire);
        if job.generation != current {
            trace!(
                generation = job.generation,
                current,
                "Discarding decode result from previous lens"
            );
            return;
        }

        match outcome {
            Ok(Some(result)) => {
                self.decoded_since_switch.store(true, Ordering::Release);
                if !self.debouncer.offer(&result) {
                    return;
                }
                *self.last_decode.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(result.clone());
                self.events.code_read(result.value);
            }
            Ok(None) => {}
            Err(e @ DecodeError::MalformedFrame { .. }) => {
                debug!(error = %e, "Skipping frame");
            }
            Err(e) => {
                error!(error = %e, "QR decoder fault");
                self.events.error(e.to_string());
            }
        }
    }
}

struct QualityContext {
    rx: Receiver<QualitySample>,
    monitor: FrameQualityMonitor,
    latch: Arc<LensSwitchLatch>,
    state: Arc<StateCell>,
    auto_switch: bool,
    on_degraded: DegradedHandler,
}

impl QualityContext {
    fn poll(&mut self) -> LoopAction {
        match self.rx.recv_timeout(POLL_INTERVAL) {
            Ok(sample) => {
                self.handle(&sample);
                LoopAction::Continue
            }
            Err(RecvTimeoutError::Timeout) => LoopAction::Continue,
            Err(RecvTimeoutError::Disconnected) => LoopAction::Stop,
        }
    }

    fn handle(&mut self, sample: &QualitySample) {
        if !self.state.get().accepts_frames() {
            return;
        }
        let outcome = self.monitor.observe(sample);
        trace!(
            edge_count = outcome.score.edge_count,
            edge_ratio = outcome.score.edge_ratio(),
            run = self.monitor.consecutive_low_quality_frames(),
            "Frame quality"
        );
        if !outcome.lens_degraded {
            return;
        }
        if self.auto_switch {
            (self.on_degraded)();
        } else {
            debug!("Lens degraded, automatic switching disabled");
            self.latch.rearm();
        }
    }
}
