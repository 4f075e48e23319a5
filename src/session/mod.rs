// SPDX-License-Identifier: GPL-3.0-only

//! Capture session controller
//!
//! [`CaptureSessionController`] is the only type the host talks to. It owns
//! the camera backend behind a single control mutex, which is the session
//! ownership token: every lifecycle operation and every lens switch runs
//! while holding it, so no two of them ever interleave. Per-frame work runs
//! on the backend's capture thread and on two workers (decode and quality)
//! that only read the lock-free session state.
//!
//! The quality worker asks for a lens switch with `try_lock`. If a lifecycle
//! operation holds the token it skips the switch rather than wait, which
//! keeps `stop()` free to join the workers while holding the token.

pub mod events;
pub mod lens_selector;
pub mod pump;
pub mod state;

pub use events::{EventEmitter, EventStream, ScanEvent, SessionEmitter, SessionId, event_channel};
pub use lens_selector::{LensSelector, RescueHistory, SwitchGuard, SwitchOutcome};
pub use pump::{FrameSink, PumpStats};
pub use state::{SessionState, StateCell};

use crate::backends::camera::{CameraBackend, FocalClass, LensDescriptor, LensPreference};
use crate::config::ScanConfig;
use crate::errors::{AcquisitionError, ScanError, ScanResult};
use crate::frame_processor::LensSwitchLatch;
use crate::torch::TorchController;
use lens_selector::{configure_lens, find_lens};
use pump::Pump;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Options for [`CaptureSessionController::start_with_options`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// Lens to open; the configured default when unset
    pub lens_preference: Option<LensPreference>,
    /// Turn the torch on as soon as the lens is attached
    pub torch_on: bool,
    /// Acquire the hardware but land in `Paused` without delivering frames
    pub start_paused: bool,
}

/// Returned by a successful start
#[derive(Debug, Clone, PartialEq)]
pub struct SessionHandle {
    pub id: SessionId,
    /// Lens the session started on
    pub lens: LensDescriptor,
}

/// Point-in-time view of the session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub session: Option<SessionId>,
    pub active_lens: Option<LensDescriptor>,
    pub is_torch_on: bool,
    pub last_decoded_value: Option<String>,
    pub last_decode_timestamp: Option<Instant>,
}

/// Hardware and per-session resources, guarded by the control mutex
struct Control {
    backend: Box<dyn CameraBackend>,
    torch: TorchController,
    active: Option<ActiveSession>,
}

struct ActiveSession {
    id: SessionId,
    events: SessionEmitter,
    lenses: Vec<LensDescriptor>,
    lens: LensDescriptor,
    history: RescueHistory,
    pump: Pump,
}

struct SessionCore {
    state: Arc<StateCell>,
    control: Mutex<Control>,
    emitter: EventEmitter,
    selector: LensSelector,
    config: ScanConfig,
}

pub struct CaptureSessionController {
    core: Arc<SessionCore>,
}

impl CaptureSessionController {
    /// Create a controller over `backend`
    ///
    /// Returns the controller and the stream its events are delivered on.
    pub fn new(
        backend: Box<dyn CameraBackend>,
        config: ScanConfig,
    ) -> ScanResult<(Self, EventStream)> {
        config.validate()?;
        let (emitter, stream) = event_channel();
        let latch = Arc::new(LensSwitchLatch::new());
        let core = SessionCore {
            state: Arc::new(StateCell::new(SessionState::Idle)),
            control: Mutex::new(Control {
                backend,
                torch: TorchController::new(),
                active: None,
            }),
            emitter,
            selector: LensSelector::new(&config, latch),
            config,
        };
        Ok((
            Self {
                core: Arc::new(core),
            },
            stream,
        ))
    }

    pub fn state(&self) -> SessionState {
        self.core.state.get()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.core.config
    }

    /// Start scanning
    ///
    /// Valid only from `Idle`. On an acquisition failure the session lands
    /// in `Error`, an `error` event is emitted and nothing is retried.
    pub fn start(
        &self,
        lens_preference: Option<LensPreference>,
        torch_on: bool,
    ) -> ScanResult<SessionHandle> {
        self.start_with_options(StartOptions {
            lens_preference,
            torch_on,
            start_paused: false,
        })
    }

    pub fn start_with_options(&self, options: StartOptions) -> ScanResult<SessionHandle> {
        let mut control = self.core.lock_control();
        let from = self.core.state.get();
        if from != SessionState::Idle {
            debug!(state = %from, "Ignoring start");
            return Err(ScanError::InvalidTransition {
                from,
                operation: "start",
            });
        }

        let id = Uuid::new_v4();
        self.core.emitter.open(id);
        let events = self.core.emitter.scoped(id);
        self.core.state.set(SessionState::Starting);
        info!(session = %id, ?options, "Starting capture session");

        match self.acquire(&mut control, id, &events, options) {
            Ok(handle) => {
                info!(
                    session = %id,
                    lens = %handle.lens,
                    state = %self.core.state.get(),
                    "Capture session started"
                );
                Ok(handle)
            }
            Err(e) => {
                warn!(
                    session = %id,
                    code = e.code(),
                    error = %e,
                    "Failed to start capture session"
                );
                events.error(format!("{}: {}", e.code(), e));
                self.core.teardown(&mut control);
                self.core.state.set(SessionState::Error);
                Err(e.into())
            }
        }
    }

    fn acquire(
        &self,
        control: &mut Control,
        id: SessionId,
        events: &SessionEmitter,
        options: StartOptions,
    ) -> Result<SessionHandle, AcquisitionError> {
        let core = &self.core;
        let lenses = core.selector.discover(control.backend.as_ref());
        let preference = options
            .lens_preference
            .unwrap_or(core.config.default_lens);
        let lens = core
            .selector
            .initial_lens(&lenses, preference)
            .ok_or(AcquisitionError::NoCamera)?;

        control.backend.acquire()?;
        control.backend.attach_input(&lens)?;
        configure_lens(control.backend.as_mut(), &lens, core.config.preview, events);

        let weak = Arc::downgrade(&self.core);
        let pump = Pump::spawn(
            &core.config,
            Arc::clone(&core.state),
            events.clone(),
            Arc::clone(core.selector.latch()),
            Box::new(move || SessionCore::on_lens_degraded(&weak, id)),
        )
        .map_err(|e| AcquisitionError::Backend(format!("Failed to spawn workers: {}", e)))?;
        let sink = pump.sink.clone();

        control.torch = TorchController::new();
        if options.torch_on {
            control
                .torch
                .set_torch(control.backend.as_mut(), &lens, true, events);
        }

        control.active = Some(ActiveSession {
            id,
            events: events.clone(),
            lenses,
            lens: lens.clone(),
            history: RescueHistory::default(),
            pump,
        });

        core.state.set(SessionState::Running);
        if options.start_paused {
            core.state.set(SessionState::Paused);
        } else {
            control.backend.start_delivery(sink)?;
        }

        Ok(SessionHandle { id, lens })
    }

    /// Stop frame delivery but keep the hardware
    ///
    /// Valid from `Running`; a no-op when already `Paused`.
    pub fn pause(&self) -> ScanResult<()> {
        let mut control = self.core.lock_control();
        match self.core.state.get() {
            SessionState::Running => {
                self.core.state.set(SessionState::Paused);
                control.backend.stop_delivery();
                info!("Capture session paused");
                Ok(())
            }
            SessionState::Paused => {
                debug!("Already paused");
                Ok(())
            }
            from => Err(ScanError::InvalidTransition {
                from,
                operation: "pause",
            }),
        }
    }

    /// Restart frame delivery without re-acquiring hardware
    ///
    /// Valid from `Paused`; a no-op when already `Running`. If delivery
    /// cannot restart the session stays `Paused`.
    pub fn resume(&self) -> ScanResult<()> {
        let mut control = self.core.lock_control();
        match self.core.state.get() {
            SessionState::Paused => {
                let Control {
                    backend, active, ..
                } = &mut *control;
                let Some(active) = active.as_ref() else {
                    return Err(ScanError::InvalidTransition {
                        from: SessionState::Paused,
                        operation: "resume",
                    });
                };
                self.core.state.set(SessionState::Running);
                if let Err(e) = backend.start_delivery(active.pump.sink.clone()) {
                    self.core.state.set(SessionState::Paused);
                    warn!(error = %e, "Failed to resume frame delivery");
                    active.events.error(format!("Failed to resume: {}", e));
                    return Err(e.into());
                }
                info!("Capture session resumed");
                Ok(())
            }
            SessionState::Running => {
                debug!("Already running");
                Ok(())
            }
            from => Err(ScanError::InvalidTransition {
                from,
                operation: "resume",
            }),
        }
    }

    /// Release every hardware and worker resource and return to `Idle`
    ///
    /// Idempotent. Teardown is complete when this returns, and no event
    /// of the stopped session is emitted afterwards.
    pub fn stop(&self) {
        let mut control = self.core.lock_control();
        let from = self.core.state.get();
        if from == SessionState::Idle {
            debug!("Already stopped");
            return;
        }

        self.core.state.set(SessionState::Stopping);
        info!(from = %from, "Stopping capture session");

        self.core.emitter.close();
        self.core.teardown(&mut control);

        self.core.state.set(SessionState::Idle);
        info!("Capture session stopped");
    }

    /// Turn the torch on or off. Ignored unless `Running`.
    pub fn set_torch(&self, on: bool) {
        let mut control = self.core.lock_control();
        if self.core.state.get() != SessionState::Running {
            debug!(on, state = %self.core.state.get(), "Ignoring torch request");
            return;
        }
        let Control {
            backend,
            torch,
            active,
        } = &mut *control;
        if let Some(active) = active.as_ref() {
            torch.set_torch(backend.as_mut(), &active.lens, on, &active.events);
        }
    }

    /// Move the session to a lens of the given focal class
    ///
    /// Ignored with [`SwitchOutcome::InProgress`] while another switch is
    /// executing.
    pub fn switch_lens(&self, class: FocalClass) -> ScanResult<SwitchOutcome> {
        let Some(guard) = self.core.selector.try_begin() else {
            debug!(%class, "Lens switch already in progress");
            return Ok(SwitchOutcome::InProgress);
        };
        let mut control = self.core.lock_control();
        let from = self.core.state.get();
        if from != SessionState::Running {
            return Err(ScanError::InvalidTransition {
                from,
                operation: "switch lens",
            });
        }
        let target = control
            .active
            .as_ref()
            .and_then(|active| find_lens(&active.lenses, class).cloned());
        let Some(target) = target else {
            debug!(%class, "No lens of requested class");
            return Ok(SwitchOutcome::Unavailable);
        };
        self.core.perform_switch(&mut control, &guard, target)
    }

    /// Report a fatal device fault (disconnect, platform error)
    ///
    /// While `Running` delivery stops, the session moves to `Error` and the
    /// reason is emitted; hardware is released by the following `stop()`.
    /// While `Paused` the reason is emitted and the session is torn down
    /// through `Stopping` to `Idle`.
    pub fn report_fault(&self, reason: &str) -> ScanResult<()> {
        let mut control = self.core.lock_control();
        let from = self.core.state.get();
        match from {
            SessionState::Running => {
                error!(reason, "Capture device fault");
                self.core.state.set(SessionState::Error);
                control.backend.stop_delivery();
                if let Some(active) = control.active.as_ref() {
                    active.events.error(reason);
                }
                Ok(())
            }
            SessionState::Paused => {
                error!(reason, "Capture device fault while paused, stopping session");
                if let Some(active) = control.active.as_ref() {
                    active.events.error(reason);
                }
                self.core.state.set(SessionState::Stopping);
                self.core.emitter.close();
                self.core.teardown(&mut control);
                self.core.state.set(SessionState::Idle);
                Ok(())
            }
            from => Err(ScanError::InvalidTransition {
                from,
                operation: "report fault",
            }),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let control = self.core.lock_control();
        let active = control.active.as_ref();
        let last = active.and_then(|a| a.pump.last_decode());
        SessionSnapshot {
            state: self.core.state.get(),
            session: active.map(|a| a.id),
            active_lens: active.map(|a| a.lens.clone()),
            is_torch_on: control.torch.is_on(),
            last_decoded_value: last.as_ref().map(|r| r.value.clone()),
            last_decode_timestamp: last.map(|r| r.timestamp),
        }
    }

    /// Frame counters of the running session
    pub fn pump_stats(&self) -> Option<PumpStats> {
        let control = self.core.lock_control();
        control.active.as_ref().map(|a| a.pump.sink.stats())
    }
}

impl Drop for CaptureSessionController {
    fn drop(&mut self) {
        self.stop();
    }
}

impl SessionCore {
    fn lock_control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop delivery and workers, turn the torch off and release hardware
    ///
    /// Safe to run on partially started or already torn down sessions.
    fn teardown(&self, control: &mut Control) {
        control.backend.stop_delivery();
        if let Some(mut active) = control.active.take() {
            active.pump.shutdown();
        }
        control.torch.shutdown(control.backend.as_mut());
        control.backend.detach_input();
        control.backend.release();
    }

    /// Quality worker callback for a degraded lens
    fn on_lens_degraded(core: &Weak<SessionCore>, session: SessionId) {
        let Some(core) = core.upgrade() else {
            return;
        };
        let Some(guard) = core.selector.try_begin() else {
            debug!("Lens switch already in progress");
            core.selector.latch().rearm();
            return;
        };
        let mut control = match core.control.try_lock() {
            Ok(control) => control,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                debug!("Session busy, skipping rescue switch");
                return;
            }
        };
        if core.state.get() != SessionState::Running {
            return;
        }

        let Control { active, .. } = &mut *control;
        let Some(active) = active.as_mut().filter(|a| a.id == session) else {
            return;
        };
        if active.pump.decoded_since_switch.swap(false, Ordering::AcqRel) {
            active.history.clear();
        }
        active.history.mark_tried(&active.lens);
        let target = core
            .selector
            .next_rescue_lens(&active.lenses, &active.lens, &active.history);
        let Some(target) = target else {
            debug!(lens = %active.lens.id, "Every lens tried since the last decode, staying");
            return;
        };

        if let Err(e) = core.perform_switch(&mut control, &guard, target) {
            debug!(error = %e, "Rescue switch failed");
        }
    }

    fn perform_switch(
        &self,
        control: &mut Control,
        guard: &SwitchGuard<'_>,
        target: LensDescriptor,
    ) -> ScanResult<SwitchOutcome> {
        let Control {
            backend,
            torch,
            active,
        } = control;
        let Some(active) = active.as_mut() else {
            return Ok(SwitchOutcome::NoCandidate);
        };
        active.history.mark_tried(&target);

        let outcome = self.selector.switch_lens(
            guard,
            backend.as_mut(),
            &active.lens,
            &target,
            &active.pump.sink,
            &active.events,
        );
        match outcome {
            Ok(SwitchOutcome::Switched(lens)) => {
                active.lens = lens.clone();
                active.pump.lens_switched();
                torch.on_lens_changed(backend.as_mut(), &active.lens, &active.events);
                Ok(SwitchOutcome::Switched(lens))
            }
            Ok(SwitchOutcome::Rejected) => {
                torch.on_lens_changed(backend.as_mut(), &active.lens, &active.events);
                Ok(SwitchOutcome::Rejected)
            }
            Ok(other) => Ok(other),
            Err(e) => {
                error!(error = %e, "Lens switch left the session without input");
                self.state.set(SessionState::Error);
                active.events.error(format!("Lens switch failed: {}", e));
                Err(e.into())
            }
        }
    }
}
