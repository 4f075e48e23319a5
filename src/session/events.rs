// SPDX-License-Identifier: GPL-3.0-only

//! Events pushed to the host
//!
//! Workers emit from their own threads; the host drains an [`EventStream`]
//! on whatever context it delivers callbacks from. The emitter is gated by
//! session id: closing the gate is the point after which a session can no
//! longer produce events, and it waits for any emission in progress.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tracing::trace;
use uuid::Uuid;

/// Identifies one start/stop cycle
pub type SessionId = Uuid;

/// Event delivered to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A new frame is ready for the renderer to pull
    FrameAvailable,
    /// A debounced QR payload
    CodeRead(String),
    /// A non-fatal or session-ending failure
    Error(String),
}

/// Create a connected emitter/stream pair
pub fn event_channel() -> (EventEmitter, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let frame_pending = Arc::new(AtomicBool::new(false));
    let emitter = EventEmitter {
        inner: Arc::new(EmitterInner {
            gate: Mutex::new(None),
            tx,
            frame_pending: Arc::clone(&frame_pending),
        }),
    };
    let stream = EventStream { rx, frame_pending };
    (emitter, stream)
}

struct EmitterInner {
    /// Session currently allowed to emit
    gate: Mutex<Option<SessionId>>,
    tx: UnboundedSender<ScanEvent>,
    /// An undelivered FrameAvailable is queued
    frame_pending: Arc<AtomicBool>,
}

#[derive(Clone)]
pub struct EventEmitter {
    inner: Arc<EmitterInner>,
}

impl EventEmitter {
    /// Let `session` emit; any previous session is shut out
    pub fn open(&self, session: SessionId) {
        let mut gate = self.inner.gate.lock().unwrap_or_else(PoisonError::into_inner);
        *gate = Some(session);
        self.inner.frame_pending.store(false, Ordering::Release);
    }

    /// Shut the gate. Returns once no emission is in progress.
    pub fn close(&self) {
        let mut gate = self.inner.gate.lock().unwrap_or_else(PoisonError::into_inner);
        *gate = None;
    }

    /// Handle bound to one session
    pub fn scoped(&self, session: SessionId) -> SessionEmitter {
        SessionEmitter {
            emitter: self.clone(),
            session,
        }
    }

    fn emit(&self, session: SessionId, event: ScanEvent) -> bool {
        // Hold the gate across the send so close() waits for us
        let gate = self.inner.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if *gate != Some(session) {
            trace!(%session, ?event, "Dropping event from closed session");
            return false;
        }
        if event == ScanEvent::FrameAvailable
            && self.inner.frame_pending.swap(true, Ordering::AcqRel)
        {
            return false;
        }
        self.inner.tx.send(event).is_ok()
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter").finish_non_exhaustive()
    }
}

/// Emitter bound to a single session id
#[derive(Debug, Clone)]
pub struct SessionEmitter {
    emitter: EventEmitter,
    session: SessionId,
}

impl SessionEmitter {
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn frame_available(&self) -> bool {
        self.emitter.emit(self.session, ScanEvent::FrameAvailable)
    }

    pub fn code_read(&self, value: impl Into<String>) -> bool {
        self.emitter.emit(self.session, ScanEvent::CodeRead(value.into()))
    }

    pub fn error(&self, message: impl Into<String>) -> bool {
        self.emitter.emit(self.session, ScanEvent::Error(message.into()))
    }
}

/// Receiving side of the event channel
///
/// `recv` is for async hosts, `blocking_recv` for hosts with a dedicated
/// delivery thread (it panics inside an async context, as tokio's does).
#[derive(Debug)]
pub struct EventStream {
    rx: UnboundedReceiver<ScanEvent>,
    frame_pending: Arc<AtomicBool>,
}

impl EventStream {
    /// Wait for the next event. `None` once the controller is gone.
    pub async fn recv(&mut self) -> Option<ScanEvent> {
        let event = self.rx.recv().await;
        self.delivered(event)
    }

    /// Block the current thread for the next event
    pub fn blocking_recv(&mut self) -> Option<ScanEvent> {
        let event = self.rx.blocking_recv();
        self.delivered(event)
    }

    /// Next queued event, if any
    pub fn try_recv(&mut self) -> Option<ScanEvent> {
        match self.rx.try_recv() {
            Ok(event) => self.delivered(Some(event)),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Everything currently queued
    pub fn drain(&mut self) -> Vec<ScanEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    fn delivered(&self, event: Option<ScanEvent>) -> Option<ScanEvent> {
        if event == Some(ScanEvent::FrameAvailable) {
            self.frame_pending.store(false, Ordering::Release);
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_gate_drops_events() {
        let (emitter, mut stream) = event_channel();
        let session = Uuid::new_v4();
        let events = emitter.scoped(session);

        assert!(!events.code_read("early"));
        emitter.open(session);
        assert!(events.code_read("A"));
        emitter.close();
        assert!(!events.error("late"));

        assert_eq!(stream.drain(), vec![ScanEvent::CodeRead("A".into())]);
    }

    #[test]
    fn test_stale_session_cannot_emit() {
        let (emitter, mut stream) = event_channel();
        let old = emitter.scoped(Uuid::new_v4());
        emitter.open(old.session());
        let new_session = Uuid::new_v4();
        emitter.open(new_session);

        assert!(!old.code_read("stale"));
        assert!(emitter.scoped(new_session).code_read("fresh"));
        assert_eq!(stream.drain(), vec![ScanEvent::CodeRead("fresh".into())]);
    }

    #[test]
    fn test_frame_available_coalesced_until_delivered() {
        let (emitter, mut stream) = event_channel();
        let session = Uuid::new_v4();
        emitter.open(session);
        let events = emitter.scoped(session);

        assert!(events.frame_available());
        assert!(!events.frame_available());
        assert!(events.code_read("A"));

        assert_eq!(stream.try_recv(), Some(ScanEvent::FrameAvailable));
        assert!(events.frame_available());
        assert_eq!(
            stream.drain(),
            vec![ScanEvent::CodeRead("A".into()), ScanEvent::FrameAvailable]
        );
    }

    #[tokio::test]
    async fn test_async_recv() {
        let (emitter, mut stream) = event_channel();
        let session = Uuid::new_v4();
        emitter.open(session);
        emitter.scoped(session).error("boom");
        assert_eq!(stream.recv().await, Some(ScanEvent::Error("boom".into())));
    }
}
