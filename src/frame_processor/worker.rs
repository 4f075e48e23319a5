// SPDX-License-Identifier: GPL-3.0-only
//! Worker thread lifecycle
//!
//! The decode and quality workers share one shape: a named thread running a
//! closure until it asks to stop or the owner raises the stop signal. The
//! owner joins the thread on `stop()` so teardown is complete when it
//! returns.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Returned by a worker iteration to control the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Run another iteration
    Continue,
    /// Leave the loop
    Stop,
}

/// Handle to a worker loop running on its own thread
///
/// Iterations are expected to block for a bounded time (for example a
/// `recv_timeout` on the job queue) so the stop signal is observed
/// promptly.
///
/// # Example
///
/// ```ignore
/// let mut worker = WorkerLoop::start("qr-decode", move || {
///     match jobs.recv_timeout(POLL_INTERVAL) {
///         Ok(job) => {
///             handle(job);
///             LoopAction::Continue
///         }
///         Err(RecvTimeoutError::Timeout) => LoopAction::Continue,
///         Err(RecvTimeoutError::Disconnected) => LoopAction::Stop,
///     }
/// })?;
///
/// worker.stop();
/// ```
pub struct WorkerLoop {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl WorkerLoop {
    /// Spawn a named worker thread running `loop_fn` until it returns
    /// [`LoopAction::Stop`] or [`WorkerLoop::stop`] is called
    pub fn start<F>(name: &str, mut loop_fn: F) -> io::Result<Self>
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        Self::start_with_init(name, || Ok(()), move |_: &mut ()| loop_fn())
    }

    /// Spawn a worker whose state is built on the worker thread itself
    ///
    /// If `init_fn` fails the thread exits without running the loop.
    pub fn start_with_init<S, I, F>(name: &str, init_fn: I, mut loop_fn: F) -> io::Result<Self>
    where
        S: 'static,
        I: FnOnce() -> Result<S, String> + Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop_signal);
        let thread_name = name.to_string();

        debug!(name, "Starting worker");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut state = match init_fn() {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(name = %thread_name, error = %e, "Worker initialization failed");
                        return;
                    }
                };

                loop {
                    if thread_stop.load(Ordering::SeqCst) {
                        debug!(name = %thread_name, "Stop signal received");
                        break;
                    }
                    if loop_fn(&mut state) == LoopAction::Stop {
                        debug!(name = %thread_name, "Worker requested stop");
                        break;
                    }
                }

                debug!(name = %thread_name, "Worker exiting");
            })?;

        info!(name, "Worker started");

        Ok(Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        })
    }

    /// Check if the thread is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop without waiting
    pub fn request_stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Signal the loop to stop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without signalling it
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if thread::current().id() == handle.thread().id() {
                // Last owner dropped on the worker itself; it exits on its own
                return;
            }
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Worker thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Worker finished");
            }
        }
    }
}

impl Drop for WorkerLoop {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "WorkerLoop dropped, stopping");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    #[test]
    fn test_loop_stops_itself() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut worker = WorkerLoop::start("test-worker", move || {
            if counter_clone.fetch_add(1, Ordering::SeqCst) >= 10 {
                LoopAction::Stop
            } else {
                LoopAction::Continue
            }
        })
        .unwrap();

        worker.join();
        assert_eq!(counter.load(Ordering::SeqCst), 11);
        assert!(!worker.is_running());
    }

    #[test]
    fn test_stop_joins_thread() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut worker = WorkerLoop::start("test-worker", move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            LoopAction::Continue
        })
        .unwrap();

        thread::sleep(Duration::from_millis(30));
        worker.stop();

        let after_stop = counter.load(Ordering::SeqCst);
        assert!(after_stop > 0);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(counter.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_init_state_reaches_loop() {
        let seen = Arc::new(AtomicU32::new(0));
        let seen_clone = Arc::clone(&seen);

        let mut worker = WorkerLoop::start_with_init(
            "test-init",
            || Ok(42u32),
            move |state| {
                seen_clone.store(*state, Ordering::SeqCst);
                LoopAction::Stop
            },
        )
        .unwrap();

        worker.join();
        assert_eq!(seen.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_failed_init_skips_loop() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);

        let mut worker = WorkerLoop::start_with_init(
            "test-fail-init",
            || Err::<(), _>("no decoder".to_string()),
            move |_: &mut ()| {
                ran_clone.store(true, Ordering::SeqCst);
                LoopAction::Stop
            },
        )
        .unwrap();

        worker.join();
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_thread_is_named() {
        let name = Arc::new(std::sync::Mutex::new(None));
        let name_clone = Arc::clone(&name);

        let mut worker = WorkerLoop::start("named-worker", move || {
            *name_clone.lock().unwrap() = thread::current().name().map(str::to_string);
            LoopAction::Stop
        })
        .unwrap();

        worker.join();
        assert_eq!(name.lock().unwrap().as_deref(), Some("named-worker"));
    }
}
