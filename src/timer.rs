//! Clock abstraction and single-shot cancellable timers.
//!
//! Confirmation timeouts run on their own thread so they can fire while the
//! dispatcher is busy. Tests swap in [`ManualClock`] to drive time by hand.

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    /// Block the calling context (used for user feedback pauses).
    fn sleep(&self, duration: Duration);
    /// Run `task` once after `delay` unless the returned handle is cancelled first.
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle;
}

/// Owning handle for a scheduled task. Dropping it cancels the task.
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    _wake: Option<Sender<()>>,
}

impl TimerHandle {
    fn new(cancelled: Arc<AtomicBool>, wake: Option<Sender<()>>) -> Self {
        Self {
            cancelled,
            _wake: wake,
        }
    }

    /// Stop the timer. A task that has already started is not interrupted.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        // Dropping the sender disconnects the channel and wakes the timer thread.
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Wall-clock implementation backed by one short-lived thread per timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }

    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let (wake_tx, wake_rx) = bounded::<()>(1);
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let spawned = thread::Builder::new()
            .name("confirmation-timer".to_string())
            .spawn(move || match wake_rx.recv_timeout(delay) {
                Err(RecvTimeoutError::Timeout) if !flag.load(Ordering::SeqCst) => task(),
                _ => {}
            });
        if let Err(err) = spawned {
            tracing::error!(error = %err, "failed to spawn timer thread; timeout disabled");
        }
        TimerHandle::new(cancelled, Some(wake_tx))
    }
}

#[cfg(test)]
pub(crate) use manual::ManualClock;
