//! Periodic publish scheduling.
//!
//! A [`StatsTimer`] is a single-shot rearming timer: a dedicated thread
//! parks on a condvar with a timeout, runs the callback when the timeout
//! elapses, and rearms itself. Teardown wakes the thread and joins it, so
//! the callback can never fire after the owning subsystem is gone.

use crate::config::StatsOptions;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Errors from arming the scheduler.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The timer thread could not be spawned.
    #[error("failed to spawn stats timer thread: {0}")]
    Spawn(#[from] std::io::Error),
}

struct TimerShared {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// A single-shot rearming timer driving the publish-and-prune pass.
pub struct StatsTimer {
    shared: Arc<TimerShared>,
    handle: Option<JoinHandle<()>>,
}

impl StatsTimer {
    /// Effective publish frequency in seconds for the given options:
    /// `log_freq` when nonzero, otherwise half the dynamic-counter
    /// lifetime with a one second floor. Pruning keeps running even when
    /// publishing is disabled.
    pub fn effective_freq(options: &StatsOptions) -> u64 {
        if options.log_freq > 0 {
            options.log_freq
        } else {
            (options.lifetime / 2).max(1)
        }
    }

    /// Arm the timer: every `period`, run `callback` and rearm.
    pub fn start<F>(period: Duration, callback: F) -> Result<Self, SchedulerError>
    where
        F: Fn() + Send + 'static,
    {
        let shared = Arc::new(TimerShared {
            stopped: Mutex::new(false),
            wake: Condvar::new(),
        });
        let thread_shared = shared.clone();

        let handle = thread::Builder::new()
            .name("stats-timer".to_string())
            .spawn(move || {
                let mut stopped = thread_shared.stopped.lock();
                loop {
                    if *stopped {
                        break;
                    }
                    let wait = thread_shared.wake.wait_for(&mut stopped, period);
                    if *stopped {
                        break;
                    }
                    if wait.timed_out() {
                        // run the pass without holding the stop flag
                        drop(stopped);
                        callback();
                        stopped = thread_shared.stopped.lock();
                    }
                }
            })?;

        tracing::debug!(target: "stats", period_secs = period.as_secs_f64(), "stats timer armed");

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Disarm the timer and wait for the thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            *self.shared.stopped.lock() = true;
            self.shared.wake.notify_one();
            let _ = handle.join();
            tracing::debug!(target: "stats", "stats timer stopped");
        }
    }
}

impl Drop for StatsTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
