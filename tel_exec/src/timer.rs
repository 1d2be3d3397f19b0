//! # Timeout Timer
//!
//! A single background thread which raises an `expired` flag once its delay has elapsed. Starting
//! the timer again cancels and joins the previous thread first, so at most one timer thread exists
//! per [`TimeoutTimer`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, RecvTimeoutError, Sender},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct TimeoutTimer {
    active: Option<ActiveTimer>,

    expired: Arc<AtomicBool>,
}

struct ActiveTimer {
    cancel_tx: Sender<()>,

    join_handle: JoinHandle<()>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TimeoutTimer {
    pub fn new() -> Self {
        Self {
            active: None,
            expired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the timer, replacing any timer which is already running.
    pub fn start(&mut self, delay: Duration) {
        self.cancel();

        self.expired.store(false, Ordering::SeqCst);

        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
        let expired = self.expired.clone();

        let join_handle = thread::spawn(move || {
            match cancel_rx.recv_timeout(delay) {
                Err(RecvTimeoutError::Timeout) => {
                    trace!("Timer expired after {:.3} s", delay.as_secs_f64());
                    expired.store(true, Ordering::SeqCst)
                },
                _ => (),
            }
        });

        self.active = Some(ActiveTimer {
            cancel_tx,
            join_handle,
        });
    }

    /// Stop the running timer, if any, and wait for its thread to end.
    ///
    /// The expired flag keeps its value.
    pub fn cancel(&mut self) {
        if let Some(timer) = self.active.take() {
            timer.cancel_tx.send(()).ok();
            timer.join_handle.join().ok();
        }
    }

    /// Whether the last started timer has expired.
    pub fn expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }

    /// Whether a timer thread is running.
    pub fn is_running(&self) -> bool {
        self.active.is_some() && !self.expired()
    }
}

impl Default for TimeoutTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimeoutTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_expiry() {
        let mut timer = TimeoutTimer::new();
        assert!(!timer.expired());

        timer.start(Duration::from_millis(50));
        assert!(timer.is_running());
        assert!(!timer.expired());

        thread::sleep(Duration::from_millis(150));
        assert!(timer.expired());
        assert!(!timer.is_running());
    }

    #[test]
    fn test_cancel() {
        let mut timer = TimeoutTimer::new();

        let start = Instant::now();
        timer.start(Duration::from_secs(60));
        timer.cancel();

        // Cancelling joins the thread without waiting for the delay
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!timer.expired());
        assert!(!timer.is_running());
    }

    #[test]
    fn test_restart_clears_expiry() {
        let mut timer = TimeoutTimer::new();

        timer.start(Duration::from_millis(10));
        thread::sleep(Duration::from_millis(100));
        assert!(timer.expired());

        // A new timer replaces the old one and starts unexpired
        timer.start(Duration::from_secs(60));
        assert!(!timer.expired());
        timer.start(Duration::from_millis(10));
        thread::sleep(Duration::from_millis(100));
        assert!(timer.expired());
    }
}
