//! # Wait Primitives
//!
//! [`Waiter`] polls a predicate until it holds or its timer expires. [`with_retries`] repeats an
//! attempt until a completion check passes or the attempt budget runs out.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;
use std::{convert::Infallible, thread, time::Duration};
use util::time::seconds_to_duration;

use crate::timer::TimeoutTimer;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Bounded poll loop driven by a single [`TimeoutTimer`].
pub struct Waiter {
    timer: TimeoutTimer,

    poll_interval: Duration,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Met,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The completion check passed after the given number of attempts
    Done(usize),

    /// The completion check never passed within the budget
    Exhausted(usize),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Waiter {
    pub fn new(poll_interval_s: f64) -> Self {
        Self {
            timer: TimeoutTimer::new(),
            poll_interval: seconds_to_duration(poll_interval_s),
        }
    }

    /// Poll `predicate` until it returns true or `timeout_s` elapses.
    pub fn wait_until<F>(&mut self, mut predicate: F, timeout_s: f64) -> WaitOutcome
    where
        F: FnMut() -> bool
    {
        match self.try_wait_until(|| Ok::<_, Infallible>(predicate()), timeout_s) {
            Ok(outcome) => outcome,
            Err(e) => match e {},
        }
    }

    /// As [`Waiter::wait_until`] with a fallible predicate. The first error ends the wait.
    ///
    /// The predicate is evaluated before the expiry flag on every poll, so a condition which holds
    /// at the deadline is still reported as met.
    pub fn try_wait_until<F, E>(&mut self, mut predicate: F, timeout_s: f64) -> Result<WaitOutcome, E>
    where
        F: FnMut() -> Result<bool, E>
    {
        self.timer.start(seconds_to_duration(timeout_s));

        loop {
            match predicate() {
                Ok(true) => {
                    self.timer.cancel();
                    return Ok(WaitOutcome::Met)
                },
                Ok(false) => (),
                Err(e) => {
                    self.timer.cancel();
                    return Err(e)
                }
            }

            if self.timer.expired() {
                trace!("Wait timed out after {} s", timeout_s);
                return Ok(WaitOutcome::TimedOut)
            }

            thread::sleep(self.poll_interval);
        }
    }

    /// Sleep for a fixed time, used to let the ACS settle after a command.
    pub fn pause(&self, duration_s: f64) {
        thread::sleep(seconds_to_duration(duration_s));
    }

    pub fn poll_interval_s(&self) -> f64 {
        self.poll_interval.as_secs_f64()
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Repeat `attempt` until `done` holds, at most `max_attempts` times.
///
/// `done` is checked before every attempt and once after the last one. Both closures receive the
/// same context so they can share mutable state. Errors from either closure end the loop.
pub fn with_retries<C, A, D, E>(
    ctx: &mut C,
    max_attempts: usize,
    mut attempt: A,
    mut done: D,
) -> Result<RetryOutcome, E>
where
    C: ?Sized,
    A: FnMut(&mut C, usize) -> Result<(), E>,
    D: FnMut(&mut C) -> Result<bool, E>,
{
    for i in 0..max_attempts {
        if done(ctx)? {
            return Ok(RetryOutcome::Done(i))
        }

        attempt(ctx, i)?;
    }

    match done(ctx)? {
        true => Ok(RetryOutcome::Done(max_attempts)),
        false => Ok(RetryOutcome::Exhausted(max_attempts)),
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
    fn test_wait_met() {
        let mut waiter = Waiter::new(0.01);
        let mut n = 0;

        let outcome = waiter.wait_until(|| { n += 1; n >= 3 }, 1.0);

        assert_eq!(outcome, WaitOutcome::Met);
        assert_eq!(n, 3);
    }

    #[test]
    fn test_wait_never_true() {
        let poll_s = 0.02;
        let timeout_s = 0.2;
        let mut waiter = Waiter::new(poll_s);

        let start = Instant::now();
        let outcome = waiter.wait_until(|| false, timeout_s);
        let elapsed_s = start.elapsed().as_secs_f64();

        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(elapsed_s >= timeout_s, "{}", elapsed_s);
        // One poll interval plus scheduling slack
        assert!(elapsed_s <= timeout_s + poll_s + 0.05, "{}", elapsed_s);
    }

    #[test]
    fn test_wait_already_true() {
        let mut waiter = Waiter::new(0.5);

        let start = Instant::now();
        assert_eq!(waiter.wait_until(|| true, 10.0), WaitOutcome::Met);
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_wait_error() {
        let mut waiter = Waiter::new(0.01);

        let res: Result<WaitOutcome, &str> = waiter.try_wait_until(|| Err("lost"), 1.0);
        assert_eq!(res, Err("lost"));
    }

    #[test]
    fn test_with_retries() {
        // Converges on the third attempt
        let mut value = 0;
        let res: Result<_, ()> = with_retries(
            &mut value,
            5,
            |v, _| { *v += 1; Ok(()) },
            |v| Ok(*v >= 3),
        );
        assert_eq!(res, Ok(RetryOutcome::Done(3)));

        // Never converges
        let mut value = 0;
        let res: Result<_, ()> = with_retries(
            &mut value,
            5,
            |v, _| { *v += 1; Ok(()) },
            |_| Ok(false),
        );
        assert_eq!(res, Ok(RetryOutcome::Exhausted(5)));
        assert_eq!(value, 5);

        // Already done, no attempt made
        let mut value = 0;
        let res: Result<_, ()> = with_retries(
            &mut value,
            5,
            |v, _| { *v += 1; Ok(()) },
            |_| Ok(true),
        );
        assert_eq!(res, Ok(RetryOutcome::Done(0)));
        assert_eq!(value, 0);

        // Errors end the loop
        let mut value = 0;
        let res = with_retries(
            &mut value,
            5,
            |_, i| if i == 1 { Err("failed") } else { Ok(()) },
            |_| Ok(false),
        );
        assert_eq!(res, Err("failed"));
    }
}
