//! General time utility functions

use chrono;
use std::time::Duration;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Longest duration produced by `seconds_to_duration`, one year
pub const MAX_DURATION_S: f64 = 31_557_600.0;

/// Convert a chrono duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    if let Some(ns) = duration.num_nanoseconds() {
        Some(ns as f64 / NANOS_PER_SECOND as f64)
    }
    else {
        None
    }
}

/// Convert a number of seconds into a std duration.
///
/// Negative and non-finite values map to a zero duration, values are capped at
/// `MAX_DURATION_S`.
pub fn seconds_to_duration(seconds: f64) -> Duration {
    if seconds.is_finite() && seconds > 0.0 {
        Duration::from_secs_f64(seconds.min(MAX_DURATION_S))
    }
    else {
        Duration::from_secs(0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_seconds_to_duration() {
        assert_eq!(seconds_to_duration(1.5), Duration::from_millis(1500));
        assert_eq!(seconds_to_duration(-3.0), Duration::from_secs(0));
        assert_eq!(seconds_to_duration(f64::NAN), Duration::from_secs(0));
    }

    #[test]
    fn test_duration_to_seconds() {
        let d = chrono::Duration::milliseconds(2500);
        assert_eq!(duration_to_seconds(d), Some(2.5));
    }
}
