//! Deadline/timeout utilities for oracle calls.
//!
//! A timeout of `0` seconds means "unbounded" throughout.

use std::time::{Duration, Instant};

pub fn overall_timeout_duration(timeout_secs: u64) -> Option<Duration> {
    if timeout_secs == 0 {
        None
    } else {
        Some(Duration::from_secs(timeout_secs))
    }
}

/// Deadline after which a running oracle is killed: the timeout plus `grace`
/// for the checker to report its own timeout.
pub fn kill_deadline(started: Instant, timeout_secs: u64, grace: Duration) -> Option<Instant> {
    overall_timeout_duration(timeout_secs)
        .and_then(|t| t.checked_add(grace))
        .and_then(|t| started.checked_add(t))
}

pub fn deadline_exceeded(deadline: Option<Instant>) -> bool {
    match deadline {
        Some(deadline) => Instant::now() >= deadline,
        None => false,
    }
}

/// Timeout for retesting a recorded boundary configuration: twice the
/// recorded running time, never less than the campaign timeout. An unbounded
/// campaign keeps retests unbounded.
pub fn retest_timeout_secs(recorded: Duration, timeout_secs: u64) -> u64 {
    if timeout_secs == 0 {
        return 0;
    }
    recorded.as_secs().saturating_mul(2).max(timeout_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_exceeded_none_returns_false() {
        assert!(!deadline_exceeded(None));
    }

    #[test]
    fn deadline_exceeded_past_returns_true() {
        let past = Instant::now() - Duration::from_secs(1);
        assert!(deadline_exceeded(Some(past)));
    }

    #[test]
    fn overall_timeout_duration_zero_returns_none() {
        assert!(overall_timeout_duration(0).is_none());
        assert_eq!(overall_timeout_duration(30), Some(Duration::from_secs(30)));
    }

    #[test]
    fn kill_deadline_adds_grace() {
        let now = Instant::now();
        assert_eq!(kill_deadline(now, 0, Duration::from_secs(5)), None);
        assert_eq!(
            kill_deadline(now, 10, Duration::from_secs(5)),
            Some(now + Duration::from_secs(15))
        );
    }

    #[test]
    fn retest_timeout_doubles_recorded_time() {
        assert_eq!(retest_timeout_secs(Duration::from_secs(400), 300), 800);
        assert_eq!(retest_timeout_secs(Duration::from_secs(20), 300), 300);
        assert_eq!(retest_timeout_secs(Duration::from_secs(400), 0), 0);
    }
}
