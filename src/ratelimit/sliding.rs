//! Sliding window log limiter.

use std::collections::VecDeque;

use super::limiter::{Algorithm, Decision, KeyedLimiter, Policy};
use crate::error::{QueueGateError, Result};

/// Default trailing window length in seconds.
pub const DEFAULT_WINDOW_SECS: f64 = 60.0;
/// Default number of admissions allowed per window.
pub const DEFAULT_SLIDING_LIMIT: usize = 3;

/// Sliding window limiter keyed by client identity.
pub type SlidingWindowLimiter = KeyedLimiter<SlidingWindow>;

/// Allows at most `limit` admissions per identity in any trailing `window`.
///
/// Each identity keeps the timestamps of its admissions, oldest first.
/// Timestamps at or before `now - window` fall out of the window before the
/// count is compared against the limit, so the count never exceeds `limit`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlidingWindow {
    window: f64,
    limit: usize,
}

impl SlidingWindow {
    /// Create a policy admitting `limit` requests per `window` seconds.
    pub fn new(window: f64, limit: usize) -> Result<Self> {
        if !window.is_finite() || window <= 0.0 {
            return Err(QueueGateError::Config(format!(
                "sliding window length must be a positive number of seconds, got {}",
                window
            )));
        }
        if limit == 0 {
            return Err(QueueGateError::Config(
                "sliding window limit must be at least 1".to_string(),
            ));
        }
        Ok(Self { window, limit })
    }

    /// Window length in seconds.
    pub fn window(&self) -> f64 {
        self.window
    }

    /// Admissions allowed per window.
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for SlidingWindow {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW_SECS,
            limit: DEFAULT_SLIDING_LIMIT,
        }
    }
}

impl Policy for SlidingWindow {
    type State = VecDeque<f64>;

    fn algorithm(&self) -> Algorithm {
        Algorithm::SlidingWindow
    }

    fn initial_state(&self, _now: f64) -> VecDeque<f64> {
        VecDeque::with_capacity(self.limit)
    }

    fn decide(&self, admitted: &mut VecDeque<f64>, now: f64) -> Decision {
        let horizon = now - self.window;
        while admitted.front().is_some_and(|&t| t <= horizon) {
            admitted.pop_front();
        }

        if admitted.len() >= self.limit {
            return Decision::Denied;
        }

        admitted.push_back(now);
        Decision::Allowed
    }

    fn settle_time(&self) -> f64 {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::RateLimiter;

    fn limiter() -> SlidingWindowLimiter {
        SlidingWindowLimiter::new(SlidingWindow::default())
    }

    #[test]
    fn test_defaults() {
        let policy = SlidingWindow::default();
        assert_eq!(policy.window(), 60.0);
        assert_eq!(policy.limit(), 3);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(SlidingWindow::new(0.0, 3).is_err());
        assert!(SlidingWindow::new(-1.0, 3).is_err());
        assert!(SlidingWindow::new(f64::NAN, 3).is_err());
        assert!(SlidingWindow::new(60.0, 0).is_err());
    }

    #[test]
    fn test_first_request_always_admitted() {
        let limiter = limiter();
        assert_eq!(limiter.allow("X", 1_000.0), Decision::Allowed);
    }

    #[test]
    fn test_fourth_request_in_window_denied() {
        let limiter = limiter();

        assert_eq!(limiter.allow("X", 0.0), Decision::Allowed);
        assert_eq!(limiter.allow("X", 1.0), Decision::Allowed);
        assert_eq!(limiter.allow("X", 2.0), Decision::Allowed);
        assert_eq!(limiter.allow("X", 3.0), Decision::Denied);
        assert_eq!(limiter.allow("X", 61.0), Decision::Allowed);
    }

    #[test]
    fn test_admission_expires_exactly_at_window_edge() {
        let limiter = SlidingWindowLimiter::new(SlidingWindow::new(10.0, 1).unwrap());

        assert_eq!(limiter.allow("X", 0.0), Decision::Allowed);
        assert_eq!(limiter.allow("X", 9.999), Decision::Denied);
        assert_eq!(limiter.allow("X", 10.0), Decision::Allowed);
    }

    #[test]
    fn test_denials_are_not_recorded() {
        let limiter = SlidingWindowLimiter::new(SlidingWindow::new(10.0, 2).unwrap());

        limiter.allow("X", 0.0);
        limiter.allow("X", 5.0);
        for t in 6..10 {
            assert_eq!(limiter.allow("X", t as f64), Decision::Denied);
        }

        // Only the admission at t=0 has left the window.
        assert_eq!(limiter.allow("X", 10.0), Decision::Allowed);
        assert_eq!(limiter.inspect("X", |log| log.len()), Some(2));
    }

    #[test]
    fn test_log_never_exceeds_limit() {
        let limiter = limiter();
        for t in 0..100 {
            limiter.allow("X", t as f64 * 0.5);
            let len = limiter.inspect("X", |log| log.len()).unwrap();
            assert!(len <= 3);
        }
    }

    #[test]
    fn test_identities_are_isolated() {
        let limiter = limiter();
        for t in 0..3 {
            limiter.allow("A", t as f64);
        }
        assert_eq!(limiter.allow("A", 3.0), Decision::Denied);
        assert_eq!(limiter.allow("B", 3.0), Decision::Allowed);
    }

    #[test]
    fn test_backwards_clock_does_not_reopen_window() {
        let limiter = limiter();
        for t in [100.0, 101.0, 102.0] {
            limiter.allow("X", t);
        }
        // Clamped to 102, so still inside the window.
        assert_eq!(limiter.allow("X", 0.0), Decision::Denied);
    }
}
