//! Leaky bucket limiter.

use super::limiter::{Algorithm, Decision, KeyedLimiter, Policy};
use crate::error::{QueueGateError, Result};

/// Default units drained per second.
pub const DEFAULT_LEAK_RATE: f64 = 1.0;
/// Default bucket capacity in units.
pub const DEFAULT_BUCKET_CAPACITY: f64 = 5.0;

/// Leaky bucket limiter keyed by client identity.
pub type LeakyBucketLimiter = KeyedLimiter<LeakyBucket>;

/// Per-identity bucket level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeakyBucketState {
    /// Current fill level, never negative
    pub water: f64,
    /// When the level was last brought up to date
    pub last_check: f64,
}

/// A bucket that gains one unit per admission and drains continuously.
///
/// The bucket drains by `elapsed * leak_rate` on every call, admitted or not.
/// A request is denied while the drained level is at or above `capacity`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeakyBucket {
    capacity: f64,
    leak_rate: f64,
}

impl LeakyBucket {
    /// Create a bucket holding `capacity` units and draining `leak_rate` units per second.
    pub fn new(capacity: f64, leak_rate: f64) -> Result<Self> {
        if !capacity.is_finite() || capacity <= 0.0 {
            return Err(QueueGateError::Config(format!(
                "leaky bucket capacity must be positive, got {}",
                capacity
            )));
        }
        if !leak_rate.is_finite() || leak_rate <= 0.0 {
            return Err(QueueGateError::Config(format!(
                "leaky bucket leak rate must be positive, got {}",
                leak_rate
            )));
        }
        Ok(Self {
            capacity,
            leak_rate,
        })
    }

    /// Capacity in units.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Units drained per second.
    pub fn leak_rate(&self) -> f64 {
        self.leak_rate
    }
}

impl Default for LeakyBucket {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BUCKET_CAPACITY,
            leak_rate: DEFAULT_LEAK_RATE,
        }
    }
}

impl Policy for LeakyBucket {
    type State = LeakyBucketState;

    fn algorithm(&self) -> Algorithm {
        Algorithm::LeakyBucket
    }

    fn initial_state(&self, now: f64) -> LeakyBucketState {
        LeakyBucketState {
            water: 0.0,
            last_check: now,
        }
    }

    fn decide(&self, bucket: &mut LeakyBucketState, now: f64) -> Decision {
        let leaked = (now - bucket.last_check) * self.leak_rate;
        bucket.water = (bucket.water - leaked).max(0.0);
        bucket.last_check = now;

        if bucket.water >= self.capacity {
            return Decision::Denied;
        }

        bucket.water += 1.0;
        Decision::Allowed
    }

    fn settle_time(&self) -> f64 {
        // The level stays below capacity + 1 after an admission.
        (self.capacity + 1.0) / self.leak_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::RateLimiter;

    fn limiter() -> LeakyBucketLimiter {
        LeakyBucketLimiter::new(LeakyBucket::default())
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(LeakyBucket::new(0.0, 1.0).is_err());
        assert!(LeakyBucket::new(5.0, 0.0).is_err());
        assert!(LeakyBucket::new(5.0, f64::INFINITY).is_err());
        assert!(LeakyBucket::new(5.0, 1.0).is_ok());
    }

    #[test]
    fn test_burst_fills_bucket_then_drains() {
        let limiter = limiter();

        for _ in 0..5 {
            assert_eq!(limiter.allow("Y", 0.0), Decision::Allowed);
        }
        assert_eq!(limiter.allow("Y", 0.0), Decision::Denied);
        assert_eq!(limiter.allow("Y", 5.0), Decision::Allowed);
    }

    #[test]
    fn test_partial_drain_admits_one() {
        let limiter = limiter();
        for _ in 0..5 {
            limiter.allow("Y", 0.0);
        }

        assert_eq!(limiter.allow("Y", 1.0), Decision::Allowed);
        assert_eq!(limiter.allow("Y", 1.0), Decision::Denied);
    }

    #[test]
    fn test_drain_applies_on_denial() {
        let limiter = limiter();
        for _ in 0..5 {
            limiter.allow("Y", 0.0);
        }

        assert_eq!(limiter.allow("Y", 0.5), Decision::Allowed);
        assert_eq!(limiter.allow("Y", 1.0), Decision::Denied);

        let state = limiter.inspect("Y", |b| *b).unwrap();
        assert_eq!(state.water, 5.0);
        assert_eq!(state.last_check, 1.0);
    }

    #[test]
    fn test_water_never_negative() {
        let limiter = limiter();
        limiter.allow("Y", 0.0);
        limiter.allow("Y", 1_000.0);

        let state = limiter.inspect("Y", |b| *b).unwrap();
        assert_eq!(state.water, 1.0);
    }

    #[test]
    fn test_identities_are_isolated() {
        let limiter = limiter();
        for _ in 0..6 {
            limiter.allow("A", 0.0);
        }
        assert_eq!(limiter.allow("A", 0.0), Decision::Denied);
        assert_eq!(limiter.allow("B", 0.0), Decision::Allowed);
    }

    #[test]
    fn test_settle_time_covers_full_drain() {
        assert_eq!(LeakyBucket::default().settle_time(), 6.0);
        assert_eq!(LeakyBucket::new(10.0, 2.0).unwrap().settle_time(), 5.5);
    }
}
