//! Token bucket limiter.

use super::limiter::{Algorithm, Decision, KeyedLimiter, Policy};
use crate::error::{QueueGateError, Result};

/// Default tokens added per second.
pub const DEFAULT_TOKEN_RATE: f64 = 1.0;
/// Default maximum tokens held.
pub const DEFAULT_TOKEN_CAPACITY: f64 = 5.0;

/// Token bucket limiter keyed by client identity.
pub type TokenBucketLimiter = KeyedLimiter<TokenBucket>;

/// Per-identity token balance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBucketState {
    /// Tokens available, never above capacity
    pub tokens: f64,
    /// When the balance was last refilled
    pub last_refill: f64,
}

/// A bucket of up to `capacity` tokens refilled at `refill_rate` per second.
///
/// Each call refills first, even when it ends in a denial, so waiting clients
/// keep accruing credit. An admission consumes one token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
}

impl TokenBucket {
    /// Create a bucket holding up to `capacity` tokens refilled at `refill_rate` per second.
    pub fn new(capacity: f64, refill_rate: f64) -> Result<Self> {
        if !capacity.is_finite() || capacity < 1.0 {
            return Err(QueueGateError::Config(format!(
                "token bucket capacity must be at least 1, got {}",
                capacity
            )));
        }
        if !refill_rate.is_finite() || refill_rate <= 0.0 {
            return Err(QueueGateError::Config(format!(
                "token bucket refill rate must be positive, got {}",
                refill_rate
            )));
        }
        Ok(Self {
            capacity,
            refill_rate,
        })
    }

    /// Maximum tokens held.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Tokens added per second.
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }
}

impl Default for TokenBucket {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_TOKEN_CAPACITY,
            refill_rate: DEFAULT_TOKEN_RATE,
        }
    }
}

impl Policy for TokenBucket {
    type State = TokenBucketState;

    fn algorithm(&self) -> Algorithm {
        Algorithm::TokenBucket
    }

    fn initial_state(&self, now: f64) -> TokenBucketState {
        TokenBucketState {
            tokens: self.capacity,
            last_refill: now,
        }
    }

    fn decide(&self, bucket: &mut TokenBucketState, now: f64) -> Decision {
        let refill = (now - bucket.last_refill) * self.refill_rate;
        bucket.tokens = (bucket.tokens + refill).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens < 1.0 {
            return Decision::Denied;
        }

        bucket.tokens -= 1.0;
        Decision::Allowed
    }

    fn settle_time(&self) -> f64 {
        self.capacity / self.refill_rate
    }
}
