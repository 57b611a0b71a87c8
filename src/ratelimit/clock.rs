//! Time sources for the limiters.
//!
//! Every limiter works in seconds expressed as `f64`. The clock is read once per
//! admission so the same reading is used for eviction, refill and the decision.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of wall-clock time in seconds.
pub trait Clock: Send + Sync {
    /// Current time in seconds.
    fn now(&self) -> f64;
}

/// Wall clock backed by [`SystemTime`], in seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// A clock that only moves when told to.
///
/// Useful for tests and for hosts that drive time themselves.
#[derive(Debug, Default)]
pub struct ManualClock {
    // f64 bit pattern
    secs: AtomicU64,
}

impl ManualClock {
    /// Create a clock reading `secs`.
    pub fn new(secs: f64) -> Self {
        Self {
            secs: AtomicU64::new(secs.to_bits()),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, secs: f64) {
        self.secs.store(secs.to_bits(), Ordering::SeqCst);
    }

    /// Move the clock forward by `secs`.
    pub fn advance(&self, secs: f64) {
        let mut current = self.secs.load(Ordering::SeqCst);
        loop {
            let next = (f64::from_bits(current) + secs).to_bits();
            match self
                .secs
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.secs.load(Ordering::SeqCst))
    }
}
