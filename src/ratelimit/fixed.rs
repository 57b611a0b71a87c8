//! Fixed window counter limiter.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::limiter::{Algorithm, Decision, KeyedLimiter, Policy};
use crate::error::{QueueGateError, Result};

/// Default admissions per window ("3/minute").
pub const DEFAULT_FIXED_LIMIT: u64 = 3;
/// Default window unit.
pub const DEFAULT_FIXED_UNIT: TimeWindow = TimeWindow::Minute;

/// Fixed window limiter keyed by client identity.
pub type FixedWindowLimiter = KeyedLimiter<FixedWindow>;

/// Time window for fixed window rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    /// Per-second rate limiting
    Second,
    /// Per-minute rate limiting
    Minute,
    /// Per-hour rate limiting
    Hour,
    /// Per-day rate limiting
    Day,
}

impl TimeWindow {
    /// Get the duration of this time window.
    pub fn duration(&self) -> Duration {
        match self {
            TimeWindow::Second => Duration::from_secs(1),
            TimeWindow::Minute => Duration::from_secs(60),
            TimeWindow::Hour => Duration::from_secs(3600),
            TimeWindow::Day => Duration::from_secs(86400),
        }
    }

    /// Start of the window containing `now`, aligned to the Unix epoch.
    pub fn window_start(&self, now: f64) -> f64 {
        let len = self.duration().as_secs_f64();
        (now / len).floor() * len
    }
}

/// Per-identity counter for the current window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedWindowState {
    /// Admissions counted in the current window
    pub count: u64,
    /// Start of the window `count` belongs to
    pub window_start: f64,
}

/// Allows `limit` admissions per identity in each aligned window.
///
/// Windows are aligned to the epoch, so every client shares the same
/// boundaries. They do not start at a client's first request, which means a
/// client first seen late in a window gets a fresh budget at the next
/// boundary rather than one full window after that first request.
///
/// Unlike [`super::SlidingWindow`], a client can make `limit` requests at the
/// end of one window and `limit` more at the start of the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedWindow {
    limit: u64,
    window: TimeWindow,
}

impl FixedWindow {
    /// Create a policy admitting `limit` requests per `window`.
    pub fn new(limit: u64, window: TimeWindow) -> Result<Self> {
        if limit == 0 {
            return Err(QueueGateError::Config(
                "fixed window limit must be at least 1".to_string(),
            ));
        }
        Ok(Self { limit, window })
    }

    /// Admissions allowed per window.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// The window unit.
    pub fn window(&self) -> TimeWindow {
        self.window
    }
}

impl Default for FixedWindow {
    fn default() -> Self {
        Self {
            limit: DEFAULT_FIXED_LIMIT,
            window: DEFAULT_FIXED_UNIT,
        }
    }
}

impl Policy for FixedWindow {
    type State = FixedWindowState;

    fn algorithm(&self) -> Algorithm {
        Algorithm::FixedWindow
    }

    fn initial_state(&self, now: f64) -> FixedWindowState {
        FixedWindowState {
            count: 0,
            window_start: self.window.window_start(now),
        }
    }

    fn decide(&self, counter: &mut FixedWindowState, now: f64) -> Decision {
        let window_start = self.window.window_start(now);
        if window_start > counter.window_start {
            counter.count = 0;
            counter.window_start = window_start;
        }

        if counter.count >= self.limit {
            return Decision::Denied;
        }

        counter.count += 1;
        Decision::Allowed
    }

    fn settle_time(&self) -> f64 {
        self.window.duration().as_secs_f64()
    }
}
