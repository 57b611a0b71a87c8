//! Common limiter interface shared by every algorithm.

use std::fmt;

use tracing::{debug, trace};

use super::store::StateStore;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed
    Allowed,
    /// The request is over the limit
    Denied,
}

impl Decision {
    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// The rate limiting algorithms available to gate an enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Fixed window counter aligned to the time unit
    FixedWindow,
    /// Sliding log of admission timestamps
    SlidingWindow,
    /// Bucket that fills per admission and drains continuously
    LeakyBucket,
    /// Bucket of tokens that refills continuously
    TokenBucket,
}

impl Algorithm {
    /// All algorithms, in the order the service exposes them.
    pub const ALL: [Algorithm; 4] = [
        Algorithm::FixedWindow,
        Algorithm::SlidingWindow,
        Algorithm::LeakyBucket,
        Algorithm::TokenBucket,
    ];

    /// Title-case name, e.g. "Token Bucket".
    pub fn title(&self) -> &'static str {
        match self {
            Algorithm::FixedWindow => "Fixed Window",
            Algorithm::SlidingWindow => "Sliding Window",
            Algorithm::LeakyBucket => "Leaky Bucket",
            Algorithm::TokenBucket => "Token Bucket",
        }
    }

    /// Sentence-case name, e.g. "Token bucket".
    pub fn sentence_name(&self) -> &'static str {
        match self {
            Algorithm::FixedWindow => "Fixed window",
            Algorithm::SlidingWindow => "Sliding window",
            Algorithm::LeakyBucket => "Leaky bucket",
            Algorithm::TokenBucket => "Token bucket",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Algorithm::FixedWindow => "fixed_window",
            Algorithm::SlidingWindow => "sliding_window",
            Algorithm::LeakyBucket => "leaky_bucket",
            Algorithm::TokenBucket => "token_bucket",
        };
        f.write_str(name)
    }
}

/// The per-identity state machine of one rate limiting algorithm.
///
/// A policy holds only its tunables. All mutable state lives in the
/// [`StateStore`] owned by the [`KeyedLimiter`] that wraps it.
pub trait Policy: Send + Sync + 'static {
    /// Mutable state kept for each client identity.
    type State: Send + Sync + 'static;

    /// Which algorithm this policy implements.
    fn algorithm(&self) -> Algorithm;

    /// State for an identity seen for the first time at `now`.
    fn initial_state(&self, now: f64) -> Self::State;

    /// Advance `state` to `now` and decide whether one more request fits.
    ///
    /// Mutates `state` to record the admission when the result is
    /// [`Decision::Allowed`].
    fn decide(&self, state: &mut Self::State, now: f64) -> Decision;

    /// Idle seconds after which any state behaves exactly like a fresh one.
    fn settle_time(&self) -> f64;
}

/// Object-safe rate limiter keyed by client identity.
///
/// Implemented by [`KeyedLimiter`] for every [`Policy`], so the queue gateway
/// can bind any algorithm to the enqueue path through one code path.
pub trait RateLimiter: Send + Sync {
    /// Which algorithm makes the decisions.
    fn algorithm(&self) -> Algorithm;

    /// Decide whether `identity` may make one more request at `now`.
    fn allow(&self, identity: &str, now: f64) -> Decision {
        self.admit_with(identity, now, &mut || {})
    }

    /// Like [`RateLimiter::allow`], but run `on_admit` before the identity's
    /// state is released when the decision is [`Decision::Allowed`].
    fn admit_with(&self, identity: &str, now: f64, on_admit: &mut dyn FnMut()) -> Decision;

    /// Forget identities idle for more than `idle_ttl` seconds as of `now`.
    ///
    /// Returns the number of identities removed.
    fn evict_idle(&self, now: f64, idle_ttl: f64) -> usize;

    /// Number of identities with live state.
    fn tracked_identities(&self) -> usize;
}

/// A rate limiter applying policy `P` independently to every client identity.
pub struct KeyedLimiter<P: Policy> {
    policy: P,
    states: StateStore<P::State>,
}

impl<P: Policy> KeyedLimiter<P> {
    /// Create a limiter with no tracked identities.
    pub fn new(policy: P) -> Self {
        Self {
            policy,
            states: StateStore::new(),
        }
    }

    /// The tunables this limiter runs with.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Read-only view of the state for `identity`, if any.
    pub fn inspect<R>(&self, identity: &str, f: impl FnOnce(&P::State) -> R) -> Option<R> {
        self.states.inspect(identity, f)
    }

    /// Drop all tracked identities.
    pub fn clear(&self) {
        self.states.clear();
    }
}

impl<P: Policy> RateLimiter for KeyedLimiter<P> {
    fn algorithm(&self) -> Algorithm {
        self.policy.algorithm()
    }

    fn admit_with(&self, identity: &str, now: f64, on_admit: &mut dyn FnMut()) -> Decision {
        let decision = self.states.with_state(
            identity,
            now,
            |now| self.policy.initial_state(now),
            |state, now| {
                let decision = self.policy.decide(state, now);
                if decision.is_allowed() {
                    on_admit();
                }
                decision
            },
        );

        match decision {
            Decision::Allowed => {
                trace!(identity = %identity, algorithm = %self.algorithm(), "Request admitted");
            }
            Decision::Denied => {
                debug!(identity = %identity, algorithm = %self.algorithm(), "Rate limit exceeded");
            }
        }

        decision
    }

    fn evict_idle(&self, now: f64, idle_ttl: f64) -> usize {
        let ttl = idle_ttl.max(self.policy.settle_time());
        let evicted = self.states.evict_idle(now - ttl);
        if evicted > 0 {
            debug!(
                algorithm = %self.algorithm(),
                evicted = evicted,
                remaining = self.states.len(),
                "Evicted idle limiter state"
            );
        }
        evicted
    }

    fn tracked_identities(&self) -> usize {
        self.states.len()
    }
}
