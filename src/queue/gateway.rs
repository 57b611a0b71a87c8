//! Binds the limiters to the shared queue.

use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

use super::SharedQueue;
use crate::config::QueueGateConfig;
use crate::error::{QueueGateError, Result};
use crate::ratelimit::{
    Algorithm, Clock, FixedWindowLimiter, LeakyBucketLimiter, RateLimiter, SlidingWindowLimiter,
    SystemClock, TokenBucketLimiter,
};

/// Result of a successful dequeue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dequeued {
    /// The value taken from the front
    pub removed: String,
    /// What is left, front-to-back
    pub queue: Vec<String>,
}

/// The admission-controlled front door to the [`SharedQueue`].
///
/// Each `enqueue_*` operation is gated by exactly one limiter. The limiters are
/// independent: being denied by one never affects the others. Dequeue is never
/// rate limited.
pub struct QueueGateway {
    queue: SharedQueue,
    fixed: FixedWindowLimiter,
    sliding: SlidingWindowLimiter,
    leaky: LeakyBucketLimiter,
    token: TokenBucketLimiter,
    clock: Arc<dyn Clock>,
    idle_ttl: f64,
}

impl QueueGateway {
    /// Create a gateway on the system clock.
    pub fn new(config: &QueueGateConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a gateway reading time from `clock`.
    pub fn with_clock(config: &QueueGateConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let limits = &config.limits;

        Ok(Self {
            queue: SharedQueue::new(),
            fixed: FixedWindowLimiter::new(limits.fixed_window()?),
            sliding: SlidingWindowLimiter::new(limits.sliding_window()?),
            leaky: LeakyBucketLimiter::new(limits.leaky_bucket()?),
            token: TokenBucketLimiter::new(limits.token_bucket()?),
            clock,
            idle_ttl: config.eviction.idle_ttl_secs,
        })
    }

    /// Enqueue `value` if the fixed window limiter admits `identity`.
    ///
    /// Returns the queue contents right after the append.
    pub fn enqueue_fixed(&self, identity: &str, value: String) -> Result<Vec<String>> {
        self.enqueue_with(&self.fixed, identity, value)
    }

    /// Enqueue `value` if the sliding window limiter admits `identity`.
    pub fn enqueue_sliding(&self, identity: &str, value: String) -> Result<Vec<String>> {
        self.enqueue_with(&self.sliding, identity, value)
    }

    /// Enqueue `value` if the leaky bucket limiter admits `identity`.
    pub fn enqueue_leaky(&self, identity: &str, value: String) -> Result<Vec<String>> {
        self.enqueue_with(&self.leaky, identity, value)
    }

    /// Enqueue `value` if the token bucket limiter admits `identity`.
    pub fn enqueue_token(&self, identity: &str, value: String) -> Result<Vec<String>> {
        self.enqueue_with(&self.token, identity, value)
    }

    /// The append happens while the limiter still holds the identity's state,
    /// so an admission and its enqueue are one step for that identity.
    fn enqueue_with(
        &self,
        limiter: &dyn RateLimiter,
        identity: &str,
        value: String,
    ) -> Result<Vec<String>> {
        let now = self.clock.now();
        let mut value = Some(value);
        let mut snapshot = None;

        limiter.admit_with(identity, now, &mut || {
            if let Some(value) = value.take() {
                snapshot = Some(self.queue.enqueue_and_snapshot(value));
            }
        });

        match snapshot {
            Some(queue) => {
                trace!(
                    identity = %identity,
                    algorithm = %limiter.algorithm(),
                    queue_len = queue.len(),
                    "Enqueued"
                );
                Ok(queue)
            }
            None => Err(QueueGateError::RateLimited {
                algorithm: limiter.algorithm(),
            }),
        }
    }

    /// Remove the front value. Fails with [`QueueGateError::EmptyQueue`] when
    /// there is nothing to remove.
    pub fn dequeue(&self) -> Result<Dequeued> {
        let (removed, queue) = self.queue.dequeue_and_snapshot().inspect_err(|_| {
            debug!("Dequeue on empty queue");
        })?;
        trace!(queue_len = queue.len(), "Dequeued");
        Ok(Dequeued { removed, queue })
    }

    /// Queue contents front-to-back.
    pub fn snapshot(&self) -> Vec<String> {
        self.queue.snapshot()
    }

    /// The shared queue itself.
    pub fn queue(&self) -> &SharedQueue {
        &self.queue
    }

    /// The limiter gating `algorithm`'s enqueue path.
    pub fn limiter(&self, algorithm: Algorithm) -> &dyn RateLimiter {
        match algorithm {
            Algorithm::FixedWindow => &self.fixed,
            Algorithm::SlidingWindow => &self.sliding,
            Algorithm::LeakyBucket => &self.leaky,
            Algorithm::TokenBucket => &self.token,
        }
    }

    /// Drop limiter state for clients idle longer than the configured TTL.
    ///
    /// Returns the number of per-algorithm states removed.
    pub fn evict_idle(&self) -> usize {
        let now = self.clock.now();
        Algorithm::ALL
            .iter()
            .map(|&algorithm| self.limiter(algorithm).evict_idle(now, self.idle_ttl))
            .sum()
    }

    /// Run [`QueueGateway::evict_idle`] every `every` until the gateway is dropped.
    pub fn spawn_eviction_task(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let gateway: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(gateway) = gateway.upgrade() else {
                    debug!("Gateway dropped, stopping eviction task");
                    return;
                };

                let evicted = gateway.evict_idle();
                if evicted > 0 {
                    info!(evicted = evicted, "Evicted idle client state");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::ManualClock;
    use tokio_test::assert_ok;

    fn gateway() -> (QueueGateway, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0.0));
        let gateway = QueueGateway::with_clock(&QueueGateConfig::default(), clock.clone()).unwrap();
        (gateway, clock)
    }

    fn is_rate_limited(result: Result<Vec<String>>, expected: Algorithm) -> bool {
        matches!(result, Err(QueueGateError::RateLimited { algorithm }) if algorithm == expected)
    }

    #[test]
    fn test_enqueue_returns_snapshot() {
        let (gateway, _) = gateway();

        assert_eq!(gateway.enqueue_token("ip", "a".to_string()).unwrap(), vec!["a"]);
        assert_eq!(
            gateway.enqueue_sliding("ip", "b".to_string()).unwrap(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_sliding_scenario() {
        let (gateway, clock) = gateway();

        for (t, value) in [(0.0, "a"), (1.0, "b"), (2.0, "c")] {
            clock.set(t);
            assert_ok!(gateway.enqueue_sliding("X", value.to_string()));
        }

        clock.set(3.0);
        assert!(is_rate_limited(
            gateway.enqueue_sliding("X", "d".to_string()),
            Algorithm::SlidingWindow
        ));

        clock.set(61.0);
        assert_ok!(gateway.enqueue_sliding("X", "e".to_string()));
        assert_eq!(gateway.snapshot(), vec!["a", "b", "c", "e"]);
    }

    #[test]
    fn test_leaky_scenario() {
        let (gateway, clock) = gateway();

        for i in 0..5 {
            assert_ok!(gateway.enqueue_leaky("Y", i.to_string()));
        }
        assert!(is_rate_limited(
            gateway.enqueue_leaky("Y", "6".to_string()),
            Algorithm::LeakyBucket
        ));

        clock.set(5.0);
        assert_ok!(gateway.enqueue_leaky("Y", "7".to_string()));
    }

    #[test]
    fn test_token_scenario() {
        let (gateway, clock) = gateway();

        for i in 0..5 {
            assert_ok!(gateway.enqueue_token("Z", i.to_string()));
        }
        assert!(is_rate_limited(
            gateway.enqueue_token("Z", "x".to_string()),
            Algorithm::TokenBucket
        ));

        clock.set(1.0);
        assert_ok!(gateway.enqueue_token("Z", "y".to_string()));
        assert!(is_rate_limited(
            gateway.enqueue_token("Z", "z".to_string()),
            Algorithm::TokenBucket
        ));
    }

    #[test]
    fn test_fixed_window_pathway() {
        let (gateway, clock) = gateway();
        clock.set(120.0);

        for i in 0..3 {
            assert_ok!(gateway.enqueue_fixed("F", i.to_string()));
        }
        assert!(is_rate_limited(
            gateway.enqueue_fixed("F", "x".to_string()),
            Algorithm::FixedWindow
        ));

        clock.set(180.0);
        assert_ok!(gateway.enqueue_fixed("F", "y".to_string()));
    }

    #[test]
    fn test_denial_leaves_queue_untouched() {
        let (gateway, _) = gateway();

        for i in 0..3 {
            gateway.enqueue_sliding("X", i.to_string()).unwrap();
        }
        let before = gateway.snapshot();

        assert!(gateway.enqueue_sliding("X", "blocked".to_string()).is_err());
        assert_eq!(gateway.snapshot(), before);
    }

    #[test]
    fn test_limiters_are_independent() {
        let (gateway, _) = gateway();

        for i in 0..3 {
            gateway.enqueue_sliding("X", i.to_string()).unwrap();
        }
        assert!(gateway.enqueue_sliding("X", "s".to_string()).is_err());

        // Exhausting one algorithm does not count against another.
        assert_ok!(gateway.enqueue_token("X", "t".to_string()));
        assert_ok!(gateway.enqueue_leaky("X", "l".to_string()));
        assert_ok!(gateway.enqueue_fixed("X", "f".to_string()));
    }

    #[test]
    fn test_identities_are_isolated() {
        let (gateway, _) = gateway();

        for i in 0..5 {
            gateway.enqueue_token("A", i.to_string()).unwrap();
        }
        assert!(gateway.enqueue_token("A", "x".to_string()).is_err());
        assert_ok!(gateway.enqueue_token("B", "y".to_string()));
    }

    #[test]
    fn test_dequeue_is_fifo_and_unlimited() {
        let (gateway, _) = gateway();
        for value in ["v1", "v2", "v3"] {
            gateway.enqueue_token("ip", value.to_string()).unwrap();
        }

        let first = gateway.dequeue().unwrap();
        assert_eq!(first.removed, "v1");
        assert_eq!(first.queue, vec!["v2", "v3"]);
        assert_eq!(gateway.dequeue().unwrap().removed, "v2");
        assert_eq!(gateway.dequeue().unwrap().removed, "v3");
    }

    #[test]
    fn test_dequeue_empty() {
        let (gateway, _) = gateway();

        assert!(matches!(gateway.dequeue(), Err(QueueGateError::EmptyQueue)));
        assert!(gateway.snapshot().is_empty());
    }

    #[test]
    fn test_evict_idle() {
        let (gateway, clock) = gateway();

        gateway.enqueue_sliding("old", "a".to_string()).unwrap();
        gateway.enqueue_token("old", "b".to_string()).unwrap();
        clock.set(500.0);
        gateway.enqueue_token("recent", "c".to_string()).unwrap();

        clock.set(650.0);
        assert_eq!(gateway.evict_idle(), 2);
        assert_eq!(gateway.limiter(Algorithm::TokenBucket).tracked_identities(), 1);
        assert_eq!(gateway.limiter(Algorithm::SlidingWindow).tracked_identities(), 0);
        assert_eq!(gateway.snapshot().len(), 3);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = QueueGateConfig::default();
        config.limits.token_bucket.refill_rate = 0.0;
        assert!(QueueGateway::new(&config).is_err());
    }

    #[test]
    fn test_concurrent_burst_is_capped() {
        let (gateway, _) = gateway();

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let gateway = &gateway;
                scope.spawn(move || {
                    for i in 0..20 {
                        let _ = gateway.enqueue_token("burst", format!("{}-{}", worker, i));
                    }
                });
            }
        });

        // The clock never moved, so exactly the initial tokens were spent.
        assert_eq!(gateway.queue().len(), 5);
    }

    #[tokio::test]
    async fn test_eviction_task_sweeps() {
        let (gateway, clock) = gateway();
        let gateway = Arc::new(gateway);

        gateway.enqueue_token("ip", "a".to_string()).unwrap();
        clock.set(10_000.0);

        let handle = gateway.spawn_eviction_task(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(gateway.limiter(Algorithm::TokenBucket).tracked_identities(), 0);
        handle.abort();
    }

    #[tokio::test]
    async fn test_eviction_task_stops_when_gateway_dropped() {
        let (gateway, _) = gateway();
        let gateway = Arc::new(gateway);

        let handle = gateway.spawn_eviction_task(Duration::from_millis(10));
        drop(gateway);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("eviction task should stop")
            .unwrap();
    }
}
