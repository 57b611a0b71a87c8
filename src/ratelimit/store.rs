//! Per-identity limiter state.

use dashmap::DashMap;
use tracing::{debug, warn};

/// Limiter state for one client identity plus the last time it was touched.
#[derive(Debug)]
struct Slot<S> {
    state: S,
    last_seen: f64,
}

/// A sharded map from client identity to one limiter's mutable state.
///
/// State is created lazily on the first call for an identity. The closure given
/// to [`StateStore::with_state`] runs while that identity's shard is locked, so
/// the whole read-modify-write is atomic for the identity while other
/// identities hashed to different shards proceed in parallel.
#[derive(Debug)]
pub struct StateStore<S> {
    slots: DashMap<String, Slot<S>>,
}

impl<S> StateStore<S> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Run `f` against the state for `identity`, creating it with `init` first
    /// if the identity has not been seen.
    ///
    /// `now` is clamped to the identity's last-seen time: a clock reading that
    /// went backwards is treated as if no time had passed. The (possibly
    /// clamped) time is handed to `f`.
    pub fn with_state<R>(
        &self,
        identity: &str,
        now: f64,
        init: impl FnOnce(f64) -> S,
        f: impl FnOnce(&mut S, f64) -> R,
    ) -> R {
        if let Some(mut slot) = self.slots.get_mut(identity) {
            let now = Self::touch(identity, slot.value_mut(), now);
            return f(&mut slot.state, now);
        }

        let mut slot = self.slots.entry(identity.to_owned()).or_insert_with(|| {
            debug!(identity = %identity, "Creating limiter state");
            Slot {
                state: init(now),
                last_seen: now,
            }
        });
        let now = Self::touch(identity, slot.value_mut(), now);
        f(&mut slot.state, now)
    }

    fn touch(identity: &str, slot: &mut Slot<S>, now: f64) -> f64 {
        if now < slot.last_seen {
            warn!(
                identity = %identity,
                now = now,
                last_seen = slot.last_seen,
                "Clock moved backwards, clamping"
            );
            return slot.last_seen;
        }
        slot.last_seen = now;
        now
    }

    /// Remove every identity last seen strictly before `cutoff`.
    ///
    /// Returns the number of identities removed.
    pub fn evict_idle(&self, cutoff: f64) -> usize {
        let mut evicted = 0;
        self.slots.retain(|_, slot| {
            let keep = slot.last_seen >= cutoff;
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }

    /// Run `f` against the state for `identity` without creating or touching it.
    pub fn inspect<R>(&self, identity: &str, f: impl FnOnce(&S) -> R) -> Option<R> {
        self.slots.get(identity).map(|slot| f(&slot.state))
    }

    /// Whether state exists for `identity`.
    pub fn contains(&self, identity: &str) -> bool {
        self.slots.contains_key(identity)
    }

    /// Number of tracked identities.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no identity is tracked.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop all state.
    pub fn clear(&self) {
        self.slots.clear();
    }
}

impl<S> Default for StateStore<S> {
    fn default() -> Self {
        Self::new()
    }
}
