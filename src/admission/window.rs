//! Sliding-window rate limiter.
//!
//! Each key keeps a log of the instants it was admitted at. A call prunes
//! the log down to the trailing window and admits only if the remaining
//! occupancy is below the limit, so there is no burst at window edges the
//! way a fixed bucket would allow.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;
use tracing::{debug, trace};

use super::backend::{AdmissionControl, Sweep};
use super::clock::{Clock, MonotonicClock};
use super::policy::WindowPolicy;

/// Per-key sliding-window limiter.
///
/// This struct is thread-safe and can be shared across request handlers.
/// The check and the record for one key happen under that key's shard lock,
/// so two concurrent callers can never both take the last slot.
pub struct SlidingWindowLimiter<K, C = MonotonicClock>
where
    K: Eq + Hash,
{
    /// Admission instants per key, oldest first
    hits: DashMap<K, VecDeque<Duration>>,
    policy: WindowPolicy,
    clock: C,
}

impl<K> SlidingWindowLimiter<K, MonotonicClock>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Create a limiter driven by the monotonic clock.
    pub fn new(policy: WindowPolicy) -> Self {
        Self::with_clock(policy, MonotonicClock::new())
    }
}

impl<K, C> SlidingWindowLimiter<K, C>
where
    K: Eq + Hash + Clone + Debug,
    C: Clock,
{
    /// Create a limiter reading time from `clock`.
    pub fn with_clock(policy: WindowPolicy, clock: C) -> Self {
        Self {
            hits: DashMap::new(),
            policy,
            clock,
        }
    }

    /// Check whether one more event for `key` fits in the trailing window,
    /// recording it if so.
    pub fn allow(&self, key: &K) -> bool {
        let now = self.clock.now();
        let window_start = now.checked_sub(self.policy.window());

        trace!(key = ?key, now_ms = now.as_millis() as u64, "Checking rate limit");

        if self.policy.max_events() == 0 {
            debug!(key = ?key, "Rate limiter configured with zero capacity, denying");
            return false;
        }

        let mut hits = self.hits.entry(key.clone()).or_insert_with(|| {
            debug!(key = ?key, "Creating new rate limit log");
            VecDeque::with_capacity(self.policy.max_events().min(16))
        });

        prune(&mut hits, window_start);

        if hits.len() >= self.policy.max_events() {
            let occupancy = hits.len();
            drop(hits);
            debug!(
                key = ?key,
                occupancy,
                limit = self.policy.max_events(),
                "Rate limit exceeded"
            );
            return false;
        }

        hits.push_back(now);
        true
    }

    /// Number of admissions currently logged for `key`, without pruning.
    pub fn occupancy(&self, key: &K) -> usize {
        self.hits.get(key).map(|hits| hits.len()).unwrap_or(0)
    }

    /// Drop every key whose whole log has fallen out of the window.
    ///
    /// A fully stale key behaves exactly like one never seen, so sweeping
    /// never changes an admission outcome.
    pub fn sweep(&self) -> usize {
        let Some(window_start) = self.clock.now().checked_sub(self.policy.window()) else {
            return 0;
        };

        let mut evicted = 0;
        self.hits.retain(|_, hits| {
            let live = hits.back().is_some_and(|&newest| newest >= window_start);
            if !live {
                evicted += 1;
            }
            live
        });
        evicted
    }

    /// The policy this limiter enforces.
    pub fn policy(&self) -> WindowPolicy {
        self.policy
    }

    /// Number of keys with state.
    pub fn key_count(&self) -> usize {
        self.hits.len()
    }

    /// Forget all state.
    pub fn clear(&self) {
        self.hits.clear();
    }
}

/// Trim entries older than `window_start` from the front of the log.
///
/// Entries are appended in time order, so the stale ones always form a prefix.
fn prune(hits: &mut VecDeque<Duration>, window_start: Option<Duration>) {
    let Some(window_start) = window_start else {
        return;
    };
    let stale = hits.partition_point(|&at| at < window_start);
    hits.drain(..stale);
}

impl<K, C> Sweep for SlidingWindowLimiter<K, C>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
    C: Clock,
{
    fn sweep(&self) -> usize {
        SlidingWindowLimiter::sweep(self)
    }
}

impl<K, C> AdmissionControl<K> for SlidingWindowLimiter<K, C>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
    C: Clock,
{
    fn admit(&self, key: &K) -> bool {
        self.allow(key)
    }
}
