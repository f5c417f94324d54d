//! Tiered notification throttle.
//!
//! A fresh key gets a small free allowance of notifications that always go
//! out, so an owner can confirm a newly configured channel works. After
//! that, notifications for the key are spaced at least `min_gap` apart.

use dashmap::DashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;
use tracing::{debug, trace};

use super::backend::{AdmissionControl, Sweep};
use super::clock::{Clock, MonotonicClock};
use super::policy::ThrottlePolicy;

/// Snapshot of a key's throttle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleEntry {
    /// Calls seen during the free-allowance phase
    pub count: u32,
    /// When the key was last admitted
    pub last_admitted: Duration,
}

/// Per-key notification throttle.
///
/// `last_admitted` only moves on admission, so a denied call never shifts
/// the moment the next notification becomes possible.
pub struct NotificationThrottle<K, C = MonotonicClock>
where
    K: Eq + Hash,
{
    entries: DashMap<K, ThrottleEntry>,
    policy: ThrottlePolicy,
    clock: C,
}

impl<K> NotificationThrottle<K, MonotonicClock>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Create a throttle driven by the monotonic clock.
    pub fn new(policy: ThrottlePolicy) -> Self {
        Self::with_clock(policy, MonotonicClock::new())
    }
}

impl<K, C> NotificationThrottle<K, C>
where
    K: Eq + Hash + Clone + Debug,
    C: Clock,
{
    /// Create a throttle reading time from `clock`.
    pub fn with_clock(policy: ThrottlePolicy, clock: C) -> Self {
        Self {
            entries: DashMap::new(),
            policy,
            clock,
        }
    }

    /// Decide whether a notification for `key` may be sent now.
    pub fn allow_notify(&self, key: &K) -> bool {
        let now = self.clock.now();

        let mut entry = self.entries.entry(key.clone()).or_insert_with(|| {
            debug!(key = ?key, "Creating new notification throttle entry");
            ThrottleEntry {
                count: 0,
                last_admitted: Duration::ZERO,
            }
        });

        if entry.count < self.policy.free_allowance() {
            entry.count += 1;
            entry.last_admitted = now;
            trace!(key = ?key, count = entry.count, "Notification within free allowance");
            return true;
        }

        let elapsed = now.saturating_sub(entry.last_admitted);
        if elapsed >= self.policy.min_gap() {
            entry.last_admitted = now;
            trace!(key = ?key, "Notification admitted after gap");
            return true;
        }

        drop(entry);
        debug!(
            key = ?key,
            elapsed_ms = elapsed.as_millis() as u64,
            min_gap_ms = self.policy.min_gap().as_millis() as u64,
            "Notification throttled"
        );
        false
    }

    /// Current state for `key`, if it has been seen.
    pub fn entry(&self, key: &K) -> Option<ThrottleEntry> {
        self.entries.get(key).map(|entry| *entry)
    }

    /// Evict entries idle for at least the policy's eviction age.
    ///
    /// Does nothing unless idle eviction was enabled on the policy.
    pub fn sweep(&self) -> usize {
        let Some(idle) = self.policy.idle_eviction() else {
            return 0;
        };
        let now = self.clock.now();

        let mut evicted = 0;
        self.entries.retain(|_, entry| {
            let keep = now.saturating_sub(entry.last_admitted) < idle;
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }

    /// The policy this throttle enforces.
    pub fn policy(&self) -> ThrottlePolicy {
        self.policy
    }

    /// Number of keys with state.
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// Forget all state.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl<K, C> Sweep for NotificationThrottle<K, C>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
    C: Clock,
{
    fn sweep(&self) -> usize {
        NotificationThrottle::sweep(self)
    }
}

impl<K, C> AdmissionControl<K> for NotificationThrottle<K, C>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
    C: Clock,
{
    fn admit(&self, key: &K) -> bool {
        self.allow_notify(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::clock::ManualClock;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn throttle(policy: ThrottlePolicy) -> (NotificationThrottle<u32, Arc<ManualClock>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (NotificationThrottle::with_clock(policy, Arc::clone(&clock)), clock)
    }

    #[test]
    fn test_first_call_creates_entry() {
        let (throttle, clock) = throttle(ThrottlePolicy::from_raw(30));
        clock.set_secs(5);

        assert!(throttle.allow_notify(&1));
        assert_eq!(
            throttle.entry(&1),
            Some(ThrottleEntry {
                count: 1,
                last_admitted: Duration::from_secs(5),
            })
        );
    }

    #[test]
    fn test_gap_enforced_after_allowance() {
        let (throttle, clock) = throttle(ThrottlePolicy::from_raw(30));

        for _ in 0..3 {
            assert!(throttle.allow_notify(&1));
        }

        clock.set_secs(29);
        assert!(!throttle.allow_notify(&1));

        clock.set_secs(30);
        assert!(throttle.allow_notify(&1));
    }

    #[test]
    fn test_denial_does_not_move_gap_clock() {
        let (throttle, clock) = throttle(ThrottlePolicy::from_raw(30));

        for _ in 0..3 {
            throttle.allow_notify(&1);
        }

        clock.set_secs(20);
        assert!(!throttle.allow_notify(&1));
        clock.set_secs(21);
        assert!(!throttle.allow_notify(&1));

        let entry = throttle.entry(&1).unwrap();
        assert_eq!(entry.last_admitted, Duration::ZERO);
        assert_eq!(entry.count, 3);

        // Gap still measured from t=0, not from the denials
        clock.set_secs(30);
        assert!(throttle.allow_notify(&1));
    }

    #[test]
    fn test_zero_gap_admits_everything() {
        let (throttle, _) = throttle(ThrottlePolicy::from_raw(0));
        for _ in 0..10 {
            assert!(throttle.allow_notify(&1));
        }
    }

    #[test]
    fn test_keys_are_independent() {
        let (throttle, _) = throttle(ThrottlePolicy::from_raw(30));

        for _ in 0..3 {
            throttle.allow_notify(&1);
        }
        assert!(!throttle.allow_notify(&1));
        assert!(throttle.allow_notify(&2));
    }

    #[test]
    fn test_sweep_disabled_by_default() {
        let (throttle, clock) = throttle(ThrottlePolicy::from_raw(30));
        throttle.allow_notify(&1);
        clock.set_secs(1_000_000);

        assert_eq!(throttle.sweep(), 0);
        assert_eq!(throttle.key_count(), 1);
    }

    #[test]
    fn test_sweep_evicts_idle_entries() {
        let policy = ThrottlePolicy::from_raw(30).with_idle_eviction(Duration::from_secs(600));
        let (throttle, clock) = throttle(policy);

        throttle.allow_notify(&1);
        clock.set_secs(500);
        throttle.allow_notify(&2);

        clock.set_secs(600);
        assert_eq!(throttle.sweep(), 1);
        assert!(throttle.entry(&1).is_none());
        assert!(throttle.entry(&2).is_some());
    }

    #[test]
    fn test_sweep_during_gap_never_readmits_early() {
        // A short idle setting is raised to several gaps, so sweeping every
        // second cannot hand the key a fresh allowance mid-gap.
        let policy = ThrottlePolicy::from_raw(30).with_idle_eviction(Duration::from_secs(5));
        let (throttle, clock) = throttle(policy);

        let mut admitted = 0;
        for at in 0..30 {
            clock.set_secs(at);
            if throttle.allow_notify(&1) {
                admitted += 1;
            }
            throttle.sweep();
        }
        assert_eq!(admitted, 3);
        assert_eq!(throttle.entry(&1).map(|e| e.count), Some(3));

        // Gap runs from the third admission at t=2
        clock.set_secs(32);
        assert!(throttle.allow_notify(&1));
        throttle.sweep();
        assert!(!throttle.allow_notify(&1));
    }

    #[test]
    fn test_zero_idle_eviction_keeps_allowance_spent() {
        let policy = ThrottlePolicy::from_raw(30).with_idle_eviction(Duration::ZERO);
        let (throttle, _) = throttle(policy);

        let admitted = (0..10)
            .filter(|_| {
                let ok = throttle.allow_notify(&1);
                throttle.sweep();
                ok
            })
            .count();
        assert_eq!(admitted, 3);
    }

    #[test]
    fn test_evicted_key_only_after_gap_multiples() {
        let policy = ThrottlePolicy::from_raw(30).with_idle_eviction(Duration::from_secs(5));
        let (throttle, clock) = throttle(policy);
        for _ in 0..3 {
            throttle.allow_notify(&1);
        }

        clock.set_secs(119);
        assert_eq!(throttle.sweep(), 0);

        clock.set_secs(120);
        assert_eq!(throttle.sweep(), 1);
        // Fresh allowance only once the key has been quiet for four gaps
        assert!(throttle.allow_notify(&1));
        assert_eq!(throttle.entry(&1).map(|e| e.count), Some(1));
    }

    #[test]
    fn test_clear() {
        let (throttle, _) = throttle(ThrottlePolicy::default());
        throttle.allow_notify(&1);
        throttle.clear();
        assert_eq!(throttle.key_count(), 0);
    }

    proptest! {
        #[test]
        fn free_allowance_ignores_elapsed_time(
            gap_secs in 1i64..3_600,
            steps in proptest::collection::vec(0u64..10, 3),
        ) {
            let (throttle, clock) = throttle(ThrottlePolicy::from_raw(gap_secs));
            for step_ms in steps {
                clock.advance(Duration::from_millis(step_ms));
                prop_assert!(throttle.allow_notify(&7));
            }
        }
    }
}
