//! Admission policies and their clamping rules.
//!
//! Policies are built from raw, possibly hostile configuration values. They
//! never reject a value: a misconfigured policy is clamped to the nearest
//! safe setting and a warning is logged.

use std::time::Duration;
use tracing::warn;

/// Default trailing window for submission limiting.
pub const DEFAULT_WINDOW_SECS: i64 = 60;
/// Default number of admitted submissions per window.
pub const DEFAULT_MAX_EVENTS: i64 = 1;
/// Default minimum gap between notifications once the free allowance is spent.
pub const DEFAULT_MIN_GAP_SECS: i64 = 30;
/// Number of notifications admitted unconditionally for a fresh key.
pub const FREE_ALLOWANCE: u32 = 3;

/// Shortest window a limiter will run with.
const MIN_WINDOW: Duration = Duration::from_secs(1);
/// Idle eviction never fires sooner than this many gaps after the last admission.
pub const IDLE_EVICTION_GAP_MULTIPLE: u32 = 4;

/// Sliding-window policy: at most `max_events` admissions per trailing `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    window: Duration,
    max_events: usize,
}

impl WindowPolicy {
    /// Create a policy. A window shorter than one second is raised to one
    /// second. `max_events == 0` is allowed and denies every call.
    pub fn new(window: Duration, max_events: usize) -> Self {
        let window = if window < MIN_WINDOW {
            warn!(
                window_ms = window.as_millis() as u64,
                "Rate limit window below minimum, clamping to 1s"
            );
            MIN_WINDOW
        } else {
            window
        };
        Self { window, max_events }
    }

    /// Build a policy from raw configuration values.
    ///
    /// Non-positive windows clamp to one second. Negative `max_events`
    /// clamps to zero, so the limiter fails closed.
    pub fn from_raw(window_secs: i64, max_events: i64) -> Self {
        let max_events = if max_events < 0 {
            warn!(max_events, "Negative max events, limiter will deny every call");
            0
        } else {
            max_events as usize
        };
        let window = Duration::from_secs(window_secs.max(0) as u64);
        Self::new(window, max_events)
    }

    /// Trailing window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Maximum admissions per window.
    pub fn max_events(&self) -> usize {
        self.max_events
    }
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(DEFAULT_WINDOW_SECS as u64),
            max_events: DEFAULT_MAX_EVENTS as usize,
        }
    }
}

/// Tiered throttle policy: `free_allowance` unconditional admissions, then
/// at most one admission per `min_gap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    min_gap: Duration,
    free_allowance: u32,
    idle_eviction: Option<Duration>,
}

impl ThrottlePolicy {
    /// Create a policy with the fixed free allowance.
    pub fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            free_allowance: FREE_ALLOWANCE,
            idle_eviction: None,
        }
    }

    /// Build a policy from a raw gap in seconds. Negative gaps clamp to zero.
    pub fn from_raw(min_gap_secs: i64) -> Self {
        if min_gap_secs < 0 {
            warn!(min_gap_secs, "Negative notification gap, clamping to 0s");
        }
        Self::new(Duration::from_secs(min_gap_secs.max(0) as u64))
    }

    /// Let sweeps evict entries whose last admission is at least `idle` old.
    ///
    /// An evicted key starts over with a fresh free allowance, so `idle` is
    /// raised to at least [`IDLE_EVICTION_GAP_MULTIPLE`] gaps (and one
    /// second). An entry still waiting out its gap is never evicted.
    pub fn with_idle_eviction(mut self, idle: Duration) -> Self {
        let floor = self
            .min_gap
            .saturating_mul(IDLE_EVICTION_GAP_MULTIPLE)
            .max(MIN_WINDOW);
        let idle = if idle < floor {
            warn!(
                idle_ms = idle.as_millis() as u64,
                floor_ms = floor.as_millis() as u64,
                "Notification idle eviction shorter than gap floor, clamping"
            );
            floor
        } else {
            idle
        };
        self.idle_eviction = Some(idle);
        self
    }

    /// Minimum gap between admissions past the free allowance.
    pub fn min_gap(&self) -> Duration {
        self.min_gap
    }

    /// Unconditional admissions per fresh key.
    pub fn free_allowance(&self) -> u32 {
        self.free_allowance
    }

    /// Idle age after which a sweep may evict an entry, if enabled.
    pub fn idle_eviction(&self) -> Option<Duration> {
        self.idle_eviction
    }
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_MIN_GAP_SECS as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_policy_defaults() {
        let policy = WindowPolicy::default();
        assert_eq!(policy.window(), Duration::from_secs(60));
        assert_eq!(policy.max_events(), 1);
    }

    #[test]
    fn test_window_policy_clamps_non_positive_window() {
        assert_eq!(WindowPolicy::from_raw(0, 1).window(), Duration::from_secs(1));
        assert_eq!(WindowPolicy::from_raw(-30, 1).window(), Duration::from_secs(1));
        assert_eq!(
            WindowPolicy::new(Duration::from_millis(10), 1).window(),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_window_policy_negative_max_events_fails_closed() {
        assert_eq!(WindowPolicy::from_raw(60, -1).max_events(), 0);
    }

    #[test]
    fn test_window_policy_keeps_valid_values() {
        let policy = WindowPolicy::from_raw(120, 5);
        assert_eq!(policy.window(), Duration::from_secs(120));
        assert_eq!(policy.max_events(), 5);
    }

    #[test]
    fn test_throttle_policy_defaults() {
        let policy = ThrottlePolicy::default();
        assert_eq!(policy.min_gap(), Duration::from_secs(30));
        assert_eq!(policy.free_allowance(), 3);
        assert_eq!(policy.idle_eviction(), None);
    }

    #[test]
    fn test_throttle_policy_clamps_negative_gap() {
        assert_eq!(ThrottlePolicy::from_raw(-5).min_gap(), Duration::ZERO);
    }

    #[test]
    fn test_throttle_policy_idle_eviction() {
        let policy = ThrottlePolicy::from_raw(30).with_idle_eviction(Duration::from_secs(600));
        assert_eq!(policy.idle_eviction(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_idle_eviction_clamped_to_gap_multiple() {
        let policy = ThrottlePolicy::from_raw(30).with_idle_eviction(Duration::from_secs(5));
        assert_eq!(policy.idle_eviction(), Some(Duration::from_secs(120)));

        let policy = ThrottlePolicy::from_raw(30).with_idle_eviction(Duration::ZERO);
        assert_eq!(policy.idle_eviction(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_idle_eviction_floor_with_zero_gap() {
        let policy = ThrottlePolicy::from_raw(0).with_idle_eviction(Duration::ZERO);
        assert_eq!(policy.idle_eviction(), Some(Duration::from_secs(1)));
    }
}
