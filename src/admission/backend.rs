//! Traits abstracting over admission-control implementations.

/// Something holding per-key state that can shed entries no longer needed.
pub trait Sweep: Send + Sync {
    /// Remove reclaimable entries and return how many were removed.
    fn sweep(&self) -> usize;
}

/// An admission-control component consulted before a gated action.
///
/// This abstracts over the sliding-window limiter and the notification
/// throttle so the gatekeeper can work with either, or with a test double.
pub trait AdmissionControl<K>: Sweep {
    /// Decide whether the action identified by `key` may proceed now.
    ///
    /// An admitted call is recorded; a denied call leaves no trace that
    /// would delay later admissions.
    fn admit(&self, key: &K) -> bool;
}
