//! Movecar - admission control for a "move my car" notification service
//!
//! A car owner prints a public code on their vehicle; passers-by scan it and
//! leave a message, and the owner may get a push notification. This crate
//! holds the policies guarding that flow: a sliding-window limiter on
//! message submissions, a tiered throttle on notifications, per-code
//! blocklists, credential hashing and Bark push delivery. Request handling, storage and
//! rendering live with the caller.

pub mod admission;
pub mod blocklist;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gate;
pub mod notify;

pub use admission::{NotificationThrottle, SlidingWindowLimiter};
pub use gate::{Gatekeeper, SubmissionVerdict};
