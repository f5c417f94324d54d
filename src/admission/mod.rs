//! Admission control: per-key rate limiting and notification throttling.

mod backend;
mod clock;
mod key;
mod policy;
mod sweeper;
mod throttle;
mod window;

pub use backend::{AdmissionControl, Sweep};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use key::{NotifyChannel, NotifyKey, SubmissionKey};
pub use policy::{
    ThrottlePolicy, WindowPolicy, DEFAULT_MAX_EVENTS, DEFAULT_MIN_GAP_SECS, DEFAULT_WINDOW_SECS,
    FREE_ALLOWANCE,
};
pub use sweeper::Sweeper;
pub use throttle::{NotificationThrottle, ThrottleEntry};
pub use window::SlidingWindowLimiter;
