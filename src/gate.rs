//! Request-facing admission decisions.
//!
//! The request-handling layer owns one [`Gatekeeper`] for the process
//! lifetime and consults it before accepting a message or sending a push
//! notification. Nothing here touches HTTP; the layer maps verdicts to
//! responses itself.

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::admission::{
    AdmissionControl, NotificationThrottle, NotifyChannel, NotifyKey, SlidingWindowLimiter,
    SubmissionKey, Sweep, Sweeper,
};
use crate::blocklist::{Blocklist, MemoryBlocklist};
use crate::config::{MovecarConfig, SweepConfig};
use crate::credentials::IpHasher;
use crate::notify::{BarkMessage, BarkNotifier, BarkTarget, NotifyError};

/// Outcome of a message submission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionVerdict {
    /// The message may be stored
    Accepted,
    /// The client is blocked on this code
    Blocked,
    /// The client submitted too recently
    RateLimited,
}

impl SubmissionVerdict {
    /// Whether the submission may proceed.
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionVerdict::Accepted)
    }

    /// HTTP status conventionally used for this verdict.
    pub fn http_status(&self) -> u16 {
        match self {
            SubmissionVerdict::Accepted => 200,
            SubmissionVerdict::Blocked => 403,
            SubmissionVerdict::RateLimited => 429,
        }
    }
}

/// Admission decisions for message submissions and notifications.
pub struct Gatekeeper {
    submissions: Arc<dyn AdmissionControl<SubmissionKey>>,
    notifications: Arc<dyn AdmissionControl<NotifyKey>>,
    blocklist: Arc<dyn Blocklist>,
    ip_hasher: IpHasher,
}

impl Gatekeeper {
    /// Create a gatekeeper from its parts.
    pub fn new(
        submissions: Arc<dyn AdmissionControl<SubmissionKey>>,
        notifications: Arc<dyn AdmissionControl<NotifyKey>>,
        blocklist: Arc<dyn Blocklist>,
        ip_hasher: IpHasher,
    ) -> Self {
        Self {
            submissions,
            notifications,
            blocklist,
            ip_hasher,
        }
    }

    /// Build a gatekeeper with in-memory components configured from `config`.
    ///
    /// Returns the blocklist alongside so the caller can manage blocks.
    pub fn from_config(config: &MovecarConfig) -> (Self, Arc<MemoryBlocklist>) {
        if config.app_secret.is_empty() {
            warn!("No app secret configured, client address hashes are unkeyed");
        }

        let blocklist = Arc::new(MemoryBlocklist::new());
        let gatekeeper = Self::new(
            Arc::new(SlidingWindowLimiter::<SubmissionKey>::new(
                config.submission.policy(),
            )),
            Arc::new(NotificationThrottle::<NotifyKey>::new(
                config.notification.policy(),
            )),
            blocklist.clone(),
            IpHasher::new(config.app_secret.clone()),
        );
        (gatekeeper, blocklist)
    }

    /// Decide whether a client may leave a message on a code.
    ///
    /// Blocked clients are turned away before the rate limiter is consulted,
    /// so their attempts never use up quota.
    #[instrument(level = "debug", skip(self, client_ip))]
    pub fn check_submission(
        &self,
        code_id: i64,
        public_code: &str,
        client_ip: &str,
    ) -> SubmissionVerdict {
        let ip_hash = self.ip_hasher.hash(client_ip);
        if self.blocklist.is_blocked(code_id, &ip_hash) {
            debug!("Submission from blocked client");
            return SubmissionVerdict::Blocked;
        }

        let key = SubmissionKey::new(client_ip, public_code);
        if !self.submissions.admit(&key) {
            return SubmissionVerdict::RateLimited;
        }

        SubmissionVerdict::Accepted
    }

    /// Decide whether a push notification for a code may go out now.
    pub fn should_notify(&self, channel: NotifyChannel, code_id: i64) -> bool {
        self.notifications.admit(&NotifyKey::new(channel, code_id))
    }

    /// Send a Bark push for a code unless its notifications are throttled.
    ///
    /// Returns `Ok(false)` when throttled; nothing is sent in that case.
    /// A failed delivery still counts against the throttle.
    pub async fn dispatch_bark(
        &self,
        notifier: &BarkNotifier,
        code_id: i64,
        target: &BarkTarget,
        message: &BarkMessage,
    ) -> Result<bool, NotifyError> {
        if !self.should_notify(NotifyChannel::Bark, code_id) {
            debug!(code_id, "Bark notification throttled");
            return Ok(false);
        }
        notifier.send(target, message).await?;
        Ok(true)
    }

    /// Start sweeping this gatekeeper's state in the background, if enabled.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>, sweep: &SweepConfig) -> Option<Sweeper> {
        if !sweep.enabled {
            debug!("Admission sweeper disabled");
            return None;
        }
        Some(Sweeper::spawn(vec![self.clone() as Arc<dyn Sweep>], sweep.interval()))
    }

    /// Keyed hash of a client address, as stored in blocklists.
    pub fn hash_ip(&self, client_ip: &str) -> String {
        self.ip_hasher.hash(client_ip)
    }
}

impl Sweep for Gatekeeper {
    fn sweep(&self) -> usize {
        self.submissions.sweep() + self.notifications.sweep()
    }
}
