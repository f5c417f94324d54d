//! Keys identifying independent admission counters.

use std::fmt;

/// Key for message-submission rate limiting.
///
/// One counter exists per caller address and public code, so a caller that
/// floods one code does not lock them out of another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubmissionKey {
    /// Address of the submitting client
    pub client_ip: String,
    /// Public code the message was left on
    pub public_code: String,
}

impl SubmissionKey {
    /// Create a new submission key.
    pub fn new(client_ip: impl Into<String>, public_code: impl Into<String>) -> Self {
        Self {
            client_ip: client_ip.into(),
            public_code: public_code.into(),
        }
    }
}

impl fmt::Display for SubmissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.client_ip, self.public_code)
    }
}

/// Push channel a notification is delivered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotifyChannel {
    /// Bark push (iOS)
    Bark,
}

impl NotifyChannel {
    /// Wire name of the channel.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyChannel::Bark => "BARK",
        }
    }
}

impl fmt::Display for NotifyChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key for notification throttling: one counter per channel and code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotifyKey {
    /// Channel the notification goes out on
    pub channel: NotifyChannel,
    /// Database id of the code that received a message
    pub code_id: i64,
}

impl NotifyKey {
    /// Create a new notification key.
    pub fn new(channel: NotifyChannel, code_id: i64) -> Self {
        Self { channel, code_id }
    }
}

impl fmt::Display for NotifyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel, self.code_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_submission_key_display() {
        let key = SubmissionKey::new("127.0.0.1", "abc123");
        assert_eq!(key.to_string(), "127.0.0.1:abc123");
    }

    #[test]
    fn test_submission_key_equality() {
        let key1 = SubmissionKey::new("10.0.0.1", "code");
        let key2 = SubmissionKey::new("10.0.0.1".to_string(), "code".to_string());
        assert_eq!(key1, key2);

        let other = SubmissionKey::new("10.0.0.2", "code");
        assert_ne!(key1, other);
    }

    #[test]
    fn test_notify_key_display() {
        let key = NotifyKey::new(NotifyChannel::Bark, 42);
        assert_eq!(key.to_string(), "BARK:42");
    }

    #[test]
    fn test_notify_keys_hash_by_code() {
        let keys: HashSet<NotifyKey> = [
            NotifyKey::new(NotifyChannel::Bark, 1),
            NotifyKey::new(NotifyChannel::Bark, 1),
            NotifyKey::new(NotifyChannel::Bark, 2),
        ]
        .into_iter()
        .collect();
        assert_eq!(keys.len(), 2);
    }
}
