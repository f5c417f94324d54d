//! Per-code client blocklists.
//!
//! Owners can block a client from leaving messages on one of their codes.
//! Entries hold the keyed address hash, never the address itself.

use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::info;

/// Lookup consulted before a message submission is rate limited.
pub trait Blocklist: Send + Sync {
    /// Whether `ip_hash` is blocked from submitting to `code_id`.
    fn is_blocked(&self, code_id: i64, ip_hash: &str) -> bool;
}

/// In-memory blocklist, keyed by code then by address hash.
#[derive(Debug, Default)]
pub struct MemoryBlocklist {
    /// code id -> address hash -> optional reason
    entries: RwLock<HashMap<i64, HashMap<String, Option<String>>>>,
}

impl MemoryBlocklist {
    /// Create an empty blocklist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block `ip_hash` on `code_id`. Re-blocking replaces the reason.
    pub fn block(&self, code_id: i64, ip_hash: impl Into<String>, reason: Option<String>) {
        let ip_hash = ip_hash.into();
        info!(code_id, reason = reason.as_deref().unwrap_or(""), "Blocking client on code");
        self.entries
            .write()
            .entry(code_id)
            .or_default()
            .insert(ip_hash, reason);
    }

    /// Lift a block. Returns whether one existed.
    pub fn unblock(&self, code_id: i64, ip_hash: &str) -> bool {
        let mut entries = self.entries.write();
        let Some(blocked) = entries.get_mut(&code_id) else {
            return false;
        };
        let removed = blocked.remove(ip_hash).is_some();
        if blocked.is_empty() {
            entries.remove(&code_id);
        }
        removed
    }

    /// Reason recorded for a block, if the client is blocked.
    pub fn reason(&self, code_id: i64, ip_hash: &str) -> Option<Option<String>> {
        self.entries
            .read()
            .get(&code_id)
            .and_then(|blocked| blocked.get(ip_hash).cloned())
    }

    /// Remove every block on a code, e.g. when the code is deleted.
    pub fn clear_code(&self, code_id: i64) -> usize {
        self.entries
            .write()
            .remove(&code_id)
            .map(|blocked| blocked.len())
            .unwrap_or(0)
    }

    /// Total number of blocks across all codes.
    pub fn len(&self) -> usize {
        self.entries.read().values().map(HashMap::len).sum()
    }

    /// Whether no blocks exist.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Blocklist for MemoryBlocklist {
    fn is_blocked(&self, code_id: i64, ip_hash: &str) -> bool {
        self.entries
            .read()
            .get(&code_id)
            .is_some_and(|blocked| blocked.contains_key(ip_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_is_scoped_to_code() {
        let blocklist = MemoryBlocklist::new();
        blocklist.block(1, "hash-a", Some("spam".to_string()));

        assert!(blocklist.is_blocked(1, "hash-a"));
        assert!(!blocklist.is_blocked(2, "hash-a"));
        assert!(!blocklist.is_blocked(1, "hash-b"));
        assert_eq!(blocklist.reason(1, "hash-a"), Some(Some("spam".to_string())));
    }

    #[test]
    fn test_unblock() {
        let blocklist = MemoryBlocklist::new();
        blocklist.block(1, "hash-a", None);

        assert!(blocklist.unblock(1, "hash-a"));
        assert!(!blocklist.unblock(1, "hash-a"));
        assert!(!blocklist.is_blocked(1, "hash-a"));
        assert!(blocklist.is_empty());
    }

    #[test]
    fn test_clear_code() {
        let blocklist = MemoryBlocklist::new();
        blocklist.block(1, "hash-a", None);
        blocklist.block(1, "hash-b", None);
        blocklist.block(2, "hash-a", None);

        assert_eq!(blocklist.clear_code(1), 2);
        assert_eq!(blocklist.len(), 1);
        assert!(blocklist.is_blocked(2, "hash-a"));
        assert_eq!(blocklist.clear_code(1), 0);
    }

    #[test]
    fn test_reblock_replaces_reason() {
        let blocklist = MemoryBlocklist::new();
        blocklist.block(1, "hash-a", Some("first".to_string()));
        blocklist.block(1, "hash-a", None);

        assert_eq!(blocklist.len(), 1);
        assert_eq!(blocklist.reason(1, "hash-a"), Some(None));
    }
}
