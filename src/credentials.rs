//! Password hashing, public code generation and IP hashing.
//!
//! Passwords are stored as `salt$digest` where `digest` is the hex SHA-256
//! of the salt followed by the password. This keeps self-hosted deployments
//! dependency-free; the format is versionless, so switching to a slow hash
//! means rehashing on next login.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Random bytes in a generated salt.
const SALT_BYTES: usize = 16;
/// Random bytes behind a public code (11 URL-safe characters).
const PUBLIC_CODE_BYTES: usize = 8;

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let salt: [u8; SALT_BYTES] = rand::random();
    hash_password_with_salt(password, &to_hex(&salt))
}

/// Hash a password with the given salt, producing `salt$digest`.
pub fn hash_password_with_salt(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{}${:x}", salt, hasher.finalize())
}

/// Check a password against a stored `salt$digest` value.
///
/// A stored value without a separator never verifies.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, _)) = stored.split_once('$') else {
        return false;
    };
    let candidate = hash_password_with_salt(password, salt);
    constant_time_eq(candidate.as_bytes(), stored.as_bytes())
}

/// Generate a URL-safe, high-entropy public code.
pub fn generate_public_code() -> String {
    let bytes: [u8; PUBLIC_CODE_BYTES] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Keyed one-way hash of client addresses.
///
/// Used wherever an address must be compared or stored (blocklists, message
/// audit) without keeping it in clear.
#[derive(Clone)]
pub struct IpHasher {
    secret: String,
}

impl IpHasher {
    /// Create a hasher keyed with the application secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Hex SHA-256 of `secret|ip`.
    pub fn hash(&self, ip: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b"|");
        hasher.update(ip.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl std::fmt::Debug for IpHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpHasher").field("secret", &"<redacted>").finish()
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
