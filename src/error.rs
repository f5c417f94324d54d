//! Error types for the movecar crate.

use thiserror::Error;

/// Main error type for movecar operations.
#[derive(Error, Debug)]
pub enum MovecarError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors raised while merging configuration sources
    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for movecar operations.
pub type Result<T> = std::result::Result<T, MovecarError>;
