//! Error types for the claim ledger

use std::time::Duration;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Token unknown, or expired and evicted
    #[error("Claim not found")]
    NotFound,

    /// Claim already reached its terminal state
    #[error("Claim has already been redeemed")]
    AlreadyRedeemed,

    /// Claim expired at the moment of detection
    #[error("Claim has expired")]
    Expired,

    /// Malformed recipient, amount, currency or action payload
    #[error("Validation error: {0}")]
    Validation(String),

    /// Funds mover failed or timed out (retryable)
    #[error("Funds mover unavailable: {0}")]
    MoverUnavailable(String),

    /// Caller exceeded its window budget
    #[error("Rate limited, retry after {}ms", retry_after.as_millis())]
    RateLimited {
        /// Time until the window rolls over
        retry_after: Duration,
    },

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the same request may succeed when retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::MoverUnavailable(_) | Error::RateLimited { .. })
    }

    /// True for the errors callers surface as "invalid or expired link"
    pub fn is_invalid_link(&self) -> bool {
        matches!(self, Error::NotFound | Error::Expired)
    }
}
