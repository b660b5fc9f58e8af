//! Token codec
//!
//! This module provides:
//! - Generation of unguessable claim tokens (256 bits from the OS CSPRNG)
//! - SHA-256 lookup keys so the store never holds a usable token
//! - Claim URL construction

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Token length in bytes before hex encoding
pub const TOKEN_BYTES: usize = 32;

/// Raw magic-link token
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SecretToken(String);

impl SecretToken {
    /// Generate a new random token
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Accept a presented token
    ///
    /// Any non-empty string is accepted; unknown tokens simply miss the index.
    pub fn parse(presented: &str) -> Option<Self> {
        let trimmed = presented.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Raw token text (for building links only)
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretToken(<redacted>)")
    }
}

/// One-way storage key derived from a token
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LookupKey(String);

impl LookupKey {
    /// Derive the lookup key (lowercase hex SHA-256 of the token text)
    pub fn derive(token: &SecretToken) -> Self {
        Self(hex::encode(hash_bytes(token.0.as_bytes())))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash arbitrary bytes using SHA-256
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Build the public claim URL for a token
pub fn claim_url(base_url: &str, token: &SecretToken) -> String {
    format!("{}/claim/{}", base_url.trim_end_matches('/'), token.expose())
}
