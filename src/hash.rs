// src/hash.rs

//! Content hashing for deduplication.

use std::fmt;

use sha2::{Digest, Sha256};

/// SHA-256 digest of raw response bytes, hex-encoded.
///
/// This is the dedupe key: identical payloads always produce the same
/// hash regardless of when or how they were fetched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    /// Compute the hash of a raw payload.
    pub fn of(content: &[u8]) -> Self {
        let digest = Sha256::digest(content);
        Self(hex::encode(digest))
    }

    /// Full 64-character hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Truncated form for log lines.
    pub fn short(&self) -> String {
        format!("{}...", &self.0[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
