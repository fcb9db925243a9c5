// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Content Hash Value Object
//!
//! Type-safe representation of a SHA-256 content hash, the identity of
//! every chunk in the vault. Hashes are stored and displayed as lowercase
//! hex, which is also the filename of the chunk's blob under `.chunks/`.
//!
//! Two hash roles exist in the system and both use this type:
//!
//! - **plain hash**: SHA-256 of the plaintext chunk bytes; deduplication
//!   identity.
//! - **storage hash**: SHA-256 of the on-disk (possibly encrypted) blob;
//!   storage identity. Equals the plain hash when encryption is off.
//!
//! The roles must never be mixed: the dedup index is keyed by plain hash
//! only, and chunk-store filenames are storage hashes only.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::VaultError;

/// Length of a SHA-256 hash encoded as lowercase hex.
pub const CONTENT_HASH_HEX_LEN: usize = 64;

/// A SHA-256 content hash in lowercase hex encoding.
///
/// Construction either computes the digest over bytes
/// ([`ContentHash::of_bytes`]) or validates an existing hex string
/// ([`ContentHash::parse`]); an invalid string never becomes a
/// `ContentHash`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Computes the SHA-256 hash of the given bytes.
    pub fn of_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hex::encode(hasher.finalize()))
    }

    /// Validates and wraps an existing lowercase hex digest.
    pub fn parse(hex_digest: impl Into<String>) -> Result<Self, VaultError> {
        let digest = hex_digest.into();
        if digest.len() != CONTENT_HASH_HEX_LEN {
            return Err(VaultError::ValidationError(format!(
                "content hash must be {} hex characters, got {}",
                CONTENT_HASH_HEX_LEN,
                digest.len()
            )));
        }
        if !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(VaultError::ValidationError(format!(
                "content hash contains non-hex characters: {}",
                digest
            )));
        }
        if digest.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(VaultError::ValidationError(
                "content hash must be lowercase hex".to_string(),
            ));
        }
        Ok(Self(digest))
    }

    /// Returns the hex digest as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the raw digest bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        // Validated at construction, decoding cannot fail.
        hex::decode(&self.0).unwrap_or_default()
    }

    /// Verifies that `data` hashes to this value.
    pub fn matches(&self, data: &[u8]) -> bool {
        Self::of_bytes(data) == *self
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_of_bytes_known_vector() {
        // SHA-256 of the empty string
        let hash = ContentHash::of_bytes(b"");
        assert_eq!(
            hash.as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_parse_round_trip() {
        let hash = ContentHash::of_bytes(b"hello world");
        let parsed = ContentHash::parse(hash.as_str()).unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn test_parse_rejects_bad_length() {
        assert!(ContentHash::parse("abc123").is_err());
        assert!(ContentHash::parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_non_hex() {
        let bad = "z".repeat(CONTENT_HASH_HEX_LEN);
        assert!(ContentHash::parse(bad).is_err());
    }

    #[test]
    fn test_parse_rejects_uppercase() {
        let upper = "A".repeat(CONTENT_HASH_HEX_LEN);
        assert!(ContentHash::parse(upper).is_err());
    }

    #[test]
    fn test_matches() {
        let hash = ContentHash::of_bytes(b"chunk data");
        assert!(hash.matches(b"chunk data"));
        assert!(!hash.matches(b"other data"));
    }

    #[test]
    fn test_distinct_inputs_distinct_hashes() {
        assert_ne!(ContentHash::of_bytes(b"a"), ContentHash::of_bytes(b"b"));
    }

    #[test]
    fn test_serde_transparent() {
        let hash = ContentHash::of_bytes(b"x");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.as_str()));
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
