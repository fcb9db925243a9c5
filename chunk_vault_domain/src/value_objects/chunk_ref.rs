// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Reference Value Object
//!
//! A `ChunkRef` is one entry in a file manifest's ordered chunk list. It
//! carries both identities of a chunk (plain hash for deduplication,
//! storage hash for the on-disk blob) together with the sizes, the
//! per-chunk nonce/IV, and the compression flag.
//!
//! ## Identity Rules
//!
//! Dedup identity is pinned to `plain_hash` and storage identity to
//! `storage_hash`. Mixing them is rejected at construction: an encrypted
//! reference whose storage hash equals its plain hash is invalid (the
//! encrypted blob cannot hash to the plaintext digest), and an
//! unencrypted reference must have identical hashes.

use serde::{Deserialize, Serialize};

use crate::error::VaultError;
use crate::value_objects::ContentHash;

/// Reference to one content-addressed chunk within a file manifest.
///
/// Serialized into manifests and sync messages; the storage hash travels
/// under the wire name `encrypted_hash` for compatibility with the
/// manifest document format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    /// Position of this chunk within the file, dense and monotonic from 0.
    pub index: u32,

    /// SHA-256 of the plaintext chunk bytes; deduplication identity.
    pub plain_hash: ContentHash,

    /// SHA-256 of the stored blob; equals `plain_hash` for unencrypted
    /// vaults.
    #[serde(rename = "encrypted_hash")]
    pub storage_hash: ContentHash,

    /// Plaintext size in bytes.
    pub size: u64,

    /// Size of the stored blob in bytes.
    pub encrypted_size: u64,

    /// Per-chunk nonce/IV, base64-encoded. `None` for unencrypted vaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,

    /// Whether the plaintext was compressed before encryption.
    #[serde(default)]
    pub compressed: bool,

    /// Whether this chunk was satisfied by the dedup index instead of a
    /// fresh store write. Runtime-only; not part of the manifest document.
    #[serde(skip)]
    pub deduplicated: bool,
}

impl ChunkRef {
    /// Creates a reference for an unencrypted chunk.
    ///
    /// Storage identity collapses onto the plain hash.
    pub fn new_plain(index: u32, plain_hash: ContentHash, size: u64, compressed: bool) -> Self {
        Self {
            index,
            storage_hash: plain_hash.clone(),
            plain_hash,
            size,
            encrypted_size: size,
            iv: None,
            compressed,
            deduplicated: false,
        }
    }

    /// Creates a reference for an encrypted chunk.
    ///
    /// Rejects a storage hash equal to the plain hash: that would mean
    /// the encrypted blob hashes to the plaintext digest, which only
    /// happens when the two identities were mixed upstream.
    pub fn new_encrypted(
        index: u32,
        plain_hash: ContentHash,
        storage_hash: ContentHash,
        size: u64,
        encrypted_size: u64,
        iv: String,
        compressed: bool,
    ) -> Result<Self, VaultError> {
        if plain_hash == storage_hash {
            return Err(VaultError::InvalidChunk(format!(
                "encrypted chunk {} has identical plain and storage hashes",
                plain_hash
            )));
        }
        Ok(Self {
            index,
            plain_hash,
            storage_hash,
            size,
            encrypted_size,
            iv: Some(iv),
            compressed,
            deduplicated: false,
        })
    }

    /// Whether this reference points at an encrypted blob.
    pub fn is_encrypted(&self) -> bool {
        self.plain_hash != self.storage_hash
    }

    /// Returns a copy flagged as satisfied by deduplication.
    pub fn into_deduplicated(mut self) -> Self {
        self.deduplicated = true;
        self
    }

    /// Validates the internal consistency of this reference.
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.size == 0 {
            return Err(VaultError::InvalidChunk(format!(
                "chunk {} has zero plaintext size",
                self.plain_hash
            )));
        }
        if self.is_encrypted() && self.iv.is_none() {
            return Err(VaultError::InvalidChunk(format!(
                "encrypted chunk {} is missing its nonce",
                self.plain_hash
            )));
        }
        if !self.is_encrypted() && self.iv.is_some() {
            return Err(VaultError::InvalidChunk(format!(
                "unencrypted chunk {} carries a nonce",
                self.plain_hash
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> ContentHash {
        ContentHash::of_bytes(b"plaintext")
    }

    fn stored() -> ContentHash {
        ContentHash::of_bytes(b"ciphertext")
    }

    #[test]
    fn test_plain_ref_collapses_identities() {
        let r = ChunkRef::new_plain(0, plain(), 42, false);
        assert_eq!(r.plain_hash, r.storage_hash);
        assert!(!r.is_encrypted());
        assert!(r.validate().is_ok());
    }

    #[test]
    fn test_encrypted_ref_requires_distinct_hashes() {
        let err = ChunkRef::new_encrypted(0, plain(), plain(), 42, 58, "bm9uY2U=".into(), false);
        assert!(err.is_err());

        let ok = ChunkRef::new_encrypted(0, plain(), stored(), 42, 58, "bm9uY2U=".into(), false);
        assert!(ok.is_ok());
        assert!(ok.unwrap().is_encrypted());
    }

    #[test]
    fn test_validate_rejects_zero_size() {
        let r = ChunkRef::new_plain(0, plain(), 0, false);
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_dedup_flag_not_serialized() {
        let r = ChunkRef::new_plain(3, plain(), 10, false).into_deduplicated();
        let json = serde_json::to_string(&r).unwrap();
        assert!(!json.contains("deduplicated"));
        let back: ChunkRef = serde_json::from_str(&json).unwrap();
        assert!(!back.deduplicated);
        assert_eq!(back.index, 3);
    }

    #[test]
    fn test_storage_hash_wire_name() {
        let r = ChunkRef::new_plain(0, plain(), 10, false);
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("encrypted_hash"));
        assert!(!json.contains("storage_hash"));
    }
}
