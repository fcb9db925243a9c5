// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # File Manifest Entity
//!
//! A file manifest describes one logical file as an ordered list of chunk
//! references plus metadata: logical path, size, modification time, tags,
//! whole-file content hash, and sync/verification timestamps. One manifest
//! document is stored per logical file under `.manifests/`.
//!
//! ## Invariants
//!
//! - chunk indices are dense and monotonic from 0;
//! - the sum of plaintext chunk sizes equals the file size;
//! - a manifest is only usable if every referenced plain hash is either
//!   in the local index or fetchable from a trusted peer (enforced by the
//!   reference rebuild, not here).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::VaultError;
use crate::value_objects::{ChunkRef, ContentHash};

/// Manifest of one logical file stored in the vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileManifest {
    /// Logical path of the file inside the vault namespace.
    pub file_path: String,

    /// Optional destination prefix applied on retrieve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// Plaintext file size in bytes.
    pub size: u64,

    /// Source file modification time at ingest.
    pub mtime: DateTime<Utc>,

    /// Ordered chunk references.
    pub chunks: Vec<ChunkRef>,

    /// User-assigned tags.
    #[serde(default)]
    pub tags: Vec<String>,

    /// SHA-256 of the whole plaintext file.
    pub content_hash: ContentHash,

    /// Merkle root over the chunk plain hashes, when computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merkle_root: Option<String>,

    pub added_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_verified: Option<DateTime<Utc>>,
}

impl FileManifest {
    /// Creates a manifest and validates its chunk list.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file_path: impl Into<String>,
        size: u64,
        mtime: DateTime<Utc>,
        chunks: Vec<ChunkRef>,
        tags: Vec<String>,
        content_hash: ContentHash,
    ) -> Result<Self, VaultError> {
        let merkle_root = Self::merkle_root_of(&chunks);
        let manifest = Self {
            file_path: file_path.into(),
            destination: None,
            size,
            mtime,
            chunks,
            tags,
            content_hash,
            merkle_root,
            added_at: Utc::now(),
            last_synced: None,
            last_verified: None,
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Binary Merkle root over the chunk plain hashes, hex-encoded.
    /// Odd levels promote their last node unchanged.
    pub fn merkle_root_of(chunks: &[ChunkRef]) -> Option<String> {
        if chunks.is_empty() {
            return None;
        }
        let mut level: Vec<Vec<u8>> = chunks
            .iter()
            .map(|c| c.plain_hash.to_bytes())
            .collect();
        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            for pair in level.chunks(2) {
                if pair.len() == 2 {
                    let mut hasher = Sha256::new();
                    hasher.update(&pair[0]);
                    hasher.update(&pair[1]);
                    next.push(hasher.finalize().to_vec());
                } else {
                    next.push(pair[0].clone());
                }
            }
            level = next;
        }
        Some(hex::encode(&level[0]))
    }

    /// Validates the manifest invariants.
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.file_path.is_empty() {
            return Err(VaultError::ValidationError(
                "manifest has an empty logical path".to_string(),
            ));
        }
        for (expected, chunk) in self.chunks.iter().enumerate() {
            if chunk.index as usize != expected {
                return Err(VaultError::ValidationError(format!(
                    "manifest {}: chunk index {} found where {} was expected",
                    self.file_path, chunk.index, expected
                )));
            }
            chunk.validate()?;
        }
        let total: u64 = self.chunks.iter().map(|c| c.size).sum();
        if total != self.size {
            return Err(VaultError::ValidationError(format!(
                "manifest {}: chunk sizes sum to {} but file size is {}",
                self.file_path, total, self.size
            )));
        }
        Ok(())
    }

    /// Maps the logical path to a filesystem-safe manifest name by
    /// replacing `/`, `\` and `:` with `_`.
    pub fn safe_name(&self) -> String {
        Self::safe_name_for(&self.file_path)
    }

    /// Safe-name mapping for an arbitrary logical path.
    pub fn safe_name_for(logical_path: &str) -> String {
        logical_path
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' => '_',
                other => other,
            })
            .collect()
    }

    /// Iterates the plain hashes referenced by this manifest.
    pub fn referenced_plain_hashes(&self) -> impl Iterator<Item = &ContentHash> {
        self.chunks.iter().map(|c| &c.plain_hash)
    }

    /// Whether any chunk reference carries the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Stamps the manifest as verified now.
    pub fn mark_verified(&mut self) {
        self.last_verified = Some(Utc::now());
    }

    /// Stamps the manifest as synced now.
    pub fn mark_synced(&mut self) {
        self.last_synced = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: u32, data: &[u8]) -> ChunkRef {
        ChunkRef::new_plain(index, ContentHash::of_bytes(data), data.len() as u64, false)
    }

    fn manifest_with(chunks: Vec<ChunkRef>, size: u64) -> Result<FileManifest, VaultError> {
        FileManifest::new(
            "docs/notes.txt",
            size,
            Utc::now(),
            chunks,
            vec!["docs".to_string()],
            ContentHash::of_bytes(b"whole file"),
        )
    }

    #[test]
    fn test_valid_manifest() {
        let m = manifest_with(vec![chunk(0, b"aaaa"), chunk(1, b"bb")], 6).unwrap();
        assert_eq!(m.chunks.len(), 2);
        assert!(m.has_tag("docs"));
        assert!(!m.has_tag("media"));
    }

    #[test]
    fn test_rejects_sparse_indices() {
        let result = manifest_with(vec![chunk(0, b"aaaa"), chunk(2, b"bb")], 6);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_size_mismatch() {
        let result = manifest_with(vec![chunk(0, b"aaaa")], 999);
        assert!(result.is_err());
    }

    #[test]
    fn test_safe_name_mapping() {
        assert_eq!(
            FileManifest::safe_name_for("docs/2025/plan:v2.txt"),
            "docs_2025_plan_v2.txt"
        );
        assert_eq!(FileManifest::safe_name_for(r"win\path"), "win_path");
    }

    #[test]
    fn test_referenced_hashes() {
        let m = manifest_with(vec![chunk(0, b"aaaa"), chunk(1, b"bb")], 6).unwrap();
        let hashes: Vec<_> = m.referenced_plain_hashes().collect();
        assert_eq!(hashes.len(), 2);
        assert_eq!(*hashes[0], ContentHash::of_bytes(b"aaaa"));
    }

    #[test]
    fn test_merkle_root() {
        let single = manifest_with(vec![chunk(0, b"only")], 4).unwrap();
        // One chunk: the root is that chunk's plain hash.
        assert_eq!(
            single.merkle_root.as_deref(),
            Some(ContentHash::of_bytes(b"only").as_str())
        );

        let double = manifest_with(vec![chunk(0, b"aaaa"), chunk(1, b"bb")], 6).unwrap();
        assert!(double.merkle_root.is_some());
        assert_ne!(double.merkle_root, single.merkle_root);

        // The root is a function of the chunk list alone.
        let again = manifest_with(vec![chunk(0, b"aaaa"), chunk(1, b"bb")], 6).unwrap();
        assert_eq!(double.merkle_root, again.merkle_root);
    }

    #[test]
    fn test_verification_stamp() {
        let mut m = manifest_with(vec![chunk(0, b"abcd")], 4).unwrap();
        assert!(m.last_verified.is_none());
        m.mark_verified();
        assert!(m.last_verified.is_some());
    }

    #[test]
    fn test_serde_round_trip() {
        let m = manifest_with(vec![chunk(0, b"aaaa"), chunk(1, b"bb")], 6).unwrap();
        let json = serde_json::to_string_pretty(&m).unwrap();
        let back: FileManifest = serde_json::from_str(&json).unwrap();
        back.validate().unwrap();
        assert_eq!(back.file_path, m.file_path);
        assert_eq!(back.chunks, m.chunks);
    }
}
