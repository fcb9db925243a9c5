// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Index Entry Entity
//!
//! One record of the deduplication index: the reference count and storage
//! location of a unique chunk, keyed by its plain hash. An entry exists
//! iff the corresponding blob exists in the chunk store (modulo a GC pass
//! in flight); a refcount of zero makes the entry eligible for garbage
//! collection.
//!
//! The entry is the canonical description of the stored blob. A dedup
//! hit rebuilds its manifest reference from the entry, never from the
//! candidate blob the writer just produced: with encryption on, two
//! encryptions of the same plaintext yield different blobs, and only
//! the first one exists in the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{ChunkRef, ContentHash};

/// Dedup index record for one unique chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkIndexEntry {
    /// Deduplication identity.
    pub plain_hash: ContentHash,

    /// Name of the blob in the chunk store.
    pub storage_hash: ContentHash,

    /// Plaintext size in bytes.
    pub size: u64,

    /// Size of the stored blob in bytes.
    pub encrypted_size: u64,

    /// Nonce/IV of the stored blob, base64. `None` for plaintext blobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,

    /// Number of manifest references to this chunk. Never negative; zero
    /// means GC-eligible.
    pub refcount: u64,

    pub first_seen: DateTime<Utc>,
    pub last_referenced: DateTime<Utc>,

    #[serde(default)]
    pub compressed: bool,

    #[serde(default)]
    pub encrypted: bool,
}

impl ChunkIndexEntry {
    /// Creates the entry for a chunk seen for the first time, with a
    /// reference count of one, copying the blob description from the
    /// reference that introduced it.
    pub fn first_reference(chunk: &ChunkRef) -> Self {
        let now = Utc::now();
        Self {
            plain_hash: chunk.plain_hash.clone(),
            storage_hash: chunk.storage_hash.clone(),
            size: chunk.size,
            encrypted_size: chunk.encrypted_size,
            iv: chunk.iv.clone(),
            refcount: 1,
            first_seen: now,
            last_referenced: now,
            compressed: chunk.compressed,
            encrypted: chunk.is_encrypted(),
        }
    }

    /// Rebuilds a manifest reference for this chunk at `index`,
    /// pointing at the blob actually in the store.
    pub fn to_chunk_ref(&self, index: u32) -> ChunkRef {
        ChunkRef {
            index,
            plain_hash: self.plain_hash.clone(),
            storage_hash: self.storage_hash.clone(),
            size: self.size,
            encrypted_size: self.encrypted_size,
            iv: self.iv.clone(),
            compressed: self.compressed,
            deduplicated: false,
        }
    }

    /// Records another reference to this chunk.
    pub fn add_reference(&mut self) {
        self.refcount += 1;
        self.last_referenced = Utc::now();
    }

    /// Releases one reference. Saturates at zero; releasing an already
    /// unreferenced entry is a no-op rather than an underflow.
    pub fn release_reference(&mut self) {
        self.refcount = self.refcount.saturating_sub(1);
    }

    /// Whether this entry may be garbage collected.
    pub fn is_unreferenced(&self) -> bool {
        self.refcount == 0
    }

    /// Bytes saved by deduplication for this entry: every reference past
    /// the first shares the single stored blob.
    pub fn saved_bytes(&self) -> u64 {
        self.size * self.refcount.saturating_sub(1)
    }
}
