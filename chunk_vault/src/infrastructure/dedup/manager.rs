// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Dedup Manager
//!
//! Thin orchestration of the chunk write path. For every encrypted (or
//! plain) blob arriving from the pipeline, the manager decides between
//! three outcomes:
//!
//! 1. dedup disabled or chunk size outside the configured range: write
//!    the blob and report no deduplication;
//! 2. dedup hit: increment the refcount only, no write;
//! 3. dedup miss: record the entry, then write the blob; if the write
//!    fails, the entry is compensated away so "entry iff blob" holds.

use std::sync::Arc;

use tracing::debug;

use chunk_vault_domain::entities::vault_config::DedupSettings;
use chunk_vault_domain::{ChunkRef, VaultError};

use crate::infrastructure::journal::Transaction;
use crate::infrastructure::store::ChunkStore;

use super::index::DedupIndex;

/// Write-path orchestrator over the store and the dedup index.
pub struct DedupManager {
    index: Arc<DedupIndex>,
    store: ChunkStore,
    settings: DedupSettings,
}

impl DedupManager {
    pub fn new(index: Arc<DedupIndex>, store: ChunkStore, settings: DedupSettings) -> Self {
        Self {
            index,
            store,
            settings,
        }
    }

    pub fn index(&self) -> &Arc<DedupIndex> {
        &self.index
    }

    /// Processes one chunk blob through the dedup write path.
    ///
    /// `bytes` is the blob exactly as it will sit in the store (already
    /// compressed/encrypted). When `txn` is given the write is staged
    /// through the journal; otherwise it lands directly.
    ///
    /// Returns the (possibly dedup-flagged) reference and whether the
    /// chunk was deduplicated.
    pub fn process_chunk(
        &self,
        chunk: ChunkRef,
        bytes: &[u8],
        txn: Option<&Transaction>,
    ) -> Result<(ChunkRef, bool), VaultError> {
        let indexed = self.settings.enabled
            && self.settings.index_enabled
            && self.settings.in_dedup_range(chunk.size);

        if !indexed {
            self.write_blob(&chunk, bytes, txn)?;
            return Ok((chunk, false));
        }

        let (entry, was_deduplicated) = self.index.add_chunk(&chunk)?;
        if was_deduplicated {
            debug!(hash = %chunk.plain_hash, "dedup hit");
            // The candidate blob was never written; the manifest must
            // reference the blob already in the store. With encryption
            // on, the two differ in storage hash and nonce.
            let canonical = entry.to_chunk_ref(chunk.index).into_deduplicated();
            return Ok((canonical, true));
        }

        if let Err(err) = self.write_blob(&chunk, bytes, txn) {
            // Compensate so the index never references a blob that was
            // not written.
            self.index.remove_chunk(&chunk.plain_hash);
            return Err(err);
        }
        Ok((chunk, false))
    }

    fn write_blob(
        &self,
        chunk: &ChunkRef,
        bytes: &[u8],
        txn: Option<&Transaction>,
    ) -> Result<(), VaultError> {
        match txn {
            Some(txn) => self.store.put_staged(txn, &chunk.storage_hash, bytes),
            None => self.store.put(&chunk.storage_hash, bytes),
        }
    }
}
