// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Deduplication Index
//!
//! Persistent mapping from plain hash to chunk index entry, loaded at
//! vault open and written back as a single JSON document with
//! write-temp-then-rename on flush. A dirty flag avoids no-op flushes.
//!
//! In-memory access is guarded by one reader/writer lock: many
//! concurrent lookups, one mutation at a time. Accessors return owned
//! snapshots, never references into the map, so callers cannot observe
//! mid-mutation state and carry no lifetime coupling to the index.
//!
//! ## Reference counting
//!
//! Two decrement paths exist with different store semantics:
//!
//! - [`DedupIndex::release_chunk`] decrements only; entries that reach
//!   zero stay in the index, eligible for the next [`DedupIndex::gc`]
//!   sweep. This is the manifest-delete path.
//! - [`DedupIndex::remove_chunk`] decrements and, at zero, removes the
//!   entry and deletes the store blob eagerly. This is the compensation
//!   path for failed writes, keeping "entry iff blob" intact.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use chunk_vault_domain::entities::ChunkIndexEntry;
use chunk_vault_domain::{ChunkRef, ContentHash, VaultError};

use crate::infrastructure::store::ChunkStore;

/// Persistent index document name, relative to the vault root.
pub const INDEX_FILE: &str = ".dedup_index.json";

/// Aggregate statistics over the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
    pub total_chunks: u64,
    /// Sum of plaintext sizes over all entries.
    pub total_size: u64,
    pub unreferenced_chunks: u64,
    /// Bytes saved by deduplication: size * (refcount - 1) over entries
    /// with refcount >= 2.
    pub saved_space: u64,
}

struct IndexInner {
    entries: HashMap<ContentHash, ChunkIndexEntry>,
    /// Secondary key set so sync diffs can test storage hashes without
    /// scanning every entry.
    storage_hashes: HashSet<ContentHash>,
    dirty: bool,
}

/// The deduplication index of one vault.
pub struct DedupIndex {
    path: PathBuf,
    store: ChunkStore,
    inner: RwLock<IndexInner>,
}

impl DedupIndex {
    /// Opens the index for a vault, loading the persisted document when
    /// present.
    pub fn open(vault_root: impl AsRef<Path>, store: ChunkStore) -> Result<Self, VaultError> {
        let path = vault_root.as_ref().join(INDEX_FILE);
        let entries: HashMap<ContentHash, ChunkIndexEntry> = if path.exists() {
            let doc = fs::read(&path).map_err(|e| VaultError::io_error_at(&path, e))?;
            let listed: Vec<ChunkIndexEntry> = serde_json::from_slice(&doc)
                .map_err(|e| VaultError::VaultCorrupt(format!("{}: {}", path.display(), e)))?;
            listed
                .into_iter()
                .map(|entry| (entry.plain_hash.clone(), entry))
                .collect()
        } else {
            HashMap::new()
        };
        let storage_hashes = entries.values().map(|e| e.storage_hash.clone()).collect();
        debug!(entries = entries.len(), "dedup index loaded");
        Ok(Self {
            path,
            store,
            inner: RwLock::new(IndexInner {
                entries,
                storage_hashes,
                dirty: false,
            }),
        })
    }

    /// Records a reference to a chunk.
    ///
    /// Returns an owned snapshot of the entry and whether the chunk was
    /// already present (a dedup hit). A new entry starts at refcount 1.
    pub fn add_chunk(&self, chunk: &ChunkRef) -> Result<(ChunkIndexEntry, bool), VaultError> {
        chunk.validate()?;
        let inner = &mut *self.inner.write();
        inner.dirty = true;
        if let Some(entry) = inner.entries.get_mut(&chunk.plain_hash) {
            entry.add_reference();
            return Ok((entry.clone(), true));
        }
        let entry = ChunkIndexEntry::first_reference(chunk);
        inner.storage_hashes.insert(entry.storage_hash.clone());
        inner
            .entries
            .insert(entry.plain_hash.clone(), entry.clone());
        Ok((entry, false))
    }

    /// Releases one reference, leaving a zero-refcount entry in place for
    /// the next GC sweep. Unknown hashes are a no-op with a warning.
    pub fn release_chunk(&self, plain_hash: &ContentHash) {
        let inner = &mut *self.inner.write();
        match inner.entries.get_mut(plain_hash) {
            Some(entry) => {
                entry.release_reference();
                inner.dirty = true;
            }
            None => warn!(hash = %plain_hash, "released a chunk the index does not know"),
        }
    }

    /// Releases one reference and, when the count reaches zero, removes
    /// the entry and deletes the store blob eagerly.
    ///
    /// Failure to delete the blob is logged but does not roll back the
    /// index change; the next GC sweep restores "entry iff blob".
    pub fn remove_chunk(&self, plain_hash: &ContentHash) {
        let removed = {
            let inner = &mut *self.inner.write();
            let Some(entry) = inner.entries.get_mut(plain_hash) else {
                warn!(hash = %plain_hash, "removed a chunk the index does not know");
                return;
            };
            entry.release_reference();
            inner.dirty = true;
            if !entry.is_unreferenced() {
                return;
            }
            let entry = inner.entries.remove(plain_hash);
            if let Some(entry) = &entry {
                inner.storage_hashes.remove(&entry.storage_hash);
            }
            entry
        };
        if let Some(entry) = removed {
            if let Err(err) = self.store.delete(&entry.storage_hash) {
                warn!(hash = %entry.storage_hash, error = %err, "failed to delete unreferenced blob");
            }
        }
    }

    /// Owned snapshot of an entry, by plain hash.
    pub fn get(&self, plain_hash: &ContentHash) -> Option<ChunkIndexEntry> {
        self.inner.read().entries.get(plain_hash).cloned()
    }

    /// Whether the index knows this plain hash.
    pub fn contains_plain(&self, plain_hash: &ContentHash) -> bool {
        self.inner.read().entries.contains_key(plain_hash)
    }

    /// Whether any entry stores its blob under this storage hash.
    pub fn contains_storage(&self, storage_hash: &ContentHash) -> bool {
        self.inner.read().storage_hashes.contains(storage_hash)
    }

    /// Resolves a storage hash to an entry snapshot.
    pub fn get_by_storage(&self, storage_hash: &ContentHash) -> Option<ChunkIndexEntry> {
        let inner = self.inner.read();
        inner
            .entries
            .values()
            .find(|entry| entry.storage_hash == *storage_hash)
            .cloned()
    }

    /// Garbage-collects every entry with a zero refcount, deleting its
    /// blob best-effort. Exclusive with all other index mutations.
    pub fn gc(&self) -> Result<u64, VaultError> {
        let inner = &mut *self.inner.write();
        let doomed: Vec<ContentHash> = inner
            .entries
            .values()
            .filter(|entry| entry.is_unreferenced())
            .map(|entry| entry.plain_hash.clone())
            .collect();
        if doomed.is_empty() {
            return Ok(0);
        }
        let mut removed = 0u64;
        for plain_hash in doomed {
            if let Some(entry) = inner.entries.remove(&plain_hash) {
                inner.storage_hashes.remove(&entry.storage_hash);
                if let Err(err) = self.store.delete(&entry.storage_hash) {
                    warn!(hash = %entry.storage_hash, error = %err, "failed to delete blob during gc");
                }
                removed += 1;
            }
        }
        inner.dirty = true;
        info!(removed, "dedup gc complete");
        Ok(removed)
    }

    /// Aggregate statistics snapshot.
    pub fn stats(&self) -> DedupStats {
        let inner = self.inner.read();
        let mut stats = DedupStats {
            total_chunks: inner.entries.len() as u64,
            ..DedupStats::default()
        };
        for entry in inner.entries.values() {
            stats.total_size += entry.size;
            if entry.is_unreferenced() {
                stats.unreferenced_chunks += 1;
            }
            stats.saved_space += entry.saved_bytes();
        }
        stats
    }

    /// All plain hashes currently indexed.
    pub fn plain_hashes(&self) -> Vec<ContentHash> {
        self.inner.read().entries.keys().cloned().collect()
    }

    /// Owned snapshots of all entries.
    pub fn entries(&self) -> Vec<ChunkIndexEntry> {
        self.inner.read().entries.values().cloned().collect()
    }

    /// Writes the index document when dirty, with temp-file + rename.
    pub fn flush(&self) -> Result<(), VaultError> {
        let snapshot: Vec<ChunkIndexEntry> = {
            let mut inner = self.inner.write();
            if !inner.dirty {
                return Ok(());
            }
            inner.dirty = false;
            // Stable ordering keeps the document diffable.
            let sorted: BTreeMap<&ContentHash, &ChunkIndexEntry> =
                inner.entries.iter().collect();
            sorted.values().map(|entry| (*entry).clone()).collect()
        };
        let doc = serde_json::to_vec_pretty(&snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).map_err(|e| VaultError::io_error_at(&tmp, e))?;
        file.write_all(&doc).map_err(|e| VaultError::io_error_at(&tmp, e))?;
        file.sync_all().map_err(|e| VaultError::io_error_at(&tmp, e))?;
        drop(file);
        fs::rename(&tmp, &self.path).map_err(|e| VaultError::io_error_at(&self.path, e))?;
        debug!(entries = snapshot.len(), "dedup index flushed");
        Ok(())
    }
}
