// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use chunk_vault_domain::{ContentHash, VaultError};

use crate::infrastructure::journal::Transaction;

/// Chunk blob directory, relative to the vault root.
pub const CHUNKS_DIR: &str = ".chunks";

/// Content-addressed blob store over a vault's `.chunks/` directory.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    /// Opens the store for a vault, creating `.chunks/` if needed.
    pub fn open(vault_root: impl AsRef<Path>) -> Result<Self, VaultError> {
        let root = vault_root.as_ref().join(CHUNKS_DIR);
        fs::create_dir_all(&root).map_err(|e| VaultError::io_error_at(&root, e))?;
        Ok(Self { root })
    }

    /// Absolute path of a blob.
    pub fn blob_path(&self, storage_hash: &ContentHash) -> PathBuf {
        self.root.join(storage_hash.as_str())
    }

    /// The vault-relative staged path for a blob.
    pub fn staged_rel_path(storage_hash: &ContentHash) -> String {
        format!("{}/{}", CHUNKS_DIR, storage_hash.as_str())
    }

    /// Whether a blob exists.
    pub fn exists(&self, storage_hash: &ContentHash) -> bool {
        self.blob_path(storage_hash).is_file()
    }

    /// Writes a blob directly. Idempotent: an existing blob is left
    /// untouched (content addressing makes overwrites meaningless).
    pub fn put(&self, storage_hash: &ContentHash, bytes: &[u8]) -> Result<(), VaultError> {
        let path = self.blob_path(storage_hash);
        if path.exists() {
            debug!(hash = %storage_hash, "blob already present, skipping write");
            return Ok(());
        }
        // Temp + rename so a crashed direct write never leaves a partial
        // blob under its content-addressed name.
        let tmp = self.root.join(format!("{}.tmp", storage_hash.as_str()));
        fs::write(&tmp, bytes).map_err(|e| VaultError::io_error_at(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| VaultError::io_error_at(&path, e))?;
        Ok(())
    }

    /// Stages a blob write through an open transaction. Idempotent like
    /// [`ChunkStore::put`].
    pub fn put_staged(
        &self,
        txn: &Transaction,
        storage_hash: &ContentHash,
        bytes: &[u8],
    ) -> Result<(), VaultError> {
        if self.exists(storage_hash) {
            debug!(hash = %storage_hash, "blob already present, skipping stage");
            return Ok(());
        }
        txn.stage_create_bytes(&Self::staged_rel_path(storage_hash), bytes)
    }

    /// Reads a blob. Transient read errors are retried once.
    pub fn get(&self, storage_hash: &ContentHash) -> Result<Vec<u8>, VaultError> {
        let path = self.blob_path(storage_hash);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(VaultError::ChunkMissing(storage_hash.to_string()))
            }
            Err(first) => {
                warn!(path = %path.display(), error = %first, "chunk read failed, retrying once");
                fs::read(&path).map_err(|e| VaultError::io_error_at(&path, e))
            }
        }
    }

    /// Deletes a blob, best-effort. A missing blob is success.
    pub fn delete(&self, storage_hash: &ContentHash) -> Result<(), VaultError> {
        let path = self.blob_path(storage_hash);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(VaultError::io_error_at(&path, err)),
        }
    }

    /// Lists the storage hashes of all blobs currently present.
    pub fn list(&self) -> Result<Vec<ContentHash>, VaultError> {
        let mut hashes = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(|e| VaultError::io_error_at(&self.root, e))? {
            let entry = entry.map_err(|e| VaultError::io_error_at(&self.root, e))?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            match ContentHash::parse(name) {
                Ok(hash) => hashes.push(hash),
                // Leftover temp files and foreign content are not blobs.
                Err(_) => debug!(name, "ignoring non-blob file in chunk store"),
            }
        }
        Ok(hashes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, ChunkStore) {
        let dir = TempDir::new().unwrap();
        let store = ChunkStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_put_get_round_trip() {
        let (_dir, store) = store();
        let hash = ContentHash::of_bytes(b"blob");
        store.put(&hash, b"blob").unwrap();
        assert!(store.exists(&hash));
        assert_eq!(store.get(&hash).unwrap(), b"blob");
    }

    #[test]
    fn test_put_is_idempotent() {
        let (_dir, store) = store();
        let hash = ContentHash::of_bytes(b"blob");
        store.put(&hash, b"blob").unwrap();
        store.put(&hash, b"blob").unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_get_missing_is_chunk_missing() {
        let (_dir, store) = store();
        let hash = ContentHash::of_bytes(b"never stored");
        assert!(matches!(store.get(&hash), Err(VaultError::ChunkMissing(_))));
    }

    #[test]
    fn test_delete_is_best_effort() {
        let (_dir, store) = store();
        let hash = ContentHash::of_bytes(b"blob");
        store.put(&hash, b"blob").unwrap();
        store.delete(&hash).unwrap();
        assert!(!store.exists(&hash));
        // Deleting again is still success.
        store.delete(&hash).unwrap();
    }

    #[test]
    fn test_staged_put_lands_on_commit() {
        let (dir, store) = store();
        let txn = Transaction::begin(dir.path(), "test").unwrap();
        let hash = ContentHash::of_bytes(b"staged blob");
        store.put_staged(&txn, &hash, b"staged blob").unwrap();
        assert!(!store.exists(&hash));
        txn.commit().unwrap();
        assert!(store.exists(&hash));
        assert_eq!(store.get(&hash).unwrap(), b"staged blob");
    }

    #[test]
    fn test_list_skips_foreign_files() {
        let (dir, store) = store();
        let hash = ContentHash::of_bytes(b"blob");
        store.put(&hash, b"blob").unwrap();
        fs::write(dir.path().join(".chunks/readme.txt"), b"not a blob").unwrap();
        let listed = store.list().unwrap();
        assert_eq!(listed, vec![hash]);
    }
}
