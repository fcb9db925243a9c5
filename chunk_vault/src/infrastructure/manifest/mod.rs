// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Manifest Store
//!
//! One JSON document per logical file under `<vault>/.manifests/`, named
//! by the safe-name mapping of the logical path. Loading scans the
//! directory filtered by extension; a malformed manifest is skipped with
//! a warning so one damaged document never prevents opening the vault.
//! All writes go through the transaction journal.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use chunk_vault_domain::{FileManifest, VaultError};

use crate::infrastructure::journal::Transaction;

/// Manifest directory, relative to the vault root.
pub const MANIFESTS_DIR: &str = ".manifests";

/// Manifest document extension.
pub const MANIFEST_EXT: &str = "json";

/// Store for a vault's file manifests.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    root: PathBuf,
}

impl ManifestStore {
    /// Opens the store, creating `.manifests/` if needed.
    pub fn open(vault_root: impl AsRef<Path>) -> Result<Self, VaultError> {
        let root = vault_root.as_ref().join(MANIFESTS_DIR);
        fs::create_dir_all(&root).map_err(|e| VaultError::io_error_at(&root, e))?;
        Ok(Self { root })
    }

    fn document_name(logical_path: &str) -> String {
        format!("{}.{}", FileManifest::safe_name_for(logical_path), MANIFEST_EXT)
    }

    /// The vault-relative path of a manifest document.
    pub fn rel_path(logical_path: &str) -> String {
        format!("{}/{}", MANIFESTS_DIR, Self::document_name(logical_path))
    }

    /// Whether a manifest exists for the logical path.
    pub fn exists(&self, logical_path: &str) -> bool {
        self.root.join(Self::document_name(logical_path)).is_file()
    }

    /// Loads one manifest by logical path.
    pub fn load(&self, logical_path: &str) -> Result<FileManifest, VaultError> {
        let path = self.root.join(Self::document_name(logical_path));
        if !path.is_file() {
            return Err(VaultError::VaultNotFound(format!(
                "no manifest for {}",
                logical_path
            )));
        }
        let doc = fs::read(&path).map_err(|e| VaultError::io_error_at(&path, e))?;
        let manifest: FileManifest = serde_json::from_slice(&doc)
            .map_err(|e| VaultError::VaultCorrupt(format!("{}: {}", path.display(), e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Loads every readable manifest, skipping malformed documents with
    /// a warning.
    pub fn list(&self) -> Result<Vec<FileManifest>, VaultError> {
        let mut manifests = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(|e| VaultError::io_error_at(&self.root, e))? {
            let entry = entry.map_err(|e| VaultError::io_error_at(&self.root, e))?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(MANIFEST_EXT) {
                continue;
            }
            let doc = match fs::read(&path) {
                Ok(doc) => doc,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable manifest");
                    continue;
                }
            };
            match serde_json::from_slice::<FileManifest>(&doc) {
                Ok(manifest) => match manifest.validate() {
                    Ok(()) => manifests.push(manifest),
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "skipping invalid manifest");
                    }
                },
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping malformed manifest");
                }
            }
        }
        manifests.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        Ok(manifests)
    }

    /// Stages a manifest write (create or replace) through a
    /// transaction.
    pub fn save_staged(&self, txn: &Transaction, manifest: &FileManifest) -> Result<(), VaultError> {
        manifest.validate()?;
        let doc = serde_json::to_vec_pretty(manifest)?;
        txn.stage_upsert_bytes(&Self::rel_path(&manifest.file_path), &doc)
    }

    /// Stages deletion of a manifest through a transaction.
    pub fn delete_staged(&self, txn: &Transaction, logical_path: &str) -> Result<(), VaultError> {
        txn.stage_delete(&Self::rel_path(logical_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use chunk_vault_domain::{ChunkRef, ContentHash};
    use tempfile::TempDir;

    fn manifest(logical_path: &str, data: &[u8]) -> FileManifest {
        let chunk = ChunkRef::new_plain(0, ContentHash::of_bytes(data), data.len() as u64, false);
        FileManifest::new(
            logical_path,
            data.len() as u64,
            Utc::now(),
            vec![chunk],
            Vec::new(),
            ContentHash::of_bytes(data),
        )
        .unwrap()
    }

    fn commit_save(dir: &TempDir, store: &ManifestStore, m: &FileManifest) {
        let txn = Transaction::begin(dir.path(), "save manifest").unwrap();
        store.save_staged(&txn, m).unwrap();
        txn.commit().unwrap();
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::open(dir.path()).unwrap();
        let m = manifest("docs/report.txt", b"contents");
        commit_save(&dir, &store, &m);

        assert!(store.exists("docs/report.txt"));
        let loaded = store.load("docs/report.txt").unwrap();
        assert_eq!(loaded.file_path, "docs/report.txt");
        assert_eq!(loaded.chunks, m.chunks);
    }

    #[test]
    fn test_safe_name_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::open(dir.path()).unwrap();
        commit_save(&dir, &store, &manifest("a/b/c.txt", b"x"));
        assert!(dir.path().join(".manifests/a_b_c.txt.json").is_file());
    }

    #[test]
    fn test_list_skips_malformed() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::open(dir.path()).unwrap();
        commit_save(&dir, &store, &manifest("good.txt", b"fine"));
        fs::write(dir.path().join(".manifests/broken.json"), b"{ nope").unwrap();
        fs::write(dir.path().join(".manifests/notes.md"), b"ignored").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].file_path, "good.txt");
    }

    #[test]
    fn test_replace_existing() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::open(dir.path()).unwrap();
        commit_save(&dir, &store, &manifest("file.txt", b"v1"));
        commit_save(&dir, &store, &manifest("file.txt", b"v2-longer"));

        let loaded = store.load("file.txt").unwrap();
        assert_eq!(loaded.size, 9);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_delete() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::open(dir.path()).unwrap();
        commit_save(&dir, &store, &manifest("gone.txt", b"bye"));

        let txn = Transaction::begin(dir.path(), "delete manifest").unwrap();
        store.delete_staged(&txn, "gone.txt").unwrap();
        txn.commit().unwrap();
        assert!(!store.exists("gone.txt"));
        assert!(matches!(store.load("gone.txt"), Err(VaultError::VaultNotFound(_))));
    }
}
