// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transaction
//!
//! One in-flight transaction over a vault. Methods serialize on the
//! transaction's own lock; independent transactions may run in parallel
//! provided they touch disjoint final paths (the caller enforces that).
//!
//! ## Commit ordering
//!
//! The committer applies all Create/Replace renames before any
//! Delete/Replace trash removals, promoting new state strictly before
//! discarding old state. A crash mid-commit can therefore never leave an
//! object both unstaged and deleted.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use chunk_vault_domain::entities::{Journal, JournalEntry, JournalState};
use chunk_vault_domain::{TransactionId, VaultError};

/// Journal root directory, relative to the vault root.
pub const TXN_ROOT: &str = ".txn";

/// Staged-file directory inside a transaction directory.
pub const NEW_DIR: &str = "new";

/// Displaced-original directory inside a transaction directory.
pub const TRASH_DIR: &str = "trash";

/// Journal document name inside a transaction directory.
pub const JOURNAL_FILE: &str = "journal.json";

/// One crash-safe transaction over a vault directory.
pub struct Transaction {
    vault_root: PathBuf,
    txn_dir: PathBuf,
    journal: Mutex<Journal>,
}

impl Transaction {
    /// Opens a new transaction under `<vault>/.txn/<id>/`.
    pub fn begin(vault_root: impl AsRef<Path>, metadata: &str) -> Result<Self, VaultError> {
        let vault_root = vault_root.as_ref().to_path_buf();
        let txn_root = vault_root.join(TXN_ROOT);
        fs::create_dir_all(&txn_root).map_err(|e| VaultError::io_error_at(&txn_root, e))?;

        // Ids are microsecond timestamps; regenerate on the rare collision.
        let mut id = TransactionId::generate();
        let mut txn_dir = txn_root.join(id.as_str());
        for _ in 0..8 {
            if !txn_dir.exists() {
                break;
            }
            id = TransactionId::generate();
            txn_dir = txn_root.join(id.as_str());
        }
        if txn_dir.exists() {
            return Err(VaultError::TxnConflict(format!(
                "transaction directory {} already exists",
                txn_dir.display()
            )));
        }

        fs::create_dir_all(txn_dir.join(NEW_DIR))
            .map_err(|e| VaultError::io_error_at(&txn_dir, e))?;
        fs::create_dir_all(txn_dir.join(TRASH_DIR))
            .map_err(|e| VaultError::io_error_at(&txn_dir, e))?;

        let journal = Journal::new(id, metadata);
        persist_journal(&txn_dir, &journal)?;
        debug!(txn = %journal.id, %metadata, "transaction opened");

        Ok(Self {
            vault_root,
            txn_dir,
            journal: Mutex::new(journal),
        })
    }

    /// The transaction id.
    pub fn id(&self) -> TransactionId {
        self.journal.lock().id.clone()
    }

    /// The transaction directory (`<vault>/.txn/<id>`).
    pub fn txn_dir(&self) -> &Path {
        &self.txn_dir
    }

    /// Current journal state.
    pub fn state(&self) -> JournalState {
        self.journal.lock().state
    }

    /// Stages creation of a new file at `rel_path`.
    ///
    /// The final path must not exist yet; replacing an existing file is a
    /// distinct operation with backup semantics.
    pub fn stage_create(&self, rel_path: &str) -> Result<StagedWriter<'_>, VaultError> {
        let rel = normalize_rel_path(rel_path)?;
        let final_abs = self.vault_root.join(&rel);
        if final_abs.exists() {
            return Err(VaultError::TxnConflict(format!(
                "{} already exists; stage a replace instead",
                rel
            )));
        }
        self.open_writer(rel, None)
    }

    /// Stages replacement of an existing file at `rel_path`.
    ///
    /// The original is moved to `trash/` immediately, so the stage itself
    /// is atomic with respect to the source location.
    pub fn stage_replace(&self, rel_path: &str) -> Result<StagedWriter<'_>, VaultError> {
        let rel = normalize_rel_path(rel_path)?;
        let final_abs = self.vault_root.join(&rel);
        if !final_abs.exists() {
            return Err(VaultError::TxnConflict(format!(
                "{} does not exist; stage a create instead",
                rel
            )));
        }
        let backup_rel = format!("{}/{}", TRASH_DIR, rel);
        self.displace_to_trash(&final_abs, &backup_rel)?;
        self.open_writer(rel, Some(backup_rel))
    }

    /// Stages deletion of an existing file at `rel_path`. The original
    /// moves to `trash/` immediately and is discarded on commit.
    pub fn stage_delete(&self, rel_path: &str) -> Result<(), VaultError> {
        let rel = normalize_rel_path(rel_path)?;
        let final_abs = self.vault_root.join(&rel);
        if !final_abs.exists() {
            return Err(VaultError::TxnConflict(format!(
                "cannot delete {}: not found",
                rel
            )));
        }
        let backup_rel = format!("{}/{}", TRASH_DIR, rel);
        self.displace_to_trash(&final_abs, &backup_rel)?;
        self.append_entry(JournalEntry::Delete {
            final_path: rel,
            backup_path: backup_rel,
        })
    }

    /// Convenience wrapper: stage a create and write the whole buffer.
    pub fn stage_create_bytes(&self, rel_path: &str, bytes: &[u8]) -> Result<(), VaultError> {
        let mut writer = self.stage_create(rel_path)?;
        writer.write_all(bytes).map_err(VaultError::from)?;
        writer.finish()
    }

    /// Convenience wrapper: stage a replace and write the whole buffer.
    pub fn stage_replace_bytes(&self, rel_path: &str, bytes: &[u8]) -> Result<(), VaultError> {
        let mut writer = self.stage_replace(rel_path)?;
        writer.write_all(bytes).map_err(VaultError::from)?;
        writer.finish()
    }

    /// Stages a create or replace depending on whether the file exists.
    pub fn stage_upsert_bytes(&self, rel_path: &str, bytes: &[u8]) -> Result<(), VaultError> {
        let rel = normalize_rel_path(rel_path)?;
        if self.vault_root.join(&rel).exists() {
            self.stage_replace_bytes(&rel, bytes)
        } else {
            self.stage_create_bytes(&rel, bytes)
        }
    }

    /// Commits all staged mutations atomically.
    ///
    /// Any promote failure mid-way transitions the journal to `failed`
    /// and triggers an implicit rollback before the error is returned.
    pub fn commit(&self) -> Result<(), VaultError> {
        let entries = {
            let mut journal = self.journal.lock();
            journal.transition_to(JournalState::Committing)?;
            persist_journal(&self.txn_dir, &journal)?;
            journal.entries.clone()
        };

        match apply_commit(&self.vault_root, &self.txn_dir, &entries, false) {
            Ok(()) => {
                let mut journal = self.journal.lock();
                journal.transition_to(JournalState::Committed)?;
                persist_journal(&self.txn_dir, &journal)?;
                debug!(txn = %journal.id, entries = entries.len(), "transaction committed");
                Ok(())
            }
            Err(err) => {
                {
                    let mut journal = self.journal.lock();
                    journal.transition_to(JournalState::Failed)?;
                    persist_journal(&self.txn_dir, &journal)?;
                }
                warn!(error = %err, "commit failed, rolling back");
                self.rollback()?;
                Err(err)
            }
        }
    }

    /// Rolls back the transaction: staged files are discarded and
    /// displaced originals restored. Idempotent.
    pub fn rollback(&self) -> Result<(), VaultError> {
        let entries = {
            let mut journal = self.journal.lock();
            match journal.state {
                JournalState::RolledBack => return Ok(()),
                JournalState::Committed => {
                    return Err(VaultError::TxnConflict(format!(
                        "journal {} is committed and cannot roll back",
                        journal.id
                    )));
                }
                _ => {}
            }
            journal.transition_to(JournalState::RollingBack)?;
            persist_journal(&self.txn_dir, &journal)?;
            journal.entries.clone()
        };

        apply_rollback(&self.vault_root, &self.txn_dir, &entries);

        let mut journal = self.journal.lock();
        journal.transition_to(JournalState::RolledBack)?;
        persist_journal(&self.txn_dir, &journal)?;
        debug!(txn = %journal.id, "transaction rolled back");
        Ok(())
    }

    /// Removes the transaction directory. Only legal in a terminal state.
    pub fn cleanup(&self) -> Result<(), VaultError> {
        let state = self.state();
        if !state.is_terminal() {
            return Err(VaultError::TxnConflict(format!(
                "transaction is {} and cannot be cleaned up",
                state
            )));
        }
        fs::remove_dir_all(&self.txn_dir).map_err(|e| VaultError::io_error_at(&self.txn_dir, e))
    }

    fn open_writer(
        &self,
        rel: String,
        backup_rel: Option<String>,
    ) -> Result<StagedWriter<'_>, VaultError> {
        {
            // Fail fast before touching the filesystem.
            let journal = self.journal.lock();
            if journal.state != JournalState::Pending {
                return Err(VaultError::TxnConflict(format!(
                    "journal {} is {} and no longer accepts stages",
                    journal.id, journal.state
                )));
            }
        }
        let staged_rel = format!("{}/{}", NEW_DIR, rel);
        let staged_abs = self.txn_dir.join(&staged_rel);
        if let Some(parent) = staged_abs.parent() {
            fs::create_dir_all(parent).map_err(|e| VaultError::io_error_at(parent, e))?;
        }
        let file = fs::File::create(&staged_abs).map_err(|e| VaultError::io_error_at(&staged_abs, e))?;
        Ok(StagedWriter {
            txn: self,
            final_rel: rel,
            staged_rel,
            staged_abs,
            backup_rel,
            file: Some(file),
            hasher: Sha256::new(),
            written: 0,
        })
    }

    fn displace_to_trash(&self, final_abs: &Path, backup_rel: &str) -> Result<(), VaultError> {
        let backup_abs = self.txn_dir.join(backup_rel);
        if let Some(parent) = backup_abs.parent() {
            fs::create_dir_all(parent).map_err(|e| VaultError::io_error_at(parent, e))?;
        }
        fs::rename(final_abs, &backup_abs).map_err(|e| VaultError::io_error_at(final_abs, e))
    }

    fn append_entry(&self, entry: JournalEntry) -> Result<(), VaultError> {
        let mut journal = self.journal.lock();
        journal.push_entry(entry)?;
        persist_journal(&self.txn_dir, &journal)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        let journal = self.journal.lock();
        if !journal.state.is_terminal() {
            warn!(
                txn = %journal.id,
                state = %journal.state,
                "transaction dropped without commit or rollback; recovery will resolve it"
            );
        }
    }
}

/// Incremental writer for one staged file.
///
/// On [`StagedWriter::finish`] the SHA-256 and size of what was written
/// are recorded and the journal entry is appended atomically under the
/// transaction's lock. Dropping the writer without finishing leaves the
/// staged file behind for rollback/recovery to discard; no entry is
/// recorded.
pub struct StagedWriter<'a> {
    txn: &'a Transaction,
    final_rel: String,
    staged_rel: String,
    staged_abs: PathBuf,
    backup_rel: Option<String>,
    file: Option<fs::File>,
    hasher: Sha256,
    written: u64,
}

impl StagedWriter<'_> {
    /// Flushes the staged file and appends the journal entry.
    pub fn finish(mut self) -> Result<(), VaultError> {
        let file = self
            .file
            .take()
            .ok_or_else(|| VaultError::internal_error("staged writer finished twice"))?;
        file.sync_all()
            .map_err(|e| VaultError::io_error_at(&self.staged_abs, e))?;
        drop(file);

        let checksum = hex::encode(std::mem::take(&mut self.hasher).finalize());
        let entry = match self.backup_rel.take() {
            None => JournalEntry::Create {
                final_path: std::mem::take(&mut self.final_rel),
                staged_path: std::mem::take(&mut self.staged_rel),
                size: self.written,
                checksum,
            },
            Some(backup_path) => JournalEntry::Replace {
                final_path: std::mem::take(&mut self.final_rel),
                staged_path: std::mem::take(&mut self.staged_rel),
                backup_path,
                size: self.written,
                checksum,
            },
        };
        self.txn.append_entry(entry)
    }

    /// Bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }
}

impl Write for StagedWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| std::io::Error::other("staged writer already finished"))?;
        let n = file.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for StagedWriter<'_> {
    fn drop(&mut self) {
        if self.file.is_some() {
            warn!(path = %self.staged_abs.display(), "staged write dropped before finish");
        }
    }
}

/// Rejects absolute or parent-escaping relative paths.
fn normalize_rel_path(rel_path: &str) -> Result<String, VaultError> {
    let rel = rel_path.trim_matches('/');
    if rel.is_empty() {
        return Err(VaultError::ValidationError("empty staged path".to_string()));
    }
    let escapes = Path::new(rel).components().any(|c| {
        matches!(
            c,
            std::path::Component::ParentDir
                | std::path::Component::RootDir
                | std::path::Component::Prefix(_)
        )
    });
    if escapes {
        return Err(VaultError::ValidationError(format!(
            "staged path {:?} escapes the vault root",
            rel_path
        )));
    }
    Ok(rel.to_string())
}

/// Persists the journal document with write-temp-then-rename.
pub fn persist_journal(txn_dir: &Path, journal: &Journal) -> Result<(), VaultError> {
    let path = txn_dir.join(JOURNAL_FILE);
    let tmp = txn_dir.join(format!("{}.tmp", JOURNAL_FILE));
    let doc = serde_json::to_vec_pretty(journal)?;
    let mut file = fs::File::create(&tmp).map_err(|e| VaultError::io_error_at(&tmp, e))?;
    file.write_all(&doc).map_err(|e| VaultError::io_error_at(&tmp, e))?;
    file.sync_all().map_err(|e| VaultError::io_error_at(&tmp, e))?;
    drop(file);
    fs::rename(&tmp, &path).map_err(|e| VaultError::io_error_at(&path, e))
}

/// Loads the journal document of a transaction directory.
pub fn load_journal(txn_dir: &Path) -> Result<Journal, VaultError> {
    let path = txn_dir.join(JOURNAL_FILE);
    let doc = fs::read(&path).map_err(|e| VaultError::io_error_at(&path, e))?;
    serde_json::from_slice(&doc)
        .map_err(|e| VaultError::TxnCorrupt(format!("{}: {}", path.display(), e)))
}

/// Applies the commit phase: promote every staged file, then discard
/// trash copies.
///
/// With `tolerate_missing_staged` (recovery re-running an interrupted
/// commit), a missing staged file whose final path exists is treated as
/// already promoted.
pub(crate) fn apply_commit(
    vault_root: &Path,
    txn_dir: &Path,
    entries: &[JournalEntry],
    tolerate_missing_staged: bool,
) -> Result<(), VaultError> {
    // Promote new state strictly before discarding old state.
    for entry in entries {
        let Some(staged_rel) = entry.staged_path() else {
            continue;
        };
        let staged_abs = txn_dir.join(staged_rel);
        let final_abs = vault_root.join(entry.final_path());
        if let Some(parent) = final_abs.parent() {
            fs::create_dir_all(parent).map_err(|e| VaultError::io_error_at(parent, e))?;
        }
        match promote_file(&staged_abs, &final_abs) {
            Ok(()) => {}
            Err(err)
                if tolerate_missing_staged
                    && err.kind() == std::io::ErrorKind::NotFound
                    && final_abs.exists() =>
            {
                debug!(path = %final_abs.display(), "staged file already promoted");
            }
            Err(err) => return Err(VaultError::io_error_at(&staged_abs, err)),
        }
    }

    for entry in entries {
        let Some(backup_rel) = entry.backup_path() else {
            continue;
        };
        let backup_abs = txn_dir.join(backup_rel);
        if backup_abs.exists() {
            // Failure to unlink a trash copy is non-fatal; recovery or
            // retention cleanup will remove it with the directory.
            if let Err(err) = fs::remove_file(&backup_abs) {
                warn!(path = %backup_abs.display(), error = %err, "failed to discard trash copy");
            }
        }
    }
    Ok(())
}

/// Applies the rollback phase: discard staged files, restore displaced
/// originals whose final path is absent.
pub(crate) fn apply_rollback(vault_root: &Path, txn_dir: &Path, entries: &[JournalEntry]) {
    for entry in entries {
        if let Some(staged_rel) = entry.staged_path() {
            let staged_abs = txn_dir.join(staged_rel);
            match fs::remove_file(&staged_abs) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(path = %staged_abs.display(), error = %err, "failed to discard staged file");
                }
            }
        }
        if let Some(backup_rel) = entry.backup_path() {
            let backup_abs = txn_dir.join(backup_rel);
            let final_abs = vault_root.join(entry.final_path());
            // A final path that already exists (partial commit) wins over
            // the backup; restoring would clobber promoted state.
            if backup_abs.exists() && !final_abs.exists() {
                if let Some(parent) = final_abs.parent() {
                    if let Err(err) = fs::create_dir_all(parent) {
                        warn!(path = %parent.display(), error = %err, "failed to restore backup parent");
                        continue;
                    }
                }
                if let Err(err) = fs::rename(&backup_abs, &final_abs) {
                    warn!(path = %backup_abs.display(), error = %err, "failed to restore backup");
                }
            }
        }
    }
}

/// Renames `staged` onto `final_path`; on a cross-device rename failure,
/// falls back to copy + fsync + rename of a same-filesystem temp.
fn promote_file(staged: &Path, final_path: &Path) -> std::io::Result<()> {
    match fs::rename(staged, final_path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(err),
        Err(_) if staged.exists() => {
            let file_name = final_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("staged");
            let tmp = final_path.with_file_name(format!("{}.promote-tmp", file_name));
            fs::copy(staged, &tmp)?;
            let copied = fs::File::open(&tmp)?;
            copied.sync_all()?;
            drop(copied);
            fs::rename(&tmp, final_path)?;
            fs::remove_file(staged)?;
            Ok(())
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read(path: &Path) -> String {
        String::from_utf8(fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn test_create_commit_promotes() {
        let dir = TempDir::new().unwrap();
        let txn = Transaction::begin(dir.path(), "test").unwrap();
        txn.stage_create_bytes("docs/a.txt", b"hello").unwrap();
        assert!(!dir.path().join("docs/a.txt").exists());

        txn.commit().unwrap();
        assert_eq!(read(&dir.path().join("docs/a.txt")), "hello");
        assert_eq!(txn.state(), JournalState::Committed);
    }

    #[test]
    fn test_create_rejects_existing_final() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"old").unwrap();
        let txn = Transaction::begin(dir.path(), "test").unwrap();
        assert!(txn.stage_create("a.txt").is_err());
    }

    #[test]
    fn test_replace_displaces_original_at_stage_time() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"old").unwrap();
        let txn = Transaction::begin(dir.path(), "test").unwrap();
        txn.stage_replace_bytes("a.txt", b"new").unwrap();

        // Original is already gone from its final location.
        assert!(!dir.path().join("a.txt").exists());
        assert!(txn.txn_dir().join("trash/a.txt").exists());

        txn.commit().unwrap();
        assert_eq!(read(&dir.path().join("a.txt")), "new");
        assert!(!txn.txn_dir().join("trash/a.txt").exists());
    }

    #[test]
    fn test_delete_commit() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"old").unwrap();
        let txn = Transaction::begin(dir.path(), "test").unwrap();
        txn.stage_delete("a.txt").unwrap();
        txn.commit().unwrap();
        assert!(!dir.path().join("a.txt").exists());
    }

    #[test]
    fn test_rollback_restores_originals_and_discards_staged() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("keep.txt"), b"original").unwrap();
        fs::write(dir.path().join("gone.txt"), b"victim").unwrap();

        let txn = Transaction::begin(dir.path(), "test").unwrap();
        txn.stage_create_bytes("fresh.txt", b"fresh").unwrap();
        txn.stage_replace_bytes("keep.txt", b"changed").unwrap();
        txn.stage_delete("gone.txt").unwrap();

        txn.rollback().unwrap();
        assert!(!dir.path().join("fresh.txt").exists());
        assert_eq!(read(&dir.path().join("keep.txt")), "original");
        assert_eq!(read(&dir.path().join("gone.txt")), "victim");
        assert_eq!(txn.state(), JournalState::RolledBack);
    }

    #[test]
    fn test_rollback_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let txn = Transaction::begin(dir.path(), "test").unwrap();
        txn.stage_create_bytes("a.txt", b"x").unwrap();
        txn.rollback().unwrap();
        txn.rollback().unwrap();
    }

    #[test]
    fn test_no_stage_after_commit() {
        let dir = TempDir::new().unwrap();
        let txn = Transaction::begin(dir.path(), "test").unwrap();
        txn.stage_create_bytes("a.txt", b"x").unwrap();
        txn.commit().unwrap();
        assert!(txn.stage_create("b.txt").is_err());
    }

    #[test]
    fn test_writer_records_size_and_checksum() {
        let dir = TempDir::new().unwrap();
        let txn = Transaction::begin(dir.path(), "test").unwrap();
        let mut writer = txn.stage_create("a.bin").unwrap();
        writer.write_all(b"chunk-body").unwrap();
        writer.finish().unwrap();

        let journal = load_journal(txn.txn_dir()).unwrap();
        match &journal.entries[0] {
            JournalEntry::Create { size, checksum, .. } => {
                assert_eq!(*size, 10);
                assert_eq!(
                    *checksum,
                    hex::encode(Sha256::digest(b"chunk-body"))
                );
            }
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        let txn = Transaction::begin(dir.path(), "test").unwrap();
        assert!(txn.stage_create("../outside.txt").is_err());
        assert!(txn.stage_create("/etc/passwd").is_err());
        assert!(txn.stage_create("").is_err());
    }

    #[test]
    fn test_cleanup_requires_terminal_state() {
        let dir = TempDir::new().unwrap();
        let txn = Transaction::begin(dir.path(), "test").unwrap();
        assert!(txn.cleanup().is_err());
        txn.rollback().unwrap();
        txn.cleanup().unwrap();
        assert!(!txn.txn_dir().exists());
    }

    #[test]
    fn test_commit_cannot_be_rolled_back() {
        let dir = TempDir::new().unwrap();
        let txn = Transaction::begin(dir.path(), "test").unwrap();
        txn.stage_create_bytes("a.txt", b"x").unwrap();
        txn.commit().unwrap();
        assert!(txn.rollback().is_err());
    }

    #[test]
    fn test_journal_persisted_across_stages() {
        let dir = TempDir::new().unwrap();
        let txn = Transaction::begin(dir.path(), "ingest docs/a.txt").unwrap();
        txn.stage_create_bytes("one.txt", b"1").unwrap();
        txn.stage_create_bytes("two.txt", b"2").unwrap();

        let journal = load_journal(txn.txn_dir()).unwrap();
        assert_eq!(journal.entries.len(), 2);
        assert_eq!(journal.state, JournalState::Pending);
        assert_eq!(journal.metadata, "ingest docs/a.txt");
    }
}
