// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Journal Recovery
//!
//! Startup resolution of every journal found under the vault's journal
//! root:
//!
//! - `committed` / `rolled_back`: removed once older than the retention
//!   window.
//! - `pending` / `rolling_back` / `failed`: rolled back.
//! - `committing`: the commit is re-run; renames whose staged file is
//!   gone and whose final file exists are treated as already promoted,
//!   making the replay idempotent.
//!
//! A journal document that cannot be parsed is left in place with a
//! warning until the retention window expires, then removed with its
//! directory; its staged and trash files are never promoted.

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use chunk_vault_domain::entities::JournalState;
use chunk_vault_domain::{TransactionId, VaultError};

use super::transaction::{
    apply_commit, apply_rollback, load_journal, persist_journal, TXN_ROOT,
};

/// Outcome of a recovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Journals whose commit or rollback was resumed.
    pub resumed: usize,
    /// Terminal journal directories removed after the retention window.
    pub purged: usize,
}

/// Resolves all journals under `<vault>/.txn`, oldest first.
pub fn recover(vault_root: impl AsRef<Path>, retention: Duration) -> Result<RecoveryReport, VaultError> {
    let vault_root = vault_root.as_ref();
    let txn_root = vault_root.join(TXN_ROOT);
    let mut report = RecoveryReport::default();
    if !txn_root.exists() {
        return Ok(report);
    }

    // Lexicographic directory order is chronological for transaction ids.
    let mut dirs: Vec<_> = fs::read_dir(&txn_root)
        .map_err(|e| VaultError::io_error_at(&txn_root, e))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.path())
        .collect();
    dirs.sort();

    for txn_dir in dirs {
        let dir_name = txn_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        if TransactionId::parse(&dir_name).is_err() {
            warn!(dir = %txn_dir.display(), "ignoring non-journal directory under .txn");
            continue;
        }

        let mut journal = match load_journal(&txn_dir) {
            Ok(journal) => journal,
            Err(err) => {
                if older_than_retention(&txn_dir, retention) {
                    warn!(dir = %txn_dir.display(), error = %err, "purging unreadable journal");
                    remove_dir(&txn_dir, &mut report.purged);
                } else {
                    warn!(dir = %txn_dir.display(), error = %err, "unreadable journal left for retention");
                }
                continue;
            }
        };

        match journal.state {
            JournalState::Committed | JournalState::RolledBack => {
                let expired = Utc::now()
                    .signed_duration_since(journal.started_at)
                    .to_std()
                    .map(|age| age >= retention)
                    .unwrap_or(false);
                if expired {
                    debug!(txn = %journal.id, state = %journal.state, "purging terminal journal");
                    remove_dir(&txn_dir, &mut report.purged);
                }
            }
            JournalState::Pending | JournalState::RollingBack | JournalState::Failed => {
                info!(txn = %journal.id, state = %journal.state, "resuming rollback");
                if journal.state != JournalState::RollingBack {
                    journal.transition_to(JournalState::RollingBack)?;
                    persist_journal(&txn_dir, &journal)?;
                }
                apply_rollback(vault_root, &txn_dir, &journal.entries);
                journal.transition_to(JournalState::RolledBack)?;
                persist_journal(&txn_dir, &journal)?;
                report.resumed += 1;
            }
            JournalState::Committing => {
                info!(txn = %journal.id, "resuming interrupted commit");
                match apply_commit(vault_root, &txn_dir, &journal.entries, true) {
                    Ok(()) => {
                        journal.transition_to(JournalState::Committed)?;
                        persist_journal(&txn_dir, &journal)?;
                    }
                    Err(err) => {
                        warn!(txn = %journal.id, error = %err, "resumed commit failed, rolling back");
                        journal.transition_to(JournalState::Failed)?;
                        persist_journal(&txn_dir, &journal)?;
                        journal.transition_to(JournalState::RollingBack)?;
                        persist_journal(&txn_dir, &journal)?;
                        apply_rollback(vault_root, &txn_dir, &journal.entries);
                        journal.transition_to(JournalState::RolledBack)?;
                        persist_journal(&txn_dir, &journal)?;
                    }
                }
                report.resumed += 1;
            }
        }
    }

    if report.resumed > 0 || report.purged > 0 {
        info!(
            resumed = report.resumed,
            purged = report.purged,
            "journal recovery complete"
        );
    }
    Ok(report)
}

fn older_than_retention(txn_dir: &Path, retention: Duration) -> bool {
    fs::metadata(txn_dir)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .map(|age| age >= retention)
        .unwrap_or(false)
}

fn remove_dir(txn_dir: &Path, purged: &mut usize) {
    match fs::remove_dir_all(txn_dir) {
        Ok(()) => *purged += 1,
        Err(err) => warn!(dir = %txn_dir.display(), error = %err, "failed to purge journal directory"),
    }
}
