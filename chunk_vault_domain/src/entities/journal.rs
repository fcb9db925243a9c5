// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transaction Journal Record
//!
//! The journal record persisted as `journal.json` inside every
//! transaction directory. It carries the transaction id, its lifecycle
//! state, and the ordered list of staged mutations.
//!
//! ## State Machine
//!
//! ```text
//!   pending ──stage*──> pending
//!   pending ──commit──> committing ──promote success──> committed
//!   committing ──any failure──> failed ──implicit rollback──> rolled_back
//!   pending|committing|failed ──rollback──> rolling_back ──> rolled_back
//! ```
//!
//! Transitions outside this automaton are rejected by
//! [`Journal::transition_to`], so an implementation bug cannot persist an
//! impossible state and confuse recovery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VaultError;
use crate::value_objects::TransactionId;

/// Lifecycle state of a transaction journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalState {
    Pending,
    Committing,
    Committed,
    RollingBack,
    RolledBack,
    Failed,
}

impl JournalState {
    /// Whether this state permits a transition to `next`.
    pub fn can_transition_to(self, next: JournalState) -> bool {
        use JournalState::*;
        matches!(
            (self, next),
            (Pending, Committing)
                | (Pending, RollingBack)
                | (Committing, Committed)
                | (Committing, Failed)
                | (Committing, RollingBack)
                | (Failed, RollingBack)
                | (RollingBack, RolledBack)
        )
    }

    /// Whether the journal has reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, JournalState::Committed | JournalState::RolledBack)
    }
}

impl std::fmt::Display for JournalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JournalState::Pending => "pending",
            JournalState::Committing => "committing",
            JournalState::Committed => "committed",
            JournalState::RollingBack => "rolling_back",
            JournalState::RolledBack => "rolled_back",
            JournalState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// One staged mutation within a transaction.
///
/// Paths are relative to the vault root (final paths) or to the
/// transaction directory (staged and backup paths), keeping the journal
/// relocatable with the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JournalEntry {
    /// A new file staged under `new/`, promoted to `final_path` on commit.
    Create {
        final_path: String,
        staged_path: String,
        size: u64,
        checksum: String,
    },
    /// An existing file replaced: the original was moved to `trash/` at
    /// stage time and the replacement staged under `new/`.
    Replace {
        final_path: String,
        staged_path: String,
        backup_path: String,
        size: u64,
        checksum: String,
    },
    /// An existing file deleted: the original was moved to `trash/` at
    /// stage time and the trash copy is discarded on commit.
    Delete {
        final_path: String,
        backup_path: String,
    },
}

impl JournalEntry {
    /// The final vault-relative path this entry settles.
    pub fn final_path(&self) -> &str {
        match self {
            JournalEntry::Create { final_path, .. }
            | JournalEntry::Replace { final_path, .. }
            | JournalEntry::Delete { final_path, .. } => final_path,
        }
    }

    /// The staged file path, when this entry promotes new content.
    pub fn staged_path(&self) -> Option<&str> {
        match self {
            JournalEntry::Create { staged_path, .. } | JournalEntry::Replace { staged_path, .. } => {
                Some(staged_path)
            }
            JournalEntry::Delete { .. } => None,
        }
    }

    /// The trash backup path, when this entry displaced an original.
    pub fn backup_path(&self) -> Option<&str> {
        match self {
            JournalEntry::Replace { backup_path, .. } | JournalEntry::Delete { backup_path, .. } => {
                Some(backup_path)
            }
            JournalEntry::Create { .. } => None,
        }
    }
}

/// The persisted journal record for one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journal {
    pub id: TransactionId,
    pub started_at: DateTime<Utc>,
    pub state: JournalState,
    pub entries: Vec<JournalEntry>,
    /// Free-form description of the operation that opened the
    /// transaction, for diagnostics only.
    #[serde(default)]
    pub metadata: String,
}

impl Journal {
    /// Creates a fresh journal in the `Pending` state.
    pub fn new(id: TransactionId, metadata: impl Into<String>) -> Self {
        Self {
            id,
            started_at: Utc::now(),
            state: JournalState::Pending,
            entries: Vec::new(),
            metadata: metadata.into(),
        }
    }

    /// Transitions to `next`, rejecting moves the automaton forbids.
    pub fn transition_to(&mut self, next: JournalState) -> Result<(), VaultError> {
        if !self.state.can_transition_to(next) {
            return Err(VaultError::TxnConflict(format!(
                "journal {} cannot move from {} to {}",
                self.id, self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Appends a staged entry. Only legal while the journal is pending.
    pub fn push_entry(&mut self, entry: JournalEntry) -> Result<(), VaultError> {
        if self.state != JournalState::Pending {
            return Err(VaultError::TxnConflict(format!(
                "journal {} is {} and no longer accepts stages",
                self.id, self.state
            )));
        }
        self.entries.push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn journal() -> Journal {
        Journal::new(TransactionId::generate(), "test")
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut j = journal();
        j.transition_to(JournalState::Committing).unwrap();
        j.transition_to(JournalState::Committed).unwrap();
        assert!(j.state.is_terminal());
    }

    #[test]
    fn test_rollback_paths() {
        let mut j = journal();
        j.transition_to(JournalState::RollingBack).unwrap();
        j.transition_to(JournalState::RolledBack).unwrap();

        let mut j = journal();
        j.transition_to(JournalState::Committing).unwrap();
        j.transition_to(JournalState::Failed).unwrap();
        j.transition_to(JournalState::RollingBack).unwrap();
        j.transition_to(JournalState::RolledBack).unwrap();
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut j = journal();
        assert!(j.transition_to(JournalState::Committed).is_err());
        assert!(j.transition_to(JournalState::Failed).is_err());

        let mut j = journal();
        j.transition_to(JournalState::Committing).unwrap();
        j.transition_to(JournalState::Committed).unwrap();
        assert!(j.transition_to(JournalState::RollingBack).is_err());
    }

    #[test]
    fn test_stage_only_while_pending() {
        let mut j = journal();
        j.push_entry(JournalEntry::Create {
            final_path: "a".into(),
            staged_path: "new/a".into(),
            size: 1,
            checksum: "00".into(),
        })
        .unwrap();
        j.transition_to(JournalState::Committing).unwrap();
        assert!(j
            .push_entry(JournalEntry::Delete {
                final_path: "b".into(),
                backup_path: "trash/b".into(),
            })
            .is_err());
    }

    #[test]
    fn test_entry_accessors() {
        let create = JournalEntry::Create {
            final_path: "f".into(),
            staged_path: "new/f".into(),
            size: 0,
            checksum: String::new(),
        };
        assert_eq!(create.final_path(), "f");
        assert_eq!(create.staged_path(), Some("new/f"));
        assert_eq!(create.backup_path(), None);

        let delete = JournalEntry::Delete {
            final_path: "g".into(),
            backup_path: "trash/g".into(),
        };
        assert_eq!(delete.staged_path(), None);
        assert_eq!(delete.backup_path(), Some("trash/g"));
    }

    #[test]
    fn test_serde_round_trip() {
        let mut j = journal();
        j.push_entry(JournalEntry::Replace {
            final_path: "vault.toml".into(),
            staged_path: "new/vault.toml".into(),
            backup_path: "trash/vault.toml".into(),
            size: 12,
            checksum: "ab".into(),
        })
        .unwrap();
        let json = serde_json::to_string(&j).unwrap();
        let back: Journal = serde_json::from_str(&json).unwrap();
        assert_eq!(back.entries, j.entries);
        assert_eq!(back.state, JournalState::Pending);
    }
}
