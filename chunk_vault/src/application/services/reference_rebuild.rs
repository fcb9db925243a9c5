// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Reference Rebuild
//!
//! Traverses every manifest, collects the referenced storage hashes,
//! and compares them with the filesystem listing of the chunk store.
//! Chunks referenced but absent are **missing**; blobs present but
//! unreferenced are **orphaned**.
//!
//! A nonzero missing count is returned as an integrity error and the
//! vault is otherwise left untouched; whether to go read-only is the
//! caller's policy. Orphans are surfaced for the caller to GC. On a
//! clean pass every manifest's `last_verified` stamp is bumped and
//! persisted through the journal.

use std::collections::HashSet;

use tracing::{info, warn};

use chunk_vault_domain::{ContentHash, VaultError};

use crate::infrastructure::journal::Transaction;

use super::vault_service::Vault;

/// Outcome of a reference rebuild.
#[derive(Debug, Clone, Default)]
pub struct RebuildReport {
    /// Referenced but absent from the chunk store.
    pub missing: Vec<ContentHash>,
    /// Present in the chunk store but referenced by no manifest.
    pub orphaned: Vec<ContentHash>,
    /// Manifests that verified cleanly.
    pub verified_files: usize,
}

impl Vault {
    /// Rebuilds and checks the manifest-to-store reference relation.
    pub fn rebuild_references(&self) -> Result<RebuildReport, VaultError> {
        let manifests = self.manifest_store().list()?;
        let mut referenced: HashSet<ContentHash> = HashSet::new();
        for manifest in &manifests {
            for chunk in &manifest.chunks {
                referenced.insert(chunk.storage_hash.clone());
            }
        }
        let present: HashSet<ContentHash> = self.chunk_store().list()?.into_iter().collect();

        let mut missing: Vec<ContentHash> = referenced.difference(&present).cloned().collect();
        let mut orphaned: Vec<ContentHash> = present.difference(&referenced).cloned().collect();
        missing.sort();
        orphaned.sort();

        if !missing.is_empty() {
            warn!(
                missing = missing.len(),
                orphaned = orphaned.len(),
                "reference rebuild found missing chunks"
            );
            return Err(VaultError::IntegrityError(format!(
                "{} referenced chunks are missing from the store",
                missing.len()
            )));
        }

        // Clean pass: stamp every manifest as verified, through the
        // journal like any other manifest write.
        let verified_files = manifests.len();
        if verified_files > 0 {
            let txn = Transaction::begin(self.root(), "reference rebuild")?;
            for mut manifest in manifests {
                manifest.mark_verified();
                self.manifest_store().save_staged(&txn, &manifest)?;
            }
            txn.commit()?;
        }

        info!(
            verified_files,
            orphaned = orphaned.len(),
            "reference rebuild complete"
        );
        Ok(RebuildReport {
            missing,
            orphaned,
            verified_files,
        })
    }
}
