// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Sync Session
//!
//! One pull-style synchronization session against a remote peer:
//!
//! 1. request an outbound pair window when the peer is not yet trusted;
//! 2. exchange keys and admit the peer to the trust cache;
//! 3. authenticate by challenge/response (skipped under auto-trust);
//! 4. fetch the remote manifest listing;
//! 5. diff against the local index, coalescing duplicate chunk refs;
//! 6. pull each missing chunk, unwrap its envelope, verify its storage
//!    hash, and install it through the dedup manager;
//! 7. persist new manifests (and newly trusted peers) through one
//!    journal transaction, renaming on path collisions;
//! 8. rebuild references and report counts and elapsed time.
//!
//! The whole session runs under a five-minute deadline and a
//! cancellation token; chunks already promoted when a session aborts
//! remain valid content-addressed blobs.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use chunk_vault_domain::{ChunkRef, ContentHash, FileManifest, VaultError};

use crate::infrastructure::journal::Transaction;
use crate::infrastructure::runtime::CancellationToken;
use crate::infrastructure::sync::client::SyncClient;
use crate::infrastructure::sync::server::SyncServer;
use crate::infrastructure::sync::transport::PeerConnection;

use super::vault_service::Vault;

/// Overall deadline for one sync session.
pub const SESSION_DEADLINE: Duration = Duration::from_secs(5 * 60);

/// Counters reported by a completed sync session.
#[derive(Debug, Clone, Default)]
pub struct SyncResult {
    pub files_synced: usize,
    pub chunks_transferred: usize,
    pub chunks_deduplicated: usize,
    pub elapsed: Duration,
}

impl Vault {
    /// Builds the inbound protocol server for this vault, to be wired
    /// into a listener by the host application.
    pub fn sync_server(&self) -> SyncServer {
        let config = self.config();
        SyncServer::new(
            self.vault_id(),
            self.name(),
            self.manifest_store().clone(),
            self.chunk_store().clone(),
            self.trust().clone(),
            self.sync_keys().cloned(),
            config.sync.uses_rsa(),
        )
    }

    fn sync_client(&self) -> Result<SyncClient, VaultError> {
        Ok(SyncClient::new(
            self.vault_id(),
            self.name(),
            self.sync_keys().cloned(),
        ))
    }

    /// Pulls state from a remote peer until this vault holds every file
    /// the peer advertises.
    pub async fn sync_with_peer(
        &self,
        conn: &dyn PeerConnection,
        expected_peer_id: Option<&str>,
        token: &CancellationToken,
    ) -> Result<SyncResult, VaultError> {
        let started = Instant::now();
        let session = token.guard(
            "sync session",
            self.run_session(conn, expected_peer_id, token),
        );
        let mut result = match tokio::time::timeout(SESSION_DEADLINE, session).await {
            Ok(outcome) => outcome?,
            Err(_) => {
                return Err(VaultError::TimeoutError(format!(
                    "sync session with {} exceeded {}s",
                    conn.peer_address(),
                    SESSION_DEADLINE.as_secs()
                )))
            }
        };
        result.elapsed = started.elapsed();
        info!(
            peer = %conn.peer_address(),
            files = result.files_synced,
            transferred = result.chunks_transferred,
            deduplicated = result.chunks_deduplicated,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "sync session complete"
        );
        Ok(result)
    }

    async fn run_session(
        &self,
        conn: &dyn PeerConnection,
        expected_peer_id: Option<&str>,
        token: &CancellationToken,
    ) -> Result<SyncResult, VaultError> {
        let client = self.sync_client()?;

        // (1) Outbound pair window for a not-yet-trusted peer.
        if let Some(peer_id) = expected_peer_id {
            if !self.trust().is_trusted(peer_id) {
                self.trust().request_outgoing_pair(peer_id);
            }
        }

        // (2) Key exchange.
        let peer = client.exchange_keys(conn, self.trust()).await?;
        if let Some(expected) = expected_peer_id {
            if peer.peer_id != expected {
                return Err(VaultError::UntrustedPeer(format!(
                    "peer identified as {} but {} was expected",
                    peer.peer_id, expected
                )));
            }
        }

        // (3) Challenge/response, skipped under auto-trust.
        if !self.trust().auto_trust() {
            client.authenticate(conn, self.trust(), &peer.peer_id).await?;
        }

        // (4) Remote manifest listing.
        token.check("sync session")?;
        let remote_manifests = client.fetch_manifests(conn).await?;

        // (5) Diff: coalesce duplicate references across all files.
        let plan = self.plan_transfers(&remote_manifests);
        debug!(
            peer = %peer.peer_id,
            missing = plan.missing.len(),
            already_present = plan.present_unique,
            "sync diff computed"
        );

        // (6) Pull and install missing chunks. Installs are direct
        // content-addressed writes; an aborted session leaves only
        // valid blobs behind.
        let mut freshly_installed: HashSet<ContentHash> = HashSet::new();
        for chunk_ref in plan.missing.values() {
            token.check("sync session")?;
            let fetched = client
                .fetch_chunk(
                    conn,
                    chunk_ref.plain_hash.as_str(),
                    chunk_ref
                        .is_encrypted()
                        .then(|| chunk_ref.storage_hash.as_str()),
                    chunk_ref.is_encrypted(),
                )
                .await?;
            if !chunk_ref.storage_hash.matches(&fetched.body) {
                return Err(VaultError::IntegrityError(format!(
                    "chunk fetched for {} does not hash to its storage name",
                    chunk_ref.plain_hash
                )));
            }
            let (_installed, _dedup) =
                self.manager()
                    .process_chunk(chunk_ref.clone(), &fetched.body, None)?;
            freshly_installed.insert(chunk_ref.plain_hash.clone());
            self.progress().print_verbose(&format!(
                "pulled chunk {} ({} bytes{})",
                chunk_ref.plain_hash,
                fetched.body.len(),
                if fetched.was_enveloped { ", enveloped" } else { "" }
            ));
        }

        // (7) Persist new manifests and trust state in one transaction.
        // References satisfied locally are rewritten to the local blob
        // description first: a peer with a different data key stores
        // the same plaintext under a different blob, and the persisted
        // manifest must point at what this store actually holds.
        let mut incoming = self.select_incoming(&remote_manifests, &peer.peer_id)?;
        for manifest in &mut incoming {
            for chunk_ref in &mut manifest.chunks {
                if let Some(entry) = self.index().get(&chunk_ref.plain_hash) {
                    *chunk_ref = entry.to_chunk_ref(chunk_ref.index);
                }
            }
            manifest.validate()?;
        }
        let files_synced = incoming.len();
        if !incoming.is_empty() || !self.trust().trusted_peers().is_empty() {
            let txn = Transaction::begin(self.root(), &format!("sync from {}", peer.peer_id))?;
            for manifest in &incoming {
                self.manifest_store().save_staged(&txn, manifest)?;
            }
            let config_snapshot = {
                let mut config = self.config_mutex().lock();
                config.sync.rsa.trusted_peers = self.trust().trusted_peers();
                config.clone()
            };
            self.config_store().save_staged(&txn, &config_snapshot)?;
            txn.commit()?;
        }

        // Account one reference per manifest chunk; the first reference
        // of a freshly installed chunk was recorded at install time.
        for manifest in &incoming {
            for chunk_ref in &manifest.chunks {
                if freshly_installed.remove(&chunk_ref.plain_hash) {
                    continue;
                }
                self.index().add_chunk(chunk_ref)?;
            }
        }
        self.index().flush()?;

        // (8) Verify what we now reference actually exists.
        self.rebuild_references()?;

        Ok(SyncResult {
            files_synced,
            chunks_transferred: plan.missing.len(),
            chunks_deduplicated: plan.present_unique,
            elapsed: Duration::default(),
        })
    }

    /// Unique chunks the peer references that the local vault lacks,
    /// plus the count of unique references already satisfied locally.
    fn plan_transfers(&self, remote_manifests: &[FileManifest]) -> TransferPlan {
        let mut missing: HashMap<ContentHash, ChunkRef> = HashMap::new();
        let mut present: HashSet<ContentHash> = HashSet::new();
        for manifest in remote_manifests {
            if self.manifest_already_local(manifest) {
                continue;
            }
            for chunk_ref in &manifest.chunks {
                let locally_present = self.index().contains_plain(&chunk_ref.plain_hash)
                    || self.index().contains_storage(&chunk_ref.storage_hash)
                    || self.chunk_store().exists(&chunk_ref.storage_hash);
                if locally_present {
                    present.insert(chunk_ref.plain_hash.clone());
                } else {
                    missing
                        .entry(chunk_ref.plain_hash.clone())
                        .or_insert_with(|| chunk_ref.clone());
                }
            }
        }
        TransferPlan {
            present_unique: present.len(),
            missing,
        }
    }

    fn manifest_already_local(&self, remote: &FileManifest) -> bool {
        match self.manifest_store().load(&remote.file_path) {
            Ok(local) => local.content_hash == remote.content_hash,
            Err(_) => false,
        }
    }

    /// Remote manifests to persist locally, renaming on content
    /// collisions.
    fn select_incoming(
        &self,
        remote_manifests: &[FileManifest],
        peer_id: &str,
    ) -> Result<Vec<FileManifest>, VaultError> {
        let suffix: String = peer_id.chars().take(8).collect();
        let mut incoming = Vec::new();
        for remote in remote_manifests {
            let mut manifest = remote.clone();
            match self.manifest_store().load(&remote.file_path) {
                Ok(local) if local.content_hash == remote.content_hash => continue,
                Ok(_) => {
                    // Same path, different content: keep both, the
                    // incoming copy under a peer-suffixed name.
                    let renamed = format!("{}.sync-{}", remote.file_path, suffix);
                    warn!(
                        path = %remote.file_path,
                        renamed = %renamed,
                        "path collision with different content"
                    );
                    if self.manifest_store().exists(&renamed) {
                        continue;
                    }
                    manifest.file_path = renamed;
                }
                Err(_) => {}
            }
            manifest.mark_synced();
            manifest.validate()?;
            incoming.push(manifest);
        }
        Ok(incoming)
    }
}

struct TransferPlan {
    missing: HashMap<ContentHash, ChunkRef>,
    present_unique: usize,
}
