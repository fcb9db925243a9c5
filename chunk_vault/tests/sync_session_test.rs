// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Peer synchronization sessions over the in-memory transport: trust
//! policy, key exchange, challenge/response, manifest diff, chunk pull
//! with the RSA envelope, and convergence.

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use chunk_vault::domain::VaultError;
use chunk_vault::infrastructure::runtime::CancellationToken;
use chunk_vault::infrastructure::sync::transport::{
    InMemoryConnection, TcpPeerConnection, TcpSyncListener,
};
use chunk_vault::{Vault, VaultCreateOptions};

const KIB: usize = 1024;

fn sync_vault(root: &std::path::Path, name: &str) -> Vault {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Vault::create(
        root,
        VaultCreateOptions {
            name: name.to_string(),
            chunk_size: Some("1KiB".to_string()),
            enable_sync: true,
            rsa_key_size: Some(1024),
            ..VaultCreateOptions::default()
        },
    )
    .unwrap()
}

/// Distinct deterministic 1 KiB blocks, so chunk boundaries land
/// exactly between them.
fn block(tag: u8) -> Vec<u8> {
    (0..KIB).map(|i| tag.wrapping_add((i % 13) as u8)).collect()
}

fn write_blocks(dir: &TempDir, name: &str, tags: &[u8]) -> std::path::PathBuf {
    let mut data = Vec::new();
    for tag in tags {
        data.extend_from_slice(&block(*tag));
    }
    let path = dir.path().join(name);
    fs::write(&path, &data).unwrap();
    path
}

/// S6: B advertises a 5-chunk file; A already holds 2 of the chunks
/// via another file. Exactly 3 chunks transfer.
#[tokio::test]
async fn test_s6_partial_overlap_pull() {
    let work = TempDir::new().unwrap();
    let vault_a = sync_vault(&work.path().join("a"), "vault-a");
    let vault_b = sync_vault(&work.path().join("b"), "vault-b");

    let shared = write_blocks(&work, "shared.bin", &[2, 4]);
    vault_a.add_file(&shared, "shared.bin", Vec::new()).unwrap();

    let big = write_blocks(&work, "big.bin", &[1, 2, 3, 4, 5]);
    vault_b.add_file(&big, "big.bin", Vec::new()).unwrap();

    // Open B's doors for A, then pull.
    vault_b.trust().allow_incoming_pair(&vault_a.vault_id());
    let conn = InMemoryConnection::new(Arc::new(vault_b.sync_server()));
    let token = CancellationToken::new();
    let result = vault_a
        .sync_with_peer(&conn, Some(&vault_b.vault_id()), &token)
        .await
        .unwrap();

    assert_eq!(result.chunks_transferred, 3);
    assert_eq!(result.chunks_deduplicated, 2);
    assert_eq!(result.files_synced, 1);

    // Shared chunks gained one reference on A.
    let shared_manifest = vault_a.load_manifest("shared.bin").unwrap();
    for chunk in &shared_manifest.chunks {
        assert_eq!(vault_a.chunk_entry(&chunk.plain_hash).unwrap().refcount, 2);
    }

    // Convergence: A now reconstructs B's file bit for bit.
    let out = work.path().join("big-from-a.bin");
    vault_a.retrieve_file("big.bin", &out).unwrap();
    assert_eq!(fs::read(&out).unwrap(), fs::read(&big).unwrap());
}

/// Every chunk the remote references exists locally after a sync, and
/// the manifests carry identical chunk lists.
#[tokio::test]
async fn test_sync_convergence() {
    let work = TempDir::new().unwrap();
    let vault_a = sync_vault(&work.path().join("a"), "vault-a");
    let vault_b = sync_vault(&work.path().join("b"), "vault-b");

    for (name, tags) in [
        ("one.bin", vec![10u8, 11, 12]),
        ("two.bin", vec![12u8, 13]),
        ("three.bin", vec![14u8]),
    ] {
        let path = write_blocks(&work, name, &tags);
        vault_b.add_file(&path, name, Vec::new()).unwrap();
    }

    vault_b.trust().allow_incoming_pair(&vault_a.vault_id());
    let conn = InMemoryConnection::new(Arc::new(vault_b.sync_server()));
    let token = CancellationToken::new();
    vault_a
        .sync_with_peer(&conn, Some(&vault_b.vault_id()), &token)
        .await
        .unwrap();

    for remote in vault_b.list_files().unwrap() {
        let local = vault_a.load_manifest(&remote.file_path).unwrap();
        assert_eq!(local.chunks, remote.chunks);
        for chunk in &local.chunks {
            assert!(vault_a.chunk_entry(&chunk.plain_hash).is_some());
        }
    }
    // A clean reference rebuild proves every referenced blob landed.
    let report = vault_a.rebuild_references().unwrap();
    assert!(report.missing.is_empty());
}

/// A second sync of identical state is a no-op.
#[tokio::test]
async fn test_sync_is_idempotent() {
    let work = TempDir::new().unwrap();
    let vault_a = sync_vault(&work.path().join("a"), "vault-a");
    let vault_b = sync_vault(&work.path().join("b"), "vault-b");
    let path = write_blocks(&work, "file.bin", &[1, 2, 3]);
    vault_b.add_file(&path, "file.bin", Vec::new()).unwrap();

    vault_b.trust().allow_incoming_pair(&vault_a.vault_id());
    let conn = InMemoryConnection::new(Arc::new(vault_b.sync_server()));
    let token = CancellationToken::new();

    let first = vault_a
        .sync_with_peer(&conn, Some(&vault_b.vault_id()), &token)
        .await
        .unwrap();
    assert_eq!(first.chunks_transferred, 3);

    let second = vault_a
        .sync_with_peer(&conn, Some(&vault_b.vault_id()), &token)
        .await
        .unwrap();
    assert_eq!(second.chunks_transferred, 0);
    assert_eq!(second.files_synced, 0);

    // Trust is idempotent too: one entry for B, no duplicates.
    let trusted = vault_a.trust().trusted_peers();
    assert_eq!(trusted.len(), 1);
    assert_eq!(trusted[0].peer_id, vault_b.vault_id());
}

/// Without a pair window or prior trust, the server rejects the
/// exchange and the session fails as untrusted.
#[tokio::test]
async fn test_unpaired_peer_is_rejected() {
    let work = TempDir::new().unwrap();
    let vault_a = sync_vault(&work.path().join("a"), "vault-a");
    let vault_b = sync_vault(&work.path().join("b"), "vault-b");
    let path = write_blocks(&work, "file.bin", &[7]);
    vault_b.add_file(&path, "file.bin", Vec::new()).unwrap();

    let conn = InMemoryConnection::new(Arc::new(vault_b.sync_server()));
    let token = CancellationToken::new();
    let err = vault_a
        .sync_with_peer(&conn, Some(&vault_b.vault_id()), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::UntrustedPeer(_)));
    assert!(vault_a.list_files().unwrap().is_empty());
}

/// Trusted peers persist into the vault config across reopen.
#[tokio::test]
async fn test_trusted_peer_persists_across_reopen() {
    let work = TempDir::new().unwrap();
    let root_a = work.path().join("a");
    let vault_b = sync_vault(&work.path().join("b"), "vault-b");
    let path = write_blocks(&work, "file.bin", &[9]);
    vault_b.add_file(&path, "file.bin", Vec::new()).unwrap();

    {
        let vault_a = sync_vault(&root_a, "vault-a");
        vault_b.trust().allow_incoming_pair(&vault_a.vault_id());
        let conn = InMemoryConnection::new(Arc::new(vault_b.sync_server()));
        let token = CancellationToken::new();
        vault_a
            .sync_with_peer(&conn, Some(&vault_b.vault_id()), &token)
            .await
            .unwrap();
    }

    let reopened = Vault::open(&root_a, None).unwrap();
    assert!(reopened.trust().is_trusted(&vault_b.vault_id()));
    let config = reopened.config();
    assert_eq!(config.sync.rsa.trusted_peers.len(), 1);
}

/// Same logical path, different content: the incoming copy lands under
/// a peer-suffixed name instead of clobbering local state.
#[tokio::test]
async fn test_path_collision_renames() {
    let work = TempDir::new().unwrap();
    let vault_a = sync_vault(&work.path().join("a"), "vault-a");
    let vault_b = sync_vault(&work.path().join("b"), "vault-b");

    let local = write_blocks(&work, "local.bin", &[20]);
    let remote = write_blocks(&work, "remote.bin", &[21, 22]);
    vault_a.add_file(&local, "notes.txt", Vec::new()).unwrap();
    vault_b.add_file(&remote, "notes.txt", Vec::new()).unwrap();

    vault_b.trust().allow_incoming_pair(&vault_a.vault_id());
    let conn = InMemoryConnection::new(Arc::new(vault_b.sync_server()));
    let token = CancellationToken::new();
    let result = vault_a
        .sync_with_peer(&conn, Some(&vault_b.vault_id()), &token)
        .await
        .unwrap();
    assert_eq!(result.files_synced, 1);

    // The local file is untouched; the incoming copy exists alongside.
    let out = work.path().join("local-out.bin");
    vault_a.retrieve_file("notes.txt", &out).unwrap();
    assert_eq!(fs::read(&out).unwrap(), fs::read(&local).unwrap());

    let files = vault_a.list_files().unwrap();
    assert_eq!(files.len(), 2);
    assert!(files
        .iter()
        .any(|m| m.file_path.starts_with("notes.txt.sync-")));
}

/// The same session flow works over the TCP transport: one connection
/// per logical stream, protocol-id preamble first.
#[tokio::test(flavor = "multi_thread")]
async fn test_sync_over_tcp() {
    let work = TempDir::new().unwrap();
    let vault_a = sync_vault(&work.path().join("a"), "vault-a");
    let vault_b = sync_vault(&work.path().join("b"), "vault-b");
    let path = write_blocks(&work, "wire.bin", &[31, 32, 33]);
    vault_b.add_file(&path, "wire.bin", Vec::new()).unwrap();
    vault_b.trust().allow_incoming_pair(&vault_a.vault_id());

    let listener = TcpSyncListener::bind("127.0.0.1:0", Arc::new(vault_b.sync_server()))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let stop = CancellationToken::new();
    let serving = tokio::spawn(listener.serve(stop.clone()));

    let conn = TcpPeerConnection::new(addr.to_string());
    let token = CancellationToken::new();
    let result = vault_a
        .sync_with_peer(&conn, Some(&vault_b.vault_id()), &token)
        .await
        .unwrap();
    assert_eq!(result.chunks_transferred, 3);

    let out = work.path().join("wire-out.bin");
    vault_a.retrieve_file("wire.bin", &out).unwrap();
    assert_eq!(fs::read(&out).unwrap(), fs::read(&path).unwrap());

    stop.cancel();
    serving.await.unwrap();
}

/// A cancelled token aborts the session with a typed error.
#[tokio::test]
async fn test_cancelled_session() {
    let work = TempDir::new().unwrap();
    let vault_a = sync_vault(&work.path().join("a"), "vault-a");
    let vault_b = sync_vault(&work.path().join("b"), "vault-b");

    vault_b.trust().allow_incoming_pair(&vault_a.vault_id());
    let conn = InMemoryConnection::new(Arc::new(vault_b.sync_server()));
    let token = CancellationToken::new();
    token.cancel();
    let err = vault_a
        .sync_with_peer(&conn, Some(&vault_b.vault_id()), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Cancelled(_)));
}
