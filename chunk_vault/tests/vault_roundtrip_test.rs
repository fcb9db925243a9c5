// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! End-to-end vault scenarios: ingest, deduplication, deletion, wrong
//! passphrase, retrieval, and compression.

use std::fs;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tempfile::TempDir;

use chunk_vault::domain::entities::vault_config::{
    CompressionAlgorithm, EncryptionKdf, EncryptionMode, EncryptionType,
};
use chunk_vault::domain::VaultError;
use chunk_vault::{Vault, VaultCreateOptions};

const MIB: usize = 1024 * 1024;
const PASSPHRASE: &str = "correct horse battery";

fn random_file(dir: &TempDir, name: &str, len: usize, seed: u64) -> std::path::PathBuf {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill_bytes(&mut data);
    let path = dir.path().join(name);
    fs::write(&path, &data).unwrap();
    path
}

fn aes_gcm_vault(root: &std::path::Path) -> Vault {
    Vault::create(
        root,
        VaultCreateOptions {
            name: "scenario".to_string(),
            encryption_type: EncryptionType::Aes,
            encryption_mode: Some(EncryptionMode::Gcm),
            kdf: EncryptionKdf::Scrypt,
            passphrase: Some(PASSPHRASE.to_string()),
            ..VaultCreateOptions::default()
        },
    )
    .unwrap()
}

fn chunk_files(vault_root: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(vault_root.join(".chunks"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// S1: AES-GCM + scrypt vault, 10 MiB random file -> 3 chunks.
#[test]
fn test_s1_ingest_ten_mib_file() {
    let work = TempDir::new().unwrap();
    let source = random_file(&work, "big.bin", 10 * MIB, 1);
    let vault_root = work.path().join("vault");
    let vault = aes_gcm_vault(&vault_root);

    let manifest = vault.add_file(&source, "big.bin", Vec::new()).unwrap();

    assert_eq!(manifest.chunks.len(), 3);
    assert_eq!(manifest.chunks[0].size, 4 * MIB as u64);
    assert_eq!(manifest.chunks[1].size, 4 * MIB as u64);
    assert_eq!(manifest.chunks[2].size, 2 * MIB as u64);
    assert_eq!(manifest.size, 10 * MIB as u64);

    let stats = vault.stats();
    assert_eq!(stats.total_chunks, 3);
    for chunk in &manifest.chunks {
        assert!(chunk.is_encrypted());
        assert!(chunk.iv.is_some());
        assert_eq!(vault.chunk_entry(&chunk.plain_hash).unwrap().refcount, 1);
    }
    assert_eq!(chunk_files(&vault_root).len(), 3);
}

/// S2: re-adding identical content under a new logical path is pure
/// deduplication.
#[test]
fn test_s2_readd_same_content_deduplicates() {
    let work = TempDir::new().unwrap();
    let source = random_file(&work, "big.bin", 10 * MIB, 2);
    let vault_root = work.path().join("vault");
    let vault = aes_gcm_vault(&vault_root);

    vault.add_file(&source, "first.bin", Vec::new()).unwrap();
    let before = chunk_files(&vault_root);

    let second = vault.add_file(&source, "second.bin", Vec::new()).unwrap();
    assert!(second.chunks.iter().all(|c| c.deduplicated));

    // No new blobs, two manifests, every entry referenced twice.
    assert_eq!(chunk_files(&vault_root), before);
    assert_eq!(vault.list_files().unwrap().len(), 2);
    let stats = vault.stats();
    assert_eq!(stats.total_chunks, 3);
    for chunk in &second.chunks {
        assert_eq!(vault.chunk_entry(&chunk.plain_hash).unwrap().refcount, 2);
    }
    assert_eq!(stats.saved_space, 10 * MIB as u64);
}

/// S3: deleting one of two logical paths only releases references.
#[test]
fn test_s3_delete_one_path_keeps_chunks() {
    let work = TempDir::new().unwrap();
    let source = random_file(&work, "big.bin", 10 * MIB, 3);
    let vault_root = work.path().join("vault");
    let vault = aes_gcm_vault(&vault_root);

    vault.add_file(&source, "first.bin", Vec::new()).unwrap();
    vault.add_file(&source, "second.bin", Vec::new()).unwrap();

    vault.delete_file("first.bin").unwrap();

    let stats = vault.stats();
    assert_eq!(stats.total_chunks, 3);
    assert_eq!(stats.unreferenced_chunks, 0);
    assert_eq!(chunk_files(&vault_root).len(), 3);
    assert_eq!(vault.gc().unwrap(), 0);
    assert_eq!(chunk_files(&vault_root).len(), 3);
}

/// Deleting the last reference makes chunks collectible.
#[test]
fn test_delete_last_reference_then_gc() {
    let work = TempDir::new().unwrap();
    let source = random_file(&work, "big.bin", 10 * MIB, 4);
    let vault_root = work.path().join("vault");
    let vault = aes_gcm_vault(&vault_root);

    vault.add_file(&source, "only.bin", Vec::new()).unwrap();
    vault.delete_file("only.bin").unwrap();

    assert_eq!(vault.stats().unreferenced_chunks, 3);
    assert_eq!(vault.gc().unwrap(), 3);
    assert!(chunk_files(&vault_root).is_empty());
    assert_eq!(vault.stats().total_chunks, 0);
}

/// S4: a wrong passphrase is rejected before any chunk is touched.
#[test]
fn test_s4_wrong_passphrase() {
    let work = TempDir::new().unwrap();
    let source = random_file(&work, "big.bin", MIB, 5);
    let vault_root = work.path().join("vault");
    {
        let vault = aes_gcm_vault(&vault_root);
        vault.add_file(&source, "data.bin", Vec::new()).unwrap();
    }

    let err = Vault::open(&vault_root, Some("wrong")).unwrap_err();
    assert!(matches!(err, VaultError::WrongPassphrase));

    // The right passphrase still opens and reads.
    let vault = Vault::open(&vault_root, Some(PASSPHRASE)).unwrap();
    let out = work.path().join("restored.bin");
    vault.retrieve_file("data.bin", &out).unwrap();
    assert_eq!(fs::read(&out).unwrap(), fs::read(&source).unwrap());
}

#[test]
fn test_retrieve_round_trip_all_ciphers() {
    let configs = [
        (EncryptionType::Aes, Some(EncryptionMode::Gcm)),
        (EncryptionType::Aes, Some(EncryptionMode::Cbc)),
        (EncryptionType::Chacha20, None),
    ];
    for (encryption_type, encryption_mode) in configs {
        let work = TempDir::new().unwrap();
        let source = random_file(&work, "doc.bin", 3 * MIB + 17, 6);
        let vault = Vault::create(
            work.path().join("vault"),
            VaultCreateOptions {
                name: "roundtrip".to_string(),
                encryption_type,
                encryption_mode,
                kdf: EncryptionKdf::Pbkdf2,
                passphrase: Some("pass".to_string()),
                chunk_size: Some("1MiB".to_string()),
                ..VaultCreateOptions::default()
            },
        )
        .unwrap();

        vault.add_file(&source, "doc.bin", Vec::new()).unwrap();
        let out = work.path().join("out.bin");
        vault.retrieve_file("doc.bin", &out).unwrap();
        assert_eq!(fs::read(&out).unwrap(), fs::read(&source).unwrap());
    }
}

#[test]
fn test_unencrypted_vault_storage_identity() {
    let work = TempDir::new().unwrap();
    let source = random_file(&work, "plain.bin", 256 * 1024, 7);
    let vault_root = work.path().join("vault");
    let vault = Vault::create(
        &vault_root,
        VaultCreateOptions {
            name: "plain".to_string(),
            chunk_size: Some("64KiB".to_string()),
            ..VaultCreateOptions::default()
        },
    )
    .unwrap();

    let manifest = vault.add_file(&source, "plain.bin", Vec::new()).unwrap();
    for chunk in &manifest.chunks {
        assert_eq!(chunk.plain_hash, chunk.storage_hash);
        assert!(chunk.iv.is_none());
    }
    let out = work.path().join("plain-out.bin");
    vault.retrieve_file("plain.bin", &out).unwrap();
    assert_eq!(fs::read(&out).unwrap(), fs::read(&source).unwrap());
}

#[test]
fn test_compressed_vault_round_trip() {
    let work = TempDir::new().unwrap();
    // Compressible content so zstd actually shrinks the blobs.
    let path = work.path().join("logs.txt");
    fs::write(&path, "tick tock tick tock\n".repeat(200_000)).unwrap();

    let vault = Vault::create(
        work.path().join("vault"),
        VaultCreateOptions {
            name: "packed".to_string(),
            encryption_type: EncryptionType::Chacha20,
            kdf: EncryptionKdf::Pbkdf2,
            passphrase: Some("zip".to_string()),
            chunk_size: Some("1MiB".to_string()),
            compression: CompressionAlgorithm::Zstd,
            ..VaultCreateOptions::default()
        },
    )
    .unwrap();

    let manifest = vault.add_file(&path, "logs.txt", Vec::new()).unwrap();
    assert!(manifest.chunks.iter().all(|c| c.compressed));
    assert!(manifest.chunks.iter().all(|c| c.encrypted_size < c.size));

    let out = work.path().join("logs-out.txt");
    vault.retrieve_file("logs.txt", &out).unwrap();
    assert_eq!(fs::read(&out).unwrap(), fs::read(&path).unwrap());
}

#[test]
fn test_tag_filtering() {
    let work = TempDir::new().unwrap();
    let a = random_file(&work, "a.bin", 1024, 8);
    let b = random_file(&work, "b.bin", 1024, 9);
    let vault = Vault::create(
        work.path().join("vault"),
        VaultCreateOptions::default(),
    )
    .unwrap();

    vault
        .add_file(&a, "a.bin", vec!["docs".to_string(), "work".to_string()])
        .unwrap();
    vault.add_file(&b, "b.bin", vec!["media".to_string()]).unwrap();

    let docs = vault.list_files_by_tag("docs").unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].file_path, "a.bin");
    assert!(vault.list_files_by_tag("missing").unwrap().is_empty());
}

#[test]
fn test_replacing_logical_path_releases_old_chunks() {
    let work = TempDir::new().unwrap();
    let v1 = random_file(&work, "v1.bin", 128 * 1024, 10);
    let v2 = random_file(&work, "v2.bin", 128 * 1024, 11);
    let vault = Vault::create(
        work.path().join("vault"),
        VaultCreateOptions {
            chunk_size: Some("64KiB".to_string()),
            ..VaultCreateOptions::default()
        },
    )
    .unwrap();

    vault.add_file(&v1, "doc.bin", Vec::new()).unwrap();
    vault.add_file(&v2, "doc.bin", Vec::new()).unwrap();

    // The old version's chunks are unreferenced and collectible.
    assert_eq!(vault.list_files().unwrap().len(), 1);
    assert_eq!(vault.stats().unreferenced_chunks, 2);
    assert_eq!(vault.gc().unwrap(), 2);

    let out = work.path().join("doc-out.bin");
    vault.retrieve_file("doc.bin", &out).unwrap();
    assert_eq!(fs::read(&out).unwrap(), fs::read(&v2).unwrap());
}

#[test]
fn test_rebuild_references_detects_missing_chunk() {
    let work = TempDir::new().unwrap();
    let source = random_file(&work, "data.bin", 64 * 1024, 12);
    let vault_root = work.path().join("vault");
    let vault = Vault::create(
        &vault_root,
        VaultCreateOptions {
            chunk_size: Some("16KiB".to_string()),
            ..VaultCreateOptions::default()
        },
    )
    .unwrap();

    let manifest = vault.add_file(&source, "data.bin", Vec::new()).unwrap();
    let report = vault.rebuild_references().unwrap();
    assert!(report.missing.is_empty());
    assert_eq!(report.verified_files, 1);
    assert!(vault.load_manifest("data.bin").unwrap().last_verified.is_some());

    // Damage the store behind the vault's back.
    let victim = &manifest.chunks[0].storage_hash;
    fs::remove_file(vault_root.join(".chunks").join(victim.as_str())).unwrap();
    let err = vault.rebuild_references().unwrap_err();
    assert!(matches!(err, VaultError::IntegrityError(_)));
}

#[test]
fn test_missing_vault_is_not_found() {
    let work = TempDir::new().unwrap();
    let err = Vault::open(work.path().join("nowhere"), None).unwrap_err();
    assert!(matches!(err, VaultError::VaultNotFound(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_auto_gc_monitor_collects_deleted_file() {
    use chunk_vault::domain::entities::vault_config::AutoGcSettings;
    use chunk_vault::infrastructure::dedup::LogAlertSink;
    use std::sync::Arc;
    use std::time::Duration;

    let work = TempDir::new().unwrap();
    let source = random_file(&work, "data.bin", 64 * 1024, 13);
    let vault = Vault::create(
        work.path().join("vault"),
        VaultCreateOptions {
            chunk_size: Some("16KiB".to_string()),
            auto_gc: Some(AutoGcSettings {
                enabled: true,
                check_interval_secs: 1,
                auto_gc_threshold: 1,
                ..AutoGcSettings::default()
            }),
            ..VaultCreateOptions::default()
        },
    )
    .unwrap();

    vault.add_file(&source, "data.bin", Vec::new()).unwrap();
    vault.delete_file("data.bin").unwrap();
    assert_eq!(vault.stats().unreferenced_chunks, 4);

    let monitor = vault.spawn_gc_monitor(Arc::new(LogAlertSink)).unwrap();
    for _ in 0..50 {
        if vault.stats().total_chunks == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    monitor.stop().await;
    assert_eq!(vault.stats().total_chunks, 0);
}
