// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Vault Service
//!
//! The top-level application service for one vault directory. It wires
//! the journal, chunk store, dedup index, ciphers, and manifest store
//! together and exposes the local vault operations: create, open,
//! ingest, retrieve, delete, list, and garbage collection.
//!
//! ## Ingest pipeline
//!
//! ```text
//! source file ──chunker──> plaintext chunks
//!    ──compress (optional, encrypted vaults)──> packed bytes
//!    ──encrypt (optional)──> framed blob, storage hash
//!    ──dedup manager──> staged store write OR refcount bump
//! commit: journal promotes staged blobs + the manifest atomically
//! ```
//!
//! Retrieval inverts the pipeline, verifying the storage hash of every
//! blob and the plain hash of every decoded chunk before bytes reach
//! the destination.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use chunk_vault_domain::entities::vault_config::{
    AutoGcSettings, CompressionAlgorithm, EncryptionKdf, EncryptionMode, EncryptionType,
};
use chunk_vault_domain::services::{
    ChunkingService, CompressionService, EncryptionAlgorithm, EncryptionService, KeyMaterial,
    NullProgressReporter, ProgressReporter,
};
use chunk_vault_domain::{
    ChunkRef, ContentHash, FileManifest, VaultConfig, VaultError,
};

use crate::infrastructure::chunking::FixedSizeChunker;
use crate::infrastructure::compression::build_codec;
use crate::infrastructure::config::VaultConfigStore;
use crate::infrastructure::crypto::key_wrap::VaultKeys;
use crate::infrastructure::crypto::rsa_keys::SyncKeys;
use crate::infrastructure::crypto::symmetric::build_cipher;
use crate::infrastructure::dedup::{DedupIndex, DedupManager, DedupStats};
use crate::infrastructure::journal::{recover, RecoveryReport, Transaction};
use crate::infrastructure::manifest::ManifestStore;
use crate::infrastructure::store::ChunkStore;
use crate::infrastructure::sync::trust::TrustStore;

/// Committed and rolled-back journals are purged after this window.
pub const JOURNAL_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Options for creating a new vault.
///
/// No `Debug` derive: the passphrase must not reach logs.
#[derive(Clone)]
pub struct VaultCreateOptions {
    pub name: String,
    pub encryption_type: EncryptionType,
    /// Block mode; required for AES, rejected elsewhere.
    pub encryption_mode: Option<EncryptionMode>,
    pub kdf: EncryptionKdf,
    /// Enables passphrase protection of the data key when present.
    pub passphrase: Option<String>,
    /// Human-readable chunk size override, e.g. `"4MiB"`.
    pub chunk_size: Option<String>,
    /// Per-chunk compression before encryption.
    pub compression: CompressionAlgorithm,
    /// Generates the RSA sync identity and enables sync.
    pub enable_sync: bool,
    /// RSA modulus size override in bits.
    pub rsa_key_size: Option<u32>,
    /// Automatic GC monitor settings override.
    pub auto_gc: Option<AutoGcSettings>,
}

impl Default for VaultCreateOptions {
    fn default() -> Self {
        Self {
            name: "vault".to_string(),
            encryption_type: EncryptionType::None,
            encryption_mode: None,
            kdf: EncryptionKdf::Scrypt,
            passphrase: None,
            chunk_size: None,
            compression: CompressionAlgorithm::None,
            enable_sync: false,
            rsa_key_size: None,
            auto_gc: None,
        }
    }
}

/// One open vault.
pub struct Vault {
    root: PathBuf,
    config: Mutex<VaultConfig>,
    config_store: VaultConfigStore,
    manifest_store: ManifestStore,
    chunk_store: ChunkStore,
    index: Arc<DedupIndex>,
    manager: DedupManager,
    chunker: FixedSizeChunker,
    cipher: Option<Box<dyn EncryptionService>>,
    codec: Option<Box<dyn CompressionService>>,
    data_key: Option<KeyMaterial>,
    sync_keys: Option<SyncKeys>,
    trust: Arc<TrustStore>,
    recovery: RecoveryReport,
    progress: Arc<dyn ProgressReporter>,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault").field("root", &self.root).finish_non_exhaustive()
    }
}

impl Vault {
    /// Initializes a vault directory and opens it.
    pub fn create(
        root: impl AsRef<Path>,
        options: VaultCreateOptions,
    ) -> Result<Self, VaultError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| VaultError::io_error_at(&root, e))?;

        let mut config = VaultConfig::new(options.name.clone());
        config.encryption.encryption_type = options.encryption_type;
        config.encryption.mode = options.encryption_mode;
        config.encryption.kdf = options.kdf;
        if let Some(chunk_size) = &options.chunk_size {
            config.chunking.chunk_size = chunk_size.clone();
        }
        // Compression rides the encryption pipeline; unencrypted vaults
        // keep plaintext blobs so the storage identity stays the plain
        // hash.
        if options.compression != CompressionAlgorithm::None
            && !matches!(
                options.encryption_type,
                EncryptionType::Aes | EncryptionType::Chacha20
            )
        {
            return Err(VaultError::InvalidConfiguration(
                "chunk compression requires an encrypted vault".to_string(),
            ));
        }
        config.chunking.compression = options.compression;
        if let Some(auto_gc) = options.auto_gc.clone() {
            config.deduplication.auto_gc = auto_gc;
        }

        match options.encryption_type {
            EncryptionType::None | EncryptionType::Gpg => {}
            EncryptionType::Aes | EncryptionType::Chacha20 => {
                VaultKeys::provision(&mut config.encryption, options.passphrase.as_deref())?;
            }
        }

        if options.enable_sync {
            config.sync.enabled = true;
            if let Some(key_size) = options.rsa_key_size {
                config.sync.rsa.key_size = key_size;
            }
            let keys = SyncKeys::generate(config.sync.rsa.key_size as usize)?;
            let private_rel = config.sync.rsa.private_key_path.clone();
            let public_rel = config.sync.rsa.public_key_path.clone();
            keys.save(&root, &private_rel, &public_rel)?;
            config.sync.rsa.fingerprint = Some(keys.fingerprint()?);
        }

        let config_store = VaultConfigStore::new(&root);
        config_store.save_initial(&config)?;
        info!(vault = %config.vault.name, root = %root.display(), "vault created");

        Self::open(&root, options.passphrase.as_deref())
    }

    /// Opens an existing vault.
    ///
    /// The passphrase is validated against the key-check token before
    /// any chunk or index state is touched; journal recovery runs before
    /// the stores open.
    pub fn open(root: impl AsRef<Path>, passphrase: Option<&str>) -> Result<Self, VaultError> {
        let root = root.as_ref().to_path_buf();
        let config_store = VaultConfigStore::new(&root);
        let config = config_store.load()?;

        let (cipher, data_key) = match config.encryption.encryption_type {
            EncryptionType::None | EncryptionType::Gpg => (None, None),
            EncryptionType::Aes | EncryptionType::Chacha20 => {
                let data_key = VaultKeys::unlock(&config.encryption, passphrase)?;
                let algorithm = EncryptionAlgorithm::from_settings(&config.encryption)?
                    .ok_or_else(|| {
                        VaultError::internal_error("encrypted vault resolved to no algorithm")
                    })?;
                (Some(build_cipher(algorithm)), Some(data_key))
            }
        };

        let recovery = recover(&root, JOURNAL_RETENTION)?;

        let chunk_store = ChunkStore::open(&root)?;
        let manifest_store = ManifestStore::open(&root)?;
        let index = Arc::new(DedupIndex::open(&root, chunk_store.clone())?);
        let manager = DedupManager::new(
            index.clone(),
            chunk_store.clone(),
            config.deduplication.clone(),
        );
        let chunker = FixedSizeChunker::new(config.chunking.parsed_chunk_size()?);
        let codec = build_codec(config.chunking.compression);

        let trust = Arc::new(TrustStore::new(
            &config.sync.rsa.trusted_peers,
            config.sync.rsa.auto_trust_all_peers,
        ));
        let sync_keys = if config.sync.uses_rsa()
            && root.join(&config.sync.rsa.private_key_path).exists()
        {
            Some(SyncKeys::load(
                &root,
                &config.sync.rsa.private_key_path,
                &config.sync.rsa.public_key_path,
            )?)
        } else {
            None
        };

        debug!(vault = %config.vault.name, resumed = recovery.resumed, purged = recovery.purged, "vault opened");
        Ok(Self {
            root,
            config: Mutex::new(config),
            config_store,
            manifest_store,
            chunk_store,
            index,
            manager,
            chunker,
            cipher,
            codec,
            data_key,
            sync_keys,
            trust,
            recovery,
            progress: Arc::new(NullProgressReporter),
        })
    }

    /// Replaces the progress reporter wired in at construction.
    pub fn with_progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress = reporter;
        self
    }

    pub(crate) fn progress(&self) -> &Arc<dyn ProgressReporter> {
        &self.progress
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn vault_id(&self) -> String {
        self.config.lock().vault.id.to_string()
    }

    pub fn name(&self) -> String {
        self.config.lock().vault.name.clone()
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> VaultConfig {
        self.config.lock().clone()
    }

    /// What journal recovery did while opening this vault.
    pub fn recovery_report(&self) -> RecoveryReport {
        self.recovery
    }

    pub fn stats(&self) -> DedupStats {
        self.index.stats()
    }

    /// Owned snapshot of one dedup index entry.
    pub fn chunk_entry(
        &self,
        plain_hash: &ContentHash,
    ) -> Option<chunk_vault_domain::ChunkIndexEntry> {
        self.index.get(plain_hash)
    }

    pub(crate) fn index(&self) -> &Arc<DedupIndex> {
        &self.index
    }

    pub(crate) fn manager(&self) -> &DedupManager {
        &self.manager
    }

    pub(crate) fn chunk_store(&self) -> &ChunkStore {
        &self.chunk_store
    }

    pub(crate) fn manifest_store(&self) -> &ManifestStore {
        &self.manifest_store
    }

    pub(crate) fn config_store(&self) -> &VaultConfigStore {
        &self.config_store
    }

    pub(crate) fn config_mutex(&self) -> &Mutex<VaultConfig> {
        &self.config
    }

    pub fn trust(&self) -> &Arc<TrustStore> {
        &self.trust
    }

    pub(crate) fn sync_keys(&self) -> Option<&SyncKeys> {
        self.sync_keys.as_ref()
    }

    fn require_cipher(
        &self,
    ) -> Result<Option<(&dyn EncryptionService, &KeyMaterial)>, VaultError> {
        let config = self.config.lock();
        match config.encryption.encryption_type {
            EncryptionType::None => Ok(None),
            EncryptionType::Gpg => Err(VaultError::InvalidConfiguration(
                "gpg encryption is delegated to an external helper".to_string(),
            )),
            EncryptionType::Aes | EncryptionType::Chacha20 => {
                match (self.cipher.as_deref(), self.data_key.as_ref()) {
                    (Some(cipher), Some(key)) => Ok(Some((cipher, key))),
                    _ => Err(VaultError::internal_error(
                        "encrypted vault opened without key material",
                    )),
                }
            }
        }
    }

    /// Ingests a source file under a logical path.
    ///
    /// Replacing an existing logical path releases the old manifest's
    /// chunk references after the new state commits.
    pub fn add_file(
        &self,
        source: impl AsRef<Path>,
        logical_path: &str,
        tags: Vec<String>,
    ) -> Result<FileManifest, VaultError> {
        let source = source.as_ref();
        let metadata = fs::metadata(source).map_err(|e| VaultError::io_error_at(source, e))?;
        if !metadata.is_file() {
            return Err(VaultError::ValidationError(format!(
                "{} is not a regular file",
                source.display()
            )));
        }
        let mtime: DateTime<Utc> = metadata
            .modified()
            .map(DateTime::from)
            .unwrap_or_else(|_| Utc::now());

        let previous = if self.manifest_store.exists(logical_path) {
            Some(self.manifest_store.load(logical_path)?)
        } else {
            None
        };

        let txn = Transaction::begin(&self.root, &format!("add {}", logical_path))?;
        match self.ingest_into(&txn, source, logical_path, tags, mtime) {
            Ok(manifest) => {
                txn.commit()?;
                if let Some(previous) = previous {
                    for chunk in &previous.chunks {
                        self.index.release_chunk(&chunk.plain_hash);
                    }
                }
                self.index.flush()?;
                info!(
                    file = logical_path,
                    chunks = manifest.chunks.len(),
                    size = manifest.size,
                    "file added"
                );
                Ok(manifest)
            }
            Err(err) => {
                warn!(file = logical_path, error = %err, "ingest failed, rolling back");
                txn.rollback()?;
                self.index.flush()?;
                Err(err)
            }
        }
    }

    fn ingest_into(
        &self,
        txn: &Transaction,
        source: &Path,
        logical_path: &str,
        tags: Vec<String>,
        mtime: DateTime<Utc>,
    ) -> Result<FileManifest, VaultError> {
        let cipher = self.require_cipher()?;
        let mut reader =
            fs::File::open(source).map_err(|e| VaultError::io_error_at(source, e))?;

        let mut refs: Vec<ChunkRef> = Vec::new();
        let mut whole_file = Sha256::new();
        let mut total_size = 0u64;
        let mut index = 0u32;

        let result = loop {
            let chunk = match self.chunker.next_chunk(&mut reader, index) {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break Ok(()),
                Err(err) => break Err(err),
            };
            whole_file.update(&chunk.data);
            total_size += chunk.data.len() as u64;

            let prepared = match self.prepare_chunk(&chunk.data, chunk.plain_hash, index, cipher) {
                Ok(prepared) => prepared,
                Err(err) => break Err(err),
            };
            match self
                .manager
                .process_chunk(prepared.chunk_ref, &prepared.body, Some(txn))
            {
                Ok((chunk_ref, deduplicated)) => {
                    self.progress.print_verbose(&format!(
                        "chunk {} of {} ({} bytes{})",
                        index + 1,
                        logical_path,
                        chunk_ref.size,
                        if deduplicated { ", deduplicated" } else { "" }
                    ));
                    refs.push(chunk_ref);
                }
                Err(err) => break Err(err),
            }
            index += 1;
        };

        if let Err(err) = result {
            // Undo the references recorded before the failure.
            for chunk_ref in &refs {
                self.index.remove_chunk(&chunk_ref.plain_hash);
            }
            return Err(err);
        }

        let content_hash = ContentHash::parse(hex::encode(whole_file.finalize()))?;
        let manifest = FileManifest::new(
            logical_path,
            total_size,
            mtime,
            refs.clone(),
            tags,
            content_hash,
        )?;
        if let Err(err) = self.manifest_store.save_staged(txn, &manifest) {
            for chunk_ref in &refs {
                self.index.remove_chunk(&chunk_ref.plain_hash);
            }
            return Err(err);
        }
        Ok(manifest)
    }

    fn prepare_chunk(
        &self,
        data: &[u8],
        plain_hash: ContentHash,
        index: u32,
        cipher: Option<(&dyn EncryptionService, &KeyMaterial)>,
    ) -> Result<PreparedChunk, VaultError> {
        let plain_size = data.len() as u64;
        match cipher {
            None => {
                // Unencrypted vaults store the plaintext itself, so the
                // storage identity collapses onto the dedup identity.
                let chunk_ref = ChunkRef::new_plain(index, plain_hash, plain_size, false);
                Ok(PreparedChunk {
                    chunk_ref,
                    body: data.to_vec(),
                })
            }
            Some((cipher, key)) => {
                let (packed, compressed) = match &self.codec {
                    Some(codec) => (codec.compress(data)?, true),
                    None => (data.to_vec(), false),
                };
                let (framed, nonce) = cipher.encrypt(&packed, key)?;
                let storage_hash = ContentHash::of_bytes(&framed);
                let chunk_ref = ChunkRef::new_encrypted(
                    index,
                    plain_hash,
                    storage_hash,
                    plain_size,
                    framed.len() as u64,
                    BASE64.encode(nonce),
                    compressed,
                )?;
                Ok(PreparedChunk {
                    chunk_ref,
                    body: framed,
                })
            }
        }
    }

    /// Reassembles a logical file to a destination path, verifying both
    /// identities of every chunk on the way out.
    pub fn retrieve_file(
        &self,
        logical_path: &str,
        destination: impl AsRef<Path>,
    ) -> Result<(), VaultError> {
        let destination = destination.as_ref();
        let manifest = self.manifest_store.load(logical_path)?;
        let cipher = self.require_cipher()?;

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| VaultError::io_error_at(parent, e))?;
        }
        let file_name = destination
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("retrieved");
        let tmp = destination.with_file_name(format!("{}.retrieve-tmp", file_name));
        let mut out = fs::File::create(&tmp).map_err(|e| VaultError::io_error_at(&tmp, e))?;
        let mut whole_file = Sha256::new();

        let result = (|| {
            for chunk_ref in &manifest.chunks {
                let plain = self.read_chunk_plaintext(chunk_ref, cipher)?;
                whole_file.update(&plain);
                out.write_all(&plain)
                    .map_err(|e| VaultError::io_error_at(&tmp, e))?;
                self.progress.print_verbose(&format!(
                    "restored chunk {} of {}",
                    chunk_ref.index + 1,
                    logical_path
                ));
            }
            let digest = ContentHash::parse(hex::encode(whole_file.finalize()))?;
            if digest != manifest.content_hash {
                return Err(VaultError::IntegrityError(format!(
                    "{}: reassembled content hash mismatch",
                    logical_path
                )));
            }
            out.sync_all().map_err(|e| VaultError::io_error_at(&tmp, e))?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                fs::rename(&tmp, destination)
                    .map_err(|e| VaultError::io_error_at(destination, e))?;
                info!(file = logical_path, dest = %destination.display(), "file retrieved");
                Ok(())
            }
            Err(err) => {
                if let Err(cleanup) = fs::remove_file(&tmp) {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %tmp.display(), error = %cleanup, "failed to remove partial retrieve");
                    }
                }
                Err(err)
            }
        }
    }

    /// Reads and fully decodes one chunk, verifying storage and plain
    /// hashes.
    fn read_chunk_plaintext(
        &self,
        chunk_ref: &ChunkRef,
        cipher: Option<(&dyn EncryptionService, &KeyMaterial)>,
    ) -> Result<Vec<u8>, VaultError> {
        let body = self.chunk_store.get(&chunk_ref.storage_hash)?;
        if !chunk_ref.storage_hash.matches(&body) {
            return Err(VaultError::IntegrityError(format!(
                "stored blob {} does not hash to its name",
                chunk_ref.storage_hash
            )));
        }

        let plain = if chunk_ref.is_encrypted() {
            let (cipher, key) = cipher.ok_or_else(|| {
                VaultError::EncryptionError(
                    "manifest references encrypted chunks but the vault has no cipher".to_string(),
                )
            })?;
            let packed = cipher.decrypt(&body, key)?;
            if chunk_ref.compressed {
                let codec = self.codec.as_ref().ok_or_else(|| {
                    VaultError::CompressionError(
                        "manifest references compressed chunks but no codec is configured"
                            .to_string(),
                    )
                })?;
                codec.decompress(&packed)?
            } else {
                packed
            }
        } else {
            body
        };

        if !chunk_ref.plain_hash.matches(&plain) {
            return Err(VaultError::IntegrityError(format!(
                "chunk {} decoded to different content",
                chunk_ref.plain_hash
            )));
        }
        Ok(plain)
    }

    /// Removes a logical file: the manifest goes through the journal,
    /// then the chunk references are released for the next GC sweep.
    pub fn delete_file(&self, logical_path: &str) -> Result<(), VaultError> {
        let manifest = self.manifest_store.load(logical_path)?;
        let txn = Transaction::begin(&self.root, &format!("delete {}", logical_path))?;
        self.manifest_store.delete_staged(&txn, logical_path)?;
        txn.commit()?;

        for chunk in &manifest.chunks {
            self.index.release_chunk(&chunk.plain_hash);
        }
        self.index.flush()?;
        info!(file = logical_path, "file deleted");
        Ok(())
    }

    /// All manifests, sorted by logical path.
    pub fn list_files(&self) -> Result<Vec<FileManifest>, VaultError> {
        self.manifest_store.list()
    }

    /// Manifests carrying a tag.
    pub fn list_files_by_tag(&self, tag: &str) -> Result<Vec<FileManifest>, VaultError> {
        Ok(self
            .manifest_store
            .list()?
            .into_iter()
            .filter(|m| m.has_tag(tag))
            .collect())
    }

    pub fn load_manifest(&self, logical_path: &str) -> Result<FileManifest, VaultError> {
        self.manifest_store.load(logical_path)
    }

    /// Runs a GC pass and flushes the index.
    pub fn gc(&self) -> Result<u64, VaultError> {
        let removed = self.index.gc()?;
        self.index.flush()?;
        Ok(removed)
    }

    /// Spawns the automatic GC monitor configured for this vault.
    ///
    /// Returns `None` when `deduplication.auto_gc.enabled` is off. The
    /// caller owns the monitor handle and its lifetime; there is no
    /// process-wide GC state.
    pub fn spawn_gc_monitor(
        &self,
        alert_sink: Arc<dyn chunk_vault_domain::services::AlertSink>,
    ) -> Option<crate::infrastructure::dedup::GcMonitor> {
        let config = self.config.lock();
        if !config.deduplication.auto_gc.enabled {
            return None;
        }
        Some(crate::infrastructure::dedup::GcMonitor::spawn(
            config.vault.name.clone(),
            self.root.clone(),
            self.index.clone(),
            config.deduplication.auto_gc.clone(),
            alert_sink,
        ))
    }
}

struct PreparedChunk {
    chunk_ref: ChunkRef,
    body: Vec<u8>,
}
