// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Vault Configuration Entity
//!
//! The single per-vault configuration document, persisted as
//! `vault.toml` at the vault root. It covers the vault identity,
//! encryption settings (including the wrapped data key and key-check
//! token), chunking and deduplication parameters, and sync settings
//! including the RSA key paths and trusted-peer list.
//!
//! The configuration is a plain serde document; loading, saving and
//! journal-staged rewrites are infrastructure concerns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::TrustedPeer;
use crate::error::VaultError;
use crate::value_objects::{ChunkSize, Fingerprint};

/// Encryption family applied to chunk bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionType {
    None,
    Aes,
    Chacha20,
    /// Recognized for compatibility; the core refuses to build a cipher
    /// for it because GPG orchestration is an external collaborator.
    Gpg,
}

/// Block mode for the AES family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionMode {
    Gcm,
    Cbc,
}

/// Key derivation function for passphrase-protected data keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionKdf {
    Scrypt,
    Pbkdf2,
}

/// Per-chunk compression applied before encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    #[default]
    None,
    Gzip,
    Zstd,
}

/// Identity block of the vault document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultIdentity {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl VaultIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// Encryption material and parameters.
///
/// The data key never appears here in the clear for passphrase-protected
/// vaults: `wrapped_key` is the AES-GCM wrapping of the data key under a
/// KDF-derived wrapping key, and `key_check` is the token whose failed
/// decryption is the authoritative wrong-passphrase signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionSettings {
    #[serde(rename = "type")]
    pub encryption_type: EncryptionType,

    /// Block mode; only meaningful for `type = "aes"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<EncryptionMode>,

    #[serde(default = "EncryptionSettings::default_kdf")]
    pub kdf: EncryptionKdf,

    #[serde(default)]
    pub passphrase_protected: bool,

    /// Base64 data key (unprotected) or base64 nonce-prefixed wrapped
    /// data key (passphrase-protected).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapped_key: Option<String>,

    /// Base64 key-check token; absent for unencrypted vaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_check: Option<String>,

    /// Base64 KDF salt; absent unless passphrase-protected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kdf_salt: Option<String>,

    #[serde(default = "EncryptionSettings::default_scrypt_n")]
    pub scrypt_n: u32,
    #[serde(default = "EncryptionSettings::default_scrypt_r")]
    pub scrypt_r: u32,
    #[serde(default = "EncryptionSettings::default_scrypt_p")]
    pub scrypt_p: u32,

    /// PBKDF2 iteration count. The default is deliberately modest for
    /// compatibility; callers may raise it.
    #[serde(default = "EncryptionSettings::default_pbkdf2_iterations")]
    pub pbkdf2_iterations: u32,
}

impl EncryptionSettings {
    fn default_kdf() -> EncryptionKdf {
        EncryptionKdf::Scrypt
    }
    fn default_scrypt_n() -> u32 {
        32768
    }
    fn default_scrypt_r() -> u32 {
        8
    }
    fn default_scrypt_p() -> u32 {
        1
    }
    fn default_pbkdf2_iterations() -> u32 {
        10_000
    }

    /// Settings for an unencrypted vault.
    pub fn none() -> Self {
        Self {
            encryption_type: EncryptionType::None,
            mode: None,
            kdf: EncryptionKdf::Scrypt,
            passphrase_protected: false,
            wrapped_key: None,
            key_check: None,
            kdf_salt: None,
            scrypt_n: Self::default_scrypt_n(),
            scrypt_r: Self::default_scrypt_r(),
            scrypt_p: Self::default_scrypt_p(),
            pbkdf2_iterations: Self::default_pbkdf2_iterations(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.encryption_type != EncryptionType::None
    }
}

impl Default for EncryptionSettings {
    fn default() -> Self {
        Self::none()
    }
}

/// Chunking parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingSettings {
    /// Chunking strategy; only `"fixed"` is implemented.
    #[serde(default = "ChunkingSettings::default_strategy")]
    pub strategy: String,

    /// Human-readable chunk size, e.g. `"4MiB"`.
    #[serde(default = "ChunkingSettings::default_chunk_size")]
    pub chunk_size: String,

    /// Content hash algorithm; fixed to `"sha256"`.
    #[serde(default = "ChunkingSettings::default_hash_algorithm")]
    pub hash_algorithm: String,

    /// Per-chunk compression applied before encryption.
    #[serde(default)]
    pub compression: CompressionAlgorithm,
}

impl ChunkingSettings {
    fn default_strategy() -> String {
        "fixed".to_string()
    }
    fn default_chunk_size() -> String {
        "4MiB".to_string()
    }
    fn default_hash_algorithm() -> String {
        "sha256".to_string()
    }

    /// Parses the configured chunk size.
    pub fn parsed_chunk_size(&self) -> Result<ChunkSize, VaultError> {
        ChunkSize::parse(&self.chunk_size)
    }
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            strategy: Self::default_strategy(),
            chunk_size: Self::default_chunk_size(),
            hash_algorithm: Self::default_hash_algorithm(),
            compression: CompressionAlgorithm::None,
        }
    }
}

/// Automatic garbage collection settings for the GC monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoGcSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Seconds between monitor ticks.
    #[serde(default = "AutoGcSettings::default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Unreferenced-chunk count that triggers a GC pass.
    #[serde(default = "AutoGcSettings::default_auto_gc_threshold")]
    pub auto_gc_threshold: u64,

    #[serde(default)]
    pub enable_logging: bool,

    /// Log file, relative to the vault root when not absolute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,

    /// Unreferenced-chunk count that raises an alert after GC.
    #[serde(default = "AutoGcSettings::default_alert_threshold")]
    pub alert_threshold: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_webhook: Option<String>,
}

impl AutoGcSettings {
    fn default_check_interval_secs() -> u64 {
        300
    }
    fn default_auto_gc_threshold() -> u64 {
        100
    }
    fn default_alert_threshold() -> u64 {
        1000
    }
}

impl Default for AutoGcSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            check_interval_secs: Self::default_check_interval_secs(),
            auto_gc_threshold: Self::default_auto_gc_threshold(),
            enable_logging: false,
            log_file: None,
            alert_threshold: Self::default_alert_threshold(),
            alert_webhook: None,
        }
    }
}

/// Deduplication parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupSettings {
    #[serde(default = "DedupSettings::default_enabled")]
    pub enabled: bool,

    /// Dedup strategy; only `"fixed"` is implemented.
    #[serde(default = "ChunkingSettings::default_strategy")]
    pub strategy: String,

    /// Chunks smaller than this bypass the index.
    #[serde(default)]
    pub min_chunk_size: u64,

    /// Chunks larger than this bypass the index. Zero means no limit.
    #[serde(default)]
    pub max_chunk_size: u64,

    /// Unreferenced-chunk count at which callers are advised to GC.
    #[serde(default = "DedupSettings::default_gc_threshold")]
    pub gc_threshold: u64,

    #[serde(default = "DedupSettings::default_enabled")]
    pub index_enabled: bool,

    #[serde(default)]
    pub auto_gc: AutoGcSettings,
}

impl DedupSettings {
    fn default_enabled() -> bool {
        true
    }
    fn default_gc_threshold() -> u64 {
        100
    }

    /// Whether a chunk of `size` bytes participates in deduplication.
    pub fn in_dedup_range(&self, size: u64) -> bool {
        if size < self.min_chunk_size {
            return false;
        }
        if self.max_chunk_size > 0 && size > self.max_chunk_size {
            return false;
        }
        true
    }
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: "fixed".to_string(),
            min_chunk_size: 0,
            max_chunk_size: 0,
            gc_threshold: Self::default_gc_threshold(),
            index_enabled: true,
            auto_gc: AutoGcSettings::default(),
        }
    }
}

/// RSA sync identity and trust anchors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsaSettings {
    #[serde(default = "RsaSettings::default_key_size")]
    pub key_size: u32,

    #[serde(default = "RsaSettings::default_public_key_path")]
    pub public_key_path: String,

    #[serde(default = "RsaSettings::default_private_key_path")]
    pub private_key_path: String,

    /// Fingerprint of this vault's own public key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,

    #[serde(default)]
    pub auto_trust_all_peers: bool,

    // Array-of-tables fields serialize after every scalar in TOML.
    #[serde(default)]
    pub trusted_peers: Vec<TrustedPeer>,
}

impl RsaSettings {
    fn default_key_size() -> u32 {
        2048
    }
    fn default_public_key_path() -> String {
        ".sync/sync_public.pem".to_string()
    }
    fn default_private_key_path() -> String {
        ".sync/sync_private.pem".to_string()
    }
}

impl Default for RsaSettings {
    fn default() -> Self {
        Self {
            key_size: Self::default_key_size(),
            public_key_path: Self::default_public_key_path(),
            private_key_path: Self::default_private_key_path(),
            fingerprint: None,
            auto_trust_all_peers: false,
            trusted_peers: Vec::new(),
        }
    }
}

/// Peer discovery toggles. Transports are wired by the host application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoverySettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub mdns: bool,
    #[serde(default)]
    pub dht: bool,
}

/// Synchronization parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Sync mode label; `"rsa"` enables authenticated sync.
    #[serde(default = "SyncSettings::default_mode")]
    pub mode: String,

    #[serde(default)]
    pub auto_sync: bool,

    /// Seconds between automatic sync rounds when `auto_sync` is on.
    #[serde(default = "SyncSettings::default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    #[serde(default)]
    pub rsa: RsaSettings,

    #[serde(default)]
    pub discovery: DiscoverySettings,
}

impl SyncSettings {
    fn default_mode() -> String {
        "rsa".to_string()
    }
    fn default_sync_interval_secs() -> u64 {
        300
    }

    pub fn uses_rsa(&self) -> bool {
        self.enabled && self.mode == "rsa"
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: Self::default_mode(),
            auto_sync: false,
            sync_interval_secs: Self::default_sync_interval_secs(),
            rsa: RsaSettings::default(),
            discovery: DiscoverySettings::default(),
        }
    }
}

/// The complete vault configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    pub vault: VaultIdentity,

    #[serde(default)]
    pub encryption: EncryptionSettings,

    #[serde(default)]
    pub chunking: ChunkingSettings,

    #[serde(default)]
    pub deduplication: DedupSettings,

    #[serde(default)]
    pub sync: SyncSettings,
}

impl VaultConfig {
    /// Creates a configuration with defaults for a new vault.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            vault: VaultIdentity::new(name),
            encryption: EncryptionSettings::default(),
            chunking: ChunkingSettings::default(),
            deduplication: DedupSettings::default(),
            sync: SyncSettings::default(),
        }
    }

    /// Validates cross-field consistency of the document.
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.chunking.strategy != "fixed" {
            return Err(VaultError::InvalidConfiguration(format!(
                "unknown chunking strategy {:?}",
                self.chunking.strategy
            )));
        }
        if self.deduplication.strategy != "fixed" {
            return Err(VaultError::InvalidConfiguration(format!(
                "unknown deduplication strategy {:?}",
                self.deduplication.strategy
            )));
        }
        if self.chunking.hash_algorithm != "sha256" {
            return Err(VaultError::InvalidConfiguration(format!(
                "unsupported hash algorithm {:?}",
                self.chunking.hash_algorithm
            )));
        }
        self.chunking.parsed_chunk_size()?;

        match self.encryption.encryption_type {
            EncryptionType::Aes if self.encryption.mode.is_none() => {
                return Err(VaultError::InvalidConfiguration(
                    "encryption.mode is required when encryption.type = \"aes\"".to_string(),
                ));
            }
            EncryptionType::None | EncryptionType::Chacha20 | EncryptionType::Gpg
                if self.encryption.mode.is_some() =>
            {
                return Err(VaultError::InvalidConfiguration(
                    "encryption.mode is only valid for encryption.type = \"aes\"".to_string(),
                ));
            }
            _ => {}
        }
        if self.encryption.passphrase_protected && self.encryption.kdf_salt.is_none() {
            return Err(VaultError::InvalidConfiguration(
                "passphrase-protected vault is missing its KDF salt".to_string(),
            ));
        }
        if self.encryption.is_enabled()
            && self.encryption.encryption_type != EncryptionType::Gpg
            && self.encryption.wrapped_key.is_none()
        {
            return Err(VaultError::InvalidConfiguration(
                "encrypted vault is missing its data key".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = VaultConfig::new("test-vault");
        config.validate().unwrap();
        assert_eq!(config.chunking.chunk_size, "4MiB");
        assert!(config.deduplication.enabled);
        assert!(!config.sync.enabled);
    }

    #[test]
    fn test_rejects_unknown_strategy() {
        let mut config = VaultConfig::new("v");
        config.chunking.strategy = "rolling".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_aes_requires_mode() {
        let mut config = VaultConfig::new("v");
        config.encryption.encryption_type = EncryptionType::Aes;
        config.encryption.wrapped_key = Some("a2V5".to_string());
        assert!(config.validate().is_err());
        config.encryption.mode = Some(EncryptionMode::Gcm);
        config.validate().unwrap();
    }

    #[test]
    fn test_mode_rejected_outside_aes() {
        let mut config = VaultConfig::new("v");
        config.encryption.encryption_type = EncryptionType::Chacha20;
        config.encryption.wrapped_key = Some("a2V5".to_string());
        config.encryption.mode = Some(EncryptionMode::Cbc);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_passphrase_requires_salt() {
        let mut config = VaultConfig::new("v");
        config.encryption.encryption_type = EncryptionType::Chacha20;
        config.encryption.wrapped_key = Some("a2V5".to_string());
        config.encryption.passphrase_protected = true;
        assert!(config.validate().is_err());
        config.encryption.kdf_salt = Some("c2FsdA==".to_string());
        config.validate().unwrap();
    }

    #[test]
    fn test_dedup_range() {
        let mut dedup = DedupSettings::default();
        assert!(dedup.in_dedup_range(1));
        dedup.min_chunk_size = 100;
        dedup.max_chunk_size = 1000;
        assert!(!dedup.in_dedup_range(99));
        assert!(dedup.in_dedup_range(100));
        assert!(dedup.in_dedup_range(1000));
        assert!(!dedup.in_dedup_range(1001));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = VaultConfig::new("round-trip");
        let doc = toml::to_string_pretty(&config).unwrap();
        let back: VaultConfig = toml::from_str(&doc).unwrap();
        back.validate().unwrap();
        assert_eq!(back.vault.id, config.vault.id);
    }
}
