// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Encryption Service
//!
//! Domain contract for chunk-body encryption. Three authenticated or
//! padded modes are supported; every mode frames its output so the
//! decryptor needs nothing beyond the key:
//!
//! | Algorithm          | Framing              | Nonce/IV |
//! |--------------------|----------------------|----------|
//! | AES-256-GCM        | `nonce ‖ ct ‖ tag`   | 12 bytes |
//! | AES-256-CBC/PKCS#7 | `iv ‖ ct`            | 16 bytes |
//! | ChaCha20-Poly1305  | `nonce ‖ ct ‖ tag`   | 12 bytes |
//!
//! Decryption rejects mis-sized nonces/IVs and authentication failures
//! with a crypto error; it never panics on malformed input.
//!
//! ## Memory Security
//!
//! Key material is carried in [`KeyMaterial`], which zeroizes its bytes
//! on drop. Derived wrapping keys and plaintext data keys must not
//! outlive their immediate use.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::entities::vault_config::{EncryptionMode, EncryptionSettings, EncryptionType};
use crate::error::VaultError;

/// Encryption algorithms supported for chunk bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionAlgorithm {
    Aes256Gcm,
    Aes256Cbc,
    ChaCha20Poly1305,
}

impl EncryptionAlgorithm {
    /// Resolves the algorithm selected by a vault's encryption settings.
    ///
    /// Returns `None` for unencrypted vaults. GPG is recognized by the
    /// configuration but refused here: its orchestration is external.
    pub fn from_settings(settings: &EncryptionSettings) -> Result<Option<Self>, VaultError> {
        match settings.encryption_type {
            EncryptionType::None => Ok(None),
            EncryptionType::Aes => match settings.mode {
                Some(EncryptionMode::Gcm) => Ok(Some(Self::Aes256Gcm)),
                Some(EncryptionMode::Cbc) => Ok(Some(Self::Aes256Cbc)),
                None => Err(VaultError::InvalidConfiguration(
                    "encryption.mode is required when encryption.type = \"aes\"".to_string(),
                )),
            },
            EncryptionType::Chacha20 => Ok(Some(Self::ChaCha20Poly1305)),
            EncryptionType::Gpg => Err(VaultError::InvalidConfiguration(
                "gpg encryption is delegated to an external helper".to_string(),
            )),
        }
    }

    /// Nonce (or IV) size in bytes for this algorithm.
    pub fn nonce_size(&self) -> usize {
        match self {
            Self::Aes256Gcm | Self::ChaCha20Poly1305 => 12,
            Self::Aes256Cbc => 16,
        }
    }

    /// Key size in bytes; 32 for every supported algorithm.
    pub fn key_size(&self) -> usize {
        32
    }
}

impl std::fmt::Display for EncryptionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Aes256Gcm => "aes-256-gcm",
            Self::Aes256Cbc => "aes-256-cbc",
            Self::ChaCha20Poly1305 => "chacha20-poly1305",
        };
        write!(f, "{}", name)
    }
}

/// Secret key bytes that zero themselves on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    bytes: Vec<u8>,
}

impl KeyMaterial {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Key bytes never appear in logs or panics.
impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyMaterial({} bytes)", self.bytes.len())
    }
}

/// Chunk-body encryption contract.
///
/// Implementations are stateless and thread-safe; the per-chunk nonce is
/// generated inside `encrypt` and embedded in the framed output.
pub trait EncryptionService: Send + Sync {
    /// The algorithm this service implements.
    fn algorithm(&self) -> EncryptionAlgorithm;

    /// Encrypts `plaintext`, returning the framed blob and the nonce/IV
    /// that was used (also embedded in the frame).
    fn encrypt(&self, plaintext: &[u8], key: &KeyMaterial) -> Result<(Vec<u8>, Vec<u8>), VaultError>;

    /// Decrypts a framed blob produced by `encrypt`.
    fn decrypt(&self, framed: &[u8], key: &KeyMaterial) -> Result<Vec<u8>, VaultError>;
}
