// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Data Key Wrapping
//!
//! Generation and passphrase protection of the vault's 32-byte data key.
//!
//! Unprotected vaults store the data key base64-encoded in the
//! configuration. Passphrase-protected vaults derive a wrapping key with
//! scrypt (default N=32768, r=8, p=1) or PBKDF2-HMAC-SHA256 over a
//! 16-byte salt, wrap the data key with AES-256-GCM under that wrapping
//! key, and store `nonce ‖ wrapped` base64-encoded.
//!
//! A separate **key-check token** is persisted alongside: AES-GCM over a
//! fixed validation literal with a fresh 12-byte nonce. A failed open of
//! the key-check is the authoritative wrong-passphrase signal, reported
//! before any chunk is read. A legacy token layout with a 16-byte nonce
//! prefix is accepted through a distinct fallback path that trims the
//! prefix to 12 bytes; new vaults always write 12-byte nonces.

use aes_gcm::{AeadInPlace, Aes256Gcm, Key, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ring::rand::{SecureRandom, SystemRandom};
use tracing::debug;
use zeroize::Zeroize;

use chunk_vault_domain::entities::vault_config::{EncryptionKdf, EncryptionSettings};
use chunk_vault_domain::services::KeyMaterial;
use chunk_vault_domain::VaultError;

/// Data key size: AES-256 / ChaCha20 key size.
pub const DATA_KEY_SIZE: usize = 32;

/// KDF salt size.
pub const SALT_SIZE: usize = 16;

/// Nonce size of the wrap and key-check AES-GCM frames.
const WRAP_NONCE_SIZE: usize = 12;

/// Legacy key-check tokens carried a 16-byte nonce field.
const LEGACY_NONCE_SIZE: usize = 16;

/// Plaintext of the key-check token. The literal is part of the vault
/// format and must not change.
const KEY_CHECK_PLAINTEXT: &[u8] = b"sietch-key-validation";

/// Key management entry points for vault creation and open.
pub struct VaultKeys;

impl VaultKeys {
    /// Generates a fresh 32-byte data key.
    pub fn generate_data_key() -> Result<KeyMaterial, VaultError> {
        let rng = SystemRandom::new();
        let mut bytes = vec![0u8; DATA_KEY_SIZE];
        rng.fill(&mut bytes)
            .map_err(|e| VaultError::EncryptionError(format!("failed to generate data key: {:?}", e)))?;
        Ok(KeyMaterial::new(bytes))
    }

    /// Creates the key material for a new vault and fills the
    /// encryption settings with the (possibly wrapped) key, salt, and
    /// key-check token.
    ///
    /// Returns the plaintext data key for immediate use by the caller.
    pub fn provision(
        settings: &mut EncryptionSettings,
        passphrase: Option<&str>,
    ) -> Result<KeyMaterial, VaultError> {
        let data_key = Self::generate_data_key()?;
        match passphrase {
            None => {
                settings.passphrase_protected = false;
                settings.wrapped_key = Some(BASE64.encode(data_key.as_slice()));
                settings.kdf_salt = None;
                settings.key_check = None;
            }
            Some(passphrase) => {
                let salt = generate_salt()?;
                let wrapping_key = derive_wrapping_key(passphrase, &salt, settings)?;
                let wrapped = aes_gcm_seal(&wrapping_key, data_key.as_slice())?;
                let key_check = aes_gcm_seal(&wrapping_key, KEY_CHECK_PLAINTEXT)?;
                settings.passphrase_protected = true;
                settings.kdf_salt = Some(BASE64.encode(salt));
                settings.wrapped_key = Some(BASE64.encode(wrapped));
                settings.key_check = Some(BASE64.encode(key_check));
            }
        }
        Ok(data_key)
    }

    /// Recovers the data key at vault open.
    ///
    /// For passphrase-protected vaults the key-check token is validated
    /// first; a failed check is `WrongPassphrase`, before any chunk or
    /// wrapped-key material is touched.
    pub fn unlock(
        settings: &EncryptionSettings,
        passphrase: Option<&str>,
    ) -> Result<KeyMaterial, VaultError> {
        let wrapped_b64 = settings.wrapped_key.as_ref().ok_or_else(|| {
            VaultError::InvalidConfiguration("encrypted vault is missing its data key".to_string())
        })?;

        if !settings.passphrase_protected {
            let mut bytes = BASE64.decode(wrapped_b64).map_err(|e| {
                VaultError::VaultCorrupt(format!("stored data key is not valid base64: {}", e))
            })?;
            if bytes.len() != DATA_KEY_SIZE {
                bytes.zeroize();
                return Err(VaultError::VaultCorrupt(
                    "stored data key has the wrong size".to_string(),
                ));
            }
            return Ok(KeyMaterial::new(bytes));
        }

        let passphrase = passphrase.ok_or_else(|| {
            VaultError::InvalidConfiguration(
                "vault is passphrase protected but no passphrase was given".to_string(),
            )
        })?;
        let salt = BASE64
            .decode(settings.kdf_salt.as_deref().unwrap_or_default())
            .map_err(|e| VaultError::VaultCorrupt(format!("stored salt is not valid base64: {}", e)))?;
        let wrapping_key = derive_wrapping_key(passphrase, &salt, settings)?;

        let key_check = settings.key_check.as_ref().ok_or_else(|| {
            VaultError::VaultCorrupt("passphrase-protected vault is missing its key check".to_string())
        })?;
        let token = BASE64.decode(key_check).map_err(|e| {
            VaultError::VaultCorrupt(format!("stored key check is not valid base64: {}", e))
        })?;
        verify_key_check(&token, &wrapping_key)?;

        let wrapped = BASE64.decode(wrapped_b64).map_err(|e| {
            VaultError::VaultCorrupt(format!("stored data key is not valid base64: {}", e))
        })?;
        let data_key = aes_gcm_open(&wrapping_key, &wrapped).map_err(|_| {
            // The key check passed, so the wrapping key is right and the
            // wrapped key itself is damaged.
            VaultError::VaultCorrupt("wrapped data key failed to decrypt".to_string())
        })?;
        if data_key.len() != DATA_KEY_SIZE {
            return Err(VaultError::VaultCorrupt(
                "unwrapped data key has the wrong size".to_string(),
            ));
        }
        Ok(KeyMaterial::new(data_key))
    }
}

/// Validates a key-check token against a wrapping key.
///
/// The current layout (12-byte nonce) is tried first; the legacy layout
/// (16-byte nonce field trimmed to 12) is a distinct second attempt, not
/// an error-driven retry. Both failing means the passphrase is wrong.
fn verify_key_check(token: &[u8], wrapping_key: &KeyMaterial) -> Result<(), VaultError> {
    if let Ok(plain) = aes_gcm_open(wrapping_key, token) {
        if plain == KEY_CHECK_PLAINTEXT {
            return Ok(());
        }
    }
    if verify_key_check_legacy(token, wrapping_key) {
        debug!("key check validated through the legacy 16-byte-nonce layout");
        return Ok(());
    }
    Err(VaultError::WrongPassphrase)
}

/// Legacy key-check layout: a 16-byte nonce field of which only the
/// first 12 bytes were ever fed to AES-GCM.
fn verify_key_check_legacy(token: &[u8], wrapping_key: &KeyMaterial) -> bool {
    if token.len() <= LEGACY_NONCE_SIZE {
        return false;
    }
    let (nonce_field, ciphertext) = token.split_at(LEGACY_NONCE_SIZE);
    let mut framed = nonce_field[..WRAP_NONCE_SIZE].to_vec();
    framed.extend_from_slice(ciphertext);
    matches!(aes_gcm_open(wrapping_key, &framed), Ok(plain) if plain == KEY_CHECK_PLAINTEXT)
}

/// Derives the wrapping key from a passphrase and salt per the vault's
/// KDF settings.
pub fn derive_wrapping_key(
    passphrase: &str,
    salt: &[u8],
    settings: &EncryptionSettings,
) -> Result<KeyMaterial, VaultError> {
    let mut out = vec![0u8; DATA_KEY_SIZE];
    match settings.kdf {
        EncryptionKdf::Scrypt => {
            let log_n = scrypt_log_n(settings.scrypt_n)?;
            let params = scrypt::Params::new(log_n, settings.scrypt_r, settings.scrypt_p, out.len())
                .map_err(|e| {
                    VaultError::InvalidConfiguration(format!("invalid scrypt parameters: {}", e))
                })?;
            scrypt::scrypt(passphrase.as_bytes(), salt, &params, &mut out)
                .map_err(|e| VaultError::EncryptionError(format!("scrypt derivation failed: {}", e)))?;
        }
        EncryptionKdf::Pbkdf2 => {
            let iterations = std::num::NonZeroU32::new(settings.pbkdf2_iterations).ok_or_else(|| {
                VaultError::InvalidConfiguration("pbkdf2 iteration count must be nonzero".to_string())
            })?;
            ring::pbkdf2::derive(
                ring::pbkdf2::PBKDF2_HMAC_SHA256,
                iterations,
                salt,
                passphrase.as_bytes(),
                &mut out,
            );
        }
    }
    Ok(KeyMaterial::new(out))
}

fn scrypt_log_n(n: u32) -> Result<u8, VaultError> {
    if n < 2 || !n.is_power_of_two() {
        return Err(VaultError::InvalidConfiguration(format!(
            "scrypt N must be a power of two >= 2, got {}",
            n
        )));
    }
    Ok(n.trailing_zeros() as u8)
}

fn generate_salt() -> Result<[u8; SALT_SIZE], VaultError> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_SIZE];
    rng.fill(&mut salt)
        .map_err(|e| VaultError::EncryptionError(format!("failed to generate salt: {:?}", e)))?;
    Ok(salt)
}

/// AES-256-GCM seal with a fresh 12-byte nonce, framed `nonce ‖ ct`.
fn aes_gcm_seal(key: &KeyMaterial, plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
    let rng = SystemRandom::new();
    let mut nonce = [0u8; WRAP_NONCE_SIZE];
    rng.fill(&mut nonce)
        .map_err(|e| VaultError::EncryptionError(format!("failed to generate nonce: {:?}", e)))?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()));
    let mut buffer = plaintext.to_vec();
    cipher
        .encrypt_in_place(Nonce::from_slice(&nonce), b"", &mut buffer)
        .map_err(|e| VaultError::EncryptionError(format!("key wrap failed: {:?}", e)))?;

    let mut framed = nonce.to_vec();
    framed.extend_from_slice(&buffer);
    Ok(framed)
}

/// Opens a `nonce ‖ ct` AES-256-GCM frame.
fn aes_gcm_open(key: &KeyMaterial, framed: &[u8]) -> Result<Vec<u8>, VaultError> {
    if framed.len() < WRAP_NONCE_SIZE {
        return Err(VaultError::EncryptionError(
            "wrapped blob shorter than its nonce".to_string(),
        ));
    }
    let (nonce, ciphertext) = framed.split_at(WRAP_NONCE_SIZE);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()));
    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place(Nonce::from_slice(nonce), b"", &mut buffer)
        .map_err(|e| VaultError::EncryptionError(format!("key unwrap failed: {:?}", e)))?;
    Ok(buffer)
}
