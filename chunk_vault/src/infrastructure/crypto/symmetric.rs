// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Symmetric Chunk Ciphers
//!
//! Implementations of the domain `EncryptionService` for the three
//! supported chunk-body ciphers. Framing on disk:
//!
//! - AES-256-GCM and ChaCha20-Poly1305: `nonce(12) ‖ ciphertext ‖ tag`
//! - AES-256-CBC with PKCS#7: `iv(16) ‖ ciphertext`
//!
//! Decryption validates the key size and the embedded nonce/IV length
//! before touching the cipher, and maps authentication or padding
//! failures to a crypto error rather than panicking.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes_gcm::{AeadInPlace, Aes256Gcm, Key, KeyInit, Nonce};
use chacha20poly1305::{ChaCha20Poly1305, Key as ChaChaKey, Nonce as ChaChaNonce};
use ring::rand::{SecureRandom, SystemRandom};

use chunk_vault_domain::services::{EncryptionAlgorithm, EncryptionService, KeyMaterial};
use chunk_vault_domain::VaultError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

fn check_key(key: &KeyMaterial, algorithm: EncryptionAlgorithm) -> Result<(), VaultError> {
    if key.len() != algorithm.key_size() {
        return Err(VaultError::EncryptionError(format!(
            "{} requires a {}-byte key, got {}",
            algorithm,
            algorithm.key_size(),
            key.len()
        )));
    }
    Ok(())
}

fn generate_nonce(rng: &SystemRandom, len: usize) -> Result<Vec<u8>, VaultError> {
    let mut nonce = vec![0u8; len];
    rng.fill(&mut nonce)
        .map_err(|e| VaultError::EncryptionError(format!("failed to generate nonce: {:?}", e)))?;
    Ok(nonce)
}

/// AES-256-GCM chunk cipher.
pub struct AesGcmEncryption {
    rng: SystemRandom,
}

impl AesGcmEncryption {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for AesGcmEncryption {
    fn default() -> Self {
        Self::new()
    }
}

impl EncryptionService for AesGcmEncryption {
    fn algorithm(&self) -> EncryptionAlgorithm {
        EncryptionAlgorithm::Aes256Gcm
    }

    fn encrypt(&self, plaintext: &[u8], key: &KeyMaterial) -> Result<(Vec<u8>, Vec<u8>), VaultError> {
        check_key(key, self.algorithm())?;
        let nonce = generate_nonce(&self.rng, 12)?;

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()));
        let mut buffer = plaintext.to_vec();
        cipher
            .encrypt_in_place(Nonce::from_slice(&nonce), b"", &mut buffer)
            .map_err(|e| VaultError::EncryptionError(format!("AES-256-GCM encryption failed: {:?}", e)))?;

        let mut framed = nonce.clone();
        framed.extend_from_slice(&buffer);
        Ok((framed, nonce))
    }

    fn decrypt(&self, framed: &[u8], key: &KeyMaterial) -> Result<Vec<u8>, VaultError> {
        check_key(key, self.algorithm())?;
        if framed.len() < 12 {
            return Err(VaultError::EncryptionError(
                "AES-256-GCM blob shorter than its nonce".to_string(),
            ));
        }
        let (nonce, ciphertext) = framed.split_at(12);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()));
        let mut buffer = ciphertext.to_vec();
        cipher
            .decrypt_in_place(Nonce::from_slice(nonce), b"", &mut buffer)
            .map_err(|e| VaultError::EncryptionError(format!("AES-256-GCM decryption failed: {:?}", e)))?;
        Ok(buffer)
    }
}

/// ChaCha20-Poly1305 chunk cipher.
pub struct ChaCha20Encryption {
    rng: SystemRandom,
}

impl ChaCha20Encryption {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for ChaCha20Encryption {
    fn default() -> Self {
        Self::new()
    }
}

impl EncryptionService for ChaCha20Encryption {
    fn algorithm(&self) -> EncryptionAlgorithm {
        EncryptionAlgorithm::ChaCha20Poly1305
    }

    fn encrypt(&self, plaintext: &[u8], key: &KeyMaterial) -> Result<(Vec<u8>, Vec<u8>), VaultError> {
        check_key(key, self.algorithm())?;
        let nonce = generate_nonce(&self.rng, 12)?;

        let cipher = ChaCha20Poly1305::new(ChaChaKey::from_slice(key.as_slice()));
        let mut buffer = plaintext.to_vec();
        cipher
            .encrypt_in_place(ChaChaNonce::from_slice(&nonce), b"", &mut buffer)
            .map_err(|e| {
                VaultError::EncryptionError(format!("ChaCha20-Poly1305 encryption failed: {:?}", e))
            })?;

        let mut framed = nonce.clone();
        framed.extend_from_slice(&buffer);
        Ok((framed, nonce))
    }

    fn decrypt(&self, framed: &[u8], key: &KeyMaterial) -> Result<Vec<u8>, VaultError> {
        check_key(key, self.algorithm())?;
        if framed.len() < 12 {
            return Err(VaultError::EncryptionError(
                "ChaCha20-Poly1305 blob shorter than its nonce".to_string(),
            ));
        }
        let (nonce, ciphertext) = framed.split_at(12);
        let cipher = ChaCha20Poly1305::new(ChaChaKey::from_slice(key.as_slice()));
        let mut buffer = ciphertext.to_vec();
        cipher
            .decrypt_in_place(ChaChaNonce::from_slice(nonce), b"", &mut buffer)
            .map_err(|e| {
                VaultError::EncryptionError(format!("ChaCha20-Poly1305 decryption failed: {:?}", e))
            })?;
        Ok(buffer)
    }
}

/// AES-256-CBC with PKCS#7 padding. Unauthenticated; integrity comes
/// from the storage hash over the framed blob.
pub struct AesCbcEncryption {
    rng: SystemRandom,
}

impl AesCbcEncryption {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for AesCbcEncryption {
    fn default() -> Self {
        Self::new()
    }
}

impl EncryptionService for AesCbcEncryption {
    fn algorithm(&self) -> EncryptionAlgorithm {
        EncryptionAlgorithm::Aes256Cbc
    }

    fn encrypt(&self, plaintext: &[u8], key: &KeyMaterial) -> Result<(Vec<u8>, Vec<u8>), VaultError> {
        check_key(key, self.algorithm())?;
        let iv = generate_nonce(&self.rng, 16)?;

        let encryptor = Aes256CbcEnc::new_from_slices(key.as_slice(), &iv)
            .map_err(|e| VaultError::EncryptionError(format!("AES-256-CBC init failed: {}", e)))?;
        let ciphertext = encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut framed = iv.clone();
        framed.extend_from_slice(&ciphertext);
        Ok((framed, iv))
    }

    fn decrypt(&self, framed: &[u8], key: &KeyMaterial) -> Result<Vec<u8>, VaultError> {
        check_key(key, self.algorithm())?;
        if framed.len() < 16 {
            return Err(VaultError::EncryptionError(
                "AES-256-CBC blob shorter than its IV".to_string(),
            ));
        }
        let (iv, ciphertext) = framed.split_at(16);
        if ciphertext.is_empty() || ciphertext.len() % 16 != 0 {
            return Err(VaultError::EncryptionError(
                "AES-256-CBC ciphertext is not block-aligned".to_string(),
            ));
        }
        let decryptor = Aes256CbcDec::new_from_slices(key.as_slice(), iv)
            .map_err(|e| VaultError::EncryptionError(format!("AES-256-CBC init failed: {}", e)))?;
        decryptor
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|e| VaultError::EncryptionError(format!("AES-256-CBC decryption failed: {}", e)))
    }
}

/// Builds the cipher for an algorithm selection.
pub fn build_cipher(algorithm: EncryptionAlgorithm) -> Box<dyn EncryptionService> {
    match algorithm {
        EncryptionAlgorithm::Aes256Gcm => Box::new(AesGcmEncryption::new()),
        EncryptionAlgorithm::Aes256Cbc => Box::new(AesCbcEncryption::new()),
        EncryptionAlgorithm::ChaCha20Poly1305 => Box::new(ChaCha20Encryption::new()),
    }
}
