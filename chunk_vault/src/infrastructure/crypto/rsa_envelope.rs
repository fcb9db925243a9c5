// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # RSA Chunk Envelope
//!
//! Block-wise PKCS#1 v1.5 wrapping of a chunk body for a specific peer's
//! public key. For a modulus of `n` bytes the body is split into blocks
//! of `n - 11` bytes (the PKCS#1 v1.5 padding overhead), each block is
//! encrypted separately, and the ciphertext blocks are concatenated.
//! Decryption splits by exactly `n` bytes and concatenates the decrypted
//! blocks.
//!
//! A short trailing residual on decrypt is logged and discarded (it can
//! only arise from a truncated transfer); a block that fails to decrypt
//! fails the whole envelope.

use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use tracing::warn;

use chunk_vault_domain::VaultError;

/// PKCS#1 v1.5 padding overhead in bytes.
const PKCS1_OVERHEAD: usize = 11;

/// Encrypts `body` for the holder of `public`.
pub fn encrypt_envelope(body: &[u8], public: &RsaPublicKey) -> Result<Vec<u8>, VaultError> {
    let modulus = public.size();
    let block_size = modulus.checked_sub(PKCS1_OVERHEAD).ok_or_else(|| {
        VaultError::EncryptionError(format!("RSA modulus of {} bytes is unusable", modulus))
    })?;

    let mut rng = rand::thread_rng();
    let mut envelope = Vec::with_capacity(body.len().div_ceil(block_size.max(1)) * modulus);
    for block in body.chunks(block_size) {
        let encrypted = public
            .encrypt(&mut rng, Pkcs1v15Encrypt, block)
            .map_err(|e| VaultError::EncryptionError(format!("envelope encryption failed: {}", e)))?;
        envelope.extend_from_slice(&encrypted);
    }
    Ok(envelope)
}

/// Decrypts an envelope produced for our public key.
pub fn decrypt_envelope(envelope: &[u8], private: &RsaPrivateKey) -> Result<Vec<u8>, VaultError> {
    let modulus = private.size();
    let mut body = Vec::new();
    let mut blocks = envelope.chunks_exact(modulus);
    for block in &mut blocks {
        let decrypted = private
            .decrypt(Pkcs1v15Encrypt, block)
            .map_err(|e| VaultError::EncryptionError(format!("envelope decryption failed: {}", e)))?;
        body.extend_from_slice(&decrypted);
    }
    let residual = blocks.remainder();
    if !residual.is_empty() {
        warn!(
            bytes = residual.len(),
            "discarding short trailing envelope block"
        );
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::crypto::rsa_keys::SyncKeys;

    fn keys() -> SyncKeys {
        SyncKeys::generate(1024).unwrap()
    }

    #[test]
    fn test_round_trip_small_body() {
        let keys = keys();
        let body = b"a chunk body".to_vec();
        let envelope = encrypt_envelope(&body, keys.public()).unwrap();
        assert_eq!(decrypt_envelope(&envelope, keys.private()).unwrap(), body);
    }

    #[test]
    fn test_round_trip_multi_block_body() {
        let keys = keys();
        // Spans several PKCS#1 blocks for a 1024-bit modulus.
        let body: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        let envelope = encrypt_envelope(&body, keys.public()).unwrap();
        let modulus = keys.public().size();
        assert_eq!(envelope.len() % modulus, 0);
        assert!(envelope.len() > body.len());
        assert_eq!(decrypt_envelope(&envelope, keys.private()).unwrap(), body);
    }

    #[test]
    fn test_round_trip_empty_body() {
        let keys = keys();
        let envelope = encrypt_envelope(&[], keys.public()).unwrap();
        assert!(envelope.is_empty());
        assert!(decrypt_envelope(&envelope, keys.private()).unwrap().is_empty());
    }

    #[test]
    fn test_exact_block_boundary() {
        let keys = keys();
        let block_size = keys.public().size() - 11;
        let body = vec![0x5A; block_size * 2];
        let envelope = encrypt_envelope(&body, keys.public()).unwrap();
        assert_eq!(envelope.len(), keys.public().size() * 2);
        assert_eq!(decrypt_envelope(&envelope, keys.private()).unwrap(), body);
    }

    #[test]
    fn test_short_residual_is_discarded() {
        let keys = keys();
        let body = b"complete block".to_vec();
        let mut envelope = encrypt_envelope(&body, keys.public()).unwrap();
        envelope.extend_from_slice(&[0xFF; 7]);
        assert_eq!(decrypt_envelope(&envelope, keys.private()).unwrap(), body);
    }

    #[test]
    fn test_corrupt_block_fails_cleanly() {
        let keys = keys();
        let mut envelope = encrypt_envelope(b"tamper me", keys.public()).unwrap();
        envelope[0] ^= 0xFF;
        assert!(decrypt_envelope(&envelope, keys.private()).is_err());
    }

    #[test]
    fn test_wrong_recipient_fails() {
        let sender_view = keys();
        let other = keys();
        let envelope = encrypt_envelope(b"not for you", sender_view.public()).unwrap();
        assert!(decrypt_envelope(&envelope, other.private()).is_err());
    }
}
