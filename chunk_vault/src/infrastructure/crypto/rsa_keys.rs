// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # RSA Sync Identity
//!
//! The vault's long-lived RSA keypair used for peer authentication and
//! the chunk envelope. Keys persist under `<vault>/.sync/`:
//!
//! - private key: PKCS#1 PEM, file mode 0600;
//! - public key: PKIX (`SubjectPublicKeyInfo`) PEM, file mode 0644;
//! - the `.sync/` directory itself: mode 0700.
//!
//! Incoming peer keys are accepted in both PKCS#1 (`RSA PUBLIC KEY`) and
//! PKIX (`PUBLIC KEY`) PEM blocks. A peer's fingerprint is the base64
//! SHA-256 of the DER encoding of its PKIX public key, regardless of
//! which PEM form it arrived in.

use std::fs;
use std::path::Path;

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use tracing::info;

use chunk_vault_domain::{Fingerprint, VaultError};

/// Marker of a PKCS#1 public key PEM block.
const PKCS1_PUBLIC_TAG: &str = "RSA PUBLIC KEY";

/// The vault's RSA sync keypair.
#[derive(Clone)]
pub struct SyncKeys {
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

impl SyncKeys {
    /// Generates a fresh keypair of `bits` modulus size.
    pub fn generate(bits: usize) -> Result<Self, VaultError> {
        if bits < 512 {
            return Err(VaultError::InvalidConfiguration(format!(
                "RSA key size {} is too small",
                bits
            )));
        }
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| VaultError::EncryptionError(format!("RSA key generation failed: {}", e)))?;
        let public = RsaPublicKey::from(&private);
        info!(bits, "generated RSA sync keypair");
        Ok(Self { private, public })
    }

    pub fn private(&self) -> &RsaPrivateKey {
        &self.private
    }

    pub fn public(&self) -> &RsaPublicKey {
        &self.public
    }

    /// Fingerprint of our own public key.
    pub fn fingerprint(&self) -> Result<Fingerprint, VaultError> {
        fingerprint_of(&self.public)
    }

    /// PKIX PEM of our public key, as sent during key exchange.
    pub fn public_key_pem(&self) -> Result<String, VaultError> {
        self.public
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| VaultError::EncryptionError(format!("public key encoding failed: {}", e)))
    }

    /// Persists the keypair under the vault, applying the restrictive
    /// file modes on Unix.
    pub fn save(
        &self,
        vault_root: &Path,
        private_rel: &str,
        public_rel: &str,
    ) -> Result<(), VaultError> {
        let private_path = vault_root.join(private_rel);
        let public_path = vault_root.join(public_rel);

        for path in [&private_path, &public_path] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| VaultError::io_error_at(parent, e))?;
                set_mode(parent, 0o700)?;
            }
        }

        let private_pem = self
            .private
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| VaultError::EncryptionError(format!("private key encoding failed: {}", e)))?;
        fs::write(&private_path, private_pem.as_bytes())
            .map_err(|e| VaultError::io_error_at(&private_path, e))?;
        set_mode(&private_path, 0o600)?;

        fs::write(&public_path, self.public_key_pem()?)
            .map_err(|e| VaultError::io_error_at(&public_path, e))?;
        set_mode(&public_path, 0o644)?;
        Ok(())
    }

    /// Loads a persisted keypair.
    pub fn load(
        vault_root: &Path,
        private_rel: &str,
        public_rel: &str,
    ) -> Result<Self, VaultError> {
        let private_path = vault_root.join(private_rel);
        let pem = fs::read_to_string(&private_path)
            .map_err(|e| VaultError::io_error_at(&private_path, e))?;
        let private = RsaPrivateKey::from_pkcs1_pem(&pem)
            .map_err(|e| VaultError::VaultCorrupt(format!("unreadable private key: {}", e)))?;

        // The public key is derivable; the stored copy is validated when
        // present so a mismatched pair is caught at open.
        let public = RsaPublicKey::from(&private);
        let public_path = vault_root.join(public_rel);
        if public_path.exists() {
            let pem = fs::read_to_string(&public_path)
                .map_err(|e| VaultError::io_error_at(&public_path, e))?;
            let stored = parse_public_key_pem(&pem)?;
            if stored != public {
                return Err(VaultError::VaultCorrupt(
                    "stored public key does not match the private key".to_string(),
                ));
            }
        }
        Ok(Self { private, public })
    }

    /// Signs SHA-256(challenge) with PKCS#1 v1.5.
    pub fn sign_challenge(&self, challenge: &[u8]) -> Result<Vec<u8>, VaultError> {
        let digest = Sha256::digest(challenge);
        self.private
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| VaultError::EncryptionError(format!("challenge signing failed: {}", e)))
    }
}

/// Verifies a PKCS#1 v1.5 signature over SHA-256(challenge).
pub fn verify_challenge_signature(
    public: &RsaPublicKey,
    challenge: &[u8],
    signature: &[u8],
) -> Result<(), VaultError> {
    let digest = Sha256::digest(challenge);
    public
        .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
        .map_err(|_| VaultError::ProtocolError("peer signature verification failed".to_string()))
}

/// Parses a public key from either PEM form.
pub fn parse_public_key_pem(pem: &str) -> Result<RsaPublicKey, VaultError> {
    if pem.contains(PKCS1_PUBLIC_TAG) {
        RsaPublicKey::from_pkcs1_pem(pem)
            .map_err(|e| VaultError::ProtocolError(format!("unreadable PKCS#1 public key: {}", e)))
    } else {
        RsaPublicKey::from_public_key_pem(pem)
            .map_err(|e| VaultError::ProtocolError(format!("unreadable public key: {}", e)))
    }
}

/// Fingerprint of a public key: base64(SHA-256(PKIX DER)).
pub fn fingerprint_of(public: &RsaPublicKey) -> Result<Fingerprint, VaultError> {
    let der = public
        .to_public_key_der()
        .map_err(|e| VaultError::EncryptionError(format!("public key DER encoding failed: {}", e)))?;
    Ok(Fingerprint::of_public_key_der(der.as_bytes()))
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), VaultError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| VaultError::io_error_at(path, e))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), VaultError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1::EncodeRsaPublicKey;
    use tempfile::TempDir;

    // Small keys keep keypair generation fast in tests.
    const TEST_BITS: usize = 1024;

    #[test]
    fn test_generate_and_sign_verify() {
        let keys = SyncKeys::generate(TEST_BITS).unwrap();
        let challenge = [7u8; 32];
        let signature = keys.sign_challenge(&challenge).unwrap();
        verify_challenge_signature(keys.public(), &challenge, &signature).unwrap();

        let other = [8u8; 32];
        assert!(verify_challenge_signature(keys.public(), &other, &signature).is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let keys = SyncKeys::generate(TEST_BITS).unwrap();
        keys.save(dir.path(), ".sync/sync_private.pem", ".sync/sync_public.pem")
            .unwrap();

        let loaded = SyncKeys::load(dir.path(), ".sync/sync_private.pem", ".sync/sync_public.pem")
            .unwrap();
        assert_eq!(loaded.fingerprint().unwrap(), keys.fingerprint().unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_modes() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let keys = SyncKeys::generate(TEST_BITS).unwrap();
        keys.save(dir.path(), ".sync/sync_private.pem", ".sync/sync_public.pem")
            .unwrap();

        let mode = |rel: &str| {
            fs::metadata(dir.path().join(rel)).unwrap().permissions().mode() & 0o777
        };
        assert_eq!(mode(".sync/sync_private.pem"), 0o600);
        assert_eq!(mode(".sync/sync_public.pem"), 0o644);
        assert_eq!(mode(".sync"), 0o700);
    }

    #[test]
    fn test_parse_both_pem_forms() {
        let keys = SyncKeys::generate(TEST_BITS).unwrap();

        let pkix = keys.public_key_pem().unwrap();
        assert!(pkix.contains("BEGIN PUBLIC KEY"));
        let parsed = parse_public_key_pem(&pkix).unwrap();
        assert_eq!(&parsed, keys.public());

        let pkcs1 = keys.public().to_pkcs1_pem(LineEnding::LF).unwrap();
        assert!(pkcs1.contains("BEGIN RSA PUBLIC KEY"));
        let parsed = parse_public_key_pem(&pkcs1).unwrap();
        assert_eq!(&parsed, keys.public());
    }

    #[test]
    fn test_fingerprint_independent_of_pem_form() {
        let keys = SyncKeys::generate(TEST_BITS).unwrap();
        let pkcs1 = keys.public().to_pkcs1_pem(LineEnding::LF).unwrap();
        let reparsed = parse_public_key_pem(&pkcs1).unwrap();
        assert_eq!(
            fingerprint_of(&reparsed).unwrap(),
            keys.fingerprint().unwrap()
        );
    }

    #[test]
    fn test_rejects_garbage_pem() {
        assert!(parse_public_key_pem("not a key").is_err());
    }
}
