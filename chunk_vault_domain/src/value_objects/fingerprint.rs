// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Key Fingerprint Value Object
//!
//! A peer's fingerprint is the base64-encoded SHA-256 digest of the DER
//! encoding of its PKIX (`SubjectPublicKeyInfo`) public key. Fingerprints
//! identify peers in the trust store alongside their peer ids; both must
//! be unique.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::VaultError;

/// Base64-encoded SHA-256 fingerprint of a DER-encoded public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Computes the fingerprint of a DER-encoded PKIX public key.
    pub fn of_public_key_der(der: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(der);
        Self(BASE64.encode(hasher.finalize()))
    }

    /// Validates and wraps an existing fingerprint string.
    ///
    /// A SHA-256 fingerprint is 32 bytes, so its standard base64 encoding
    /// is exactly 44 characters ending in `=`.
    pub fn parse(value: impl Into<String>) -> Result<Self, VaultError> {
        let value = value.into();
        let decoded = BASE64
            .decode(&value)
            .map_err(|e| VaultError::ValidationError(format!("invalid fingerprint encoding: {}", e)))?;
        if decoded.len() != 32 {
            return Err(VaultError::ValidationError(format!(
                "fingerprint must decode to 32 bytes, got {}",
                decoded.len()
            )));
        }
        Ok(Self(value))
    }

    /// Returns the encoded fingerprint.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
