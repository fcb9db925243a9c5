// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Crypto Infrastructure
//!
//! Concrete cryptography for the vault:
//!
//! - [`symmetric`] - chunk-body ciphers (AES-256-GCM, AES-256-CBC,
//!   ChaCha20-Poly1305) implementing the domain `EncryptionService`.
//! - [`key_wrap`] - data-key generation, scrypt/PBKDF2 passphrase
//!   wrapping, and the key-check token that distinguishes a wrong
//!   passphrase from corrupt data.
//! - [`rsa_keys`] - the vault's long-lived RSA sync identity: keypair
//!   generation and PEM persistence, fingerprints, challenge signatures.
//! - [`rsa_envelope`] - block-wise PKCS#1 v1.5 wrapping of chunk bodies
//!   for a specific peer's public key.

pub mod key_wrap;
pub mod rsa_envelope;
pub mod rsa_keys;
pub mod symmetric;

pub use key_wrap::VaultKeys;
pub use rsa_keys::SyncKeys;
pub use symmetric::build_cipher;
