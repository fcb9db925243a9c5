// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Compression Service
//!
//! Domain contract for optional per-chunk compression, applied to
//! plaintext bytes before encryption and undone after decryption on
//! retrieve. The chunk's `compressed` flag records whether a codec ran.

use crate::entities::vault_config::CompressionAlgorithm;
use crate::error::VaultError;

/// Per-chunk compression codec contract.
pub trait CompressionService: Send + Sync {
    /// The codec this service implements.
    fn algorithm(&self) -> CompressionAlgorithm;

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, VaultError>;

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, VaultError>;
}
