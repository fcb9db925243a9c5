// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Compression
//!
//! Optional per-chunk codecs applied to plaintext before encryption:
//! gzip (flate2) and zstd. `CompressionAlgorithm::None` maps to no codec
//! at all rather than a pass-through implementation.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression as GzLevel;

use chunk_vault_domain::entities::vault_config::CompressionAlgorithm;
use chunk_vault_domain::services::CompressionService;
use chunk_vault_domain::VaultError;

/// gzip codec backed by flate2.
pub struct GzipCompression;

impl CompressionService for GzipCompression {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Gzip
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, VaultError> {
        let mut encoder = GzEncoder::new(Vec::new(), GzLevel::default());
        encoder
            .write_all(data)
            .and_then(|_| encoder.finish())
            .map_err(|e| VaultError::CompressionError(format!("gzip compression failed: {}", e)))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, VaultError> {
        let mut decoder = GzDecoder::new(data);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| VaultError::CompressionError(format!("gzip decompression failed: {}", e)))?;
        Ok(out)
    }
}

/// zstd codec at the default level.
pub struct ZstdCompression;

impl CompressionService for ZstdCompression {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Zstd
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, VaultError> {
        zstd::encode_all(data, 0)
            .map_err(|e| VaultError::CompressionError(format!("zstd compression failed: {}", e)))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, VaultError> {
        zstd::decode_all(data)
            .map_err(|e| VaultError::CompressionError(format!("zstd decompression failed: {}", e)))
    }
}

/// Builds the codec for a configured algorithm; `None` means the
/// pipeline skips the compression stage entirely.
pub fn build_codec(algorithm: CompressionAlgorithm) -> Option<Box<dyn CompressionService>> {
    match algorithm {
        CompressionAlgorithm::None => None,
        CompressionAlgorithm::Gzip => Some(Box::new(GzipCompression)),
        CompressionAlgorithm::Zstd => Some(Box::new(ZstdCompression)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codecs() -> Vec<Box<dyn CompressionService>> {
        vec![
            build_codec(CompressionAlgorithm::Gzip).unwrap(),
            build_codec(CompressionAlgorithm::Zstd).unwrap(),
        ]
    }

    #[test]
    fn test_round_trip() {
        let data = b"compressible compressible compressible compressible".repeat(64);
        for codec in codecs() {
            let packed = codec.compress(&data).unwrap();
            assert!(packed.len() < data.len());
            assert_eq!(codec.decompress(&packed).unwrap(), data);
        }
    }

    #[test]
    fn test_round_trip_empty() {
        for codec in codecs() {
            let packed = codec.compress(b"").unwrap();
            assert!(codec.decompress(&packed).unwrap().is_empty());
        }
    }

    #[test]
    fn test_garbage_input_rejected() {
        for codec in codecs() {
            assert!(codec.decompress(b"definitely not a compressed stream").is_err());
        }
    }

    #[test]
    fn test_none_has_no_codec() {
        assert!(build_codec(CompressionAlgorithm::None).is_none());
    }
}
