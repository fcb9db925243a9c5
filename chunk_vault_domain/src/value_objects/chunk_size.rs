// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Size Value Object
//!
//! Type-safe representation of the chunk size used by the fixed-size
//! chunking strategy. Ensures chunk sizes are within valid bounds and
//! provides parsing of human-readable sizes from vault configuration.
//!
//! ## Chunk Size Constraints
//!
//! - **Minimum (1 byte)**: zero-byte chunks are meaningless in processing.
//! - **Maximum (512 MB)**: very large chunks cause memory pressure, and a
//!   chunk is held fully in memory through the encryption pipeline.
//! - **Default (4 MiB)**: the vault's fixed-size chunking default.

use byte_unit::Byte;
use serde::{Deserialize, Serialize};

use crate::error::VaultError;

/// Minimum allowed chunk size in bytes.
pub const MIN_CHUNK_SIZE: usize = 1;

/// Maximum allowed chunk size in bytes (512 MB).
pub const MAX_CHUNK_SIZE: usize = 512 * 1024 * 1024;

/// Default chunk size in bytes (4 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Validated size of a data chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkSize {
    bytes: usize,
}

impl ChunkSize {
    /// Creates a new chunk size from a byte count.
    ///
    /// Returns a `ValidationError` when the size is outside
    /// `[MIN_CHUNK_SIZE, MAX_CHUNK_SIZE]`.
    pub fn new(bytes: usize) -> Result<Self, VaultError> {
        if bytes < MIN_CHUNK_SIZE {
            return Err(VaultError::ValidationError(format!(
                "chunk size must be at least {} byte, got {}",
                MIN_CHUNK_SIZE, bytes
            )));
        }
        if bytes > MAX_CHUNK_SIZE {
            return Err(VaultError::ValidationError(format!(
                "chunk size must be at most {} bytes, got {}",
                MAX_CHUNK_SIZE, bytes
            )));
        }
        Ok(Self { bytes })
    }

    /// Creates a chunk size from kilobytes.
    pub fn from_kb(kb: usize) -> Result<Self, VaultError> {
        Self::new(kb * 1024)
    }

    /// Creates a chunk size from megabytes.
    pub fn from_mb(mb: usize) -> Result<Self, VaultError> {
        Self::new(mb * 1024 * 1024)
    }

    /// Parses a human-readable size string such as `"4MB"` or `"512KiB"`.
    pub fn parse(input: &str) -> Result<Self, VaultError> {
        let byte = Byte::parse_str(input, true).map_err(|e| {
            VaultError::InvalidConfiguration(format!("invalid chunk size {:?}: {}", input, e))
        })?;
        Self::new(byte.as_u64() as usize)
    }

    /// Returns the size in bytes.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Returns the number of chunks needed to hold `file_size` bytes.
    pub fn chunks_needed_for_file(&self, file_size: u64) -> u64 {
        if file_size == 0 {
            return 0;
        }
        file_size.div_ceil(self.bytes as u64)
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        Self {
            bytes: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl std::fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.bytes % (1024 * 1024) == 0 {
            write!(f, "{}MiB", self.bytes / (1024 * 1024))
        } else if self.bytes % 1024 == 0 {
            write!(f, "{}KiB", self.bytes / 1024)
        } else {
            write!(f, "{}B", self.bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_valid() {
        let size = ChunkSize::new(1024 * 1024).unwrap();
        assert_eq!(size.bytes(), 1024 * 1024);
    }

    #[test]
    fn test_new_rejects_zero() {
        assert!(ChunkSize::new(0).is_err());
    }

    #[test]
    fn test_new_rejects_oversize() {
        assert!(ChunkSize::new(MAX_CHUNK_SIZE + 1).is_err());
        assert!(ChunkSize::new(MAX_CHUNK_SIZE).is_ok());
    }

    #[test]
    fn test_default_is_4_mib() {
        assert_eq!(ChunkSize::default().bytes(), 4 * 1024 * 1024);
    }

    #[test]
    fn test_from_kb_and_mb() {
        assert_eq!(ChunkSize::from_kb(512).unwrap().bytes(), 512 * 1024);
        assert_eq!(ChunkSize::from_mb(4).unwrap().bytes(), 4 * 1024 * 1024);
    }

    #[test]
    fn test_parse_human_sizes() {
        assert_eq!(ChunkSize::parse("4MiB").unwrap().bytes(), 4 * 1024 * 1024);
        assert_eq!(ChunkSize::parse("1KiB").unwrap().bytes(), 1024);
        assert!(ChunkSize::parse("not-a-size").is_err());
    }

    #[test]
    fn test_chunks_needed() {
        let size = ChunkSize::from_mb(4).unwrap();
        assert_eq!(size.chunks_needed_for_file(0), 0);
        assert_eq!(size.chunks_needed_for_file(1), 1);
        assert_eq!(size.chunks_needed_for_file(4 * 1024 * 1024), 1);
        assert_eq!(size.chunks_needed_for_file(4 * 1024 * 1024 + 1), 2);
        // 10 MiB file -> 3 chunks (4 + 4 + 2)
        assert_eq!(size.chunks_needed_for_file(10 * 1024 * 1024), 3);
    }

    #[test]
    fn test_display() {
        assert_eq!(ChunkSize::from_mb(4).unwrap().to_string(), "4MiB");
        assert_eq!(ChunkSize::from_kb(16).unwrap().to_string(), "16KiB");
        assert_eq!(ChunkSize::new(100).unwrap().to_string(), "100B");
    }
}
