// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunking Service
//!
//! Domain contract for slicing file bytes into chunks. The only strategy
//! in scope is fixed-size chunking; the trait exists so the write path
//! stays independent of how chunk boundaries are chosen.

use crate::error::VaultError;
use crate::value_objects::{ChunkSize, ContentHash};

/// One plaintext chunk emitted by a chunker, before compression and
/// encryption.
#[derive(Debug, Clone)]
pub struct PlainChunk {
    /// Position within the source file, dense from 0.
    pub index: u32,
    /// SHA-256 over `data`.
    pub plain_hash: ContentHash,
    pub data: Vec<u8>,
}

impl PlainChunk {
    pub fn new(index: u32, data: Vec<u8>) -> Self {
        Self {
            index,
            plain_hash: ContentHash::of_bytes(&data),
            data,
        }
    }
}

/// Splits a byte stream into chunks.
pub trait ChunkingService: Send + Sync {
    /// The chunk size this chunker targets. Every emitted chunk except
    /// the last has exactly this size.
    fn chunk_size(&self) -> ChunkSize;

    /// Reads the next chunk from `reader`. Returns `Ok(None)` at end of
    /// stream. Never returns an empty chunk.
    fn next_chunk(
        &self,
        reader: &mut dyn std::io::Read,
        index: u32,
    ) -> Result<Option<PlainChunk>, VaultError>;
}
