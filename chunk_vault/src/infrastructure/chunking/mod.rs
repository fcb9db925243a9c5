// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Fixed-Size Chunker
//!
//! The only chunking strategy in scope: slice the source stream into
//! chunks of exactly the configured size, with a smaller final chunk.

use std::io::Read;

use chunk_vault_domain::services::{ChunkingService, PlainChunk};
use chunk_vault_domain::{ChunkSize, VaultError};

/// Fixed-size chunking of a byte stream.
pub struct FixedSizeChunker {
    chunk_size: ChunkSize,
}

impl FixedSizeChunker {
    pub fn new(chunk_size: ChunkSize) -> Self {
        Self { chunk_size }
    }
}

impl ChunkingService for FixedSizeChunker {
    fn chunk_size(&self) -> ChunkSize {
        self.chunk_size
    }

    fn next_chunk(
        &self,
        reader: &mut dyn Read,
        index: u32,
    ) -> Result<Option<PlainChunk>, VaultError> {
        let target = self.chunk_size.bytes();
        let mut buffer = vec![0u8; target];
        let mut filled = 0usize;
        while filled < target {
            match reader.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(VaultError::io_error(err.to_string())),
            }
        }
        if filled == 0 {
            return Ok(None);
        }
        buffer.truncate(filled);
        Ok(Some(PlainChunk::new(index, buffer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn chunk_all(chunker: &FixedSizeChunker, data: &[u8]) -> Vec<PlainChunk> {
        let mut reader = Cursor::new(data.to_vec());
        let mut chunks = Vec::new();
        let mut index = 0;
        while let Some(chunk) = chunker.next_chunk(&mut reader, index).unwrap() {
            chunks.push(chunk);
            index += 1;
        }
        chunks
    }

    #[test]
    fn test_exact_multiple() {
        let chunker = FixedSizeChunker::new(ChunkSize::new(4).unwrap());
        let chunks = chunk_all(&chunker, b"abcdefgh");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].data, b"abcd");
        assert_eq!(chunks[1].data, b"efgh");
    }

    #[test]
    fn test_smaller_final_chunk() {
        let chunker = FixedSizeChunker::new(ChunkSize::new(4).unwrap());
        let chunks = chunk_all(&chunker, b"abcdefghij");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].data, b"ij");
    }

    #[test]
    fn test_empty_stream() {
        let chunker = FixedSizeChunker::new(ChunkSize::new(4).unwrap());
        assert!(chunk_all(&chunker, b"").is_empty());
    }

    #[test]
    fn test_indices_are_dense() {
        let chunker = FixedSizeChunker::new(ChunkSize::new(3).unwrap());
        let chunks = chunk_all(&chunker, b"0123456789");
        let indices: Vec<u32> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_hashes_match_content() {
        let chunker = FixedSizeChunker::new(ChunkSize::new(4).unwrap());
        let chunks = chunk_all(&chunker, b"abcdabcd");
        assert_eq!(chunks[0].plain_hash, chunks[1].plain_hash);
    }
}
