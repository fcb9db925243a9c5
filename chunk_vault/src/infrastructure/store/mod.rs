// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Store
//!
//! Flat directory of content-addressed blobs under `<vault>/.chunks/`,
//! each named by the lowercase hex storage hash of its content. Writes
//! are idempotent: putting a blob that already exists is a no-op. When a
//! transaction is active, puts are restated as journal stages so a crash
//! never leaves a partially written blob at its final path.
//!
//! Deletion is not journaled: GC deletes are unconditional best-effort,
//! because an unreferenced chunk is equivalent to an absent chunk.

pub mod chunk_store;

pub use chunk_store::{ChunkStore, CHUNKS_DIR};
