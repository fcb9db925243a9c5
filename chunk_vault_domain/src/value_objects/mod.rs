// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Value Objects
//!
//! Immutable, self-validating values used throughout the vault domain.
//! Value objects have no identity: two instances with the same attributes
//! are equal, and all validation happens at construction time.

pub mod chunk_ref;
pub mod chunk_size;
pub mod content_hash;
pub mod fingerprint;
pub mod transaction_id;

pub use chunk_ref::ChunkRef;
pub use chunk_size::ChunkSize;
pub use content_hash::ContentHash;
pub use fingerprint::Fingerprint;
pub use transaction_id::TransactionId;
