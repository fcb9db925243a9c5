// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Entities
//!
//! Identity-bearing domain objects. Entities can change state over time
//! while keeping their identity: a file manifest is identified by its
//! logical path, an index entry by its plain hash, a journal by its
//! transaction id, a trusted peer by its peer id.

pub mod chunk_index_entry;
pub mod file_manifest;
pub mod journal;
pub mod trusted_peer;
pub mod vault_config;

pub use chunk_index_entry::ChunkIndexEntry;
pub use file_manifest::FileManifest;
pub use journal::{Journal, JournalEntry, JournalState};
pub use trusted_peer::TrustedPeer;
pub use vault_config::{
    AutoGcSettings, ChunkingSettings, CompressionAlgorithm, DedupSettings, EncryptionKdf,
    EncryptionMode, EncryptionSettings, EncryptionType, RsaSettings, SyncSettings, VaultConfig,
    VaultIdentity,
};
