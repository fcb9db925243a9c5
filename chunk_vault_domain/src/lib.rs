// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Vault Domain
//!
//! The vault domain represents the core business logic and rules of the
//! chunk vault system: a content-addressed, encrypted, deduplicating store
//! for file data with peer-to-peer synchronization. It implements
//! Domain-Driven Design (DDD) patterns and is completely independent of
//! external concerns like the filesystem layout, network transports, or
//! user interfaces.
//!
//! ## Module Structure
//!
//! - [`error`] - the `VaultError` taxonomy shared by every layer
//! - [`value_objects`] - immutable, self-validating values (`ContentHash`,
//!   `ChunkSize`, `ChunkRef`, `Fingerprint`, `TransactionId`)
//! - [`entities`] - identity-bearing domain objects (`FileManifest`,
//!   `ChunkIndexEntry`, `TrustedPeer`, `Journal`, `VaultConfig`)
//! - [`services`] - stateless domain service contracts implemented by the
//!   infrastructure layer (`EncryptionService`, `ChunkingService`,
//!   `CompressionService`, `AlertSink`, `PeerDiscovery`)
//!
//! ## Domain Concepts
//!
//! ### Content addressing
//!
//! Every chunk of file data is identified by the SHA-256 of its plaintext
//! bytes (the *plain hash*). The blob actually stored on disk may be an
//! encrypted transformation of those bytes, named by the SHA-256 of the
//! encrypted blob (the *storage hash*). Deduplication identity is always
//! the plain hash; storage identity is always the storage hash. For an
//! unencrypted vault the two coincide.
//!
//! ### Crash safety
//!
//! Every structural mutation of a vault flows through a transaction
//! journal. The [`entities::Journal`] entity models the journal record and
//! its state machine; the infrastructure layer owns staging, commit,
//! rollback, and recovery.
//!
//! ### Trust
//!
//! Peers are identified by their long-lived RSA public keys. A
//! [`entities::TrustedPeer`] pins a peer id to a key fingerprint; pairing
//! windows and the auto-trust policy live with the sync service.

pub mod entities;
pub mod error;
pub mod services;
pub mod value_objects;

// Re-export commonly used types for convenient access
// These exports provide a clean API surface for consumers of the domain layer
pub use entities::{
    ChunkIndexEntry, FileManifest, Journal, JournalEntry, JournalState, TrustedPeer, VaultConfig,
};
pub use error::VaultError;
pub use value_objects::{ChunkRef, ChunkSize, ContentHash, Fingerprint, TransactionId};
