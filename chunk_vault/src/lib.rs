// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Vault
//!
//! A content-addressed, encrypted, deduplicating vault with peer-to-peer
//! synchronization. A vault is a self-contained directory holding user
//! files as manifests that reference content-addressed chunks, a
//! deduplication index over those chunks, the vault configuration
//! including encryption material, and a transaction journal that makes
//! all structural mutations crash-safe.
//!
//! ## Layers
//!
//! - **Domain** (`chunk_vault_domain`): entities, value objects, error
//!   taxonomy, and the service traits this crate implements.
//! - **Infrastructure** ([`infrastructure`]): transaction journal, chunk
//!   store, dedup index and manager, GC monitor, crypto, manifest and
//!   config stores, and the sync protocol.
//! - **Application** ([`application`]): the [`application::Vault`]
//!   service orchestrating ingest, retrieve, delete, verification, and
//!   sync sessions.
//!
//! ## Vault Layout
//!
//! ```text
//! <vault>/
//!   vault.toml            vault configuration document
//!   .chunks/<hash>        one blob per stored chunk (hex storage hash)
//!   .manifests/<name>.json  one document per logical file
//!   .txn/<txn-id>/        transaction journals (new/, trash/, journal.json)
//!   .dedup_index.json     persistent dedup index
//!   .sync/                RSA sync keypair
//!   .logs/gc.log          GC monitor log (optional)
//! ```

pub mod application;
pub mod infrastructure;

pub use application::{Vault, VaultCreateOptions};
pub use chunk_vault_domain as domain;
