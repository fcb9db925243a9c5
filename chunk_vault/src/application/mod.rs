// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Application Layer
//!
//! Orchestration over the infrastructure: the [`Vault`] service ties
//! the journal, stores, dedup, and crypto together for local
//! operations, and drives sync sessions against remote peers.

pub mod services;

pub use services::reference_rebuild::RebuildReport;
pub use services::sync_service::SyncResult;
pub use services::vault_service::{Vault, VaultCreateOptions};
