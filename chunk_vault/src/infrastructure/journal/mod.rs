// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transaction Journal
//!
//! Crash-safe staging and commit/rollback of vault file mutations. Every
//! structural change to a vault (chunk writes, manifest writes, config
//! rewrites, deletions) flows through a [`Transaction`]:
//!
//! ```text
//! <vault>/.txn/<txn-id>/
//!   new/      staged files, mirroring their final relative paths
//!   trash/    originals displaced by Replace/Delete at stage time
//!   journal.json
//! ```
//!
//! New content is written under `new/` and promoted into place with
//! atomic renames at commit. Originals targeted by Replace/Delete move
//! to `trash/` at stage time, making the stage itself atomic with
//! respect to the source location; trash copies are discarded on commit
//! and restored on rollback. [`recovery::recover`] resolves all journals
//! found on startup.

pub mod recovery;
pub mod transaction;

pub use recovery::{recover, RecoveryReport};
pub use transaction::{StagedWriter, Transaction};
