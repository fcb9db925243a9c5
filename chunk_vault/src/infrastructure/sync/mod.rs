// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Sync Protocol
//!
//! Peer-to-peer vault synchronization over a bidirectional stream
//! abstraction. Four protocols run on the stream layer, all length-
//! framed JSON with 30-second read and write deadlines:
//!
//! | Protocol id          | Purpose                                   |
//! |----------------------|-------------------------------------------|
//! | `manifest/1.0.0`     | full manifest listing (`0.9.0` read-only fallback) |
//! | `chunk/1.0.0`        | single chunk fetch, optional RSA envelope |
//! | `key-exchange/1.0.0` | public-key exchange and pairing           |
//! | `auth/1.0.0`         | challenge/response authentication         |
//!
//! The transport behind the streams is a seam ([`transport`]): TCP for
//! real deployments, an in-memory duplex for tests. Peer discovery
//! never appears here; discovered peers arrive through the bounded
//! queue in [`discovery`].

pub mod client;
pub mod discovery;
pub mod framing;
pub mod messages;
pub mod server;
pub mod transport;
pub mod trust;

pub use client::SyncClient;
pub use server::SyncServer;
pub use transport::{PeerConnection, SyncStream};
pub use trust::TrustStore;
