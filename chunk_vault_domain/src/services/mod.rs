// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Services
//!
//! Stateless domain service contracts. The traits defined here are the
//! seams between the domain and the infrastructure layer: concrete
//! implementations (RustCrypto ciphers, flate2/zstd codecs, the
//! fixed-size chunker, webhook alert delivery, discovery transports)
//! live outside the domain and are wired in at construction.

pub mod alert_sink;
pub mod chunking_service;
pub mod compression_service;
pub mod encryption_service;
pub mod peer_discovery;
pub mod progress_reporter;

pub use alert_sink::{Alert, AlertSink};
pub use chunking_service::{ChunkingService, PlainChunk};
pub use compression_service::CompressionService;
pub use encryption_service::{EncryptionAlgorithm, EncryptionService, KeyMaterial};
pub use peer_discovery::{DiscoveredPeer, PeerDiscovery};
pub use progress_reporter::{NullProgressReporter, ProgressReporter};
