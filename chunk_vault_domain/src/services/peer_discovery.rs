// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Peer Discovery
//!
//! Capability seam for peer discovery transports (mDNS, DHT, static
//! lists). The core never depends on a particular transport: a discovery
//! implementation is started and stopped by the host application and
//! feeds discovered peers into a bounded queue the sync layer consumes.

/// A peer surfaced by a discovery transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPeer {
    pub peer_id: String,
    /// Dialable address, transport-specific (e.g. `host:port`).
    pub address: String,
}

/// Discovery transport contract.
pub trait PeerDiscovery: Send + Sync {
    /// Starts discovery. Implementations deliver peers until stopped.
    fn start(&self) -> Result<(), String>;

    /// Stops discovery and closes the peer feed.
    fn stop(&self);

    /// Snapshot of the peers discovered so far.
    fn discovered_peers(&self) -> Vec<DiscoveredPeer>;
}
