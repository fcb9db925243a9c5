// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Trust Store and Pairing
//!
//! Three peer sets, all keyed by peer id:
//!
//! - **trusted**: fingerprint pinned, loaded from the vault config;
//! - **pending outgoing**: peers we want to pair with, expiring after
//!   the pair window;
//! - **pending incoming**: peers allowed to initiate a key exchange
//!   with us, expiring after the pair window.
//!
//! Expired pending entries are evicted on lookup. A successful key
//! exchange clears the corresponding pending entry. Admitting a peer
//! whose id or fingerprint is already trusted is a no-op, so re-pairing
//! never duplicates trust anchors. Persistence of newly trusted peers is
//! the caller's job: it is a config rewrite staged through the journal,
//! not an ad-hoc edit.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rsa::RsaPublicKey;
use tracing::{debug, info};

use chunk_vault_domain::{Fingerprint, TrustedPeer, VaultError};

use crate::infrastructure::crypto::rsa_keys::parse_public_key_pem;

/// Default window during which a pending pair stays valid.
pub const DEFAULT_PAIR_WINDOW: Duration = Duration::from_secs(5 * 60);

struct TrustInner {
    trusted: HashMap<String, TrustedPeer>,
    fingerprints: HashSet<Fingerprint>,
    pending_outgoing: HashMap<String, Instant>,
    pending_incoming: HashMap<String, Instant>,
}

/// In-memory trust cache plus pairing windows for one vault.
pub struct TrustStore {
    inner: Mutex<TrustInner>,
    auto_trust: bool,
    pair_window: Duration,
}

impl TrustStore {
    /// Builds the store from the configured trusted peers.
    pub fn new(trusted_peers: &[TrustedPeer], auto_trust: bool) -> Self {
        Self::with_pair_window(trusted_peers, auto_trust, DEFAULT_PAIR_WINDOW)
    }

    /// Builds the store with an explicit pair window (tests shrink it).
    pub fn with_pair_window(
        trusted_peers: &[TrustedPeer],
        auto_trust: bool,
        pair_window: Duration,
    ) -> Self {
        let trusted: HashMap<String, TrustedPeer> = trusted_peers
            .iter()
            .map(|peer| (peer.peer_id.clone(), peer.clone()))
            .collect();
        let fingerprints = trusted.values().map(|p| p.fingerprint.clone()).collect();
        Self {
            inner: Mutex::new(TrustInner {
                trusted,
                fingerprints,
                pending_outgoing: HashMap::new(),
                pending_incoming: HashMap::new(),
            }),
            auto_trust,
            pair_window,
        }
    }

    /// Whether every peer is trusted without pairing.
    pub fn auto_trust(&self) -> bool {
        self.auto_trust
    }

    pub fn is_trusted(&self, peer_id: &str) -> bool {
        self.auto_trust || self.inner.lock().trusted.contains_key(peer_id)
    }

    /// Snapshot of one trusted peer.
    pub fn get(&self, peer_id: &str) -> Option<TrustedPeer> {
        self.inner.lock().trusted.get(peer_id).cloned()
    }

    /// Parses the trusted peer's public key on demand.
    pub fn public_key_of(&self, peer_id: &str) -> Result<Option<RsaPublicKey>, VaultError> {
        match self.get(peer_id) {
            Some(peer) => parse_public_key_pem(&peer.public_key).map(Some),
            None => Ok(None),
        }
    }

    /// Policy check for an inbound key exchange.
    pub fn is_pairing_allowed(&self, peer_id: &str) -> bool {
        if self.auto_trust {
            return true;
        }
        let mut inner = self.inner.lock();
        if inner.trusted.contains_key(peer_id) {
            return true;
        }
        Self::check_pending(&mut inner.pending_incoming, peer_id)
    }

    /// Symmetric check against the outgoing set.
    pub fn is_outgoing_pair_requested(&self, peer_id: &str) -> bool {
        Self::check_pending(&mut self.inner.lock().pending_outgoing, peer_id)
    }

    fn check_pending(pending: &mut HashMap<String, Instant>, peer_id: &str) -> bool {
        match pending.get(peer_id) {
            Some(expiry) if *expiry > Instant::now() => true,
            Some(_) => {
                // Expired entries are evicted on lookup.
                pending.remove(peer_id);
                debug!(peer = peer_id, "pending pair expired");
                false
            }
            None => false,
        }
    }

    /// Opens an outgoing pair window towards `peer_id`.
    pub fn request_outgoing_pair(&self, peer_id: &str) {
        let expiry = Instant::now() + self.pair_window;
        self.inner
            .lock()
            .pending_outgoing
            .insert(peer_id.to_string(), expiry);
        debug!(peer = peer_id, "outgoing pair requested");
    }

    /// Allows `peer_id` to initiate a key exchange with us until the
    /// window closes.
    pub fn allow_incoming_pair(&self, peer_id: &str) {
        let expiry = Instant::now() + self.pair_window;
        self.inner
            .lock()
            .pending_incoming
            .insert(peer_id.to_string(), expiry);
        debug!(peer = peer_id, "incoming pair allowed");
    }

    /// Admits a peer to the trust cache, clearing its pending entries.
    ///
    /// Idempotent on both keys: a peer id or fingerprint that is already
    /// trusted leaves the store unchanged and returns `false`.
    pub fn mark_trusted(&self, peer: TrustedPeer) -> bool {
        let mut inner = self.inner.lock();
        inner.pending_outgoing.remove(&peer.peer_id);
        inner.pending_incoming.remove(&peer.peer_id);
        if inner.trusted.contains_key(&peer.peer_id) || inner.fingerprints.contains(&peer.fingerprint)
        {
            return false;
        }
        info!(peer = %peer.peer_id, fingerprint = %peer.fingerprint, "peer admitted to trust cache");
        inner.fingerprints.insert(peer.fingerprint.clone());
        inner.trusted.insert(peer.peer_id.clone(), peer);
        true
    }

    /// Snapshot of the trusted set for persistence into the config.
    pub fn trusted_peers(&self) -> Vec<TrustedPeer> {
        let mut peers: Vec<TrustedPeer> = self.inner.lock().trusted.values().cloned().collect();
        peers.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        peers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: &str, key_der: &[u8]) -> TrustedPeer {
        TrustedPeer::new(
            id,
            format!("{}-display", id),
            "-----BEGIN PUBLIC KEY-----\nstub\n-----END PUBLIC KEY-----\n",
            Fingerprint::of_public_key_der(key_der),
        )
    }

    #[test]
    fn test_configured_peers_are_trusted() {
        let store = TrustStore::new(&[peer("a", b"key-a")], false);
        assert!(store.is_trusted("a"));
        assert!(!store.is_trusted("b"));
    }

    #[test]
    fn test_auto_trust_allows_everyone() {
        let store = TrustStore::new(&[], true);
        assert!(store.is_trusted("anyone"));
        assert!(store.is_pairing_allowed("anyone"));
    }

    #[test]
    fn test_pairing_requires_window() {
        let store = TrustStore::new(&[], false);
        assert!(!store.is_pairing_allowed("newcomer"));
        store.allow_incoming_pair("newcomer");
        assert!(store.is_pairing_allowed("newcomer"));
        // The window is per-peer.
        assert!(!store.is_pairing_allowed("other"));
    }

    #[test]
    fn test_expired_window_is_evicted() {
        let store = TrustStore::with_pair_window(&[], false, Duration::from_millis(1));
        store.allow_incoming_pair("slow");
        store.request_outgoing_pair("slow");
        std::thread::sleep(Duration::from_millis(5));
        assert!(!store.is_pairing_allowed("slow"));
        assert!(!store.is_outgoing_pair_requested("slow"));
    }

    #[test]
    fn test_mark_trusted_clears_pending() {
        let store = TrustStore::new(&[], false);
        store.request_outgoing_pair("x");
        assert!(store.is_outgoing_pair_requested("x"));
        assert!(store.mark_trusted(peer("x", b"key-x")));
        assert!(!store.is_outgoing_pair_requested("x"));
        assert!(store.is_trusted("x"));
    }

    #[test]
    fn test_idempotent_trust_by_id() {
        let store = TrustStore::new(&[], false);
        assert!(store.mark_trusted(peer("dup", b"key-1")));
        assert!(!store.mark_trusted(peer("dup", b"key-2")));
        assert_eq!(store.trusted_peers().len(), 1);
    }

    #[test]
    fn test_idempotent_trust_by_fingerprint() {
        let store = TrustStore::new(&[], false);
        assert!(store.mark_trusted(peer("first", b"same-key")));
        assert!(!store.mark_trusted(peer("second", b"same-key")));
        let peers = store.trusted_peers();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].peer_id, "first");
    }

    #[test]
    fn test_trusted_peers_snapshot_sorted() {
        let store = TrustStore::new(&[], false);
        store.mark_trusted(peer("zeta", b"z"));
        store.mark_trusted(peer("alpha", b"a"));
        let ids: Vec<String> = store.trusted_peers().into_iter().map(|p| p.peer_id).collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);
    }
}
