// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Trusted Peer Entity
//!
//! A peer admitted to the trust store: a peer id pinned to an RSA public
//! key and its fingerprint. Uniqueness holds on both the peer id and the
//! fingerprint; re-adding either is a no-op at the trust-store level.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::Fingerprint;

/// One peer the vault trusts for synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedPeer {
    /// Stable peer identifier exchanged during key exchange.
    pub peer_id: String,

    /// Human-readable name, self-reported by the peer.
    #[serde(default)]
    pub display_name: String,

    /// The peer's public key, PEM-encoded (PKIX).
    pub public_key: String,

    /// base64(SHA-256(DER of the PKIX public key)).
    pub fingerprint: Fingerprint,

    pub trusted_since: DateTime<Utc>,
}

impl TrustedPeer {
    pub fn new(
        peer_id: impl Into<String>,
        display_name: impl Into<String>,
        public_key: impl Into<String>,
        fingerprint: Fingerprint,
    ) -> Self {
        Self {
            peer_id: peer_id.into(),
            display_name: display_name.into(),
            public_key: public_key.into(),
            fingerprint,
            trusted_since: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction() {
        let fp = Fingerprint::of_public_key_der(b"der-bytes");
        let peer = TrustedPeer::new("peer-1", "laptop", "-----BEGIN PUBLIC KEY-----", fp.clone());
        assert_eq!(peer.peer_id, "peer-1");
        assert_eq!(peer.fingerprint, fp);
    }

    #[test]
    fn test_serde_round_trip() {
        let peer = TrustedPeer::new(
            "peer-2",
            "",
            "-----BEGIN PUBLIC KEY-----\n...\n-----END PUBLIC KEY-----\n",
            Fingerprint::of_public_key_der(b"other"),
        );
        let json = serde_json::to_string(&peer).unwrap();
        let back: TrustedPeer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, peer);
    }
}
