// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Wire Messages
//!
//! Serde types for the four sync protocols. Responses carry an optional
//! `error` string instead of a transport-level failure so the remote
//! reason reaches the caller verbatim; binary payloads (chunk bodies,
//! challenges, signatures) travel base64-encoded inside the JSON frames.

use serde::{Deserialize, Serialize};

use chunk_vault_domain::FileManifest;

/// Manifest listing protocol.
pub const MANIFEST_PROTOCOL: &str = "manifest/1.0.0";

/// Read-only fallback manifest protocol accepted from older peers.
pub const MANIFEST_PROTOCOL_LEGACY: &str = "manifest/0.9.0";

/// Chunk fetch protocol.
pub const CHUNK_PROTOCOL: &str = "chunk/1.0.0";

/// Key exchange protocol.
pub const KEY_EXCHANGE_PROTOCOL: &str = "key-exchange/1.0.0";

/// Challenge/response authentication protocol.
pub const AUTH_PROTOCOL: &str = "auth/1.0.0";

/// Server reply when an untrusted peer asks for manifests.
pub const ERR_PEER_NOT_TRUSTED: &str = "Unauthorized: Peer not trusted";

/// Server reply when a requested chunk is absent under both hashes.
pub const ERR_CHUNK_NOT_FOUND: &str = "Chunk not found";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestRequest {
    /// Stable id of the requesting peer.
    pub peer_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestResponse {
    #[serde(default)]
    pub files: Vec<FileManifest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRequest {
    pub peer_id: String,
    /// Plain hash, the authoritative lookup key.
    pub hash: String,
    /// Storage hash to retry with when the plain-hash lookup misses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_hash: Option<String>,
    #[serde(default)]
    pub is_encrypted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkResponse {
    /// Base64 chunk body; absent on error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Whether `data` is wrapped in the requester's RSA envelope.
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyExchangeRequest {
    pub peer_id: String,
    #[serde(default)]
    pub name: String,
    /// PEM public key, PKCS#1 or PKIX form.
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyExchangeResponse {
    pub accepted: bool,
    #[serde(default)]
    pub peer_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    pub peer_id: String,
    pub vault_id: String,
    /// Base64 of 32 fresh random bytes.
    pub challenge: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Base64 PKCS#1 v1.5 signature over SHA-256(challenge).
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub vault_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
