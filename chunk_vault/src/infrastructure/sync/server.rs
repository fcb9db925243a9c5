// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Sync Server
//!
//! Inbound handlers for the four sync protocols. One handler invocation
//! serves one logical stream; the transport layer has already consumed
//! the protocol-id preamble.
//!
//! Policy decisions live here:
//!
//! - manifests are refused to untrusted callers when the vault uses RSA
//!   sync and auto-trust is off;
//! - chunk lookups treat the plain hash as authoritative and only fall
//!   back to the storage hash on a miss;
//! - chunk bodies are wrapped in the caller's RSA envelope when the
//!   caller is trusted and its public key is known;
//! - key exchange admits unknown peers only inside an incoming pair
//!   window (or under auto-trust).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::{debug, info, warn};

use chunk_vault_domain::{ContentHash, TrustedPeer, VaultError};

use crate::infrastructure::crypto::rsa_envelope::encrypt_envelope;
use crate::infrastructure::crypto::rsa_keys::{fingerprint_of, parse_public_key_pem, SyncKeys};
use crate::infrastructure::manifest::ManifestStore;
use crate::infrastructure::store::ChunkStore;
use crate::infrastructure::sync::framing::{
    decode_frame_body, read_frame, read_pem_block, write_frame, PEM_MARKER,
};
use crate::infrastructure::sync::messages::*;
use crate::infrastructure::sync::transport::SyncStream;
use crate::infrastructure::sync::trust::TrustStore;

use std::sync::Arc;

use tokio::io::AsyncReadExt;

/// Serves the sync protocols for one vault.
pub struct SyncServer {
    vault_id: String,
    vault_name: String,
    manifest_store: ManifestStore,
    chunk_store: ChunkStore,
    trust: Arc<TrustStore>,
    keys: Option<SyncKeys>,
    uses_rsa: bool,
}

impl SyncServer {
    pub fn new(
        vault_id: String,
        vault_name: String,
        manifest_store: ManifestStore,
        chunk_store: ChunkStore,
        trust: Arc<TrustStore>,
        keys: Option<SyncKeys>,
        uses_rsa: bool,
    ) -> Self {
        Self {
            vault_id,
            vault_name,
            manifest_store,
            chunk_store,
            trust,
            keys,
            uses_rsa,
        }
    }

    pub fn trust(&self) -> &Arc<TrustStore> {
        &self.trust
    }

    /// Dispatches one logical stream by protocol id.
    pub async fn handle(
        &self,
        protocol_id: &str,
        stream: &mut (dyn SyncStream + '_),
    ) -> Result<(), VaultError> {
        debug!(protocol = protocol_id, "serving sync stream");
        match protocol_id {
            MANIFEST_PROTOCOL | MANIFEST_PROTOCOL_LEGACY => self.handle_manifest(stream).await,
            CHUNK_PROTOCOL => self.handle_chunk(stream).await,
            KEY_EXCHANGE_PROTOCOL => self.handle_key_exchange(stream).await,
            AUTH_PROTOCOL => self.handle_auth(stream).await,
            other => Err(VaultError::ProtocolError(format!(
                "unknown protocol id {:?}",
                other
            ))),
        }
    }

    async fn handle_manifest(&self, stream: &mut (dyn SyncStream + '_)) -> Result<(), VaultError> {
        let request: ManifestRequest = read_frame(stream).await?;
        if self.uses_rsa && !self.trust.is_trusted(&request.peer_id) {
            warn!(peer = %request.peer_id, "refusing manifest request from untrusted peer");
            let response = ManifestResponse {
                files: Vec::new(),
                error: Some(ERR_PEER_NOT_TRUSTED.to_string()),
            };
            return write_frame(stream, &response).await;
        }
        let files = self.manifest_store.list()?;
        debug!(peer = %request.peer_id, files = files.len(), "serving manifest listing");
        write_frame(stream, &ManifestResponse { files, error: None }).await
    }

    async fn handle_chunk(&self, stream: &mut (dyn SyncStream + '_)) -> Result<(), VaultError> {
        let request: ChunkRequest = read_frame(stream).await?;
        let body = self.resolve_chunk(&request);
        let response = match body {
            None => ChunkResponse {
                data: None,
                encrypted: false,
                error: Some(ERR_CHUNK_NOT_FOUND.to_string()),
            },
            Some(body) => match self.envelope_for(&request.peer_id)? {
                Some(public) => ChunkResponse {
                    data: Some(BASE64.encode(encrypt_envelope(&body, &public)?)),
                    encrypted: true,
                    error: None,
                },
                None => ChunkResponse {
                    data: Some(BASE64.encode(&body)),
                    encrypted: false,
                    error: None,
                },
            },
        };
        write_frame(stream, &response).await
    }

    /// Plain hash first; the storage hash only on a miss. When both
    /// would resolve, the plain hash wins.
    fn resolve_chunk(&self, request: &ChunkRequest) -> Option<Vec<u8>> {
        if let Ok(hash) = ContentHash::parse(request.hash.clone()) {
            if let Ok(body) = self.chunk_store.get(&hash) {
                return Some(body);
            }
        }
        if let Some(encrypted_hash) = &request.encrypted_hash {
            if let Ok(hash) = ContentHash::parse(encrypted_hash.clone()) {
                if let Ok(body) = self.chunk_store.get(&hash) {
                    return Some(body);
                }
            }
        }
        None
    }

    /// The caller's public key, when the caller is trusted and its key
    /// is on file.
    fn envelope_for(&self, peer_id: &str) -> Result<Option<rsa::RsaPublicKey>, VaultError> {
        if !self.trust.is_trusted(peer_id) {
            return Ok(None);
        }
        match self.trust.public_key_of(peer_id) {
            Ok(key) => Ok(key),
            Err(err) => {
                // A damaged stored key falls back to a raw body rather
                // than failing the fetch.
                warn!(peer = peer_id, error = %err, "cannot parse stored peer key");
                Ok(None)
            }
        }
    }

    async fn handle_key_exchange(
        &self,
        stream: &mut (dyn SyncStream + '_),
    ) -> Result<(), VaultError> {
        // Key exchange accepts either a JSON frame or a bare PEM block.
        // PEM blocks open with `----`, which as a length prefix would
        // exceed the frame limit, so four bytes decide the framing.
        let mut prefix = [0u8; 4];
        tokio::time::timeout(
            crate::infrastructure::sync::framing::IO_DEADLINE,
            stream.read_exact(&mut prefix),
        )
        .await
        .map_err(|_| VaultError::TimeoutError("key exchange read deadline".to_string()))?
        .map_err(|e| VaultError::ProtocolError(format!("key exchange preamble: {}", e)))?;

        let request = if prefix == PEM_MARKER {
            let public = read_pem_block(stream, &prefix, |text| {
                text.contains("-----END").then(|| parse_public_key_pem(text).ok()).flatten()
            })
            .await?;
            // A bare PEM carries no peer id; the key is the identity.
            let fingerprint = fingerprint_of(&public)?;
            KeyExchangeRequest {
                peer_id: fingerprint.to_string(),
                name: String::new(),
                public_key: encode_public_key_pem(&public)?,
            }
        } else {
            decode_frame_body::<_, KeyExchangeRequest>(stream, prefix).await?
        };

        let Some(keys) = &self.keys else {
            let response = KeyExchangeResponse {
                accepted: false,
                error: Some("vault has no sync keypair".to_string()),
                ..empty_key_exchange_response()
            };
            return write_frame(stream, &response).await;
        };

        if !self.trust.is_pairing_allowed(&request.peer_id) {
            warn!(peer = %request.peer_id, "rejecting key exchange outside a pair window");
            let response = KeyExchangeResponse {
                accepted: false,
                error: Some(ERR_PEER_NOT_TRUSTED.to_string()),
                ..empty_key_exchange_response()
            };
            return write_frame(stream, &response).await;
        }

        let peer_key = parse_public_key_pem(&request.public_key)?;
        let peer_fingerprint = fingerprint_of(&peer_key)?;
        let admitted = self.trust.mark_trusted(TrustedPeer::new(
            request.peer_id.clone(),
            request.name.clone(),
            request.public_key.clone(),
            peer_fingerprint.clone(),
        ));
        if admitted {
            info!(peer = %request.peer_id, fingerprint = %peer_fingerprint, "key exchange accepted");
        }

        let response = KeyExchangeResponse {
            accepted: true,
            peer_id: self.vault_id.clone(),
            name: self.vault_name.clone(),
            public_key: keys.public_key_pem()?,
            fingerprint: keys.fingerprint()?.to_string(),
            error: None,
        };
        write_frame(stream, &response).await
    }

    async fn handle_auth(&self, stream: &mut (dyn SyncStream + '_)) -> Result<(), VaultError> {
        let request: AuthRequest = read_frame(stream).await?;
        let Some(keys) = &self.keys else {
            let response = AuthResponse {
                signature: String::new(),
                vault_id: self.vault_id.clone(),
                name: self.vault_name.clone(),
                error: Some("vault has no sync keypair".to_string()),
            };
            return write_frame(stream, &response).await;
        };
        let challenge = BASE64
            .decode(&request.challenge)
            .map_err(|e| VaultError::ProtocolError(format!("malformed challenge: {}", e)))?;
        let signature = keys.sign_challenge(&challenge)?;
        debug!(peer = %request.peer_id, "answered auth challenge");
        let response = AuthResponse {
            signature: BASE64.encode(signature),
            vault_id: self.vault_id.clone(),
            name: self.vault_name.clone(),
            error: None,
        };
        write_frame(stream, &response).await
    }
}

fn empty_key_exchange_response() -> KeyExchangeResponse {
    KeyExchangeResponse {
        accepted: false,
        peer_id: String::new(),
        name: String::new(),
        public_key: String::new(),
        fingerprint: String::new(),
        error: None,
    }
}

fn encode_public_key_pem(public: &rsa::RsaPublicKey) -> Result<String, VaultError> {
    use rsa::pkcs8::EncodePublicKey;
    public
        .to_public_key_pem(rsa::pkcs8::LineEnding::LF)
        .map_err(|e| VaultError::EncryptionError(format!("public key encoding failed: {}", e)))
}
