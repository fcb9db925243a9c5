// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Sync Client
//!
//! Outbound side of the four sync protocols. Each call opens one
//! logical stream on the peer connection, performs a single
//! request/response exchange under the framing deadlines, and maps
//! remote error strings onto the domain error taxonomy.
//!
//! The manifest fetch retries exactly once with the legacy protocol id
//! when the current one fails with a protocol error; no other RPC is
//! retried.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, info, warn};

use chunk_vault_domain::{FileManifest, TrustedPeer, VaultError};

use crate::infrastructure::crypto::rsa_envelope::decrypt_envelope;
use crate::infrastructure::crypto::rsa_keys::{
    fingerprint_of, parse_public_key_pem, verify_challenge_signature, SyncKeys,
};
use crate::infrastructure::sync::framing::{read_frame, write_frame};
use crate::infrastructure::sync::messages::*;
use crate::infrastructure::sync::transport::PeerConnection;
use crate::infrastructure::sync::trust::TrustStore;

/// One fetched chunk body.
#[derive(Debug)]
pub struct FetchedChunk {
    pub body: Vec<u8>,
    /// Whether the body arrived wrapped in our RSA envelope.
    pub was_enveloped: bool,
}

/// Outbound protocol client for one vault.
pub struct SyncClient {
    vault_id: String,
    vault_name: String,
    keys: Option<SyncKeys>,
}

impl SyncClient {
    pub fn new(vault_id: String, vault_name: String, keys: Option<SyncKeys>) -> Self {
        Self {
            vault_id,
            vault_name,
            keys,
        }
    }

    pub fn vault_id(&self) -> &str {
        &self.vault_id
    }

    /// Fetches the peer's full manifest listing, falling back from
    /// `manifest/1.0.0` to `manifest/0.9.0` on a protocol failure.
    pub async fn fetch_manifests(
        &self,
        conn: &dyn PeerConnection,
    ) -> Result<Vec<FileManifest>, VaultError> {
        match self.fetch_manifests_with(conn, MANIFEST_PROTOCOL).await {
            Ok(files) => Ok(files),
            Err(VaultError::ProtocolError(reason)) => {
                warn!(peer = %conn.peer_address(), %reason, "manifest protocol failed, retrying with legacy id");
                self.fetch_manifests_with(conn, MANIFEST_PROTOCOL_LEGACY).await
            }
            Err(err) => Err(err),
        }
    }

    async fn fetch_manifests_with(
        &self,
        conn: &dyn PeerConnection,
        protocol_id: &str,
    ) -> Result<Vec<FileManifest>, VaultError> {
        let mut stream = conn.open_stream(protocol_id).await?;
        write_frame(
            &mut *stream,
            &ManifestRequest {
                peer_id: self.vault_id.clone(),
            },
        )
        .await?;
        let response: ManifestResponse = read_frame(&mut *stream).await?;
        if let Some(error) = response.error {
            if error == ERR_PEER_NOT_TRUSTED {
                return Err(VaultError::UntrustedPeer(conn.peer_address()));
            }
            return Err(VaultError::ProtocolError(format!(
                "manifest request refused: {}",
                error
            )));
        }
        debug!(peer = %conn.peer_address(), files = response.files.len(), "fetched manifest listing");
        Ok(response.files)
    }

    /// Fetches one chunk body, unwrapping the RSA envelope when the
    /// server applied one.
    pub async fn fetch_chunk(
        &self,
        conn: &dyn PeerConnection,
        plain_hash: &str,
        encrypted_hash: Option<&str>,
        is_encrypted: bool,
    ) -> Result<FetchedChunk, VaultError> {
        let mut stream = conn.open_stream(CHUNK_PROTOCOL).await?;
        write_frame(
            &mut *stream,
            &ChunkRequest {
                peer_id: self.vault_id.clone(),
                hash: plain_hash.to_string(),
                encrypted_hash: encrypted_hash.map(str::to_string),
                is_encrypted,
            },
        )
        .await?;
        let response: ChunkResponse = read_frame(&mut *stream).await?;
        if let Some(error) = response.error {
            if error == ERR_CHUNK_NOT_FOUND {
                return Err(VaultError::ChunkMissing(plain_hash.to_string()));
            }
            return Err(VaultError::ProtocolError(format!(
                "chunk request refused: {}",
                error
            )));
        }
        let data = response.data.ok_or_else(|| {
            VaultError::ProtocolError("chunk response carried neither data nor error".to_string())
        })?;
        let raw = BASE64
            .decode(data)
            .map_err(|e| VaultError::ProtocolError(format!("chunk body is not valid base64: {}", e)))?;

        if !response.encrypted {
            return Ok(FetchedChunk {
                body: raw,
                was_enveloped: false,
            });
        }
        let keys = self.keys.as_ref().ok_or_else(|| {
            VaultError::ProtocolError(
                "peer sent an enveloped chunk but this vault has no sync keypair".to_string(),
            )
        })?;
        let body = decrypt_envelope(&raw, keys.private())?;
        Ok(FetchedChunk {
            body,
            was_enveloped: true,
        })
    }

    /// Performs the key exchange and admits the responding peer to the
    /// trust cache. Returns the admitted peer record.
    pub async fn exchange_keys(
        &self,
        conn: &dyn PeerConnection,
        trust: &TrustStore,
    ) -> Result<TrustedPeer, VaultError> {
        let keys = self.keys.as_ref().ok_or_else(|| {
            VaultError::InvalidConfiguration("key exchange requires a sync keypair".to_string())
        })?;
        let mut stream = conn.open_stream(KEY_EXCHANGE_PROTOCOL).await?;
        write_frame(
            &mut *stream,
            &KeyExchangeRequest {
                peer_id: self.vault_id.clone(),
                name: self.vault_name.clone(),
                public_key: keys.public_key_pem()?,
            },
        )
        .await?;
        let response: KeyExchangeResponse = read_frame(&mut *stream).await?;
        if !response.accepted {
            let reason = response
                .error
                .unwrap_or_else(|| "key exchange rejected".to_string());
            return Err(VaultError::UntrustedPeer(format!(
                "{}: {}",
                conn.peer_address(),
                reason
            )));
        }

        let peer_key = parse_public_key_pem(&response.public_key)?;
        let fingerprint = fingerprint_of(&peer_key)?;
        let peer = TrustedPeer::new(
            response.peer_id.clone(),
            response.name.clone(),
            response.public_key.clone(),
            fingerprint.clone(),
        );
        trust.mark_trusted(peer.clone());
        info!(peer = %peer.peer_id, %fingerprint, "key exchange complete");
        Ok(peer)
    }

    /// Challenge/response authentication of the peer we just exchanged
    /// keys with. A signature mismatch is fatal for the session.
    pub async fn authenticate(
        &self,
        conn: &dyn PeerConnection,
        trust: &TrustStore,
        peer_id: &str,
    ) -> Result<(), VaultError> {
        let rng = SystemRandom::new();
        let mut challenge = [0u8; 32];
        rng.fill(&mut challenge)
            .map_err(|e| VaultError::internal_error(format!("challenge generation failed: {:?}", e)))?;

        let mut stream = conn.open_stream(AUTH_PROTOCOL).await?;
        write_frame(
            &mut *stream,
            &AuthRequest {
                peer_id: self.vault_id.clone(),
                vault_id: self.vault_id.clone(),
                challenge: BASE64.encode(challenge),
            },
        )
        .await?;
        let response: AuthResponse = read_frame(&mut *stream).await?;
        if let Some(error) = response.error {
            return Err(VaultError::ProtocolError(format!(
                "authentication refused: {}",
                error
            )));
        }
        let signature = BASE64
            .decode(&response.signature)
            .map_err(|e| VaultError::ProtocolError(format!("signature is not valid base64: {}", e)))?;

        let public = trust.public_key_of(peer_id)?.ok_or_else(|| {
            VaultError::UntrustedPeer(format!("no public key on file for {}", peer_id))
        })?;
        verify_challenge_signature(&public, &challenge, &signature).map_err(|_| {
            VaultError::UntrustedPeer(format!("{} failed challenge verification", peer_id))
        })?;
        debug!(peer = peer_id, "peer authenticated");
        Ok(())
    }
}
