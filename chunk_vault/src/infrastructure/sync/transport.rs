// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Sync Transport
//!
//! The seam between the sync protocol and the bytes underneath it. A
//! [`PeerConnection`] opens one logical stream per RPC, identified by a
//! protocol id; the protocol layer never sees what carries the stream.
//!
//! Two implementations ship with the core:
//!
//! - [`TcpPeerConnection`] / [`TcpSyncListener`] - one TCP connection
//!   per logical stream, opened with a protocol-id preamble. Dialing is
//!   bounded by a 30-second connect deadline.
//! - [`InMemoryConnection`] - a duplex pipe wired straight into a
//!   [`SyncServer`], used by the integration tests and embeddings.
//!
//! Discovery transports (mDNS, DHT, libp2p hosts) are external
//! collaborators and never appear in the core.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, warn};

use chunk_vault_domain::VaultError;

use crate::infrastructure::runtime::CancellationToken;
use crate::infrastructure::sync::framing::{self, IO_DEADLINE};
use crate::infrastructure::sync::server::SyncServer;

/// Object-safe bidirectional byte stream.
pub trait SyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> SyncStream for T {}

/// Opens logical protocol streams to one peer.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Transport-specific peer address, for diagnostics.
    fn peer_address(&self) -> String;

    /// Opens a stream speaking `protocol_id`.
    async fn open_stream(&self, protocol_id: &str) -> Result<Box<dyn SyncStream>, VaultError>;
}

/// TCP connection factory: one connection per logical stream.
pub struct TcpPeerConnection {
    address: String,
}

impl TcpPeerConnection {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl PeerConnection for TcpPeerConnection {
    fn peer_address(&self) -> String {
        self.address.clone()
    }

    async fn open_stream(&self, protocol_id: &str) -> Result<Box<dyn SyncStream>, VaultError> {
        let connect = TcpStream::connect(&self.address);
        let mut stream = match tokio::time::timeout(IO_DEADLINE, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                return Err(VaultError::PeerNotReachable(format!(
                    "{}: {}",
                    self.address, err
                )))
            }
            Err(_) => {
                return Err(VaultError::PeerNotReachable(format!(
                    "{}: connect timed out",
                    self.address
                )))
            }
        };
        framing::write_protocol_id(&mut stream, protocol_id).await?;
        debug!(peer = %self.address, protocol = protocol_id, "opened sync stream");
        Ok(Box::new(stream))
    }
}

/// Accept loop serving inbound sync streams over TCP.
pub struct TcpSyncListener {
    listener: TcpListener,
    server: Arc<SyncServer>,
}

impl TcpSyncListener {
    /// Binds the listener.
    pub async fn bind(addr: impl ToSocketAddrs, server: Arc<SyncServer>) -> Result<Self, VaultError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| VaultError::io_error(format!("sync listener bind failed: {}", e)))?;
        Ok(Self { listener, server })
    }

    /// The bound local address.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, VaultError> {
        self.listener
            .local_addr()
            .map_err(|e| VaultError::io_error(e.to_string()))
    }

    /// Serves connections until the token is cancelled. Each connection
    /// carries exactly one protocol stream and is handled on its own
    /// task.
    pub async fn serve(self, token: CancellationToken) {
        loop {
            let (mut stream, remote) = tokio::select! {
                _ = token.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        warn!(error = %err, "sync accept failed");
                        continue;
                    }
                }
            };
            let server = self.server.clone();
            let conn_token = token.clone();
            tokio::spawn(async move {
                let result = conn_token
                    .guard("inbound sync stream", async {
                        let protocol_id = framing::read_protocol_id(&mut stream).await?;
                        server.handle(&protocol_id, &mut stream).await
                    })
                    .await;
                if let Err(err) = result {
                    warn!(peer = %remote, error = %err, "inbound sync stream failed");
                }
            });
        }
        debug!("sync listener stopped");
    }
}

/// In-memory connection wired straight into a server, for tests and
/// in-process embeddings.
pub struct InMemoryConnection {
    server: Arc<SyncServer>,
}

impl InMemoryConnection {
    pub fn new(server: Arc<SyncServer>) -> Self {
        Self { server }
    }
}

#[async_trait]
impl PeerConnection for InMemoryConnection {
    fn peer_address(&self) -> String {
        "in-memory".to_string()
    }

    async fn open_stream(&self, protocol_id: &str) -> Result<Box<dyn SyncStream>, VaultError> {
        let (client, mut serving) = tokio::io::duplex(framing::MAX_FRAME_SIZE.min(1 << 20));
        let server = self.server.clone();
        let protocol_id = protocol_id.to_string();
        tokio::spawn(async move {
            if let Err(err) = server.handle(&protocol_id, &mut serving).await {
                warn!(protocol = %protocol_id, error = %err, "in-memory sync stream failed");
            }
        });
        Ok(Box::new(client))
    }
}
