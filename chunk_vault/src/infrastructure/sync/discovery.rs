// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Discovered-Peer Queue
//!
//! Bounded queue between discovery transports (external collaborators
//! implementing the domain `PeerDiscovery` trait) and the sync layer.
//! Producers block when the queue is full and abort cooperatively on
//! cancellation; consumers block on dequeue and unblock when the queue
//! closes.

use tokio::sync::mpsc;
use tracing::debug;

use chunk_vault_domain::services::DiscoveredPeer;
use chunk_vault_domain::VaultError;

use crate::infrastructure::runtime::CancellationToken;

/// Creates a bounded discovered-peer queue.
pub fn peer_queue(capacity: usize) -> (PeerProducer, PeerConsumer) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (PeerProducer { tx }, PeerConsumer { rx })
}

/// Producer half, held by discovery transports.
#[derive(Clone)]
pub struct PeerProducer {
    tx: mpsc::Sender<DiscoveredPeer>,
}

impl PeerProducer {
    /// Publishes one peer, blocking while the queue is full. Returns a
    /// `Cancelled` error when the token fires first and a protocol
    /// error when the queue is closed.
    pub async fn publish(
        &self,
        peer: DiscoveredPeer,
        token: &CancellationToken,
    ) -> Result<(), VaultError> {
        tokio::select! {
            _ = token.cancelled() => Err(VaultError::cancelled("peer discovery".to_string())),
            sent = self.tx.send(peer) => sent.map_err(|_| {
                VaultError::ProtocolError("discovered-peer queue is closed".to_string())
            }),
        }
    }
}

/// Consumer half, held by the sync layer.
pub struct PeerConsumer {
    rx: mpsc::Receiver<DiscoveredPeer>,
}

impl PeerConsumer {
    /// Dequeues the next peer; `None` once the queue is closed and
    /// drained.
    pub async fn next(&mut self) -> Option<DiscoveredPeer> {
        let peer = self.rx.recv().await;
        if let Some(peer) = &peer {
            debug!(peer = %peer.peer_id, address = %peer.address, "peer dequeued");
        }
        peer
    }

    /// Closes the queue; producers fail fast afterwards.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn peer(n: u32) -> DiscoveredPeer {
        DiscoveredPeer {
            peer_id: format!("peer-{}", n),
            address: format!("10.0.0.{}:7071", n),
        }
    }

    #[tokio::test]
    async fn test_publish_and_consume() {
        let (producer, mut consumer) = peer_queue(4);
        let token = CancellationToken::new();
        producer.publish(peer(1), &token).await.unwrap();
        producer.publish(peer(2), &token).await.unwrap();
        assert_eq!(consumer.next().await.unwrap().peer_id, "peer-1");
        assert_eq!(consumer.next().await.unwrap().peer_id, "peer-2");
    }

    #[tokio::test]
    async fn test_consumer_unblocks_on_close() {
        let (producer, mut consumer) = peer_queue(4);
        drop(producer);
        assert!(consumer.next().await.is_none());
    }

    #[tokio::test]
    async fn test_producer_cancellation_while_full() {
        let (producer, mut consumer) = peer_queue(1);
        let token = CancellationToken::new();
        producer.publish(peer(1), &token).await.unwrap();

        let blocked = {
            let producer = producer.clone();
            let token = token.clone();
            tokio::spawn(async move { producer.publish(peer(2), &token).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        let result = blocked.await.unwrap();
        assert!(matches!(result, Err(VaultError::Cancelled(_))));

        // The queued peer is still deliverable.
        assert_eq!(consumer.next().await.unwrap().peer_id, "peer-1");
    }

    #[tokio::test]
    async fn test_publish_after_close_fails() {
        let (producer, mut consumer) = peer_queue(2);
        consumer.close();
        let token = CancellationToken::new();
        let result = producer.publish(peer(1), &token).await;
        assert!(matches!(result, Err(VaultError::ProtocolError(_))));
    }
}
