// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cooperative Cancellation
//!
//! Lightweight clone-able cancellation token passed to every long
//! operation: sync sessions, RPC handlers, GC monitor ticks. Cancelling
//! the token aborts the operation at its next suspension point with a
//! typed `Cancelled` error; intermediate state is either rolled back (any
//! mutation inside an open transaction) or discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use chunk_vault_domain::VaultError;

/// Cancellation token for signaling cooperative shutdown.
#[derive(Clone, Default)]
pub struct CancellationToken {
    /// Shared cancellation flag
    cancelled: Arc<AtomicBool>,
    /// Notification for waiters
    notify: Arc<Notify>,
}

impl CancellationToken {
    /// Create a new, un-cancelled token
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Cancel this token and wake all waiters
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Check if cancelled (non-blocking)
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Wait for cancellation (async)
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
            if self.is_cancelled() {
                return;
            }
        }
    }

    /// Returns a typed error if the token is cancelled, for use at
    /// operation checkpoints.
    pub fn check(&self, operation: &str) -> Result<(), VaultError> {
        if self.is_cancelled() {
            Err(VaultError::cancelled(operation.to_string()))
        } else {
            Ok(())
        }
    }

    /// Runs a future, aborting with `Cancelled` when the token fires
    /// first.
    pub async fn guard<F, T>(&self, operation: &str, fut: F) -> Result<T, VaultError>
    where
        F: std::future::Future<Output = Result<T, VaultError>>,
    {
        tokio::select! {
            _ = self.cancelled() => Err(VaultError::cancelled(operation.to_string())),
            result = fut => result,
        }
    }
}
