// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! This module provides the hierarchical error system for the chunk vault
//! domain. It categorizes failures, provides actionable error messages, and
//! supports both automated error recovery and human-readable diagnostics.
//!
//! ## Error Taxonomy
//!
//! The error system organizes failures into five logical kinds:
//!
//! - **Configuration**: missing or invalid vault configuration. Fatal for
//!   the operation; surfaced verbatim.
//! - **Crypto**: wrong passphrase, malformed ciphertext, bad authentication
//!   tag, mis-sized nonce. Never retried; the key-check result is what
//!   distinguishes "wrong passphrase" from "corrupt ciphertext".
//! - **IO**: filesystem failures, surfaced with the offending path.
//! - **Protocol**: remote errors or malformed frames during sync.
//! - **Integrity**: hash mismatch on a stored or fetched chunk, or a
//!   reference rebuild finding missing chunks.
//!
//! Additional operational variants (`TxnConflict`, `Cancelled`, ...) map
//! one-to-one onto the error exit conditions callers observe.
//!
//! ## Error Handling Strategy
//!
//! Errors bubble to the nearest orchestrator (transaction, sync session,
//! GC monitor). A transaction commit failure triggers automatic rollback.
//! A sync session error aborts the session; chunks already promoted remain
//! valid content-addressed blobs regardless of the session outcome.

use thiserror::Error;

/// Domain-specific errors for the chunk vault system.
///
/// Each variant includes a descriptive message and is designed to provide
/// clear information about what went wrong and potentially how to fix it.
///
/// ## Design Principles
///
/// - **Specific**: each error type represents a specific failure mode
/// - **Actionable**: error messages provide enough context for debugging
/// - **Categorized**: errors are grouped by kind for systematic handling
/// - **Recoverable**: some errors indicate retry-able conditions
#[derive(Error, Debug, Clone)]
pub enum VaultError {
    #[error("Vault not found: {0}")]
    VaultNotFound(String),

    #[error("Vault corrupt: {0}")]
    VaultCorrupt(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Encryption error: {0}")]
    EncryptionError(String),

    #[error("Wrong passphrase")]
    WrongPassphrase,

    #[error("Integrity check failed: {0}")]
    IntegrityError(String),

    #[error("Chunk missing: {0}")]
    ChunkMissing(String),

    #[error("Invalid chunk: {0}")]
    InvalidChunk(String),

    #[error("Transaction conflict: {0}")]
    TxnConflict(String),

    #[error("Transaction journal corrupt: {0}")]
    TxnCorrupt(String),

    #[error("Compression error: {0}")]
    CompressionError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Untrusted peer: {0}")]
    UntrustedPeer(String),

    #[error("Peer not reachable: {0}")]
    PeerNotReachable(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl VaultError {
    /// Creates a new configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a new encryption error
    pub fn encryption_error(msg: impl Into<String>) -> Self {
        Self::EncryptionError(msg.into())
    }

    /// Creates a new integrity error
    pub fn integrity_error(msg: impl Into<String>) -> Self {
        Self::IntegrityError(msg.into())
    }

    /// Creates a new IO error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::IoError(msg.into())
    }

    /// Creates an IO error carrying the offending path
    pub fn io_error_at(path: impl AsRef<std::path::Path>, err: impl std::fmt::Display) -> Self {
        Self::IoError(format!("{}: {}", path.as_ref().display(), err))
    }

    /// Creates a new protocol error
    pub fn protocol_error(msg: impl Into<String>) -> Self {
        Self::ProtocolError(msg.into())
    }

    /// Creates a new internal error
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Creates a new cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Checks if the error is recoverable
    ///
    /// Recoverable errors indicate temporary conditions that callers may
    /// retry. Reads are retried once on transient IO errors; writes never
    /// are.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            VaultError::TimeoutError(_) | VaultError::IoError(_) | VaultError::PeerNotReachable(_)
        )
    }

    /// Checks if the error is a security-related error
    pub fn is_security_error(&self) -> bool {
        matches!(
            self,
            VaultError::WrongPassphrase
                | VaultError::EncryptionError(_)
                | VaultError::IntegrityError(_)
                | VaultError::UntrustedPeer(_)
        )
    }

    /// Gets the error category
    pub fn category(&self) -> &'static str {
        match self {
            VaultError::VaultNotFound(_) => "configuration",
            VaultError::VaultCorrupt(_) => "configuration",
            VaultError::InvalidConfiguration(_) => "configuration",
            VaultError::EncryptionError(_) => "crypto",
            VaultError::WrongPassphrase => "crypto",
            VaultError::IntegrityError(_) => "integrity",
            VaultError::ChunkMissing(_) => "integrity",
            VaultError::InvalidChunk(_) => "data",
            VaultError::TxnConflict(_) => "transaction",
            VaultError::TxnCorrupt(_) => "transaction",
            VaultError::CompressionError(_) => "compression",
            VaultError::IoError(_) => "io",
            VaultError::SerializationError(_) => "serialization",
            VaultError::ValidationError(_) => "validation",
            VaultError::ProtocolError(_) => "protocol",
            VaultError::UntrustedPeer(_) => "protocol",
            VaultError::PeerNotReachable(_) => "protocol",
            VaultError::TimeoutError(_) => "timeout",
            VaultError::Cancelled(_) => "cancellation",
            VaultError::InternalError(_) => "internal",
        }
    }
}

// Implement conversion from standard library errors
impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        VaultError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        VaultError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(VaultError::WrongPassphrase.category(), "crypto");
        assert_eq!(VaultError::io_error("boom").category(), "io");
        assert_eq!(VaultError::TxnConflict("t".into()).category(), "transaction");
        assert_eq!(VaultError::UntrustedPeer("p".into()).category(), "protocol");
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(VaultError::TimeoutError("slow".into()).is_recoverable());
        assert!(VaultError::PeerNotReachable("10.0.0.1".into()).is_recoverable());
        assert!(!VaultError::WrongPassphrase.is_recoverable());
        assert!(!VaultError::IntegrityError("hash".into()).is_recoverable());
    }

    #[test]
    fn test_io_error_carries_path() {
        let err = VaultError::io_error_at("/vault/.chunks/abc", "permission denied");
        assert!(err.to_string().contains("/vault/.chunks/abc"));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: VaultError = io.into();
        assert_eq!(err.category(), "io");
    }
}
