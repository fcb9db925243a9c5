// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transaction Id Value Object
//!
//! Transaction ids name journal directories under `.txn/`. The format is
//! a UTC timestamp `YYYYMMDDTHHMMSSZ-<6-digit-micros>`, which makes
//! lexicographic ordering equal to chronological ordering, so a plain
//! directory listing of the journal root yields journals oldest-first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VaultError;

/// Identifier of one transaction journal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Creates a transaction id for the given instant.
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self(format!(
            "{}-{:06}",
            instant.format("%Y%m%dT%H%M%SZ"),
            instant.timestamp_subsec_micros() % 1_000_000
        ))
    }

    /// Creates a transaction id for the current instant.
    pub fn generate() -> Self {
        Self::at(Utc::now())
    }

    /// Validates and wraps an existing id, e.g. read back from a journal
    /// directory name during recovery.
    pub fn parse(value: impl Into<String>) -> Result<Self, VaultError> {
        let value = value.into();
        let bytes = value.as_bytes();
        // YYYYMMDDTHHMMSSZ-nnnnnn
        let valid = bytes.len() == 23
            && bytes[8] == b'T'
            && bytes[15] == b'Z'
            && bytes[16] == b'-'
            && bytes[..8].iter().all(u8::is_ascii_digit)
            && bytes[9..15].iter().all(u8::is_ascii_digit)
            && bytes[17..].iter().all(u8::is_ascii_digit);
        if !valid {
            return Err(VaultError::TxnCorrupt(format!(
                "malformed transaction id: {:?}",
                value
            )));
        }
        Ok(Self(value))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format() {
        let instant = Utc.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap();
        let id = TransactionId::at(instant);
        assert_eq!(id.as_str(), "20250314T150926Z-000000");
    }

    #[test]
    fn test_lexicographic_is_chronological() {
        let earlier = TransactionId::at(Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap());
        let later = TransactionId::at(Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 6).unwrap());
        assert!(earlier < later);
        assert!(earlier.as_str() < later.as_str());
    }

    #[test]
    fn test_parse_round_trip() {
        let id = TransactionId::generate();
        let parsed = TransactionId::parse(id.as_str()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(TransactionId::parse("").is_err());
        assert!(TransactionId::parse("20250314T150926Z").is_err());
        assert!(TransactionId::parse("20250314X150926Z-000000").is_err());
        assert!(TransactionId::parse("20250314T150926Z-00000x").is_err());
    }
}
