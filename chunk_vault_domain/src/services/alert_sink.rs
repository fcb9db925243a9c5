// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Alert Sink
//!
//! Capability seam for GC-monitor alerts. The core formats the alert;
//! delivery (webhook POST, desktop notification, ...) is wired in by the
//! host application. Delivery failures are warnings, never fatal.

use serde::Serialize;

/// One alert raised by the GC monitor.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub vault_name: String,
    /// Unreferenced chunks remaining after the triggering GC pass.
    pub unreferenced_chunks: u64,
    pub threshold: u64,
    pub message: String,
}

/// Delivers alerts to some external destination.
pub trait AlertSink: Send + Sync {
    /// Delivers one alert. Errors are reported as strings so delivery
    /// concerns stay out of the domain error taxonomy.
    fn deliver(&self, alert: &Alert) -> Result<(), String>;
}
