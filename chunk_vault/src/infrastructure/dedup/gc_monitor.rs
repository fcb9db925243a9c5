// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # GC Monitor
//!
//! Single-writer background loop over the dedup index. On each tick it
//! reads the index statistics; when the unreferenced-chunk count crosses
//! the configured threshold it runs a GC pass and flushes the index, and
//! when the count remaining afterwards still crosses the alert threshold
//! it raises an alert through the configured [`AlertSink`].
//!
//! Cancellation is cooperative: the loop selects on its token and exits
//! within one tick of a stop request. The monitor is per-vault state the
//! application owns at whatever scope it likes; there is no process-wide
//! singleton.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use chunk_vault_domain::entities::vault_config::AutoGcSettings;
use chunk_vault_domain::services::{Alert, AlertSink};

use crate::infrastructure::runtime::CancellationToken;

use super::index::DedupIndex;

/// Alert sink that only logs; the default when no webhook delivery is
/// wired in by the host application.
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn deliver(&self, alert: &Alert) -> Result<(), String> {
        warn!(
            vault = %alert.vault_name,
            unreferenced = alert.unreferenced_chunks,
            threshold = alert.threshold,
            "{}",
            alert.message
        );
        Ok(())
    }
}

/// Handle to a running GC monitor task.
pub struct GcMonitor {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl GcMonitor {
    /// Spawns the monitor loop for a vault. Returns immediately; the
    /// loop runs until [`GcMonitor::stop`] or token cancellation.
    pub fn spawn(
        vault_name: String,
        vault_root: PathBuf,
        index: Arc<DedupIndex>,
        settings: AutoGcSettings,
        alert_sink: Arc<dyn AlertSink>,
    ) -> Self {
        let token = CancellationToken::new();
        let loop_token = token.clone();
        let handle = tokio::spawn(async move {
            run_monitor(vault_name, vault_root, index, settings, alert_sink, loop_token).await;
        });
        Self { token, handle }
    }

    /// The monitor's cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Requests a stop and waits for the loop to exit.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(err) = self.handle.await {
            warn!(error = %err, "gc monitor task ended abnormally");
        }
    }
}

async fn run_monitor(
    vault_name: String,
    vault_root: PathBuf,
    index: Arc<DedupIndex>,
    settings: AutoGcSettings,
    alert_sink: Arc<dyn AlertSink>,
    token: CancellationToken,
) {
    let tick = Duration::from_secs(settings.check_interval_secs.max(1));
    let mut interval = tokio::time::interval(tick);
    info!(vault = %vault_name, interval_secs = tick.as_secs(), "gc monitor started");

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => {}
        }
        if token.is_cancelled() {
            break;
        }

        let stats = index.stats();
        debug!(
            vault = %vault_name,
            unreferenced = stats.unreferenced_chunks,
            "gc monitor tick"
        );

        if stats.unreferenced_chunks >= settings.auto_gc_threshold {
            let removed = match index.gc() {
                Ok(removed) => removed,
                Err(err) => {
                    warn!(vault = %vault_name, error = %err, "automatic gc failed");
                    continue;
                }
            };
            if let Err(err) = index.flush() {
                warn!(vault = %vault_name, error = %err, "index flush after gc failed");
            }
            log_line(
                &vault_root,
                &settings,
                &format!(
                    "auto gc removed {} chunks ({} were unreferenced)",
                    removed, stats.unreferenced_chunks
                ),
            );

            let after = index.stats();
            if after.unreferenced_chunks >= settings.alert_threshold
                && settings.alert_webhook.is_some()
            {
                let alert = Alert {
                    vault_name: vault_name.clone(),
                    unreferenced_chunks: after.unreferenced_chunks,
                    threshold: settings.alert_threshold,
                    message: format!(
                        "{} unreferenced chunks remain after gc (alert threshold {})",
                        after.unreferenced_chunks, settings.alert_threshold
                    ),
                };
                // Delivery failures are warnings; the monitor never stops
                // over an unreachable sink.
                if let Err(err) = alert_sink.deliver(&alert) {
                    warn!(vault = %vault_name, error = %err, "alert delivery failed");
                }
            }
        }
    }
    info!(vault = %vault_name, "gc monitor stopped");
}

fn log_line(vault_root: &Path, settings: &AutoGcSettings, message: &str) {
    if !settings.enable_logging {
        return;
    }
    let Some(log_file) = &settings.log_file else {
        return;
    };
    let path = {
        let candidate = Path::new(log_file);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            vault_root.join(candidate)
        }
    };
    if let Some(parent) = path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            warn!(path = %parent.display(), error = %err, "cannot create gc log directory");
            return;
        }
    }
    let line = format!("{} {}\n", Utc::now().to_rfc3339(), message);
    let result = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .and_then(|mut file| std::io::Write::write_all(&mut file, line.as_bytes()));
    if let Err(err) = result {
        warn!(path = %path.display(), error = %err, "cannot append to gc log");
    }
}
