// /////////////////////////////////////////////////////////////////////////////
// Chunk Vault
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Vault Config Store
//!
//! Loads and saves the single `vault.toml` document. The initial write
//! at vault creation is a direct temp-file + rename (no journal exists
//! yet); every later rewrite (trusted-peer additions, setting changes)
//! is staged through an open transaction.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use tracing::debug;

use chunk_vault_domain::{VaultConfig, VaultError};

use crate::infrastructure::journal::Transaction;

/// Configuration document name, relative to the vault root.
pub const CONFIG_FILE: &str = "vault.toml";

/// Store for one vault's configuration document.
pub struct VaultConfigStore {
    path: PathBuf,
}

impl VaultConfigStore {
    pub fn new(vault_root: impl AsRef<Path>) -> Self {
        Self {
            path: vault_root.as_ref().join(CONFIG_FILE),
        }
    }

    /// Whether the vault configuration document exists.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Loads and validates the configuration.
    pub fn load(&self) -> Result<VaultConfig, VaultError> {
        if !self.exists() {
            return Err(VaultError::VaultNotFound(format!(
                "no {} at {}",
                CONFIG_FILE,
                self.path.display()
            )));
        }
        let doc = fs::read_to_string(&self.path).map_err(|e| VaultError::io_error_at(&self.path, e))?;
        let config: VaultConfig = toml::from_str(&doc)
            .map_err(|e| VaultError::VaultCorrupt(format!("{}: {}", self.path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the initial configuration during vault creation, with
    /// temp-file + rename. Refuses to clobber an existing vault.
    pub fn save_initial(&self, config: &VaultConfig) -> Result<(), VaultError> {
        if self.exists() {
            return Err(VaultError::InvalidConfiguration(format!(
                "{} already exists",
                self.path.display()
            )));
        }
        config.validate()?;
        let doc = render(config)?;
        let tmp = self.path.with_extension("toml.tmp");
        let mut file = fs::File::create(&tmp).map_err(|e| VaultError::io_error_at(&tmp, e))?;
        file.write_all(doc.as_bytes())
            .map_err(|e| VaultError::io_error_at(&tmp, e))?;
        file.sync_all().map_err(|e| VaultError::io_error_at(&tmp, e))?;
        drop(file);
        fs::rename(&tmp, &self.path).map_err(|e| VaultError::io_error_at(&self.path, e))?;
        debug!(path = %self.path.display(), "vault configuration written");
        Ok(())
    }

    /// Stages a configuration rewrite through an open transaction.
    pub fn save_staged(&self, txn: &Transaction, config: &VaultConfig) -> Result<(), VaultError> {
        config.validate()?;
        let doc = render(config)?;
        txn.stage_upsert_bytes(CONFIG_FILE, doc.as_bytes())
    }
}

fn render(config: &VaultConfig) -> Result<String, VaultError> {
    toml::to_string_pretty(config)
        .map_err(|e| VaultError::SerializationError(format!("configuration encoding failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = VaultConfigStore::new(dir.path());
        assert!(!store.exists());

        let config = VaultConfig::new("alpha");
        store.save_initial(&config).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.vault.id, config.vault.id);
        assert_eq!(loaded.vault.name, "alpha");
    }

    #[test]
    fn test_missing_vault_is_typed() {
        let dir = TempDir::new().unwrap();
        let store = VaultConfigStore::new(dir.path());
        assert!(matches!(store.load(), Err(VaultError::VaultNotFound(_))));
    }

    #[test]
    fn test_initial_save_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = VaultConfigStore::new(dir.path());
        store.save_initial(&VaultConfig::new("one")).unwrap();
        assert!(store.save_initial(&VaultConfig::new("two")).is_err());
    }

    #[test]
    fn test_corrupt_document_is_typed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "vault = 3").unwrap();
        let store = VaultConfigStore::new(dir.path());
        assert!(matches!(store.load(), Err(VaultError::VaultCorrupt(_))));
    }

    #[test]
    fn test_staged_rewrite_lands_on_commit() {
        let dir = TempDir::new().unwrap();
        let store = VaultConfigStore::new(dir.path());
        let mut config = VaultConfig::new("before");
        store.save_initial(&config).unwrap();

        config.vault.name = "after".to_string();
        let txn = Transaction::begin(dir.path(), "update config").unwrap();
        store.save_staged(&txn, &config).unwrap();
        // The original is displaced to trash at stage time.
        assert!(!store.exists());
        txn.commit().unwrap();
        assert_eq!(store.load().unwrap().vault.name, "after");
    }
}
