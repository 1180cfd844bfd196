// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Storage layout under the data directory.

use std::path::{Path, PathBuf};

/// Default data directory.
pub const DATA_ROOT: &str = "/data";

#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Wallet Paths ==========

    pub fn wallets_dir(&self) -> PathBuf {
        self.root.join("wallets")
    }

    /// Wallet record: public address, salt and sealed server share.
    pub fn wallet(&self, wallet_id: &str) -> PathBuf {
        self.wallets_dir().join(format!("{wallet_id}.json"))
    }

    // ========== Payment Link Paths ==========

    pub fn links_dir(&self) -> PathBuf {
        self.root.join("links")
    }

    pub fn link(&self, link_id: &str) -> PathBuf {
        self.links_dir().join(format!("{link_id}.json"))
    }

    // ========== Relay Account Paths ==========

    pub fn relay_dir(&self) -> PathBuf {
        self.root.join("relay")
    }

    pub fn relay_meta(&self) -> PathBuf {
        self.relay_dir().join("meta.json")
    }

    /// Raw 32-byte relay seed.
    pub fn relay_key(&self) -> PathBuf {
        self.relay_dir().join("key.bin")
    }

    // ========== Transaction Database ==========

    pub fn transactions_db(&self) -> PathBuf {
        self.root.join("transactions.redb")
    }

    // ========== Audit Log Paths ==========

    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Daily audit events file (JSONL).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_use_data_root() {
        let paths = StoragePaths::default();
        assert_eq!(paths.root(), Path::new("/data"));
    }

    #[test]
    fn record_paths_are_correct() {
        let paths = StoragePaths::new("/tmp/test-data");
        assert_eq!(
            paths.wallet("w1"),
            PathBuf::from("/tmp/test-data/wallets/w1.json")
        );
        assert_eq!(
            paths.link("lnk-1"),
            PathBuf::from("/tmp/test-data/links/lnk-1.json")
        );
        assert_eq!(
            paths.relay_key(),
            PathBuf::from("/tmp/test-data/relay/key.bin")
        );
        assert_eq!(
            paths.transactions_db(),
            PathBuf::from("/tmp/test-data/transactions.redb")
        );
    }

    #[test]
    fn audit_paths_are_correct() {
        let paths = StoragePaths::default();
        assert_eq!(paths.audit_dir(), PathBuf::from("/data/audit"));
        assert_eq!(
            paths.audit_events_file("2026-10-19"),
            PathBuf::from("/data/audit/2026-10-19/events.jsonl")
        );
    }
}
