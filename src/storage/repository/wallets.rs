// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet repository.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/wallets/{wallet_id}.json
//! ```
//!
//! A record holds the public address, the passcode salt and the sealed
//! server and backup shares. Both shares are sealed under a key derived from
//! the passcode share, which is never stored, and the recovery share only
//! leaves through the provisioning result. A record alone cannot sign.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::super::{FileStorage, StorageError, StorageResult};
use crate::custody::{ProvisionedWallet, Salt, SealedShare, WalletSecrets};
use crate::ledger::Pubkey;
use crate::routing::WalletCapability;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletStatus {
    #[default]
    Active,
    /// Frozen by an operator; cannot sign.
    Suspended,
}

/// Persisted wallet record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRecord {
    pub wallet_id: String,
    pub owner_user_id: String,
    /// Primary-chain address of the split key.
    pub public_address: Pubkey,
    pub salt: Salt,
    pub sealed_server_share: SealedShare,
    /// False only for wallets created before backup shares existed.
    pub has_backup_share: bool,
    /// Absent for wallets whose backup share was only given to the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sealed_backup_share: Option<SealedShare>,
    /// Sponsor-provisioned secondary-chain address, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evm_address: Option<String>,
    pub status: WalletStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WalletRecord {
    pub fn from_provisioned(
        wallet_id: impl Into<String>,
        owner_user_id: impl Into<String>,
        wallet: &ProvisionedWallet,
    ) -> Self {
        let now = Utc::now();
        Self {
            wallet_id: wallet_id.into(),
            owner_user_id: owner_user_id.into(),
            public_address: wallet.public_address,
            salt: wallet.salt.clone(),
            sealed_server_share: wallet.sealed_server_share.clone(),
            has_backup_share: true,
            sealed_backup_share: Some(wallet.sealed_backup_share.clone()),
            evm_address: None,
            status: WalletStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn secrets(&self) -> WalletSecrets {
        WalletSecrets {
            salt: self.salt.clone(),
            sealed_server_share: self.sealed_server_share.clone(),
            public_address: self.public_address,
            has_backup_share: self.has_backup_share,
            sealed_backup_share: self.sealed_backup_share.clone(),
        }
    }

    /// Per-chain usability, derived fresh from the record.
    pub fn capability(&self) -> WalletCapability {
        let active = self.status == WalletStatus::Active;
        WalletCapability {
            solana: active,
            avalanche: active && self.evm_address.is_some(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == WalletStatus::Active
    }
}

pub struct WalletRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> WalletRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    pub fn exists(&self, wallet_id: &str) -> bool {
        self.storage.exists(self.storage.paths().wallet(wallet_id))
    }

    pub fn get(&self, wallet_id: &str) -> StorageResult<WalletRecord> {
        let path = self.storage.paths().wallet(wallet_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Wallet {wallet_id}")));
        }
        self.storage.read_json(path)
    }

    pub fn create(&self, record: &WalletRecord) -> StorageResult<()> {
        let wallet_id = &record.wallet_id;
        if self.exists(wallet_id) {
            return Err(StorageError::AlreadyExists(format!("Wallet {wallet_id}")));
        }
        self.storage
            .write_json(self.storage.paths().wallet(wallet_id), record)
    }

    pub fn update(&self, record: &WalletRecord) -> StorageResult<()> {
        let wallet_id = &record.wallet_id;
        if !self.exists(wallet_id) {
            return Err(StorageError::NotFound(format!("Wallet {wallet_id}")));
        }
        let mut record = record.clone();
        record.updated_at = Utc::now();
        self.storage
            .write_json(self.storage.paths().wallet(wallet_id), &record)
    }

    /// Swap in the salt and sealed shares produced by a passcode rotation.
    pub fn apply_rotation(
        &self,
        wallet_id: &str,
        rotated: &ProvisionedWallet,
    ) -> StorageResult<WalletRecord> {
        let mut record = self.get(wallet_id)?;
        if record.public_address != rotated.public_address {
            return Err(StorageError::IntegrityViolation(format!(
                "Rotation for wallet {wallet_id} changed its address"
            )));
        }
        record.salt = rotated.salt.clone();
        record.sealed_server_share = rotated.sealed_server_share.clone();
        record.has_backup_share = true;
        record.sealed_backup_share = Some(rotated.sealed_backup_share.clone());
        self.update(&record)?;
        Ok(record)
    }

    pub fn set_evm_address(&self, wallet_id: &str, evm_address: &str) -> StorageResult<WalletRecord> {
        let mut record = self.get(wallet_id)?;
        record.evm_address = Some(evm_address.to_string());
        self.update(&record)?;
        Ok(record)
    }

    pub fn set_status(&self, wallet_id: &str, status: WalletStatus) -> StorageResult<()> {
        let mut record = self.get(wallet_id)?;
        record.status = status;
        self.update(&record)
    }

    pub fn list_all_ids(&self) -> StorageResult<Vec<String>> {
        self.storage
            .list_files(self.storage.paths().wallets_dir(), "json")
    }

    pub fn list_by_owner(&self, owner_user_id: &str) -> StorageResult<Vec<WalletRecord>> {
        let mut wallets = Vec::new();
        for wallet_id in self.list_all_ids()? {
            match self.get(&wallet_id) {
                Ok(record) if record.owner_user_id == owner_user_id => wallets.push(record),
                Ok(_) => {}
                Err(e) => tracing::warn!(wallet_id = %wallet_id, error = %e, "Skipping unreadable wallet"),
            }
        }
        wallets.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(wallets)
    }

    /// Combined capability across a user's active wallets.
    pub fn capability_for_user(&self, owner_user_id: &str) -> StorageResult<WalletCapability> {
        let capability = self
            .list_by_owner(owner_user_id)?
            .iter()
            .map(WalletRecord::capability)
            .fold(WalletCapability::default(), |acc, c| WalletCapability {
                solana: acc.solana || c.solana,
                avalanche: acc.avalanche || c.avalanche,
            });
        Ok(capability)
    }

    /// Look up the wallet that owns the record, failing if the user differs.
    pub fn verify_ownership(&self, wallet_id: &str, user_id: &str) -> StorageResult<WalletRecord> {
        let record = self.get(wallet_id)?;
        if record.owner_user_id != user_id {
            return Err(StorageError::NotFound(format!(
                "Wallet {wallet_id} not found for user"
            )));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::codec::encrypt_for_storage;
    use crate::custody::PasscodeKey;
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileStorage) {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        (temp, storage)
    }

    fn record(wallet_id: &str, owner: &str) -> WalletRecord {
        let key = PasscodeKey::from_user_share(&[7u8; 32]).unwrap();
        let now = Utc::now();
        WalletRecord {
            wallet_id: wallet_id.to_string(),
            owner_user_id: owner.to_string(),
            public_address: Pubkey::new([3u8; 32]),
            salt: Salt::generate(),
            sealed_server_share: encrypt_for_storage(&[9u8; 32], &key).unwrap(),
            has_backup_share: true,
            sealed_backup_share: None,
            evm_address: None,
            status: WalletStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn create_and_get_wallet() {
        let (_temp, storage) = setup();
        let repo = WalletRepository::new(&storage);
        let wallet = record("w1", "user-1");

        repo.create(&wallet).unwrap();
        let loaded = repo.get("w1").unwrap();
        assert_eq!(loaded.public_address, wallet.public_address);
        assert_eq!(loaded.salt, wallet.salt);
        assert_eq!(loaded.sealed_server_share, wallet.sealed_server_share);

        assert!(matches!(
            repo.create(&wallet),
            Err(StorageError::AlreadyExists(_))
        ));
    }

    #[test]
    fn capability_tracks_evm_address_and_status() {
        let (_temp, storage) = setup();
        let repo = WalletRepository::new(&storage);
        repo.create(&record("w1", "user-1")).unwrap();

        let cap = repo.capability_for_user("user-1").unwrap();
        assert!(cap.solana && !cap.avalanche);

        repo.set_evm_address("w1", "0x1111111111111111111111111111111111111111")
            .unwrap();
        let cap = repo.capability_for_user("user-1").unwrap();
        assert!(cap.solana && cap.avalanche);

        repo.set_status("w1", WalletStatus::Suspended).unwrap();
        assert_eq!(
            repo.capability_for_user("user-1").unwrap(),
            WalletCapability::default()
        );
        assert_eq!(
            repo.capability_for_user("nobody").unwrap(),
            WalletCapability::default()
        );
    }

    #[test]
    fn list_by_owner_filters_correctly() {
        let (_temp, storage) = setup();
        let repo = WalletRepository::new(&storage);
        repo.create(&record("w1", "alice")).unwrap();
        repo.create(&record("w2", "bob")).unwrap();
        repo.create(&record("w3", "alice")).unwrap();

        let wallets = repo.list_by_owner("alice").unwrap();
        assert_eq!(wallets.len(), 2);
        assert!(wallets.iter().all(|w| w.owner_user_id == "alice"));
    }

    #[test]
    fn rotation_must_keep_address() {
        let (_temp, storage) = setup();
        let repo = WalletRepository::new(&storage);
        let wallet = record("w1", "alice");
        repo.create(&wallet).unwrap();

        let rotated = ProvisionedWallet {
            public_address: Pubkey::new([4u8; 32]),
            salt: Salt::generate(),
            sealed_server_share: wallet.sealed_server_share.clone(),
            sealed_backup_share: wallet.sealed_server_share.clone(),
            backup_share: vec![0u8; 32].into(),
            recovery_share: vec![0u8; 32].into(),
        };
        assert!(matches!(
            repo.apply_rotation("w1", &rotated),
            Err(StorageError::IntegrityViolation(_))
        ));
    }

    #[test]
    fn ownership_is_enforced() {
        let (_temp, storage) = setup();
        let repo = WalletRepository::new(&storage);
        repo.create(&record("w1", "alice")).unwrap();

        assert!(repo.verify_ownership("w1", "alice").is_ok());
        assert!(matches!(
            repo.verify_ownership("w1", "mallory"),
            Err(StorageError::NotFound(_))
        ));
    }
}
