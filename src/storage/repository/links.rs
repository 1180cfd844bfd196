// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payment link repository.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/links/{link_id}.json
//! ```
//!
//! Only a keyed hash of the one-time code is stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::super::{FileStorage, StorageError, StorageResult};
use crate::ledger::{Pubkey, Signature};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Active,
    Claimed,
    Expired,
    Cancelled,
    /// A newer link on the same token account replaced its delegation.
    Superseded,
    /// Too many wrong codes. Only the creator can still cancel it.
    Locked,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Claimed => "claimed",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
            Self::Superseded => "superseded",
            Self::Locked => "locked",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLink {
    pub link_id: String,
    pub creator_user_id: String,
    pub creator_wallet_id: String,
    /// Creator's wallet address, the token account owner.
    pub owner: Pubkey,
    /// Creator's token account the delegation is set on.
    pub source_account: Pubkey,
    pub mint: Pubkey,
    pub token_symbol: String,
    /// Approved amount in base units.
    pub amount: u64,
    /// Mint decimals; enables checked transfers when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
    /// Hex HMAC-SHA256 of the one-time code.
    pub otp_hash: String,
    /// Wrong codes presented so far.
    #[serde(default)]
    pub failed_attempts: u32,
    pub expires_at: DateTime<Utc>,
    pub status: LinkStatus,
    pub approval_signature: Signature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_signature: Option<Signature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<Pubkey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<uuid::Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentLink {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub struct LinkRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> LinkRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    pub fn exists(&self, link_id: &str) -> bool {
        self.storage.exists(self.storage.paths().link(link_id))
    }

    pub fn get(&self, link_id: &str) -> StorageResult<PaymentLink> {
        let path = self.storage.paths().link(link_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Payment link {link_id}")));
        }
        self.storage.read_json(path)
    }

    pub fn create(&self, link: &PaymentLink) -> StorageResult<()> {
        if self.exists(&link.link_id) {
            return Err(StorageError::AlreadyExists(format!(
                "Payment link {}",
                link.link_id
            )));
        }
        self.storage
            .write_json(self.storage.paths().link(&link.link_id), link)
    }

    pub fn update(&self, link: &PaymentLink) -> StorageResult<()> {
        if !self.exists(&link.link_id) {
            return Err(StorageError::NotFound(format!(
                "Payment link {}",
                link.link_id
            )));
        }
        let mut link = link.clone();
        link.updated_at = Utc::now();
        self.storage
            .write_json(self.storage.paths().link(&link.link_id), &link)
    }

    pub fn set_status(&self, link_id: &str, status: LinkStatus) -> StorageResult<PaymentLink> {
        let mut link = self.get(link_id)?;
        link.status = status;
        self.update(&link)?;
        Ok(link)
    }

    /// Count a wrong code, locking the link once `max_attempts` is reached.
    /// Links that are no longer active are returned unchanged.
    pub fn record_failed_attempt(
        &self,
        link_id: &str,
        max_attempts: u32,
    ) -> StorageResult<PaymentLink> {
        let _guard = self.storage.lock_records();
        let mut link = self.get(link_id)?;
        if link.status != LinkStatus::Active {
            return Ok(link);
        }
        link.failed_attempts = link.failed_attempts.saturating_add(1);
        if link.failed_attempts >= max_attempts {
            link.status = LinkStatus::Locked;
        }
        self.update(&link)?;
        Ok(link)
    }

    fn list_all(&self) -> StorageResult<Vec<PaymentLink>> {
        let mut links = Vec::new();
        for link_id in self
            .storage
            .list_files(self.storage.paths().links_dir(), "json")?
        {
            match self.get(&link_id) {
                Ok(link) => links.push(link),
                Err(e) => tracing::warn!(link_id = %link_id, error = %e, "Skipping unreadable link"),
            }
        }
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(links)
    }

    /// Newest first.
    pub fn list_by_creator(&self, creator_user_id: &str) -> StorageResult<Vec<PaymentLink>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|l| l.creator_user_id == creator_user_id)
            .collect())
    }

    /// Active links whose delegation sits on `source_account`.
    pub fn list_active_for_source(&self, source_account: &Pubkey) -> StorageResult<Vec<PaymentLink>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|l| l.status == LinkStatus::Active && &l.source_account == source_account)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use chrono::Duration;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileStorage) {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        (temp, storage)
    }

    fn link(link_id: &str, creator: &str, source: u8) -> PaymentLink {
        let now = Utc::now();
        PaymentLink {
            link_id: link_id.to_string(),
            creator_user_id: creator.to_string(),
            creator_wallet_id: "w1".to_string(),
            owner: Pubkey::new([1u8; 32]),
            source_account: Pubkey::new([source; 32]),
            mint: Pubkey::new([2u8; 32]),
            token_symbol: "USDC".to_string(),
            amount: 5_000_000,
            decimals: Some(6),
            otp_hash: "00".repeat(32),
            failed_attempts: 0,
            expires_at: now + Duration::hours(24),
            status: LinkStatus::Active,
            approval_signature: Signature::default(),
            claim_signature: None,
            claimed_by: None,
            transaction_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn create_get_and_update_status() {
        let (_temp, storage) = setup();
        let repo = LinkRepository::new(&storage);
        repo.create(&link("lnk-1", "alice", 9)).unwrap();

        assert_eq!(repo.get("lnk-1").unwrap().amount, 5_000_000);
        assert!(matches!(
            repo.create(&link("lnk-1", "alice", 9)),
            Err(StorageError::AlreadyExists(_))
        ));

        let cancelled = repo.set_status("lnk-1", LinkStatus::Cancelled).unwrap();
        assert_eq!(cancelled.status, LinkStatus::Cancelled);
        assert_eq!(repo.get("lnk-1").unwrap().status, LinkStatus::Cancelled);
        assert!(matches!(repo.get("missing"), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn active_links_are_listed_per_source_account() {
        let (_temp, storage) = setup();
        let repo = LinkRepository::new(&storage);
        repo.create(&link("a", "alice", 9)).unwrap();
        repo.create(&link("b", "alice", 9)).unwrap();
        repo.create(&link("c", "alice", 8)).unwrap();
        repo.set_status("b", LinkStatus::Claimed).unwrap();

        let active = repo.list_active_for_source(&Pubkey::new([9u8; 32])).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].link_id, "a");
        assert_eq!(repo.list_by_creator("alice").unwrap().len(), 3);
    }

    #[test]
    fn failed_attempts_lock_the_link_at_the_limit() {
        let (_temp, storage) = setup();
        let repo = LinkRepository::new(&storage);
        repo.create(&link("lnk-1", "alice", 9)).unwrap();

        let first = repo.record_failed_attempt("lnk-1", 2).unwrap();
        assert_eq!((first.failed_attempts, first.status), (1, LinkStatus::Active));
        let second = repo.record_failed_attempt("lnk-1", 2).unwrap();
        assert_eq!((second.failed_attempts, second.status), (2, LinkStatus::Locked));

        // Further attempts leave a locked link as it is.
        let third = repo.record_failed_attempt("lnk-1", 2).unwrap();
        assert_eq!(third.failed_attempts, 2);
        assert_eq!(repo.get("lnk-1").unwrap().status, LinkStatus::Locked);
    }

    #[test]
    fn expiry_is_inclusive() {
        let l = link("x", "alice", 1);
        assert!(!l.is_expired_at(l.expires_at - Duration::seconds(1)));
        assert!(l.is_expired_at(l.expires_at));
    }
}
