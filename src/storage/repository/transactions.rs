// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Universal transaction records.
//!
//! One record per transfer regardless of chain. Records start `pending`
//! and move exactly once to `confirmed` or `failed`; a terminal record is
//! never mutated again.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::super::tx_cache::TxCache;
use super::super::tx_database::{PendingCursor, TxDatabase, TxDbError, TxDbResult};
use crate::ledger::Signature;
use crate::routing::Chain;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    #[default]
    Pending,
    Confirmed,
    Failed,
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        })
    }
}

/// Attempted mutation of a settled record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transaction {id} is already {status}")]
pub struct TerminalState {
    pub id: Uuid,
    pub status: TxStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniversalTransaction {
    pub id: Uuid,
    pub sender_user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_user_id: Option<String>,
    pub sender_address: String,
    pub recipient_address: String,
    /// Human-readable decimal amount.
    pub amount: String,
    pub token_symbol: String,
    pub chain: Chain,
    pub status: TxStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_signature: Option<Signature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_tx_hash: Option<String>,
    /// Set for claims of a payment link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_link_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UniversalTransaction {
    pub fn new_pending(
        sender_user_id: impl Into<String>,
        recipient_user_id: Option<&str>,
        sender_address: impl Into<String>,
        recipient_address: impl Into<String>,
        amount: impl Into<String>,
        token_symbol: impl Into<String>,
        chain: Chain,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            sender_user_id: sender_user_id.into(),
            recipient_user_id: recipient_user_id.map(str::to_string),
            sender_address: sender_address.into(),
            recipient_address: recipient_address.into(),
            amount: amount.into(),
            token_symbol: token_symbol.into(),
            chain,
            status: TxStatus::Pending,
            primary_signature: None,
            secondary_tx_hash: None,
            payment_link_id: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_payment_link(mut self, link_id: impl Into<String>) -> Self {
        self.payment_link_id = Some(link_id.into());
        self
    }

    fn ensure_pending(&self) -> Result<(), TerminalState> {
        if self.status.is_terminal() {
            Err(TerminalState {
                id: self.id,
                status: self.status,
            })
        } else {
            Ok(())
        }
    }

    /// Record the primary-chain signature once broadcast.
    pub fn attach_signature(&mut self, signature: Signature) -> Result<(), TerminalState> {
        self.ensure_pending()?;
        self.primary_signature = Some(signature);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record the secondary-chain hash once the sponsor reports it.
    pub fn attach_tx_hash(&mut self, tx_hash: impl Into<String>) -> Result<(), TerminalState> {
        self.ensure_pending()?;
        self.secondary_tx_hash = Some(tx_hash.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_confirmed(&mut self) -> Result<(), TerminalState> {
        self.ensure_pending()?;
        self.status = TxStatus::Confirmed;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), TerminalState> {
        self.ensure_pending()?;
        self.status = TxStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    /// The chain-native identifier the reconciler polls.
    pub fn chain_reference(&self) -> Option<String> {
        match self.chain {
            Chain::Solana => self.primary_signature.map(|s| s.to_string()),
            Chain::Avalanche => self.secondary_tx_hash.clone(),
        }
    }

    fn user_ids(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.sender_user_id.as_str()).chain(self.recipient_user_id.as_deref())
    }
}

/// Transaction store with a first-page cache per user.
pub struct TransactionRepository {
    db: TxDatabase,
    cache: TxCache,
}

impl TransactionRepository {
    pub fn new(db: TxDatabase, cache: TxCache) -> Self {
        Self { db, cache }
    }

    pub fn open(path: &Path, cache: TxCache) -> TxDbResult<Self> {
        Ok(Self::new(TxDatabase::open(path)?, cache))
    }

    pub fn create(&self, tx: &UniversalTransaction) -> TxDbResult<()> {
        self.db.insert(tx)?;
        self.invalidate(tx);
        Ok(())
    }

    pub fn get(&self, id: &Uuid) -> TxDbResult<UniversalTransaction> {
        self.db
            .get(id)?
            .ok_or_else(|| TxDbError::NotFound(format!("Transaction {id}")))
    }

    pub fn attach_signature(
        &self,
        id: &Uuid,
        signature: Signature,
    ) -> TxDbResult<UniversalTransaction> {
        self.apply(id, |tx| tx.attach_signature(signature))
    }

    pub fn attach_tx_hash(&self, id: &Uuid, tx_hash: &str) -> TxDbResult<UniversalTransaction> {
        self.apply(id, |tx| tx.attach_tx_hash(tx_hash))
    }

    /// Fails with `TerminalState` if the record already settled.
    pub fn mark_confirmed(&self, id: &Uuid) -> TxDbResult<UniversalTransaction> {
        self.apply(id, UniversalTransaction::mark_confirmed)
    }

    /// Fails with `TerminalState` if the record already settled.
    pub fn mark_failed(&self, id: &Uuid, reason: &str) -> TxDbResult<UniversalTransaction> {
        self.apply(id, |tx| tx.mark_failed(reason))
    }

    /// Newest-first history for a user. The first page is served from cache.
    pub fn list_for_user(
        &self,
        user_id: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> TxDbResult<(Vec<UniversalTransaction>, Option<String>)> {
        if cursor.is_none() {
            if let Some(page) = self.cache.get_first_page(user_id, limit) {
                return Ok(page);
            }
        }

        let page = self.db.list_by_user(user_id, cursor, limit)?;
        if cursor.is_none() {
            self.cache.put_first_page(user_id, limit, page.clone());
        }
        Ok(page)
    }

    pub fn list_pending_after(
        &self,
        after: Option<&PendingCursor>,
        limit: usize,
    ) -> TxDbResult<(Vec<UniversalTransaction>, Option<PendingCursor>)> {
        self.db.list_pending_after(after, limit)
    }

    fn apply<F>(&self, id: &Uuid, apply: F) -> TxDbResult<UniversalTransaction>
    where
        F: FnOnce(&mut UniversalTransaction) -> Result<(), TerminalState>,
    {
        let updated = self.db.update(id, apply)?;
        self.invalidate(&updated);
        Ok(updated)
    }

    fn invalidate(&self, tx: &UniversalTransaction) {
        for user_id in tx.user_ids() {
            self.cache.invalidate(user_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn repo() -> (TransactionRepository, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let repo = TransactionRepository::open(
            &dir.path().join("tx.redb"),
            TxCache::new(16, Duration::from_secs(60)),
        )
        .unwrap();
        (repo, dir)
    }

    fn transfer(sender: &str, recipient: &str) -> UniversalTransaction {
        UniversalTransaction::new_pending(
            sender,
            Some(recipient),
            "sender-address",
            "recipient-address",
            "1.25",
            "SOL",
            Chain::Solana,
        )
    }

    #[test]
    fn terminal_records_are_never_mutated() {
        let mut tx = transfer("alice", "bob");
        tx.mark_confirmed().unwrap();

        let err = tx.mark_failed("late failure").unwrap_err();
        assert_eq!(err.status, TxStatus::Confirmed);
        assert_eq!(tx.status, TxStatus::Confirmed);
        assert!(tx.failure_reason.is_none());
        assert!(tx.attach_signature(Signature::default()).is_err());
    }

    #[test]
    fn lifecycle_through_repository() {
        let (repo, _dir) = repo();
        let tx = transfer("alice", "bob");
        repo.create(&tx).unwrap();

        let signature = Signature::new([5u8; 64]);
        repo.attach_signature(&tx.id, signature).unwrap();
        let failed = repo.mark_failed(&tx.id, "blockhash expired").unwrap();
        assert_eq!(failed.status, TxStatus::Failed);
        assert_eq!(failed.chain_reference(), Some(signature.to_string()));

        assert!(matches!(
            repo.mark_confirmed(&tx.id),
            Err(TxDbError::TerminalState(_))
        ));
        assert!(matches!(
            repo.get(&Uuid::new_v4()),
            Err(TxDbError::NotFound(_))
        ));
    }

    #[test]
    fn cached_first_page_is_invalidated_on_change() {
        let (repo, _dir) = repo();
        let tx = transfer("alice", "bob");
        repo.create(&tx).unwrap();

        let (page, _) = repo.list_for_user("bob", None, 10).unwrap();
        assert_eq!(page[0].status, TxStatus::Pending);

        repo.mark_confirmed(&tx.id).unwrap();
        let (page, _) = repo.list_for_user("bob", None, 10).unwrap();
        assert_eq!(page[0].status, TxStatus::Confirmed);

        repo.create(&transfer("alice", "carol")).unwrap();
        assert_eq!(repo.list_for_user("alice", None, 10).unwrap().0.len(), 2);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TxStatus::Confirmed).unwrap(),
            "\"confirmed\""
        );
        assert_eq!(TxStatus::Failed.to_string(), "failed");
    }
}
