// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded transaction database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `transactions`: id → serialized UniversalTransaction
//! - `user_tx_index`: composite key (user|!timestamp|id) → role
//! - `pending`: id → creation timestamp, for the reconciler

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use uuid::Uuid;

use super::repository::transactions::{TerminalState, TxStatus, UniversalTransaction};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: id → serialized UniversalTransaction (JSON bytes).
const TRANSACTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("transactions");

/// Index: composite key → role ("sender"|"recipient").
/// Key format: `user|!timestamp_be|id` for descending-time range scans.
const USER_TX_INDEX: TableDefinition<&[u8], &str> = TableDefinition::new("user_tx_index");

/// Non-terminal transactions: id → created_at millis.
const PENDING: TableDefinition<&str, i64> = TableDefinition::new("pending");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TxDbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error(transparent)]
    TerminalState(#[from] TerminalState),
}

pub type TxDbResult<T> = Result<T, TxDbError>;

/// Position in the pending set, ordered by creation time then id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PendingCursor {
    pub created_millis: i64,
    pub id: String,
}

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Build a composite key for the user_tx_index table.
///
/// The inverted timestamp gives newest-first ordering on a forward scan.
fn make_index_key(user_id: &str, timestamp_millis: i64, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(user_id.len() + 1 + 8 + 1 + id.len());
    key.extend_from_slice(user_id.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&(!(timestamp_millis as u64)).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(id.as_bytes());
    key
}

fn make_prefix(user_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(user_id.len() + 1);
    prefix.extend_from_slice(user_id.as_bytes());
    prefix.push(b'|');
    prefix
}

/// Upper bound for a range scan over one user's entries.
fn make_prefix_end(user_id: &str) -> Vec<u8> {
    let mut end = Vec::with_capacity(user_id.len() + 1);
    end.extend_from_slice(user_id.as_bytes());
    // '}' sorts directly after '|'
    end.push(b'|' + 1);
    end
}

/// Extract the id portion from a composite index key.
fn extract_id_from_key(key: &[u8], prefix_len: usize) -> Option<String> {
    // prefix | 8 timestamp bytes | '|' | id
    let start = prefix_len + 8 + 1;
    key.get(start..)
        .and_then(|id| String::from_utf8(id.to_vec()).ok())
}

fn encode_cursor(key: &[u8]) -> String {
    alloy::primitives::hex::encode(key)
}

fn decode_cursor(cursor: &str) -> Option<Vec<u8>> {
    alloy::primitives::hex::decode(cursor).ok()
}

// =============================================================================
// TxDatabase
// =============================================================================

/// Embedded ACID store for universal transaction records.
pub struct TxDatabase {
    db: Database,
}

impl TxDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> TxDbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(TRANSACTIONS)?;
            let _ = write_txn.open_table(USER_TX_INDEX)?;
            let _ = write_txn.open_table(PENDING)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Insert a new record and its index entries.
    pub fn insert(&self, tx: &UniversalTransaction) -> TxDbResult<()> {
        let id = tx.id.to_string();
        let json = serde_json::to_vec(tx)?;
        let timestamp = tx.created_at.timestamp_millis();

        let write_txn = self.db.begin_write()?;
        {
            let mut tx_table = write_txn.open_table(TRANSACTIONS)?;
            if tx_table.get(id.as_str())?.is_some() {
                return Err(TxDbError::AlreadyExists(format!("Transaction {id}")));
            }
            tx_table.insert(id.as_str(), json.as_slice())?;

            let mut idx_table = write_txn.open_table(USER_TX_INDEX)?;
            let sender_key = make_index_key(&tx.sender_user_id, timestamp, &id);
            idx_table.insert(sender_key.as_slice(), "sender")?;
            if let Some(recipient) = tx.recipient_user_id.as_deref() {
                if recipient != tx.sender_user_id {
                    let key = make_index_key(recipient, timestamp, &id);
                    idx_table.insert(key.as_slice(), "recipient")?;
                }
            }

            if !tx.status.is_terminal() {
                let mut pending = write_txn.open_table(PENDING)?;
                pending.insert(id.as_str(), timestamp)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get(&self, id: &Uuid) -> TxDbResult<Option<UniversalTransaction>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TRANSACTIONS)?;
        match table.get(id.to_string().as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Read-modify-write a record in one write transaction.
    ///
    /// `apply` sees the stored record; its error aborts the transaction
    /// without writing. Records leaving the pending state are dropped from
    /// the pending table.
    pub fn update<F>(&self, id: &Uuid, apply: F) -> TxDbResult<UniversalTransaction>
    where
        F: FnOnce(&mut UniversalTransaction) -> Result<(), TerminalState>,
    {
        let key = id.to_string();
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(TRANSACTIONS)?;

            let existing_bytes = {
                let existing = table
                    .get(key.as_str())?
                    .ok_or_else(|| TxDbError::NotFound(format!("Transaction {key}")))?;
                existing.value().to_vec()
            };

            let mut tx: UniversalTransaction = serde_json::from_slice(&existing_bytes)?;
            apply(&mut tx)?;

            let json = serde_json::to_vec(&tx)?;
            table.insert(key.as_str(), json.as_slice())?;

            if tx.status.is_terminal() {
                let mut pending = write_txn.open_table(PENDING)?;
                pending.remove(key.as_str())?;
            }
            tx
        };
        write_txn.commit()?;
        Ok(updated)
    }

    /// Paginated history for a user, newest first.
    ///
    /// Returns the page and a cursor for the next one when the page is full.
    pub fn list_by_user(
        &self,
        user_id: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> TxDbResult<(Vec<UniversalTransaction>, Option<String>)> {
        let read_txn = self.db.begin_read()?;
        let idx_table = read_txn.open_table(USER_TX_INDEX)?;
        let tx_table = read_txn.open_table(TRANSACTIONS)?;

        let prefix = make_prefix(user_id);
        let prefix_end = make_prefix_end(user_id);

        // A cursor from another user's scan falls back to the first page
        let resumed = cursor
            .and_then(decode_cursor)
            .filter(|key| key.starts_with(&prefix));
        let mut skip_first = resumed.is_some();
        let start = resumed.unwrap_or_else(|| prefix.clone());

        let mut results = Vec::with_capacity(limit);
        let mut last_key: Option<Vec<u8>> = None;

        for entry in idx_table.range(start.as_slice()..prefix_end.as_slice())? {
            if results.len() >= limit {
                break;
            }
            let (key, _role) = entry?;
            let key_bytes = key.value().to_vec();

            // Skip the cursor entry itself
            if skip_first {
                skip_first = false;
                if key_bytes == start {
                    continue;
                }
            }

            if let Some(id) = extract_id_from_key(&key_bytes, prefix.len()) {
                if let Some(value) = tx_table.get(id.as_str())? {
                    results.push(serde_json::from_slice(value.value())?);
                    last_key = Some(key_bytes);
                }
            }
        }

        let next_cursor = if results.len() >= limit {
            last_key.map(|k| encode_cursor(&k))
        } else {
            None
        };

        Ok((results, next_cursor))
    }

    /// Oldest non-terminal transactions first.
    pub fn list_pending(&self, limit: usize) -> TxDbResult<Vec<UniversalTransaction>> {
        Ok(self.list_pending_after(None, limit)?.0)
    }

    /// Up to `limit` pending transactions ordered after `after`, plus the
    /// cursor to continue from when more remain.
    pub fn list_pending_after(
        &self,
        after: Option<&PendingCursor>,
        limit: usize,
    ) -> TxDbResult<(Vec<UniversalTransaction>, Option<PendingCursor>)> {
        let read_txn = self.db.begin_read()?;
        let pending = read_txn.open_table(PENDING)?;
        let tx_table = read_txn.open_table(TRANSACTIONS)?;

        let mut ids = Vec::new();
        for entry in pending.iter()? {
            let (id, created) = entry?;
            let cursor = PendingCursor {
                created_millis: created.value(),
                id: id.value().to_string(),
            };
            if after.is_none_or(|after| &cursor > after) {
                ids.push(cursor);
            }
        }
        ids.sort();

        let more = ids.len() > limit;
        ids.truncate(limit);
        let next = if more { ids.last().cloned() } else { None };

        let mut results = Vec::with_capacity(ids.len());
        for cursor in &ids {
            if let Some(value) = tx_table.get(cursor.id.as_str())? {
                results.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok((results, next))
    }

    pub fn count_pending(&self) -> TxDbResult<u64> {
        let read_txn = self.db.begin_read()?;
        let pending = read_txn.open_table(PENDING)?;
        Ok(pending.len()?)
    }
}

// =============================================================================
// Tests
// =============================================================================
