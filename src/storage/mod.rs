// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage
//!
//! All state lives under one data directory, which deployments mount on an
//! encrypted volume. Nothing stored here can sign on its own: server shares
//! are sealed under passcode-derived keys, and the relay seed is the only
//! raw key material on disk.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/
//!   wallets/{wallet_id}.json     # address, salt, sealed server and backup shares
//!   links/{link_id}.json         # payment links (hashed one-time codes)
//!   relay/meta.json              # relay account address
//!   relay/key.bin                # relay seed, owner-only permissions
//!   transactions.redb            # universal transaction records
//!   audit/{date}/events.jsonl    # daily audit logs
//! ```

pub mod audit;
pub mod file_store;
pub mod paths;
pub mod repository;
pub mod tx_cache;
pub mod tx_database;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use file_store::{FileStorage, StorageError, StorageResult};
pub use paths::StoragePaths;
pub use repository::{
    LinkRepository, LinkStatus, PaymentLink, RelayAccountMetadata, RelayAccountRepository,
    TerminalState, TransactionRepository, TxStatus, UniversalTransaction, WalletRecord,
    WalletRepository, WalletStatus,
};
pub use tx_cache::TxCache;
pub use tx_database::{PendingCursor, TxDatabase, TxDbError, TxDbResult};
