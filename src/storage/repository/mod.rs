// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to storage.
//!
//! File-backed repositories borrow an [`FileStorage`](super::FileStorage);
//! transactions live in the redb-backed [`TransactionRepository`].

pub mod links;
pub mod relay;
pub mod transactions;
pub mod wallets;

pub use links::{LinkRepository, LinkStatus, PaymentLink};
pub use relay::{RelayAccountMetadata, RelayAccountRepository};
pub use transactions::{TerminalState, TransactionRepository, TxStatus, UniversalTransaction};
pub use wallets::{WalletRecord, WalletRepository, WalletStatus};
