// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Custody - Split-Key Wallet Core
//!
//! Passcode-split signing keys, a fee-sponsoring relay for the primary
//! chain, delegated payment links and cross-chain transfer routing.
//!
//! ## Modules
//!
//! - `custody` - Key splitting, sealing and transient reconstruction
//! - `ledger` - Primary-chain primitives and JSON-RPC client
//! - `relay` - Fee-paying relay account and submission
//! - `delegation` - Payment links claimed under an on-chain allowance
//! - `routing` - Per-token chain selection
//! - `evm` - Secondary EVM chain through a sponsored-transaction service
//! - `storage` - File-backed records, audit log and transaction database
//! - `service` - The facade collaborators call
//! - `reconciler` - Background settlement of pending transactions

pub mod config;
pub mod custody;
pub mod delegation;
pub mod error;
pub mod evm;
pub mod ledger;
pub mod logging;
pub mod reconciler;
pub mod relay;
pub mod routing;
pub mod service;
pub mod storage;
pub mod units;

pub use error::{WalletError, WalletResult};
pub use service::CustodyService;
