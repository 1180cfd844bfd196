// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gas-sponsoring relay for the primary chain.
//!
//! - `account` - the relay's funded signing key
//! - `service` - fee payment, co-signing and broadcast
//! - `confirmation` - bounded status polling

pub mod account;
pub mod confirmation;
pub mod service;

pub use account::{RelayAccount, RelayKeyError};
pub use confirmation::{await_confirmation, Confirmation, ConfirmationPolicy};
pub use service::{Authorization, PreparedTransaction, RelayConfig, RelayService, RelaySubmission};
