// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Delegated transfers and payment links.
//!
//! A creator approves the relay as delegate for a bounded amount; whoever
//! holds the link's one-time code can later have the relay move exactly
//! that amount to their own account.

pub mod link;
pub mod otp;
pub mod strategies;

pub use link::{ApprovedLink, ClaimedLink, LinkRequest, PaymentLinks};
pub use otp::{OneTimeCode, OtpHasher};
pub use strategies::{
    execute_delegated_transfer, ClaimStrategy, DelegatedTransfer, StrategyOutcome,
    CLAIM_STRATEGIES,
};
