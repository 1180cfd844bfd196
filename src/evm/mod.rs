// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Secondary EVM chain integration.
//!
//! This module provides:
//! - Network and token configuration (`types`)
//! - ERC-20 call encoding (`erc20`)
//! - Balance and receipt reads over an alloy provider (`client`)
//! - The sponsored-transaction service client (`sponsor`)

pub mod client;
pub mod erc20;
pub mod sponsor;
pub mod types;

pub use client::{EvmClient, EvmReader};
pub use erc20::{parse_address, transfer_call, EvmCall};
pub use sponsor::{SponsoredRelay, SponsoredRelayClient};
pub use types::{EvmAsset, NetworkConfig, TxReceipt, AVAX_FUJI, AVAX_MAINNET};

/// Errors from secondary chain operations.
#[derive(Debug, thiserror::Error)]
pub enum EvmError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Unsupported token: {0}")]
    UnsupportedToken(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    /// The sponsor could not be reached or answered with an error status.
    #[error("Sponsor error: {0}")]
    Sponsor(String),

    /// The sponsor refused or reverted the call.
    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
