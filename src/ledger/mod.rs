// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Primary-chain integration.
//!
//! This module provides:
//! - Addresses, blockhashes and signatures (`pubkey`)
//! - Instruction builders for the system, compute budget, token and
//!   associated token account programs (`programs`)
//! - Legacy message compilation, signing and wire encoding (`transaction`)
//! - The `LedgerRpc` seam and its JSON-RPC implementation (`rpc`)

pub mod instruction;
pub mod programs;
pub mod pubkey;
pub mod rpc;
pub mod transaction;

#[cfg(test)]
pub mod fake;

pub use instruction::{AccountMeta, Instruction};
pub use pubkey::{Hash, Pubkey, Signature};
pub use rpc::{JsonRpcClient, LedgerRpc, SignatureStatus};
pub use transaction::{Message, Signer, Transaction};

/// Errors from primary-chain operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    /// The endpoint could not be reached or timed out.
    #[error("RPC transport error: {0}")]
    Transport(String),

    /// The node answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
}

impl LedgerError {
    /// Whether the node was unreachable, as opposed to rejecting the request.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
