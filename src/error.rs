// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet operation error taxonomy.
//!
//! Callers branch on three classes:
//!
//! | Class | Variants | Caller action |
//! |-------|----------|---------------|
//! | user | `InvalidPasscode`, `InsufficientBalance`, `RouteUnavailable`, `InvalidInput`, link errors | show to the user |
//! | operational | `RelayUnavailable`, `RelayUnderfunded` | alert operators, retry later |
//! | rejected | `SubmissionFailure` | nothing moved; the request may be retried |
//! | unknown outcome | `SubmissionUnknown` | check the transaction later, do not resubmit |

use crate::custody::CustodyError;
use crate::evm::EvmError;
use crate::ledger::Signature;
use crate::storage::{StorageError, TxDbError};
use crate::units::UnitsError;

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("Invalid passcode")]
    InvalidPasscode,

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u128, available: u128 },

    #[error("Route unavailable: {reason}")]
    RouteUnavailable { reason: String },

    #[error("Relay unavailable: {0}")]
    RelayUnavailable(String),

    #[error("Relay underfunded: balance {balance}, required {required}")]
    RelayUnderfunded { balance: u64, required: u64 },

    /// The chain or the sponsor definitively rejected the transaction.
    #[error("Submission failed: {0}")]
    SubmissionFailure(String),

    /// The broadcast may have reached the chain and can still land.
    /// `signature` is set for primary-chain transactions.
    #[error("Submission outcome unknown: {reason}")]
    SubmissionUnknown {
        signature: Option<Signature>,
        reason: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payment link has expired")]
    LinkExpired,

    #[error("Payment link is {0}")]
    LinkUnavailable(String),

    #[error("Invalid one-time code")]
    InvalidOneTimeCode,

    #[error("Secondary chain error: {0}")]
    Secondary(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Transaction database error: {0}")]
    TxDatabase(#[from] TxDbError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WalletError {
    /// Failures an operator should be paged for rather than shown to a user.
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            Self::RelayUnavailable(_)
                | Self::RelayUnderfunded { .. }
                | Self::Secondary(_)
                | Self::Storage(_)
                | Self::TxDatabase(_)
                | Self::Internal(_)
        )
    }

    /// Whether retrying the same request later can succeed without risking a
    /// double payment.
    ///
    /// Cryptographic and validation failures are never retryable, and neither
    /// is a submission whose outcome is unknown.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RelayUnavailable(_)
                | Self::RelayUnderfunded { .. }
                | Self::SubmissionFailure(_)
                | Self::Secondary(_)
        )
    }
}

impl From<CustodyError> for WalletError {
    fn from(err: CustodyError) -> Self {
        match err {
            CustodyError::InvalidPasscode => Self::InvalidPasscode,
            CustodyError::InvalidInput(msg) => Self::InvalidInput(msg),
            CustodyError::Crypto(msg) => Self::Internal(msg),
        }
    }
}

impl From<EvmError> for WalletError {
    fn from(err: EvmError) -> Self {
        match err {
            EvmError::InvalidAddress(msg) | EvmError::UnsupportedToken(msg) => {
                Self::InvalidInput(msg)
            }
            EvmError::Rejected(msg) => Self::SubmissionFailure(msg),
            other => Self::Secondary(other.to_string()),
        }
    }
}

impl From<UnitsError> for WalletError {
    fn from(err: UnitsError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

pub type WalletResult<T> = Result<T, WalletError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_errors_are_operational_and_retryable() {
        let unavailable = WalletError::RelayUnavailable("timeout".into());
        let underfunded = WalletError::RelayUnderfunded {
            balance: 1,
            required: 2,
        };
        assert!(unavailable.is_operational() && unavailable.is_retryable());
        assert!(underfunded.is_operational() && underfunded.is_retryable());
    }

    #[test]
    fn user_errors_are_not_retryable() {
        for err in [
            WalletError::InvalidPasscode,
            WalletError::InsufficientBalance {
                required: 2,
                available: 1,
            },
            WalletError::RouteUnavailable {
                reason: "no wallet".into(),
            },
            WalletError::InvalidOneTimeCode,
        ] {
            assert!(!err.is_operational(), "{err}");
            assert!(!err.is_retryable(), "{err}");
        }
    }

    #[test]
    fn submission_failure_is_retryable_but_not_operational() {
        let err = WalletError::SubmissionFailure("blockhash expired".into());
        assert!(err.is_retryable());
        assert!(!err.is_operational());
    }

    #[test]
    fn unknown_submission_outcome_is_not_retryable() {
        let err = WalletError::SubmissionUnknown {
            signature: Some(Signature::new([1u8; 64])),
            reason: "operation timed out".into(),
        };
        assert!(!err.is_retryable());
        assert!(!err.is_operational());
        assert_eq!(err.to_string(), "Submission outcome unknown: operation timed out");
    }

    #[test]
    fn custody_errors_map_onto_taxonomy() {
        assert!(matches!(
            WalletError::from(CustodyError::InvalidPasscode),
            WalletError::InvalidPasscode
        ));
        assert!(matches!(
            WalletError::from(CustodyError::InvalidInput("x".into())),
            WalletError::InvalidInput(_)
        ));
    }

    #[test]
    fn messages_carry_detail() {
        let err = WalletError::InsufficientBalance {
            required: 10,
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient balance: required 10, available 3"
        );
    }
}
