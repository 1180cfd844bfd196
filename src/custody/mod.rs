// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Split-key custody.
//!
//! Each wallet's ed25519 seed is split three ways:
//!
//! | Share | Where it lives |
//! |-------|----------------|
//! | user | re-derived from the passcode and salt, never stored |
//! | server | stored, AES-256-GCM sealed under a key derived from the user share |
//! | backup | handed to the user, and stored sealed like the server share |
//!
//! A fourth value, the recovery share (`user ⊕ backup`), lets the holder of
//! both backup and recovery shares rebuild the key without the passcode.

pub mod codec;
pub mod keys;
pub mod passcode;
pub mod provision;
pub mod reconstruct;
pub mod shares;

pub use codec::{CodecError, SealedShare};
pub use keys::SigningKey;
pub use passcode::{Passcode, PasscodeError, PasscodeKey, Salt};
pub use provision::{provision_wallet, rotate_passcode, ProvisionedWallet};
pub use reconstruct::{
    Credentials, ReconstructedKey, ReconstructionMode, ReconstructionState, Reconstructor,
    WalletSecrets,
};
pub use shares::{Share, ShareError};

/// Errors from custody operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CustodyError {
    /// Decryption, combination or address check failed.
    ///
    /// Wrong passcode, wrong backup share and a corrupted record are
    /// deliberately indistinguishable.
    #[error("invalid passcode")]
    InvalidPasscode,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("cryptographic failure: {0}")]
    Crypto(String),
}

impl From<PasscodeError> for CustodyError {
    fn from(err: PasscodeError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}
