// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transient signing key reconstruction.
//!
//! The key exists only inside a [`ReconstructedKey`] guard. Dropping the
//! guard wipes the key and moves the reconstructor to `Discarded`.

use std::fmt;

use tracing::{debug, warn};

use super::codec::{decrypt_from_storage, SealedShare};
use super::keys::{SigningKey, SEED_LENGTH};
use super::passcode::{Passcode, PasscodeKey, Salt};
use super::shares::{combine, legacy_third_share, xor_pair, Share};
use super::CustodyError;
use crate::ledger::{Pubkey, Signature, Signer};

/// Which shares take part in a reconstruction, resolved once up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconstructionMode {
    /// Passcode only. The third share is the wallet's stored backup share,
    /// or the legacy hash-derived share for wallets that never had one.
    Standard,
    /// Passcode plus a backup share presented by the user.
    WithBackup,
    /// Backup plus recovery share, no passcode.
    FullRecovery,
}

impl ReconstructionMode {
    pub fn resolve(
        has_passcode: bool,
        has_backup: bool,
        has_recovery: bool,
    ) -> Result<Self, CustodyError> {
        match (has_passcode, has_backup, has_recovery) {
            (_, false, true) => Err(CustodyError::InvalidInput(
                "recovery share requires the backup share".into(),
            )),
            (_, true, true) => Ok(Self::FullRecovery),
            (true, true, false) => Ok(Self::WithBackup),
            (true, false, false) => Ok(Self::Standard),
            (false, _, false) => Err(CustodyError::InvalidInput(
                "passcode or backup and recovery shares required".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconstructionState {
    NotAttempted,
    SharesGathered,
    Reconstructed,
    Discarded,
}

/// What the caller presents to unlock a wallet.
#[derive(Default)]
pub struct Credentials {
    pub passcode: Option<Passcode>,
    pub backup_share: Option<Share>,
    pub recovery_share: Option<Share>,
}

impl Credentials {
    pub fn passcode(passcode: Passcode) -> Self {
        Self {
            passcode: Some(passcode),
            ..Self::default()
        }
    }

    pub fn with_backup(mut self, backup_share: Share) -> Self {
        self.backup_share = Some(backup_share);
        self
    }

    pub fn recovery(backup_share: Share, recovery_share: Share) -> Self {
        Self {
            passcode: None,
            backup_share: Some(backup_share),
            recovery_share: Some(recovery_share),
        }
    }

    pub fn mode(&self) -> Result<ReconstructionMode, CustodyError> {
        ReconstructionMode::resolve(
            self.passcode.is_some(),
            self.backup_share.is_some(),
            self.recovery_share.is_some(),
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("passcode", &self.passcode.is_some())
            .field("backup_share", &self.backup_share.is_some())
            .field("recovery_share", &self.recovery_share.is_some())
            .finish()
    }
}

/// The persisted inputs of a reconstruction.
#[derive(Debug, Clone)]
pub struct WalletSecrets {
    pub salt: Salt,
    pub sealed_server_share: SealedShare,
    pub public_address: Pubkey,
    /// Wallets issued a backup share cannot use the legacy third share.
    pub has_backup_share: bool,
    /// Backup share sealed under the same passcode-derived key as the
    /// server share.
    pub sealed_backup_share: Option<SealedShare>,
}

/// Drives one reconstruction for one wallet.
pub struct Reconstructor<'a> {
    secrets: &'a WalletSecrets,
    state: ReconstructionState,
}

impl<'a> Reconstructor<'a> {
    pub fn new(secrets: &'a WalletSecrets) -> Self {
        Self {
            secrets,
            state: ReconstructionState::NotAttempted,
        }
    }

    pub fn state(&self) -> ReconstructionState {
        self.state
    }

    /// Rebuild the signing key. Ends in `Discarded` on failure, or when the
    /// returned guard is dropped.
    pub fn reconstruct(
        &mut self,
        credentials: &Credentials,
    ) -> Result<ReconstructedKey<'_>, CustodyError> {
        match self.gather_and_combine(credentials) {
            Ok(key) => {
                self.state = ReconstructionState::Reconstructed;
                debug!(address = %key.pubkey(), "signing key reconstructed");
                Ok(ReconstructedKey {
                    key,
                    state: &mut self.state,
                })
            }
            Err(err) => {
                self.state = ReconstructionState::Discarded;
                warn!(address = %self.secrets.public_address, error = %err, "signing key reconstruction failed");
                Err(err)
            }
        }
    }

    fn gather_and_combine(&mut self, credentials: &Credentials) -> Result<SigningKey, CustodyError> {
        let mode = credentials.mode()?;
        if mode == ReconstructionMode::Standard
            && self.secrets.has_backup_share
            && self.secrets.sealed_backup_share.is_none()
        {
            return Err(CustodyError::InvalidInput(
                "this wallet requires its backup share".into(),
            ));
        }
        debug!(?mode, "gathering shares");

        let user_share = match (mode, &credentials.passcode) {
            (ReconstructionMode::FullRecovery, _) => match (&credentials.backup_share, &credentials.recovery_share) {
                (Some(backup), Some(recovery)) => {
                    xor_pair(backup, recovery).map_err(|_| CustodyError::InvalidPasscode)?
                }
                _ => return Err(CustodyError::InvalidInput("missing recovery shares".into())),
            },
            (_, Some(passcode)) => passcode
                .derive_share(&self.secrets.salt, SEED_LENGTH)
                .map_err(|e| CustodyError::Crypto(e.to_string()))?,
            (_, None) => return Err(CustodyError::InvalidInput("missing passcode".into())),
        };

        let storage_key = PasscodeKey::from_user_share(&user_share)
            .map_err(|e| CustodyError::Crypto(e.to_string()))?;
        let server_share = decrypt_from_storage(&self.secrets.sealed_server_share, &storage_key)
            .map_err(|_| CustodyError::InvalidPasscode)?;

        let third_share = match (mode, &credentials.backup_share) {
            (ReconstructionMode::Standard, _) => match &self.secrets.sealed_backup_share {
                Some(sealed) => decrypt_from_storage(sealed, &storage_key)
                    .map_err(|_| CustodyError::InvalidPasscode)?,
                None => legacy_third_share(&user_share, &server_share)
                    .map_err(|_| CustodyError::InvalidPasscode)?,
            },
            (_, Some(backup)) => backup.clone(),
            (_, None) => return Err(CustodyError::InvalidInput("missing backup share".into())),
        };
        self.state = ReconstructionState::SharesGathered;

        let seed = combine(&user_share, &server_share, &third_share)
            .map_err(|_| CustodyError::InvalidPasscode)?;
        let key = SigningKey::from_seed(&seed).ok_or(CustodyError::InvalidPasscode)?;

        if key.pubkey() != self.secrets.public_address {
            return Err(CustodyError::InvalidPasscode);
        }
        Ok(key)
    }
}

/// A reconstructed key, valid until dropped.
pub struct ReconstructedKey<'r> {
    key: SigningKey,
    state: &'r mut ReconstructionState,
}

impl ReconstructedKey<'_> {
    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.key
    }
}

impl Signer for ReconstructedKey<'_> {
    fn pubkey(&self) -> Pubkey {
        self.key.pubkey()
    }

    fn sign_message(&self, message: &[u8]) -> Signature {
        self.key.sign_message(message)
    }
}

impl fmt::Debug for ReconstructedKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReconstructedKey({})", self.key.pubkey())
    }
}

impl Drop for ReconstructedKey<'_> {
    fn drop(&mut self) {
        *self.state = ReconstructionState::Discarded;
    }
}
