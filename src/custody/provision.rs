// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet creation and passcode rotation.

use std::fmt;

use tracing::info;

use super::codec::{encrypt_for_storage, SealedShare};
use super::keys::{SigningKey, SEED_LENGTH};
use super::passcode::{Passcode, PasscodeKey, Salt};
use super::reconstruct::{Credentials, Reconstructor, WalletSecrets};
use super::shares::{split_with_share, xor_pair, Share};
use super::CustodyError;
use crate::ledger::{Pubkey, Signer};

/// Everything produced at wallet setup.
///
/// The caller persists `salt` and both sealed shares, and hands
/// `backup_share` and `recovery_share` to the user. The stored shares only
/// open under the passcode-derived key, so nothing persisted lets the
/// service sign without the passcode or the backup and recovery pair.
pub struct ProvisionedWallet {
    pub public_address: Pubkey,
    pub salt: Salt,
    pub sealed_server_share: SealedShare,
    pub sealed_backup_share: SealedShare,
    pub backup_share: Share,
    pub recovery_share: Share,
}

impl ProvisionedWallet {
    pub fn secrets(&self) -> WalletSecrets {
        WalletSecrets {
            salt: self.salt.clone(),
            sealed_server_share: self.sealed_server_share.clone(),
            public_address: self.public_address,
            has_backup_share: true,
            sealed_backup_share: Some(self.sealed_backup_share.clone()),
        }
    }
}

impl fmt::Debug for ProvisionedWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionedWallet")
            .field("public_address", &self.public_address)
            .field("salt", &self.salt)
            .field("sealed_server_share", &self.sealed_server_share)
            .finish_non_exhaustive()
    }
}

/// Generate a fresh signing key and split it around the passcode share.
pub fn provision_wallet(passcode: &Passcode) -> Result<ProvisionedWallet, CustodyError> {
    let key = SigningKey::generate();
    let wallet = split_key(&key, passcode)?;
    info!(address = %wallet.public_address, "wallet provisioned");
    Ok(wallet)
}

/// Re-split an existing key under a new passcode.
///
/// Uses a fresh salt, so the old passcode, backup and recovery shares all
/// stop working. The public address is unchanged.
pub fn rotate_passcode(
    secrets: &WalletSecrets,
    current: &Credentials,
    new_passcode: &Passcode,
) -> Result<ProvisionedWallet, CustodyError> {
    let mut reconstructor = Reconstructor::new(secrets);
    let key = reconstructor.reconstruct(current)?;
    let wallet = split_key(key.signing_key(), new_passcode)?;
    info!(address = %wallet.public_address, "passcode rotated");
    Ok(wallet)
}

fn split_key(key: &SigningKey, passcode: &Passcode) -> Result<ProvisionedWallet, CustodyError> {
    let seed = key.seed();
    let salt = Salt::generate();
    let crypto = |e: &dyn fmt::Display| CustodyError::Crypto(e.to_string());

    let user_share = passcode
        .derive_share(&salt, SEED_LENGTH)
        .map_err(|e| crypto(&e))?;
    let (backup_share, server_share) =
        split_with_share(seed.as_slice(), &user_share).map_err(|e| crypto(&e))?;
    let recovery_share = xor_pair(&user_share, &backup_share).map_err(|e| crypto(&e))?;

    let storage_key = PasscodeKey::from_user_share(&user_share).map_err(|e| crypto(&e))?;
    let sealed_server_share =
        encrypt_for_storage(&server_share, &storage_key).map_err(|e| crypto(&e))?;
    let sealed_backup_share =
        encrypt_for_storage(&backup_share, &storage_key).map_err(|e| crypto(&e))?;

    Ok(ProvisionedWallet {
        public_address: key.pubkey(),
        salt,
        sealed_server_share,
        sealed_backup_share,
        backup_share,
        recovery_share,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::codec::decrypt_from_storage;
    use crate::custody::shares::combine;
    use crate::custody::CustodyError;

    fn passcode(raw: &str) -> Passcode {
        Passcode::new(raw).unwrap()
    }

    #[test]
    fn shares_recombine_to_the_provisioned_key() {
        let code = passcode("482913");
        let wallet = provision_wallet(&code).unwrap();

        let user = code.derive_share(&wallet.salt, SEED_LENGTH).unwrap();
        let server = decrypt_from_storage(
            &wallet.sealed_server_share,
            &PasscodeKey::from_user_share(&user).unwrap(),
        )
        .unwrap();
        let seed = combine(&user, &server, &wallet.backup_share).unwrap();
        let stored_backup = decrypt_from_storage(
            &wallet.sealed_backup_share,
            &PasscodeKey::from_user_share(&user).unwrap(),
        )
        .unwrap();
        assert_eq!(stored_backup.as_slice(), wallet.backup_share.as_slice());

        assert_eq!(
            SigningKey::from_seed(&seed).unwrap().pubkey(),
            wallet.public_address
        );
        assert_eq!(
            xor_pair(&wallet.backup_share, &wallet.recovery_share)
                .unwrap()
                .as_slice(),
            user.as_slice()
        );
    }

    #[test]
    fn each_wallet_gets_its_own_salt_and_key() {
        let code = passcode("000000");
        let one = provision_wallet(&code).unwrap();
        let two = provision_wallet(&code).unwrap();
        assert_ne!(one.public_address, two.public_address);
        assert_ne!(one.salt, two.salt);
    }

    #[test]
    fn rotation_keeps_address_and_retires_old_passcode() {
        let wallet = provision_wallet(&passcode("111222")).unwrap();
        let old = wallet.secrets();

        let rotated = rotate_passcode(
            &old,
            &Credentials::passcode(passcode("111222")).with_backup(wallet.backup_share.clone()),
            &passcode("333444"),
        )
        .unwrap();
        assert_eq!(rotated.public_address, wallet.public_address);
        let new = rotated.secrets();

        let mut reconstructor = Reconstructor::new(&new);
        let key = reconstructor
            .reconstruct(
                &Credentials::passcode(passcode("333444")).with_backup(rotated.backup_share.clone()),
            )
            .unwrap();
        assert_eq!(key.pubkey(), wallet.public_address);
        drop(key);

        let address = Reconstructor::new(&new)
            .reconstruct(&Credentials::passcode(passcode("333444")))
            .map(|key| key.pubkey())
            .unwrap();
        assert_eq!(address, wallet.public_address);
        assert_eq!(
            Reconstructor::new(&new)
                .reconstruct(&Credentials::passcode(passcode("111222")))
                .unwrap_err(),
            CustodyError::InvalidPasscode
        );

        let err = Reconstructor::new(&new)
            .reconstruct(
                &Credentials::passcode(passcode("111222")).with_backup(wallet.backup_share.clone()),
            )
            .unwrap_err();
        assert_eq!(err, CustodyError::InvalidPasscode);
    }

    #[test]
    fn rotation_requires_current_credentials() {
        let wallet = provision_wallet(&passcode("111222")).unwrap();
        let err = rotate_passcode(
            &wallet.secrets(),
            &Credentials::passcode(passcode("999999")).with_backup(wallet.backup_share.clone()),
            &passcode("333444"),
        )
        .unwrap_err();
        assert_eq!(err, CustodyError::InvalidPasscode);
    }

    #[test]
    fn debug_omits_shares() {
        let wallet = provision_wallet(&passcode("123123")).unwrap();
        let rendered = format!("{wallet:?}");
        assert!(!rendered.contains("backup_share"));
        assert!(!rendered.contains("recovery_share"));
    }
}
