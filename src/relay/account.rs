// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The relay's own funded signing key.
//!
//! Constructed once at startup and handed to [`RelayService`](super::RelayService)
//! behind an `Arc`. It is never a process global, so tests can inject a
//! throwaway account.

use std::fmt;

use tracing::info;
use zeroize::Zeroizing;

use crate::custody::keys::{SigningKey, SEED_LENGTH};
use crate::ledger::{Pubkey, Signature, Signer};
use crate::storage::{
    AuditEvent, AuditEventType, AuditRepository, FileStorage, RelayAccountRepository,
    StorageError,
};

#[derive(Debug, thiserror::Error)]
pub enum RelayKeyError {
    #[error("relay secret is not valid base58")]
    Encoding,

    #[error("relay secret must be 32 or 64 bytes, got {0}")]
    Length(usize),

    #[error("relay keypair public half does not match its seed")]
    KeypairMismatch,

    #[error("relay key storage: {0}")]
    Storage(#[from] StorageError),
}

pub struct RelayAccount {
    key: SigningKey,
}

impl RelayAccount {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Parse a base58 secret: a 32-byte seed or a 64-byte `seed || pubkey`
    /// keypair as produced by common wallet tooling.
    pub fn from_base58(secret: &str) -> Result<Self, RelayKeyError> {
        let bytes = Zeroizing::new(
            bs58::decode(secret.trim())
                .into_vec()
                .map_err(|_| RelayKeyError::Encoding)?,
        );

        let key = match bytes.len() {
            SEED_LENGTH => SigningKey::from_seed(&bytes[..]),
            64 => {
                let key = SigningKey::from_seed(&bytes[..SEED_LENGTH]);
                if key
                    .as_ref()
                    .is_some_and(|k| k.pubkey().as_bytes()[..] != bytes[SEED_LENGTH..])
                {
                    return Err(RelayKeyError::KeypairMismatch);
                }
                key
            }
            other => return Err(RelayKeyError::Length(other)),
        };
        key.map(Self::new)
            .ok_or(RelayKeyError::Length(bytes.len()))
    }

    /// Use the configured secret if given, else the key in storage,
    /// generating one on first start.
    pub fn load_or_bootstrap(
        storage: &FileStorage,
        configured_secret: Option<&str>,
    ) -> Result<Self, RelayKeyError> {
        if let Some(secret) = configured_secret {
            let account = Self::from_base58(secret)?;
            info!(address = %account.address(), source = "config", "relay account loaded");
            return Ok(account);
        }

        let repo = RelayAccountRepository::new(storage);
        let existed = repo.exists();
        let (metadata, key) = repo.bootstrap()?;
        if !existed {
            AuditRepository::new(storage).record(
                AuditEvent::new(AuditEventType::RelayBootstrapped)
                    .with_resource("relay", metadata.public_address.to_string()),
            );
        }
        info!(address = %metadata.public_address, source = "storage", "relay account loaded");
        Ok(Self::new(key))
    }

    pub fn address(&self) -> Pubkey {
        self.key.pubkey()
    }
}

impl Signer for RelayAccount {
    fn pubkey(&self) -> Pubkey {
        self.key.pubkey()
    }

    fn sign_message(&self, message: &[u8]) -> Signature {
        self.key.sign_message(message)
    }
}

impl fmt::Debug for RelayAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelayAccount({})", self.address())
    }
}
