// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository for the service-owned relay account.
//!
//! ```text
//! /data/relay/
//!   meta.json   # public address, timestamps
//!   key.bin     # 32-byte ed25519 seed, mode 0600
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::super::{FileStorage, StorageError, StorageResult};
use crate::custody::keys::{SigningKey, SEED_LENGTH};
use crate::ledger::{Pubkey, Signer};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayAccountMetadata {
    pub public_address: Pubkey,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct RelayAccountRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> RelayAccountRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    pub fn exists(&self) -> bool {
        self.storage.exists(self.storage.paths().relay_key())
    }

    pub fn get(&self) -> StorageResult<RelayAccountMetadata> {
        let path = self.storage.paths().relay_meta();
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound("Relay account metadata".to_string()));
        }
        self.storage.read_json(path)
    }

    /// Load the stored relay key, generating and persisting one if missing.
    ///
    /// The key file is created exclusively, so two racing processes end up
    /// sharing whichever key landed first.
    pub fn bootstrap(&self) -> StorageResult<(RelayAccountMetadata, SigningKey)> {
        if !self.exists() {
            let key = SigningKey::generate();
            match self
                .storage
                .write_raw_new(self.storage.paths().relay_key(), key.seed().as_slice())
            {
                Ok(()) => {
                    let now = Utc::now();
                    let metadata = RelayAccountMetadata {
                        public_address: key.pubkey(),
                        created_at: now,
                        updated_at: now,
                    };
                    self.storage
                        .write_json(self.storage.paths().relay_meta(), &metadata)?;
                    tracing::info!(address = %metadata.public_address, "Relay account created");
                    return Ok((metadata, key));
                }
                Err(StorageError::AlreadyExists(_)) => {}
                Err(e) => return Err(e),
            }
        }

        let key = self.read_signing_key()?;
        let metadata = match self.get() {
            Ok(metadata) if metadata.public_address == key.pubkey() => metadata,
            Ok(_) => {
                return Err(StorageError::IntegrityViolation(
                    "Relay metadata does not match stored key".to_string(),
                ))
            }
            Err(StorageError::NotFound(_)) => {
                let now = Utc::now();
                let metadata = RelayAccountMetadata {
                    public_address: key.pubkey(),
                    created_at: now,
                    updated_at: now,
                };
                self.storage
                    .write_json(self.storage.paths().relay_meta(), &metadata)?;
                metadata
            }
            Err(e) => return Err(e),
        };
        Ok((metadata, key))
    }

    pub fn read_signing_key(&self) -> StorageResult<SigningKey> {
        let path = self.storage.paths().relay_key();
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound("Relay account key".to_string()));
        }
        let seed = Zeroizing::new(self.storage.read_raw(path)?);
        if seed.len() != SEED_LENGTH {
            return Err(StorageError::IntegrityViolation(format!(
                "Relay key has {} bytes",
                seed.len()
            )));
        }
        SigningKey::from_seed(&seed)
            .ok_or_else(|| StorageError::IntegrityViolation("Relay key is invalid".to_string()))
    }
}
