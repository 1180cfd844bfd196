// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::fmt;

use ed25519_dalek::Signer as _;
use zeroize::Zeroizing;

use crate::ledger::{Pubkey, Signature, Signer};

/// Length of an ed25519 seed, and therefore of every share.
pub const SEED_LENGTH: usize = 32;

/// A raw ed25519 keypair for one primary-chain account.
///
/// Not `Clone`, not serializable; the inner key zeroizes on drop.
pub struct SigningKey(ed25519_dalek::SigningKey);

impl SigningKey {
    pub fn generate() -> Self {
        Self(ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng))
    }

    /// Build a key from its 32-byte seed.
    pub fn from_seed(seed: &[u8]) -> Option<Self> {
        let seed: &[u8; SEED_LENGTH] = seed.try_into().ok()?;
        Some(Self(ed25519_dalek::SigningKey::from_bytes(seed)))
    }

    pub(crate) fn seed(&self) -> Zeroizing<[u8; SEED_LENGTH]> {
        Zeroizing::new(self.0.to_bytes())
    }

    /// Base58 public address.
    pub fn address(&self) -> String {
        self.pubkey().to_string()
    }
}

impl Signer for SigningKey {
    fn pubkey(&self) -> Pubkey {
        Pubkey::new(self.0.verifying_key().to_bytes())
    }

    fn sign_message(&self, message: &[u8]) -> Signature {
        Signature::new(self.0.sign(message).to_bytes())
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey({})", self.pubkey())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_round_trip_preserves_address() {
        let key = SigningKey::generate();
        let restored = SigningKey::from_seed(key.seed().as_slice()).unwrap();
        assert_eq!(key.pubkey(), restored.pubkey());
        assert_eq!(key.address(), restored.address());
    }

    #[test]
    fn from_seed_requires_32_bytes() {
        assert!(SigningKey::from_seed(&[1u8; 31]).is_none());
        assert!(SigningKey::from_seed(&[1u8; 33]).is_none());
    }

    #[test]
    fn debug_shows_only_public_address() {
        let key = SigningKey::from_seed(&[7u8; 32]).unwrap();
        assert_eq!(format!("{key:?}"), format!("SigningKey({})", key.pubkey()));
    }
}
