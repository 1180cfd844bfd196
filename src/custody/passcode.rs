// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Passcode credentials and the storage key derived from them.

use std::fmt;

use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::shares::{derive_share_from_passcode, Share, ShareError};

/// Number of digits in a wallet passcode.
pub const PASSCODE_LENGTH: usize = 6;

/// Per-wallet salt length in bytes.
pub const SALT_LENGTH: usize = 16;

const STORAGE_KEY_LABEL: &[u8] = b"relational-custody/server-share/v1";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PasscodeError {
    #[error("passcode must be exactly 6 digits")]
    InvalidFormat,

    #[error("salt must be 16 base64-encoded bytes")]
    InvalidSalt,
}

/// A numeric wallet passcode.
///
/// The raw digits are wiped on drop and never printed.
pub struct Passcode(Zeroizing<String>);

impl Passcode {
    /// Validate and wrap a raw passcode.
    pub fn new(raw: &str) -> Result<Self, PasscodeError> {
        if raw.len() != PASSCODE_LENGTH || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PasscodeError::InvalidFormat);
        }
        Ok(Self(Zeroizing::new(raw.to_string())))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Re-derive the passcode share for a wallet.
    pub fn derive_share(&self, salt: &Salt, length: usize) -> Result<Share, ShareError> {
        derive_share_from_passcode(self.as_bytes(), salt.as_bytes(), length)
    }
}

impl fmt::Debug for Passcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passcode(******)")
    }
}

/// Per-wallet random salt for passcode derivation.
#[derive(Clone, PartialEq, Eq)]
pub struct Salt([u8; SALT_LENGTH]);

impl Salt {
    /// Generate a fresh random salt.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SALT_LENGTH];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SALT_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        Base64::encode_string(&self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, PasscodeError> {
        let bytes = Base64::decode_vec(encoded).map_err(|_| PasscodeError::InvalidSalt)?;
        let bytes: [u8; SALT_LENGTH] = bytes
            .try_into()
            .map_err(|_| PasscodeError::InvalidSalt)?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({})", self.to_base64())
    }
}

impl Serialize for Salt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Salt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

/// AES-256 key protecting the stored server share.
///
/// Derived from the passcode share, so both the passcode flow and the
/// backup+recovery flow (which rebuilds the passcode share) can open it.
pub struct PasscodeKey(Zeroizing<[u8; 32]>);

impl PasscodeKey {
    pub fn from_user_share(user_share: &[u8]) -> Result<Self, ShareError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(user_share)
            .map_err(|e| ShareError::Derivation(e.to_string()))?;
        mac.update(STORAGE_KEY_LABEL);

        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&mac.finalize().into_bytes());
        Ok(Self(key))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for PasscodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasscodeKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passcode_requires_six_digits() {
        assert!(Passcode::new("482913").is_ok());
        assert_eq!(Passcode::new("48291").unwrap_err(), PasscodeError::InvalidFormat);
        assert_eq!(Passcode::new("4829134").unwrap_err(), PasscodeError::InvalidFormat);
        assert_eq!(Passcode::new("48a913").unwrap_err(), PasscodeError::InvalidFormat);
        assert_eq!(Passcode::new("４８２９１３").unwrap_err(), PasscodeError::InvalidFormat);
    }

    #[test]
    fn passcode_debug_is_redacted() {
        let passcode = Passcode::new("123456").unwrap();
        assert_eq!(format!("{passcode:?}"), "Passcode(******)");
    }

    #[test]
    fn salt_base64_round_trip_and_validation() {
        let salt = Salt::generate();
        let decoded = Salt::from_base64(&salt.to_base64()).unwrap();
        assert_eq!(salt, decoded);

        assert_eq!(
            Salt::from_base64("not base64!").unwrap_err(),
            PasscodeError::InvalidSalt
        );
        assert_eq!(
            Salt::from_base64(&Base64::encode_string(&[1u8; 8])).unwrap_err(),
            PasscodeError::InvalidSalt
        );
    }

    #[test]
    fn storage_key_depends_on_share() {
        let one = PasscodeKey::from_user_share(&[1u8; 32]).unwrap();
        let same = PasscodeKey::from_user_share(&[1u8; 32]).unwrap();
        let other = PasscodeKey::from_user_share(&[2u8; 32]).unwrap();
        assert_eq!(one.as_bytes(), same.as_bytes());
        assert_ne!(one.as_bytes(), other.as_bytes());
    }
}
