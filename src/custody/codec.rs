// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Server share encryption at rest.
//!
//! Envelope layout: `version(1) || nonce(12) || ciphertext || tag(16)`,
//! persisted as base64. AES-256-GCM authenticates the share, so a wrong
//! passcode and a corrupted record both fail the same way.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64ct::{Base64, Encoding};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroizing;

use super::passcode::PasscodeKey;

const ENVELOPE_VERSION: u8 = 1;
const NONCE_LENGTH: usize = 12;
const TAG_LENGTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("share encryption failed")]
    EncryptionFailed,

    /// Wrong key, truncated envelope, tampered bytes or unknown version.
    #[error("share decryption failed")]
    DecryptionFailed,
}

/// An encrypted server share as stored.
#[derive(Clone, PartialEq, Eq)]
pub struct SealedShare(Vec<u8>);

impl SealedShare {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        Base64::encode_string(&self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CodecError> {
        Base64::decode_vec(encoded)
            .map(Self)
            .map_err(|_| CodecError::DecryptionFailed)
    }
}

impl std::fmt::Debug for SealedShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SealedShare({} bytes)", self.0.len())
    }
}

impl Serialize for SealedShare {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for SealedShare {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Encrypt a share under the passcode-derived key.
pub fn encrypt_for_storage(plaintext: &[u8], key: &PasscodeKey) -> Result<SealedShare, CodecError> {
    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| CodecError::EncryptionFailed)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CodecError::EncryptionFailed)?;

    let mut envelope = Vec::with_capacity(1 + NONCE_LENGTH + ciphertext.len());
    envelope.push(ENVELOPE_VERSION);
    envelope.extend_from_slice(nonce.as_slice());
    envelope.extend_from_slice(&ciphertext);

    Ok(SealedShare(envelope))
}

/// Decrypt a stored share. Never returns unauthenticated bytes.
pub fn decrypt_from_storage(
    sealed: &SealedShare,
    key: &PasscodeKey,
) -> Result<Zeroizing<Vec<u8>>, CodecError> {
    let bytes = sealed.as_bytes();
    if bytes.len() < 1 + NONCE_LENGTH + TAG_LENGTH || bytes[0] != ENVELOPE_VERSION {
        return Err(CodecError::DecryptionFailed);
    }

    let (nonce, ciphertext) = bytes[1..].split_at(NONCE_LENGTH);
    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| CodecError::DecryptionFailed)?;

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| CodecError::DecryptionFailed)
}
