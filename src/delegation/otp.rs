// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! One-time claim codes for payment links.
//!
//! Codes are six decimal digits. Only `HMAC-SHA256(pepper, code)` is
//! persisted, hex encoded, so a leaked link record cannot be brute-forced
//! offline without the server pepper.

use std::fmt;

use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, Rng};
use sha2::Sha256;
use zeroize::Zeroizing;

pub const CODE_LENGTH: usize = 6;

/// A freshly issued code. Shown to the link creator once.
pub struct OneTimeCode(Zeroizing<String>);

impl OneTimeCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OneTimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OneTimeCode([REDACTED])")
    }
}

pub struct OtpHasher {
    keyed: Hmac<Sha256>,
}

impl OtpHasher {
    pub fn new(pepper: &[u8]) -> Result<Self, InvalidLength> {
        Ok(Self {
            keyed: <Hmac<Sha256> as Mac>::new_from_slice(pepper)?,
        })
    }

    pub fn generate(&self) -> OneTimeCode {
        let value: u32 = OsRng.gen_range(0..1_000_000);
        OneTimeCode(Zeroizing::new(format!("{value:06}")))
    }

    pub fn hash(&self, code: &str) -> String {
        alloy::primitives::hex::encode(self.mac(code).finalize().into_bytes())
    }

    /// Constant-time check of `code` against a stored hash.
    pub fn verify(&self, code: &str, stored_hash: &str) -> bool {
        if code.len() != CODE_LENGTH || !code.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        let Ok(expected) = alloy::primitives::hex::decode(stored_hash) else {
            return false;
        };
        self.mac(code).verify_slice(&expected).is_ok()
    }

    fn mac(&self, code: &str) -> Hmac<Sha256> {
        let mut mac = self.keyed.clone();
        mac.update(code.as_bytes());
        mac
    }
}

impl fmt::Debug for OtpHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtpHasher").finish_non_exhaustive()
    }
}
