// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! XOR share splitting and passcode share derivation.
//!
//! Keys are split 3-of-3: `part1 ⊕ part2 ⊕ part3 == secret`. Any strict
//! subset of the parts is uniformly random and reveals nothing. Losing one
//! part loses the key unless a recovery share was issued alongside it.

use argon2::{Algorithm, Argon2, Params, Version};
use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// A single key share. Wiped from memory on drop.
pub type Share = Zeroizing<Vec<u8>>;

/// Argon2id memory cost in KiB (19 MiB).
const PASSCODE_KDF_MEMORY_KIB: u32 = 19 * 1024;
/// Argon2id iteration count.
const PASSCODE_KDF_ITERATIONS: u32 = 2;
/// Argon2id lanes.
const PASSCODE_KDF_LANES: u32 = 1;

const SHARE_EXPAND_LABEL: &[u8] = b"relational-custody/passcode-share/v1";
const LEGACY_EXPAND_LABEL: &[u8] = b"relational-custody/legacy-share/v1";

/// Errors from share operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShareError {
    #[error("share lengths differ: {0}, {1}, {2}")]
    LengthMismatch(usize, usize, usize),

    #[error("secret must not be empty")]
    EmptySecret,

    #[error("key derivation failed: {0}")]
    Derivation(String),

    #[error("share is not valid base64")]
    Encoding,
}

/// Split a secret into three parts of equal length.
///
/// The first two parts are random; the third is `secret ⊕ part1 ⊕ part2`.
pub fn split(secret: &[u8]) -> Result<(Share, Share, Share), ShareError> {
    if secret.is_empty() {
        return Err(ShareError::EmptySecret);
    }

    let part1 = random_share(secret.len());
    let part2 = random_share(secret.len());
    let part3 = combine(secret, &part1, &part2)?;

    Ok((part1, part2, part3))
}

/// Split a secret around an already-fixed share.
///
/// Used when one share is re-derivable (the passcode share) and must not be
/// random. Returns `(random_part, computed_part)` such that
/// `fixed ⊕ random_part ⊕ computed_part == secret`.
pub fn split_with_share(secret: &[u8], fixed: &[u8]) -> Result<(Share, Share), ShareError> {
    if secret.is_empty() {
        return Err(ShareError::EmptySecret);
    }
    if fixed.len() != secret.len() {
        return Err(ShareError::LengthMismatch(
            secret.len(),
            fixed.len(),
            secret.len(),
        ));
    }

    let random_part = random_share(secret.len());
    let computed = combine(secret, fixed, &random_part)?;

    Ok((random_part, computed))
}

/// Recombine three shares with byte-wise XOR.
pub fn combine(part_a: &[u8], part_b: &[u8], part_c: &[u8]) -> Result<Share, ShareError> {
    if part_a.len() != part_b.len() || part_b.len() != part_c.len() {
        return Err(ShareError::LengthMismatch(
            part_a.len(),
            part_b.len(),
            part_c.len(),
        ));
    }

    let combined = part_a
        .iter()
        .zip(part_b)
        .zip(part_c)
        .map(|((a, b), c)| a ^ b ^ c)
        .collect::<Vec<u8>>();

    Ok(Zeroizing::new(combined))
}

/// XOR two equal-length shares.
pub fn xor_pair(left: &[u8], right: &[u8]) -> Result<Share, ShareError> {
    if left.len() != right.len() {
        return Err(ShareError::LengthMismatch(left.len(), right.len(), right.len()));
    }

    Ok(Zeroizing::new(
        left.iter().zip(right).map(|(a, b)| a ^ b).collect(),
    ))
}

/// Derive a reproducible share of `length` bytes from a passcode and salt.
///
/// Argon2id stretches the passcode into a 32-byte seed which is then
/// expanded to the requested length. Identical inputs always produce the
/// identical share; the share is never stored.
pub fn derive_share_from_passcode(
    passcode: &[u8],
    salt: &[u8],
    length: usize,
) -> Result<Share, ShareError> {
    let params = Params::new(
        PASSCODE_KDF_MEMORY_KIB,
        PASSCODE_KDF_ITERATIONS,
        PASSCODE_KDF_LANES,
        Some(32),
    )
    .map_err(|e| ShareError::Derivation(format!("invalid Argon2id params: {e}")))?;

    let mut seed = Zeroizing::new([0u8; 32]);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(passcode, salt, seed.as_mut())
        .map_err(|e| ShareError::Derivation(format!("Argon2id failed: {e}")))?;

    expand(seed.as_ref(), SHARE_EXPAND_LABEL, length)
}

/// Deterministic third share for wallets created before backup shares existed.
///
/// Computed from the passcode share and the decrypted server share.
pub fn legacy_third_share(user_share: &[u8], server_share: &[u8]) -> Result<Share, ShareError> {
    let mut hasher = Sha256::new();
    hasher.update(user_share);
    hasher.update(server_share);
    let digest = Zeroizing::new(hasher.finalize().to_vec());

    expand(&digest, LEGACY_EXPAND_LABEL, user_share.len())
}

/// HMAC-SHA256 counter-mode expansion of `seed` to `length` bytes.
fn expand(seed: &[u8], label: &[u8], length: usize) -> Result<Share, ShareError> {
    let mut output = Zeroizing::new(Vec::with_capacity(length));
    let mut counter: u32 = 0;

    while output.len() < length {
        let mut mac = Hmac::<Sha256>::new_from_slice(seed)
            .map_err(|e| ShareError::Derivation(e.to_string()))?;
        mac.update(label);
        mac.update(&counter.to_be_bytes());
        let block = mac.finalize().into_bytes();

        let take = (length - output.len()).min(block.len());
        output.extend_from_slice(&block[..take]);
        counter += 1;
    }

    Ok(output)
}

/// Text form of a share handed to the user for offline custody.
pub fn encode_share(share: &[u8]) -> Zeroizing<String> {
    Zeroizing::new(Base64::encode_string(share))
}

pub fn decode_share(encoded: &str) -> Result<Share, ShareError> {
    Base64::decode_vec(encoded.trim())
        .map(Zeroizing::new)
        .map_err(|_| ShareError::Encoding)
}

fn random_share(length: usize) -> Share {
    let mut bytes = Zeroizing::new(vec![0u8; length]);
    OsRng.fill_bytes(bytes.as_mut_slice());
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_then_combine_returns_secret() {
        for length in [1usize, 16, 32, 64, 97] {
            let mut secret = vec![0u8; length];
            OsRng.fill_bytes(&mut secret);

            let (a, b, c) = split(&secret).unwrap();
            assert_eq!(a.len(), length);
            assert_eq!(b.len(), length);
            assert_eq!(c.len(), length);

            let recovered = combine(&a, &b, &c).unwrap();
            assert_eq!(recovered.as_slice(), secret.as_slice());

            // Combination order does not matter.
            let recovered = combine(&c, &a, &b).unwrap();
            assert_eq!(recovered.as_slice(), secret.as_slice());
        }
    }

    #[test]
    fn split_rejects_empty_secret() {
        assert_eq!(split(&[]).unwrap_err(), ShareError::EmptySecret);
    }

    #[test]
    fn combine_rejects_mismatched_lengths() {
        let err = combine(&[1, 2, 3], &[1, 2], &[1, 2, 3]).unwrap_err();
        assert_eq!(err, ShareError::LengthMismatch(3, 2, 3));
    }

    #[test]
    fn split_with_share_keeps_fixed_part() {
        let secret = [7u8; 32];
        let fixed = [42u8; 32];

        let (random_part, computed) = split_with_share(&secret, &fixed).unwrap();
        let recovered = combine(&fixed, &random_part, &computed).unwrap();
        assert_eq!(recovered.as_slice(), &secret);
    }

    #[test]
    fn split_with_share_rejects_wrong_length() {
        assert!(matches!(
            split_with_share(&[1u8; 32], &[1u8; 16]),
            Err(ShareError::LengthMismatch(32, 16, 32))
        ));
    }

    #[test]
    fn two_shares_do_not_reveal_constant_secret() {
        // The same secret split many times: any fixed pair of parts must vary,
        // and each part's bytes must spread over the whole byte range.
        let secret = [0u8; 32];
        let mut seen_first_bytes = std::collections::HashSet::new();
        let mut pairs = std::collections::HashSet::new();

        for _ in 0..256 {
            let (a, b, c) = split(&secret).unwrap();
            seen_first_bytes.insert(c[0]);
            pairs.insert((a.to_vec(), b.to_vec()));
            // No single part equals the secret.
            assert_ne!(c.as_slice(), &secret);
        }

        assert_eq!(pairs.len(), 256);
        assert!(seen_first_bytes.len() > 128);
    }

    #[test]
    fn passcode_share_is_deterministic() {
        let salt = [9u8; 16];
        let first = derive_share_from_passcode(b"482913", &salt, 32).unwrap();
        let second = derive_share_from_passcode(b"482913", &salt, 32).unwrap();
        assert_eq!(first.as_slice(), second.as_slice());
        assert_eq!(first.len(), 32);
    }

    #[test]
    fn passcode_share_varies_with_passcode_and_salt() {
        let salt = [9u8; 16];
        let base = derive_share_from_passcode(b"482913", &salt, 32).unwrap();
        let other_code = derive_share_from_passcode(b"482914", &salt, 32).unwrap();
        let other_salt = derive_share_from_passcode(b"482913", &[8u8; 16], 32).unwrap();

        assert_ne!(base.as_slice(), other_code.as_slice());
        assert_ne!(base.as_slice(), other_salt.as_slice());
    }

    #[test]
    fn passcode_share_stretches_to_any_length() {
        let salt = [1u8; 16];
        let long = derive_share_from_passcode(b"000000", &salt, 80).unwrap();
        let short = derive_share_from_passcode(b"000000", &salt, 20).unwrap();
        assert_eq!(long.len(), 80);
        assert_eq!(&long[..20], short.as_slice());
    }

    #[test]
    fn legacy_third_share_matches_length_and_is_stable() {
        let user = [3u8; 32];
        let server = [4u8; 32];
        let one = legacy_third_share(&user, &server).unwrap();
        let two = legacy_third_share(&user, &server).unwrap();
        assert_eq!(one.len(), 32);
        assert_eq!(one.as_slice(), two.as_slice());
        assert_ne!(
            one.as_slice(),
            legacy_third_share(&server, &user).unwrap().as_slice()
        );
    }

    #[test]
    fn share_text_encoding() {
        let share = random_share(32);
        let text = encode_share(&share);
        assert_eq!(decode_share(&text).unwrap().as_slice(), share.as_slice());
        assert_eq!(decode_share("***").unwrap_err(), ShareError::Encoding);
    }

    #[test]
    fn xor_pair_is_self_inverse() {
        let a = [0x0fu8; 8];
        let b = [0xf1u8; 8];
        let x = xor_pair(&a, &b).unwrap();
        assert_eq!(xor_pair(&x, &b).unwrap().as_slice(), &a);
    }
}
