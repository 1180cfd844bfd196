// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Decimal amount strings to base units and back.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitsError {
    #[error("Invalid amount format: {0}")]
    InvalidFormat(String),

    #[error("Too many decimal places (max {0})")]
    TooManyDecimals(u8),

    #[error("Amount overflow")]
    Overflow,

    #[error("Amount must be greater than zero")]
    Zero,
}

/// Parse a human-readable amount (e.g. `"1.5"`) into base units.
pub fn parse_units(amount: &str, decimals: u8) -> Result<u128, UnitsError> {
    let amount = amount.trim();
    let (whole, fraction) = match amount.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (amount, ""),
    };

    let digits_only = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty() && fraction.is_empty()
        || !digits_only(whole)
        || !digits_only(fraction)
        || amount.ends_with('.')
    {
        return Err(UnitsError::InvalidFormat(amount.to_string()));
    }
    if fraction.len() > usize::from(decimals) {
        return Err(UnitsError::TooManyDecimals(decimals));
    }

    let multiplier = 10u128
        .checked_pow(u32::from(decimals))
        .ok_or(UnitsError::Overflow)?;
    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| UnitsError::Overflow)?
    };
    let fraction: u128 = if fraction.is_empty() {
        0
    } else {
        format!("{fraction:0<width$}", width = usize::from(decimals))
            .parse()
            .map_err(|_| UnitsError::Overflow)?
    };

    whole
        .checked_mul(multiplier)
        .and_then(|w| w.checked_add(fraction))
        .ok_or(UnitsError::Overflow)
}

/// Parse a strictly positive amount that must fit the primary chain's u64.
pub fn parse_positive_u64(amount: &str, decimals: u8) -> Result<u64, UnitsError> {
    let units = parse_units(amount, decimals)?;
    if units == 0 {
        return Err(UnitsError::Zero);
    }
    u64::try_from(units).map_err(|_| UnitsError::Overflow)
}

/// Format base units with trailing zeros trimmed.
pub fn format_units(amount: u128, decimals: u8) -> String {
    if amount == 0 {
        return "0".to_string();
    }
    let Some(divisor) = 10u128.checked_pow(u32::from(decimals)) else {
        return amount.to_string();
    };

    let whole = amount / divisor;
    let remainder = amount % divisor;
    if remainder == 0 {
        return whole.to_string();
    }

    let fraction = format!("{remainder:0>width$}", width = usize::from(decimals));
    format!("{whole}.{}", fraction.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_whole_and_fractional() {
        assert_eq!(parse_units("1", 6).unwrap(), 1_000_000);
        assert_eq!(parse_units("1.5", 6).unwrap(), 1_500_000);
        assert_eq!(parse_units("0.000001", 6).unwrap(), 1);
        assert_eq!(parse_units(".25", 2).unwrap(), 25);
        assert_eq!(parse_units("1", 18).unwrap(), 1_000_000_000_000_000_000);
        assert_eq!(parse_units("0.5", 9).unwrap(), 500_000_000);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(matches!(parse_units("1.2.3", 6), Err(UnitsError::InvalidFormat(_))));
        assert!(matches!(parse_units("abc", 6), Err(UnitsError::InvalidFormat(_))));
        assert!(matches!(parse_units("-1", 6), Err(UnitsError::InvalidFormat(_))));
        assert!(matches!(parse_units("", 6), Err(UnitsError::InvalidFormat(_))));
        assert!(matches!(parse_units("1.", 6), Err(UnitsError::InvalidFormat(_))));
        assert_eq!(parse_units("1.1234567", 6), Err(UnitsError::TooManyDecimals(6)));
        assert_eq!(
            parse_units("340282366920938463463374607431768211456", 0),
            Err(UnitsError::Overflow)
        );
    }

    #[test]
    fn positive_u64_bounds() {
        assert_eq!(parse_positive_u64("0", 6), Err(UnitsError::Zero));
        assert_eq!(parse_positive_u64("2", 9).unwrap(), 2_000_000_000);
        assert_eq!(
            parse_positive_u64("18446744073709551616", 0),
            Err(UnitsError::Overflow)
        );
    }

    #[test]
    fn format_trims_zeros() {
        assert_eq!(format_units(0, 6), "0");
        assert_eq!(format_units(1_000_000, 6), "1");
        assert_eq!(format_units(1_500_000, 6), "1.5");
        assert_eq!(format_units(1, 6), "0.000001");
        assert_eq!(format_units(1_234_567_890_000_000_000, 18), "1.23456789");
    }
}
