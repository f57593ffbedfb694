//! # Utilities Module
//!
//! Helpers shared across the client: exact conversion between the
//! ledger's major currency unit and its indivisible minor unit, and a
//! few formatting helpers used in log output.
//!
//! ## Units
//!
//! | Unit | Value |
//! |------|-------|
//! | 1 major unit | 100,000,000 minor units |
//! | 1 minor unit | smallest indivisible amount |
//!
//! Every amount that reaches an allowance or a transfer is expressed in
//! minor units. Conversion never goes through floating point.

use crate::error::{Error, Result};

/// Minor units per major unit of native currency.
pub const MINOR_UNITS_PER_MAJOR: u64 = 100_000_000;

/// Number of fractional digits a major-unit amount may carry.
pub const MINOR_UNIT_DECIMALS: usize = 8;

/// Convert a whole number of major units to minor units.
///
/// ## Examples
///
/// ```rust
/// use royalty_transfer::utils::major_to_minor;
/// assert_eq!(major_to_minor(33).unwrap(), 3_300_000_000);
/// ```
pub fn major_to_minor(major: u64) -> Result<u64> {
    major
        .checked_mul(MINOR_UNITS_PER_MAJOR)
        .ok_or_else(|| Error::InvalidOperation(format!("Amount overflows: {} major units", major)))
}

/// Parse a decimal major-unit amount string into minor units.
///
/// Accepts `"33"`, `"3.3"`, `"0.00000001"` and thousands separators.
/// Rejects negative values, more than eight fractional digits and
/// anything that does not fit in a `u64`.
///
/// ## Examples
///
/// ```rust
/// use royalty_transfer::utils::parse_major;
/// assert_eq!(parse_major("3.3").unwrap(), 330_000_000);
/// assert_eq!(parse_major("1,000").unwrap(), 100_000_000_000);
/// ```
pub fn parse_major(amount_str: &str) -> Result<u64> {
    let cleaned = amount_str.trim().replace(',', "");
    let invalid = || Error::InvalidOperation(format!("Invalid amount: {}", amount_str));

    if cleaned.is_empty() || cleaned.starts_with('-') || cleaned.starts_with('+') {
        return Err(invalid());
    }

    let (whole, fraction) = match cleaned.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (cleaned.as_str(), ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if fraction.len() > MINOR_UNIT_DECIMALS {
        return Err(Error::InvalidOperation(format!(
            "Amount {} has more than {} fractional digits",
            amount_str, MINOR_UNIT_DECIMALS
        )));
    }

    let whole_value: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };

    let padded = format!("{:0<width$}", fraction, width = MINOR_UNIT_DECIMALS);
    let fraction_value: u64 = padded.parse().map_err(|_| invalid())?;

    major_to_minor(whole_value)?
        .checked_add(fraction_value)
        .ok_or_else(invalid)
}

/// Format a minor-unit amount as a major-unit decimal string.
///
/// Trailing fractional zeros are dropped.
///
/// ## Examples
///
/// ```rust
/// use royalty_transfer::utils::format_minor;
/// assert_eq!(format_minor(330_000_000), "3.3");
/// assert_eq!(format_minor(100_000_000), "1");
/// ```
pub fn format_minor(amount: u64) -> String {
    let whole = amount / MINOR_UNITS_PER_MAJOR;
    let fraction = amount % MINOR_UNITS_PER_MAJOR;

    if fraction == 0 {
        return whole.to_string();
    }

    let fraction_str = format!("{:0width$}", fraction, width = MINOR_UNIT_DECIMALS);
    format!("{}.{}", whole, fraction_str.trim_end_matches('0'))
}

/// Truncate a string to a maximum length.
///
/// Useful for logging long keys and encoded transactions. Lengths are
/// counted in characters, so multibyte text is never split mid-character.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len || max_len < 5 {
        return s.to_string();
    }
    let half = (max_len - 3) / 2;
    let head: String = s.chars().take(half).collect();
    let tail_start = s
        .char_indices()
        .rev()
        .nth(half - 1)
        .map(|(index, _)| index)
        .unwrap_or(0);
    format!("{}...{}", head, &s[tail_start..])
}
