//! Exact conversion between human decimal amounts and smallest units.
//!
//! Amounts cross this boundary exactly once, on the way in. Everything past
//! it is an integer number of smallest units: `floor(amount * 10^decimals)`,
//! computed on the decimal digits so `1.005` at 6 decimals is `1_005_000`
//! rather than whatever the nearest binary float happens to be.

use crate::error::{Error, Result};

/// Largest exponent shift accepted before the value is treated as overflow.
const MAX_SHIFT: i64 = 64;

/// Convert a decimal string to smallest units, rounding toward zero.
///
/// Accepts plain (`"5"`, `"5.0"`, `".5"`) and exponent (`"1e-3"`) notation.
///
/// # Errors
///
/// Returns [`Error::Validation`] for negative, malformed or out-of-range input.
pub fn to_smallest_unit(amount: &str, decimals: u8) -> Result<u64> {
    let amount = amount.trim();
    if amount.starts_with('-') {
        return Err(Error::Validation(format!("amount must not be negative: {amount}")));
    }

    let (mantissa, exponent) = match amount.find(['e', 'E']) {
        Some(pos) => {
            let exp: i64 = amount[pos + 1..]
                .parse()
                .map_err(|_| Error::Validation(format!("malformed amount: {amount}")))?;
            (&amount[..pos], exp)
        }
        None => (amount, 0),
    };

    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let valid_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty())
        || !valid_digits(int_part)
        || !valid_digits(frac_part)
    {
        return Err(Error::Validation(format!("malformed amount: {amount}")));
    }

    let mut digits: String = format!("{int_part}{frac_part}")
        .trim_start_matches('0')
        .to_string();
    let frac_len = i64::try_from(frac_part.len())
        .map_err(|_| Error::Validation(format!("malformed amount: {amount}")))?;
    let shift = i64::from(decimals)
        .saturating_add(exponent)
        .saturating_sub(frac_len);

    if digits.is_empty() {
        return Ok(0);
    }

    if shift >= 0 {
        if shift > MAX_SHIFT {
            return Err(out_of_range(amount));
        }
        let zeros = usize::try_from(shift).map_err(|_| out_of_range(amount))?;
        digits.push_str(&"0".repeat(zeros));
    } else {
        let drop = usize::try_from(shift.saturating_neg()).unwrap_or(usize::MAX);
        if drop >= digits.len() {
            return Ok(0);
        }
        digits.truncate(digits.len() - drop);
    }

    digits.parse::<u64>().map_err(|_| out_of_range(amount))
}

/// Render smallest units as a decimal string without trailing zeros.
#[must_use]
pub fn from_smallest_unit(value: u64, decimals: u8) -> String {
    let decimals = usize::from(decimals);
    if decimals == 0 {
        return value.to_string();
    }
    let raw = format!("{value:0>width$}", width = decimals + 1);
    let (int_part, frac_part) = raw.split_at(raw.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac_part}")
    }
}

fn out_of_range(amount: &str) -> Error {
    Error::Validation(format!("amount out of range: {amount}"))
}
