//! Exact conversion between human decimal amounts and on-chain integers.
//!
//! Uses `rust_decimal` for input so that values like `0.1` are represented
//! exactly, then scales into `U256` smallest-denomination units. No floating
//! point is involved at any stage.

use alloy::primitives::U256;
use rust_decimal::Decimal;

use crate::error::{CoreError, Result};

/// Decimals of the native currency and its wrapped fungible representation.
pub const NATIVE_DECIMALS: u32 = 18;

/// Largest unit exponent accepted (10^77 is the largest power of ten below 2^256).
const MAX_DECIMALS: u32 = 77;

fn pow10(exp: u32) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}

/// Convert a decimal amount into smallest-denomination units.
///
/// `parse_units(dec!(0.1), 18)` returns `100_000_000_000_000_000`.
///
/// # Errors
/// Returns `CoreError::InvalidAmount` if the value is negative, carries more
/// fractional digits than `decimals` allows, or overflows `U256`.
pub fn parse_units(value: Decimal, decimals: u32) -> Result<U256> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(CoreError::InvalidAmount(format!(
            "negative amount {value}"
        )));
    }
    if decimals > MAX_DECIMALS {
        return Err(CoreError::InvalidAmount(format!(
            "unsupported decimals {decimals}"
        )));
    }

    let normalized = value.normalize();
    let scale = normalized.scale();
    if scale > decimals {
        return Err(CoreError::InvalidAmount(format!(
            "{value} has more than {decimals} fractional digits"
        )));
    }

    // Non-negative here, so the mantissa fits in u128.
    let mantissa = U256::from(normalized.mantissa().unsigned_abs());
    mantissa
        .checked_mul(pow10(decimals - scale))
        .ok_or_else(|| CoreError::InvalidAmount(format!("{value} overflows 256 bits")))
}

/// Format smallest-denomination units as a decimal string.
///
/// Trailing fractional zeros are trimmed: `format_units(10^17, 18) == "0.1"`.
///
/// # Errors
/// Returns `CoreError::InvalidAmount` if `decimals` exceeds 77.
pub fn format_units(amount: U256, decimals: u32) -> Result<String> {
    if decimals > MAX_DECIMALS {
        return Err(CoreError::InvalidAmount(format!(
            "unsupported decimals {decimals}"
        )));
    }
    if decimals == 0 {
        return Ok(amount.to_string());
    }
    let unit = pow10(decimals);
    let whole = amount / unit;
    let frac = amount % unit;
    if frac.is_zero() {
        return Ok(whole.to_string());
    }
    let frac_str = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    Ok(format!("{}.{}", whole, frac_str.trim_end_matches('0')))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_tenth_of_native() {
        let wei = parse_units(dec!(0.1), NATIVE_DECIMALS).unwrap();
        assert_eq!(wei, U256::from(100_000_000_000_000_000u128));
    }

    #[test]
    fn test_parse_whole_and_trailing_zeros() {
        assert_eq!(parse_units(dec!(2), 0).unwrap(), U256::from(2u64));
        assert_eq!(parse_units(dec!(1.500), 3).unwrap(), U256::from(1500u64));
        assert_eq!(parse_units(dec!(0), 18).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_parse_rejects_excess_precision() {
        let result = parse_units(dec!(0.0001), 3);
        assert!(matches!(result, Err(CoreError::InvalidAmount(_))));
    }

    #[test]
    fn test_parse_rejects_negative() {
        let result = parse_units(dec!(-1), 18);
        assert!(matches!(result, Err(CoreError::InvalidAmount(_))));
    }

    #[test]
    fn test_sum_is_exact() {
        // 0.1 + 0.2 must be exactly 0.3 in wei
        let a = parse_units(dec!(0.1), 18).unwrap();
        let b = parse_units(dec!(0.2), 18).unwrap();
        assert_eq!(a + b, parse_units(dec!(0.3), 18).unwrap());
    }

    #[test]
    fn test_format_units() {
        let fmt = |amount: u128, decimals| format_units(U256::from(amount), decimals).unwrap();
        assert_eq!(fmt(100_000_000_000_000_000, 18), "0.1");
        assert_eq!(fmt(2_000_000_000_000_000_000, 18), "2");
        assert_eq!(fmt(1_050_000, 6), "1.05");
        assert_eq!(fmt(7, 0), "7");
        assert_eq!(fmt(1, 18), "0.000000000000000001");
        assert_eq!(fmt(1, 77), format!("0.{}1", "0".repeat(76)));
    }

    #[test]
    fn test_format_rejects_oversized_decimals() {
        assert!(matches!(
            format_units(U256::from(1u8), 78),
            Err(CoreError::InvalidAmount(_))
        ));
        assert!(parse_units(dec!(1), 78).is_err());
    }
}
