use ethers::types::H256;

use crate::errors::PayoutError;

/// Convert a decimal string to integer smallest units
///
/// Fixed-point only: fractional digits past `decimals` are truncated,
/// shorter fractions are zero-padded.
pub fn parse_units(amount: &str, decimals: u32) -> Result<u64, PayoutError> {
    let invalid = |reason: &'static str| PayoutError::InvalidAmount {
        amount: amount.to_string(),
        reason,
    };

    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty amount"));
    }

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (trimmed, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("no digits"));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("only digits and a single decimal point are allowed"));
    }

    let scale = 10u64
        .checked_pow(decimals)
        .ok_or_else(|| invalid("too many decimals"))?;

    let whole_units = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u64>()
            .map_err(|_| invalid("amount too large"))?
            .checked_mul(scale)
            .ok_or_else(|| invalid("amount too large"))?
    };

    let mut fraction_digits: String = fraction.chars().take(decimals as usize).collect();
    while fraction_digits.len() < decimals as usize {
        fraction_digits.push('0');
    }
    let fraction_units = if fraction_digits.is_empty() {
        0
    } else {
        fraction_digits
            .parse::<u64>()
            .map_err(|_| invalid("amount too large"))?
    };

    whole_units
        .checked_add(fraction_units)
        .ok_or_else(|| invalid("amount too large"))
}

/// Render integer smallest units as a decimal string, without trailing zeros
pub fn format_units(units: u64, decimals: u32) -> String {
    let Some(scale) = 10u64.checked_pow(decimals) else {
        return units.to_string();
    };
    let whole = units / scale;
    let fraction = units % scale;
    if fraction == 0 {
        return whole.to_string();
    }
    let padded = format!("{:0width$}", fraction, width = decimals as usize);
    format!("{}.{}", whole, padded.trim_end_matches('0'))
}

/// Block explorer link for a transaction
pub fn explorer_tx_url(explorer_base: &str, tx_hash: &H256) -> String {
    format!("{}/tx/{:#x}", explorer_base.trim_end_matches('/'), tx_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_units_normal() {
        assert_eq!(parse_units("10.00", 6).unwrap(), 10_000_000);
        assert_eq!(parse_units("2.5", 6).unwrap(), 2_500_000);
        assert_eq!(parse_units("7", 6).unwrap(), 7_000_000);
        assert_eq!(parse_units(" 1.25 ", 6).unwrap(), 1_250_000);
    }

    #[test]
    fn parse_units_smallest_unit() {
        assert_eq!(parse_units("0.000001", 6).unwrap(), 1);
        assert_eq!(parse_units(".000001", 6).unwrap(), 1);
    }

    #[test]
    fn parse_units_truncates_extra_precision() {
        // 7th decimal is dropped, not rounded
        assert_eq!(parse_units("0.0000019", 6).unwrap(), 1);
        assert_eq!(parse_units("1.9999999", 6).unwrap(), 1_999_999);
    }

    #[test]
    fn parse_units_zero() {
        assert_eq!(parse_units("0", 6).unwrap(), 0);
        assert_eq!(parse_units("0.00", 6).unwrap(), 0);
        assert_eq!(parse_units("0.0000001", 6).unwrap(), 0);
    }

    #[test]
    fn parse_units_rejects_garbage() {
        for bad in ["", " ", ".", "-1", "+1", "1.2.3", "1e6", "ten", "1,5"] {
            assert!(
                matches!(parse_units(bad, 6), Err(PayoutError::InvalidAmount { .. })),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn parse_units_rejects_overflow() {
        assert!(parse_units("18446744073709551615", 6).is_err());
        assert_eq!(
            parse_units("18446744073709.551615", 6).unwrap(),
            u64::MAX
        );
    }

    #[test]
    fn format_units_trims_zeros() {
        assert_eq!(format_units(10_000_000, 6), "10");
        assert_eq!(format_units(2_500_000, 6), "2.5");
        assert_eq!(format_units(3_333_334, 6), "3.333334");
        assert_eq!(format_units(1, 6), "0.000001");
        assert_eq!(format_units(0, 6), "0");
    }

    #[test]
    fn decimal_round_trip() {
        let units = parse_units("10.00", 6).unwrap();
        assert_eq!(units, 10_000_000);
        assert_eq!(format_units(units, 6), "10");
    }

    #[test]
    fn explorer_url_uses_full_hash() {
        let hash = H256::repeat_byte(0xab);
        let url = explorer_tx_url("https://sepolia.basescan.org/", &hash);
        assert_eq!(url, format!("https://sepolia.basescan.org/tx/0x{}", "ab".repeat(32)));
    }
}
