//! Exact decimal amounts for record balances.
//!
//! Uses `rust_decimal` internally so that balances are added without any
//! floating-point intermediate. Text is the only external representation:
//! amounts are parsed from text at the store and wire boundaries and
//! formatted back to text when written.
//!
//! Every value `parse` accepts is held exactly, and every value `add`
//! returns formats back to text that `parse` accepts. Text or sums that
//! would need rounding to fit are rejected as `InvalidAmount`.

use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Most fractional digits a `rust_decimal` value carries.
const MAX_SCALE: i64 = 28;

/// Most significant digits a 96-bit mantissa can hold. Values with this many
/// digits may still be out of range; `Decimal` has the final say.
const MAX_DIGITS: usize = 29;

/// Longest exponent accepted, in digits.
const MAX_EXPONENT_DIGITS: usize = 6;

/// An exact decimal amount.
///
/// The scale of the parsed text is preserved, so `"100.00"` formats back as
/// `"100.00"` and adding `"50.00"` yields `"150.00"`.
///
/// # Examples
///
/// ```
/// use ledger_store::Amount;
///
/// let a: Amount = "10.50".parse().unwrap();
/// let b: Amount = "-0.25".parse().unwrap();
/// assert_eq!(a.checked_add(b).unwrap().to_string(), "10.25");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    /// Zero value.
    pub const ZERO: Self = Amount(Decimal::ZERO);

    /// Wraps a `Decimal`, folding negative zero into zero.
    pub fn new(value: Decimal) -> Self {
        let mut value = value;
        if value.is_zero() {
            value.set_sign_positive(true);
        }
        Amount(value)
    }

    /// Returns the underlying decimal.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Returns `true` if this value is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Exact addition.
    ///
    /// The sum carries the larger of the two scales. Fails if it does not fit
    /// at that scale: `rust_decimal` would otherwise round it.
    pub fn checked_add(self, rhs: Self) -> Result<Self> {
        let scale = self.0.scale().max(rhs.0.scale());
        let sum = self
            .0
            .checked_add(rhs.0)
            .ok_or_else(|| self.sum_error(rhs, "sum out of range"))?;

        let exact = sum.scale() == scale && sum.checked_sub(rhs.0) == Some(self.0);
        if !exact {
            return Err(self.sum_error(rhs, "sum needs more digits than an amount holds"));
        }

        Ok(Amount::new(sum))
    }

    fn sum_error(self, rhs: Self, reason: &str) -> LedgerError {
        LedgerError::invalid_amount(&format!("{} + {}", self, rhs), reason)
    }
}

/// Parses decimal text into an exact amount.
///
/// Accepts an optional sign, an integer part, an optional fractional part and
/// an optional exponent (`1.5e3`). Surrounding whitespace is ignored.
///
/// Fails with `InvalidAmount` if the text is malformed or if its value cannot
/// be held without rounding: more than 28 places after the point (trailing
/// zeros aside) or a magnitude beyond the 96-bit mantissa.
pub fn parse(text: &str) -> Result<Amount> {
    let numeral =
        scan_numeral(text.trim()).map_err(|reason| LedgerError::invalid_amount(text, reason))?;
    numeral
        .to_decimal()
        .map(Amount::new)
        .map_err(|reason| LedgerError::invalid_amount(text, reason))
}

/// Exact addition of two amounts.
pub fn add(a: Amount, b: Amount) -> Result<Amount> {
    a.checked_add(b)
}

/// Canonical text form, accepted back by [`parse`].
pub fn format(x: Amount) -> String {
    x.to_string()
}

/// A numeral split into its parts: `digits * 10^(exponent - fraction_len)`.
struct Numeral {
    negative: bool,
    digits: String,
    fraction_len: usize,
    exponent: i64,
}

impl Numeral {
    fn to_decimal(&self) -> std::result::Result<Decimal, String> {
        let mut scale = self.fraction_len as i64 - self.exponent;
        let mut digits = self.digits.trim_start_matches('0').to_string();

        if digits.is_empty() {
            return Decimal::try_from_i128_with_scale(0, scale.clamp(0, MAX_SCALE) as u32)
                .map_err(|e| e.to_string());
        }

        while scale > MAX_SCALE && digits.ends_with('0') {
            digits.pop();
            scale -= 1;
        }
        if scale > MAX_SCALE {
            return Err(format!("more than {} decimal places", MAX_SCALE));
        }
        if scale < 0 {
            if digits.len() as i64 - scale > MAX_DIGITS as i64 {
                return Err("value out of range".to_string());
            }
            digits.extend(std::iter::repeat('0').take(-scale as usize));
            scale = 0;
        }
        if digits.len() > MAX_DIGITS {
            return Err("too many significant digits".to_string());
        }

        let magnitude: i128 = digits.parse().map_err(|_| "value out of range".to_string())?;
        let mantissa = if self.negative { -magnitude } else { magnitude };
        Decimal::try_from_i128_with_scale(mantissa, scale as u32).map_err(|e| e.to_string())
    }
}

/// Splits text of the form `[+-]digits[.digits][(e|E)[+-]digits]`.
///
/// `rust_decimal` alone is more lenient (it accepts `_` separators, for one)
/// and rounds what it cannot hold, so the numeral is taken apart here and
/// built into a `Decimal` only once it is known to fit.
fn scan_numeral(s: &str) -> std::result::Result<Numeral, &'static str> {
    if s.is_empty() {
        return Err("empty amount");
    }

    let bytes = s.as_bytes();
    let mut pos = 0;

    let negative = bytes[pos] == b'-';
    if matches!(bytes[pos], b'+' | b'-') {
        pos += 1;
    }

    let int_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos == int_start {
        return Err("missing integer digits");
    }
    let mut digits = s[int_start..pos].to_string();

    let mut fraction_len = 0;
    if pos < bytes.len() && bytes[pos] == b'.' {
        pos += 1;
        let frac_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        if pos == frac_start {
            return Err("missing fractional digits");
        }
        fraction_len = pos - frac_start;
        digits.push_str(&s[frac_start..pos]);
    }

    let mut exponent = 0;
    if pos < bytes.len() && matches!(bytes[pos], b'e' | b'E') {
        pos += 1;
        let exp_negative = pos < bytes.len() && bytes[pos] == b'-';
        if pos < bytes.len() && matches!(bytes[pos], b'+' | b'-') {
            pos += 1;
        }
        let exp_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        if pos == exp_start {
            return Err("malformed exponent");
        }
        let exp_digits = s[exp_start..pos].trim_start_matches('0');
        if exp_digits.len() > MAX_EXPONENT_DIGITS {
            return Err("exponent out of range");
        }
        let magnitude: i64 = exp_digits.parse().unwrap_or(0);
        exponent = if exp_negative { -magnitude } else { magnitude };
    }

    if pos != bytes.len() {
        return Err("unexpected character");
    }

    Ok(Numeral {
        negative,
        digits,
        fraction_len,
        exponent,
    })
}

impl FromStr for Amount {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        parse(s)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(*self))
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    fn dec(s: &str) -> Amount {
        parse(s).unwrap()
    }

    /// Renders `mantissa * 10^-scale` without going through `rust_decimal`.
    fn to_text(mantissa: i128, scale: u32) -> String {
        let sign = if mantissa < 0 { "-" } else { "" };
        let digits = mantissa.unsigned_abs().to_string();
        if scale == 0 {
            return format!("{}{}", sign, digits);
        }
        let scale = scale as usize;
        let padded = format!("{:0>width$}", digits, width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        format!("{}{}.{}", sign, int_part, frac_part)
    }

    #[test]
    fn test_parse_preserves_scale() {
        assert_eq!(dec("100.00").to_string(), "100.00");
        assert_eq!(dec("1.5").to_string(), "1.5");
        assert_eq!(dec("42").to_string(), "42");
        assert_eq!(dec("  2.50  ").to_string(), "2.50");
        assert_eq!(dec("+7.25").to_string(), "7.25");
    }

    #[test]
    fn test_parse_exponent_forms() {
        assert_eq!(dec("1.5e3"), dec("1500"));
        assert_eq!(dec("25E-2"), dec("0.25"));
        assert_eq!(dec("-1e+2"), dec("-100"));
    }

    #[test]
    fn test_parse_rejects_malformed_text() {
        for bad in [
            "", "   ", "abc", "1.2.3", "1,000", "1_000", "--1", "+-1", "1e", "1e+", "1.5ee2",
            ".5", "5.", "12a", "NaN", "inf", "0x10",
        ] {
            let err = parse(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidAmount, "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_parse_rejects_digits_beyond_precision() {
        let err = parse("0.12345678901234567890123456789").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);

        assert!(parse("0.1234567890123456789012345678").is_ok());
    }

    #[test]
    fn test_parse_rejects_places_that_would_round_away() {
        for bad in [
            "0.00000000000000000000000000001",
            "0.000000000000000000000000000015",
            "-0.00000000000000000000000000009",
            "1e-29",
            "12.5e-28",
        ] {
            let err = parse(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidAmount, "accepted {:?}", bad);
        }

        assert_eq!(
            format(dec("0.0000000000000000000000000001")),
            "0.0000000000000000000000000001"
        );
        assert_eq!(format(dec("1.2e-27")), "0.0000000000000000000000000012");
    }

    #[test]
    fn test_parse_drops_only_trailing_zeros_past_max_scale() {
        assert_eq!(
            format(dec("1.000000000000000000000000000000")),
            "1.0000000000000000000000000000"
        );
        assert_eq!(
            format(dec("0.000000000000000000000000000000")),
            "0.0000000000000000000000000000"
        );
    }

    #[test]
    fn test_parse_accepts_full_mantissa_range() {
        assert_eq!(
            format(dec("79228162514264337593543950335")),
            "79228162514264337593543950335"
        );
        assert_eq!(
            format(dec("-7.9228162514264337593543950335")),
            "-7.9228162514264337593543950335"
        );
        assert_eq!(
            format(dec("7.9228162514264337593543950335e28")),
            "79228162514264337593543950335"
        );

        for bad in [
            "79228162514264337593543950336",
            "100000000000000000000000000000",
            "1e29",
            "1e999999",
            "1e9999999999",
        ] {
            let err = parse(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidAmount, "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_parse_zero_with_large_exponent() {
        assert_eq!(format(dec("0e100")), "0");
        assert_eq!(format(dec("-0.0e-5")), "0.000000");
    }

    #[test]
    fn test_add_is_exact() {
        assert_eq!(add(dec("0.1"), dec("0.2")).unwrap().to_string(), "0.3");
        assert_eq!(add(dec("100.00"), dec("50.00")).unwrap().to_string(), "150.00");
        assert_eq!(add(dec("100.00"), dec("-30.00")).unwrap().to_string(), "70.00");
        assert_eq!(add(dec("1"), dec("0.005")).unwrap().to_string(), "1.005");
    }

    #[test]
    fn test_negative_zero_is_identity() {
        let balance = dec("0.00");
        let sum = add(balance, dec("-0")).unwrap();
        assert_eq!(format(sum), "0.00");

        let balance = dec("12.34");
        assert_eq!(format(add(balance, dec("-0")).unwrap()), "12.34");
    }

    #[test]
    fn test_add_and_subtract_restores_original() {
        let original = dec("73.10");
        let up = add(original, dec("10.50")).unwrap();
        let back = add(up, dec("-10.50")).unwrap();
        assert_eq!(format(back), "73.10");
    }

    #[test]
    fn test_add_overflow_is_invalid_amount() {
        let max = Amount::new(Decimal::MAX);
        let err = add(max, dec("1")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
    }

    #[test]
    fn test_add_rejects_sums_that_would_round() {
        let cases = [
            ("9999999999999999999999999999", "0.01"),
            ("1000000000000000000000000000", "0.0001"),
            ("79228162514264337593543950335", "0.5"),
            ("0.1234567890123456789012345678", "10"),
        ];

        for (a, b) in cases {
            let err = add(dec(a), dec(b)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidAmount, "{} + {}", a, b);
        }
    }

    #[test]
    fn test_add_with_widest_mantissa_formats_back_to_parseable_text() {
        let sum = add(dec("0.1234567890123456789012345678"), dec("1")).unwrap();
        assert_eq!(format(sum), "1.1234567890123456789012345678");
        assert_eq!(parse(&format(sum)).unwrap(), sum);

        let sum = add(dec("79228162514264337593543950334"), dec("1")).unwrap();
        assert_eq!(format(sum), "79228162514264337593543950335");
        assert_eq!(parse(&format(sum)).unwrap(), sum);
    }

    #[test]
    fn test_serde_uses_text() {
        #[derive(Serialize, Deserialize)]
        struct Row {
            money: Amount,
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(Row { money: dec("5.10") }).unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(out, "money\n5.10\n");

        let mut reader = csv::Reader::from_reader("money\nx1\n".as_bytes());
        let bad: std::result::Result<Row, _> = reader.deserialize().next().unwrap();
        assert!(bad.is_err());
    }

    const MAX_MANTISSA: i128 = 79_228_162_514_264_337_593_543_950_335;

    fn mantissa() -> impl Strategy<Value = i128> {
        prop_oneof![
            -1_000_000_000i128..1_000_000_000i128,
            -MAX_MANTISSA..=MAX_MANTISSA,
        ]
    }

    fn fits(mantissa: i128) -> bool {
        mantissa.unsigned_abs() <= MAX_MANTISSA as u128
    }

    proptest! {
        #[test]
        fn prop_add_is_exact_or_rejected(
            ma in mantissa(),
            sa in 0u32..=28,
            mb in mantissa(),
            sb in 0u32..=28,
        ) {
            let a = parse(&to_text(ma, sa)).unwrap();
            let b = parse(&to_text(mb, sb)).unwrap();

            let scale = sa.max(sb);
            let aligned_a = ma.checked_mul(10i128.pow(scale - sa));
            let aligned_b = mb.checked_mul(10i128.pow(scale - sb));
            let expected = aligned_a
                .zip(aligned_b)
                .and_then(|(x, y)| x.checked_add(y));

            match (add(a, b), expected) {
                (Ok(sum), Some(expected)) => {
                    let reparsed = parse(&format(sum)).unwrap();
                    prop_assert_eq!(format(reparsed), to_text(expected, scale));
                }
                (Ok(sum), None) => {
                    prop_assert!(false, "{} + {} gave {}, which cannot be exact", a, b, sum);
                }
                (Err(e), expected) => {
                    prop_assert_eq!(e.kind(), ErrorKind::InvalidAmount);
                    let operands_fit =
                        aligned_a.map_or(false, fits) && aligned_b.map_or(false, fits);
                    if operands_fit {
                        prop_assert!(
                            !expected.map_or(false, fits),
                            "rejected representable sum {} + {}",
                            a,
                            b
                        );
                    }
                }
            }
        }
    }
}
