//! Card number validation and masking helpers.
//!
//! Used by the tokenization boundary to reject unreadable captures before
//! they reach the backend, and to derive the masked PAN surfaced to hosts.

use chrono::{Datelike, Utc};

/// Minimum PAN length accepted by the tokenizer.
pub const MIN_PAN_LENGTH: usize = 13;

/// Maximum PAN length accepted by the tokenizer.
pub const MAX_PAN_LENGTH: usize = 19;

/// Validate a primary account number.
///
/// Accepts 13-19 digit numbers that pass the Luhn check. Non-digit input is
/// rejected rather than normalized; the reader delivers digits only, so
/// anything else indicates a corrupted read.
#[must_use]
pub fn validate_pan(pan: &str) -> bool {
    let len = pan.len();
    if !(MIN_PAN_LENGTH..=MAX_PAN_LENGTH).contains(&len) {
        return false;
    }
    if !pan.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    luhn_checksum(pan) == 0
}

/// Validate a card verification value (3 or 4 digits).
#[must_use]
pub fn validate_cvv(cvv: &str) -> bool {
    matches!(cvv.len(), 3 | 4) && cvv.bytes().all(|b| b.is_ascii_digit())
}

/// Validate an `MM/YY` expiration date against the current month.
///
/// A card expiring this month is still valid.
#[must_use]
pub fn validate_expiry(expiry: &str) -> bool {
    let Some((month, year)) = expiry.split_once('/') else {
        return false;
    };
    if month.len() != 2 || year.len() != 2 {
        return false;
    }
    let (Ok(month), Ok(year)) = (month.parse::<u32>(), year.parse::<i32>()) else {
        return false;
    };
    if !(1..=12).contains(&month) {
        return false;
    }

    let now = Utc::now();
    let year = 2000 + year;
    year > now.year() || (year == now.year() && month >= now.month())
}

/// Mask a PAN, keeping only the last four digits.
///
/// ```
/// use cardlink_core::card::masked_pan;
///
/// assert_eq!(masked_pan("4111111111111111"), "************1111");
/// ```
#[must_use]
pub fn masked_pan(pan: &str) -> String {
    let keep = pan.len().saturating_sub(4);
    let mut masked = "*".repeat(keep);
    masked.push_str(&pan[keep..]);
    masked
}

/// Luhn checksum over a digit string; zero means valid.
fn luhn_checksum(digits: &str) -> u32 {
    let mut sum = 0;
    for (i, b) in digits.bytes().rev().enumerate() {
        let mut digit = u32::from(b - b'0');
        if i % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }
    sum % 10
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("4111111111111111")] // Visa test number
    #[case("5500005555555559")] // Mastercard test number
    #[case("371449635398431")] // Amex test number (15 digits)
    #[case("6011000990139424")] // Discover test number
    fn test_validate_pan_accepts_known_test_numbers(#[case] pan: &str) {
        assert!(validate_pan(pan));
    }

    #[rstest]
    #[case("4111111111111112")] // failed checksum
    #[case("411111111111")] // too short
    #[case("41111111111111111111")] // too long
    #[case("4111 1111 1111 1111")] // embedded spaces
    #[case("411111111111111a")] // non-digit
    #[case("")]
    fn test_validate_pan_rejects_invalid(#[case] pan: &str) {
        assert!(!validate_pan(pan));
    }

    #[rstest]
    #[case("123", true)]
    #[case("1234", true)]
    #[case("12", false)]
    #[case("12345", false)]
    #[case("12a", false)]
    fn test_validate_cvv(#[case] cvv: &str, #[case] valid: bool) {
        assert_eq!(validate_cvv(cvv), valid);
    }

    #[test]
    fn test_validate_expiry_accepts_future_dates() {
        assert!(validate_expiry("12/99"));
    }

    #[rstest]
    #[case("13/30")] // invalid month
    #[case("00/30")]
    #[case("1/30")] // missing zero padding
    #[case("12/2030")] // four digit year
    #[case("1230")] // missing separator
    #[case("01/20")] // in the past
    fn test_validate_expiry_rejects_invalid(#[case] expiry: &str) {
        assert!(!validate_expiry(expiry));
    }

    #[test]
    fn test_masked_pan_keeps_last_four() {
        assert_eq!(masked_pan("4111111111111111"), "************1111");
        assert_eq!(masked_pan("371449635398431"), "***********8431");
    }

    #[test]
    fn test_masked_pan_short_input() {
        assert_eq!(masked_pan("123"), "123");
    }
}
