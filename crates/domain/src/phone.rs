//! Phone normalization for outbound messaging.
//!
//! Every outbound channel dials the canonical digits-only form, either as
//! the `wa.me/<digits>` deep-link prefix or as an SMS gateway `to` field.

use serde::{Deserialize, Serialize};

/// Rwanda's country calling code, applied to national and bare
/// subscriber numbers.
const COUNTRY_CODE: &str = "250";

/// Length of a bare subscriber number without trunk prefix or country
/// code (e.g. `788123456`).
const SUBSCRIBER_DIGITS: usize = 9;

/// A normalized, digits-only dialable phone number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalPhone(String);

impl CanonicalPhone {
    /// Returns the digit string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the phone into its digit string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CanonicalPhone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for CanonicalPhone {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Converts heterogeneous phone input into a canonical dialable string.
///
/// Strips everything except digits (a leading `+` is dropped), then:
/// a leading national trunk `0` is replaced by `250`; a bare 9-digit
/// subscriber number gets `250` prepended; anything else passes through
/// untouched, assumed already international. Returns `None` when no
/// digits remain.
///
/// The function is idempotent: normalizing an already-normalized number
/// yields the same value. Short inputs without a recognizable prefix
/// pass through best-effort and are not validated as dialable.
pub fn normalize(raw: &str) -> Option<CanonicalPhone> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    let canonical = if let Some(rest) = digits.strip_prefix('0') {
        format!("{COUNTRY_CODE}{rest}")
    } else if !digits.starts_with(COUNTRY_CODE) && digits.len() == SUBSCRIBER_DIGITS {
        format!("{COUNTRY_CODE}{digits}")
    } else {
        digits
    };

    Some(CanonicalPhone(canonical))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digits(raw: &str) -> String {
        normalize(raw).unwrap().into_string()
    }

    #[test]
    fn test_national_trunk_prefix_becomes_country_code() {
        assert_eq!(digits("0788123456"), "250788123456");
        assert_eq!(digits("0722000111"), "250722000111");
    }

    #[test]
    fn test_bare_subscriber_number_gets_country_code() {
        assert_eq!(digits("788123456"), "250788123456");
    }

    #[test]
    fn test_international_forms_pass_through() {
        assert_eq!(digits("+250788123456"), "250788123456");
        assert_eq!(digits("250788123456"), "250788123456");
        // Different country, already international: left alone.
        assert_eq!(digits("+4915112345678"), "4915112345678");
    }

    #[test]
    fn test_formatting_characters_are_discarded() {
        assert_eq!(digits("+250 788 123-456"), "250788123456");
        assert_eq!(digits("(078) 812-3456"), "250788123456");
        assert_eq!(digits("call 0788123456 now"), "250788123456");
    }

    #[test]
    fn test_blank_and_non_numeric_input_is_invalid() {
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("   "), None);
        assert_eq!(normalize("+"), None);
        assert_eq!(normalize("no digits here"), None);
    }

    #[test]
    fn test_short_numbers_pass_through_unvalidated() {
        assert_eq!(digits("12345"), "12345");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in [
            "0788123456",
            "788123456",
            "+250788123456",
            "250788123456",
            "12345",
            "+4915112345678",
        ] {
            let once = digits(raw);
            assert_eq!(digits(&once), once, "not idempotent for {raw:?}");
        }
    }
}
