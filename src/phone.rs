//! Phone number canonicalization.
//!
//! Every place that touches a phone number — registration, login,
//! payment initiation — goes through [`normalize`]. The provider-facing
//! MSISDN form is a separate canonical form produced by [`to_msisdn`].

use crate::error::AppError;

pub const COUNTRY_PREFIX: &str = "+254";
const MSISDN_PREFIX: &str = "254";
const MSISDN_LEN: usize = 12;

/// Canonicalize a raw user-entered phone number into the identity key
/// `+254[17]XXXXXXXX`.
///
/// Accepted input shapes: `07XXXXXXXX` / `01XXXXXXXX`, bare `7XXXXXXXX` /
/// `1XXXXXXXX`, and the already-canonical `+2547XXXXXXXX` form.
/// Idempotent on canonical input.
pub fn normalize(raw: &str) -> Result<String, AppError> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|ch| ch.is_ascii_digit() || *ch == '+')
        .collect();

    if cleaned.is_empty() {
        return Err(AppError::InvalidFormat("Phone number is required".into()));
    }

    let canonical = if let Some(rest) = cleaned.strip_prefix('0') {
        format!("{COUNTRY_PREFIX}{rest}")
    } else if cleaned.starts_with('7') || cleaned.starts_with('1') {
        format!("{COUNTRY_PREFIX}{cleaned}")
    } else if cleaned.starts_with(COUNTRY_PREFIX) {
        cleaned
    } else {
        return Err(AppError::InvalidFormat(
            "Phone number must be in format 7XXXXXXXX or +2547XXXXXXXX".into(),
        ));
    };

    if !is_canonical(&canonical) {
        return Err(AppError::InvalidFormat(
            "Phone number must be in format 7XXXXXXXX or +2547XXXXXXXX".into(),
        ));
    }

    Ok(canonical)
}

/// `+254[17]` followed by exactly 8 more digits.
fn is_canonical(phone: &str) -> bool {
    let Some(rest) = phone.strip_prefix(COUNTRY_PREFIX) else {
        return false;
    };
    let mut chars = rest.chars();
    matches!(chars.next(), Some('7') | Some('1'))
        && rest.len() == 9
        && chars.all(|ch| ch.is_ascii_digit())
}

/// Format a phone number the way the payment provider expects it:
/// a bare 12-digit `254XXXXXXXXX` MSISDN.
pub fn to_msisdn(raw: &str) -> Result<String, AppError> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|ch| ch.is_ascii_digit())
        .collect();

    let msisdn = if let Some(rest) = cleaned.strip_prefix('0') {
        format!("{MSISDN_PREFIX}{rest}")
    } else if cleaned.starts_with('7') || cleaned.starts_with('1') {
        format!("{MSISDN_PREFIX}{cleaned}")
    } else {
        cleaned
    };

    if msisdn.len() != MSISDN_LEN || !msisdn.starts_with(MSISDN_PREFIX) {
        return Err(AppError::InvalidFormat(
            "Phone number must resolve to a 12-digit MSISDN".into(),
        ));
    }

    Ok(msisdn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_all_input_shapes_to_one_key() {
        for raw in ["0712345678", "712345678", "+254712345678"] {
            assert_eq!(normalize(raw).unwrap(), "+254712345678", "input: {raw}");
        }
    }

    #[test]
    fn normalizes_trunk_digit_one() {
        assert_eq!(normalize("0110345678").unwrap(), "+254110345678");
        assert_eq!(normalize("110345678").unwrap(), "+254110345678");
    }

    #[test]
    fn strips_spacing_and_punctuation() {
        assert_eq!(normalize(" 0712 345-678 ").unwrap(), "+254712345678");
        assert_eq!(normalize("+254 (712) 345 678").unwrap(), "+254712345678");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize("0712345678").unwrap();
        assert_eq!(normalize(&once).unwrap(), once);
    }

    #[test]
    fn rejects_unknown_prefixes() {
        assert!(matches!(normalize("+255712345678"), Err(AppError::InvalidFormat(_))));
        assert!(matches!(normalize("812345678"), Err(AppError::InvalidFormat(_))));
        assert!(matches!(normalize(""), Err(AppError::InvalidFormat(_))));
    }

    #[test]
    fn rejects_wrong_lengths() {
        assert!(matches!(normalize("071234567"), Err(AppError::InvalidFormat(_))));
        assert!(matches!(normalize("07123456789"), Err(AppError::InvalidFormat(_))));
        assert!(matches!(normalize("+25471234567"), Err(AppError::InvalidFormat(_))));
    }

    #[test]
    fn rejects_non_subscriber_leading_digit() {
        // +2548... is not a valid subscriber prefix
        assert!(matches!(normalize("+254812345678"), Err(AppError::InvalidFormat(_))));
    }

    #[test]
    fn formats_msisdn_for_provider() {
        assert_eq!(to_msisdn("0712345678").unwrap(), "254712345678");
        assert_eq!(to_msisdn("712345678").unwrap(), "254712345678");
        assert_eq!(to_msisdn("+254712345678").unwrap(), "254712345678");
        assert_eq!(to_msisdn("254712345678").unwrap(), "254712345678");
    }

    #[test]
    fn msisdn_must_be_twelve_digits() {
        assert!(matches!(to_msisdn("07123456"), Err(AppError::InvalidFormat(_))));
        assert!(matches!(to_msisdn("2547123456789"), Err(AppError::InvalidFormat(_))));
        assert!(matches!(to_msisdn(""), Err(AppError::InvalidFormat(_))));
    }
}
