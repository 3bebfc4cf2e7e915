//! # Validation Module
//!
//! Decides whether decoded or typed text is an acceptable product code, and
//! produces the canonical form used for product lookup.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Code Acceptance Pipeline                           │
//! │                                                                         │
//! │  Layer 1: Decoding engine (zedbar / rxing)                             │
//! │  ├── Guard patterns, module widths                                     │
//! │  └── Check digit (EAN/UPC)                                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE: product code rules                              │
//! │  ├── Digits only                                                       │
//! │  └── Length 8..=13 (UPC-E/EAN-8 through EAN-13)                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Canonicalization                                             │
//! │  └── 12-digit UPC-A → 13-digit EAN-13 ("0" + code)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use foodie_core::validation::{validate_product_code, canonicalize_product_code};
//!
//! assert!(validate_product_code("12345678").is_ok());
//! assert!(validate_product_code("1234567").is_err());
//! assert_eq!(canonicalize_product_code("5901234123457"), "5901234123457");
//! ```

use crate::error::ValidationError;
use crate::{MAX_PRODUCT_CODE_LEN, MIN_PRODUCT_CODE_LEN, UPC_A_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const FIELD: &str = "barcode";

// =============================================================================
// Product Code Validators
// =============================================================================

/// Validates a raw product code.
///
/// ## Rules
/// - Must not be empty
/// - Must contain only ASCII digits (`^[0-9]+$`)
/// - Length must be between 8 and 13 inclusive
///
/// No trimming happens here: surrounding whitespace is a format error.
/// Callers handling typed input trim first.
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Decoder fires onResult("00012345678")                                  │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_product_code ← THIS FUNCTION                                 │
/// │       │                                                                 │
/// │       ├── non-digit?  → Error: "barcode has invalid format"            │
/// │       ├── len < 8?    → Error: "barcode must be at least 8 characters" │
/// │       ├── len > 13?   → Error: "barcode must be at most 13 characters" │
/// │       │                                                                 │
/// │       └── OK → canonicalize, hand to onScan                            │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_product_code(raw: &str) -> ValidationResult<()> {
    if raw.is_empty() {
        return Err(ValidationError::Required {
            field: FIELD.to_string(),
        });
    }

    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: FIELD.to_string(),
            reason: "must contain only digits".to_string(),
        });
    }

    // All ASCII, so byte length is the digit count
    if raw.len() < MIN_PRODUCT_CODE_LEN {
        return Err(ValidationError::TooShort {
            field: FIELD.to_string(),
            min: MIN_PRODUCT_CODE_LEN,
        });
    }

    if raw.len() > MAX_PRODUCT_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: FIELD.to_string(),
            max: MAX_PRODUCT_CODE_LEN,
        });
    }

    Ok(())
}

/// Returns true if [`validate_product_code`] accepts `raw`.
pub fn is_product_code(raw: &str) -> bool {
    validate_product_code(raw).is_ok()
}

/// Canonicalizes a validated product code for lookup.
///
/// ## Rules
/// - 12 digits (UPC-A): prefixed with a single `0`, giving EAN-13
/// - Any other length: returned unchanged
///
/// A 13-digit code is never padded again, so canonicalization is idempotent.
pub fn canonicalize_product_code(code: &str) -> String {
    if code.len() == UPC_A_LEN && code.bytes().all(|b| b.is_ascii_digit()) {
        let mut padded = String::with_capacity(UPC_A_LEN + 1);
        padded.push('0');
        padded.push_str(code);
        return padded;
    }

    code.to_string()
}

/// Validates typed input from the manual barcode field.
///
/// ## Returns
/// The canonical code, after trimming surrounding whitespace.
pub fn validate_manual_entry(input: &str) -> ValidationResult<String> {
    let code = input.trim();
    validate_product_code(code)?;
    Ok(canonicalize_product_code(code))
}

// =============================================================================
// Check Digits
// =============================================================================

/// Computes the GS1 mod-10 check digit for the given payload digits.
///
/// Weights alternate 3,1,3,... starting from the rightmost payload digit.
/// Returns `None` if `payload` contains a non-digit.
pub fn gs1_check_digit(payload: &str) -> Option<u8> {
    let mut sum = 0u32;
    for (i, b) in payload.bytes().rev().enumerate() {
        if !b.is_ascii_digit() {
            return None;
        }
        let digit = u32::from(b - b'0');
        sum += if i % 2 == 0 { digit * 3 } else { digit };
    }
    Some(((10 - sum % 10) % 10) as u8)
}

/// Verifies the trailing GS1 check digit of a full code.
pub fn has_valid_check_digit(code: &str) -> bool {
    if code.len() < 2 {
        return false;
    }
    let (payload, check) = code.split_at(code.len() - 1);
    match (gs1_check_digit(payload), check.bytes().next()) {
        (Some(expected), Some(actual)) if actual.is_ascii_digit() => expected == actual - b'0',
        _ => false,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_product_code_accepts_range() {
        assert!(validate_product_code("12345678").is_ok());
        assert!(validate_product_code("036000291452").is_ok());
        assert!(validate_product_code("5901234123457").is_ok());
    }

    #[test]
    fn test_validate_product_code_rejects() {
        assert!(matches!(
            validate_product_code("1234567"),
            Err(ValidationError::TooShort { min: 8, .. })
        ));
        assert!(matches!(
            validate_product_code("12345678901234"),
            Err(ValidationError::TooLong { max: 13, .. })
        ));
        assert!(matches!(
            validate_product_code("12345A78"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(matches!(
            validate_product_code(""),
            Err(ValidationError::Required { .. })
        ));
        assert!(validate_product_code(" 12345678").is_err());
        // Non-ASCII digits are not product codes
        assert!(validate_product_code("١٢٣٤٥٦٧٨").is_err());
    }

    #[test]
    fn test_validator_matches_length_rule_for_every_length() {
        for len in 1..=16 {
            let code = "7".repeat(len);
            assert_eq!(is_product_code(&code), (8..=13).contains(&len), "len {len}");
        }
    }

    #[test]
    fn test_canonicalize_pads_upc_a() {
        assert_eq!(canonicalize_product_code("036000291452"), "0036000291452");
        assert_eq!(canonicalize_product_code("712345678904"), "0712345678904");
    }

    #[test]
    fn test_canonicalize_leaves_other_lengths() {
        assert_eq!(canonicalize_product_code("0036000291452"), "0036000291452");
        assert_eq!(canonicalize_product_code("96385074"), "96385074");
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let once = canonicalize_product_code("036000291452");
        assert_eq!(canonicalize_product_code(&once), once);
    }

    #[test]
    fn test_validate_manual_entry_trims() {
        assert_eq!(
            validate_manual_entry("  036000291452\n").unwrap(),
            "0036000291452"
        );
        assert!(validate_manual_entry("   ").is_err());
    }

    #[test]
    fn test_gs1_check_digit() {
        assert_eq!(gs1_check_digit("590123412345"), Some(7));
        assert_eq!(gs1_check_digit("03600029145"), Some(2));
        assert_eq!(gs1_check_digit("9638507"), Some(4));
        assert_eq!(gs1_check_digit("12a"), None);

        assert!(has_valid_check_digit("5901234123457"));
        assert!(!has_valid_check_digit("5901234123458"));
    }
}
