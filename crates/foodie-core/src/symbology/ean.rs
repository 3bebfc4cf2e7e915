//! # EAN / UPC Encoding
//!
//! Module patterns for the retail family, used to render symbols.
//!
//! ## Symbol Layout (EAN-13)
//! ```text
//!  quiet │101│ d1 d2 d3 d4 d5 d6 │01010│ d7 d8 d9 d10 d11 d12 │101│ quiet
//!        start   L/G, parity → d0   middle    R (bar first)       end
//! ```
//! - UPC-A is an EAN-13 whose implied first digit is `0`
//! - EAN-8 has four L digits on each side and no parity digit
//! - UPC-E has six L/G digits and a `010101` end guard; the parity pattern
//!   carries the number system and the check digit

use crate::validation::{gs1_check_digit, has_valid_check_digit};

/// Bar/space widths of the L-code digits, light element first.
/// R codes use the same widths starting with a bar; G codes are the
/// L widths reversed.
const DIGIT_WIDTHS: [[u8; 4]; 10] = [
    [3, 2, 1, 1],
    [2, 2, 2, 1],
    [2, 1, 2, 2],
    [1, 4, 1, 1],
    [1, 1, 3, 2],
    [1, 2, 3, 1],
    [1, 1, 1, 4],
    [1, 3, 1, 2],
    [1, 2, 1, 3],
    [3, 1, 1, 2],
];

/// EAN-13 left-half parity by implied first digit (bit set = G code,
/// leftmost digit in the high bit).
const FIRST_DIGIT_PARITY: [u8; 10] = [
    0b000000, 0b001011, 0b001101, 0b001110, 0b010011, 0b011001, 0b011100, 0b010101, 0b010110,
    0b011010,
];

/// UPC-E number-system-0 parity by check digit (bit set = G code).
/// Number system 1 uses the complement.
const UPC_E_PARITY: [u8; 10] = [
    0b111000, 0b110100, 0b110010, 0b110001, 0b101100, 0b100110, 0b100011, 0b101010, 0b101001,
    0b100101,
];

const START_GUARD: [u8; 3] = [1, 1, 1];
const MIDDLE_GUARD: [u8; 5] = [1, 1, 1, 1, 1];
const UPC_E_END_GUARD: [u8; 6] = [1, 1, 1, 1, 1, 1];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parity {
    L,
    G,
}

/// Expands an 8-digit UPC-E code to its 12-digit UPC-A form.
///
/// ## Rules (by last data digit)
/// ```text
/// 0,1,2 → NS d1 d2 d6 0000 d3 d4 d5
/// 3     → NS d1 d2 d3 00000 d4 d5
/// 4     → NS d1 d2 d3 d4 00000 d5
/// 5..9  → NS d1 d2 d3 d4 d5 0000 d6
/// ```
pub fn expand_upc_e(code: &str) -> Option<String> {
    let bytes = code.as_bytes();
    if bytes.len() != 8 || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let ns = char::from(bytes[0]);
    let d: Vec<char> = bytes[1..7].iter().map(|&b| char::from(b)).collect();
    let check = char::from(bytes[7]);

    let body: String = match d[5] {
        '0' | '1' | '2' => format!("{}{}{}0000{}{}{}", d[0], d[1], d[5], d[2], d[3], d[4]),
        '3' => format!("{}{}{}00000{}{}", d[0], d[1], d[2], d[3], d[4]),
        '4' => format!("{}{}{}{}00000{}", d[0], d[1], d[2], d[3], d[4]),
        _ => format!("{}{}{}{}{}0000{}", d[0], d[1], d[2], d[3], d[4], d[5]),
    };

    Some(format!("{ns}{body}{check}"))
}

fn push_widths(modules: &mut Vec<bool>, widths: &[u8], start_dark: bool) {
    let mut dark = start_dark;
    for &w in widths {
        modules.extend(std::iter::repeat(dark).take(usize::from(w)));
        dark = !dark;
    }
}

fn push_digit(modules: &mut Vec<bool>, digit: u8, parity: Parity) {
    let mut widths = DIGIT_WIDTHS[usize::from(digit)];
    if parity == Parity::G {
        widths.reverse();
    }
    push_widths(modules, &widths, false);
}

fn parse_digits(text: &str) -> Option<Vec<u8>> {
    text.bytes()
        .map(|b| b.is_ascii_digit().then(|| b - b'0'))
        .collect()
}

/// Completes `text` to `full_len` digits, appending the GS1 check digit
/// when it is one short, or verifying it when already complete.
pub(crate) fn with_check_digit(text: &str, full_len: usize) -> Result<Vec<u8>, String> {
    let digits = parse_digits(text).ok_or_else(|| "must contain only digits".to_string())?;
    if digits.len() + 1 == full_len {
        let check = gs1_check_digit(text).ok_or_else(|| "must contain only digits".to_string())?;
        let mut digits = digits;
        digits.push(check);
        Ok(digits)
    } else if digits.len() == full_len {
        if has_valid_check_digit(text) {
            Ok(digits)
        } else {
            Err("check digit does not match".to_string())
        }
    } else {
        Err(format!("needs {} or {} digits", full_len - 1, full_len))
    }
}

/// Encodes 13 validated digits as EAN-13 modules (`true` = bar).
pub(crate) fn encode_ean13(digits: &[u8]) -> Vec<bool> {
    let mut modules = Vec::with_capacity(95);
    push_widths(&mut modules, &START_GUARD, true);
    let parity = FIRST_DIGIT_PARITY[usize::from(digits[0])];
    for (k, &digit) in digits[1..7].iter().enumerate() {
        let g = parity & (1 << (5 - k)) != 0;
        push_digit(&mut modules, digit, if g { Parity::G } else { Parity::L });
    }
    push_widths(&mut modules, &MIDDLE_GUARD, false);
    for &digit in &digits[7..13] {
        push_widths(&mut modules, &DIGIT_WIDTHS[usize::from(digit)], true);
    }
    push_widths(&mut modules, &START_GUARD, true);
    modules
}

/// Encodes 8 validated digits as EAN-8 modules.
pub(crate) fn encode_ean8(digits: &[u8]) -> Vec<bool> {
    let mut modules = Vec::with_capacity(67);
    push_widths(&mut modules, &START_GUARD, true);
    for &digit in &digits[0..4] {
        push_digit(&mut modules, digit, Parity::L);
    }
    push_widths(&mut modules, &MIDDLE_GUARD, false);
    for &digit in &digits[4..8] {
        push_widths(&mut modules, &DIGIT_WIDTHS[usize::from(digit)], true);
    }
    push_widths(&mut modules, &START_GUARD, true);
    modules
}

/// Encodes a UPC-E code given as 7 digits (check computed) or 8 digits.
pub(crate) fn encode_upc_e(text: &str) -> Result<Vec<bool>, String> {
    let digits = parse_digits(text).ok_or_else(|| "must contain only digits".to_string())?;
    if digits.len() != 7 && digits.len() != 8 {
        return Err("needs 7 or 8 digits".to_string());
    }
    if digits[0] > 1 {
        return Err("number system must be 0 or 1".to_string());
    }

    // The check digit belongs to the expanded UPC-A form
    let provisional = format!("{}0", &text[..7]);
    let expanded = expand_upc_e(&provisional).ok_or_else(|| "cannot expand".to_string())?;
    let check = gs1_check_digit(&expanded[..11]).ok_or_else(|| "cannot expand".to_string())?;
    if digits.len() == 8 && digits[7] != check {
        return Err("check digit does not match".to_string());
    }

    let mut parity = UPC_E_PARITY[usize::from(check)];
    if digits[0] == 1 {
        parity = !parity & 0b111111;
    }

    let mut modules = Vec::with_capacity(51);
    push_widths(&mut modules, &START_GUARD, true);
    for (k, &digit) in digits[1..7].iter().enumerate() {
        let g = parity & (1 << (5 - k)) != 0;
        push_digit(&mut modules, digit, if g { Parity::G } else { Parity::L });
    }
    push_widths(&mut modules, &UPC_E_END_GUARD, false);
    Ok(modules)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(pattern: &str) -> Vec<bool> {
        pattern.chars().map(|c| c == '1').collect()
    }

    #[test]
    fn test_encode_lengths() {
        let digits = with_check_digit("590123412345", 13).unwrap();
        assert_eq!(encode_ean13(&digits).len(), 95);
        let digits = with_check_digit("9638507", 8).unwrap();
        assert_eq!(encode_ean8(&digits).len(), 67);
        assert_eq!(encode_upc_e("0123456").unwrap().len(), 51);
    }

    #[test]
    fn test_ean13_guards_and_first_digits() {
        let digits = with_check_digit("5901234123457", 13).unwrap();
        let modules = encode_ean13(&digits);

        assert_eq!(modules[..3], bits("101")[..]);
        assert_eq!(modules[45..50], bits("01010")[..]);
        assert_eq!(modules[92..], bits("101")[..]);
        // '9' under parity of 5 (L): 0001011
        assert_eq!(modules[3..10], bits("0001011")[..]);
        // first right-hand digit '1' (R): 1100110
        assert_eq!(modules[50..57], bits("1100110")[..]);
    }

    #[test]
    fn test_upc_e_parity_depends_on_number_system() {
        let ns0 = encode_upc_e("0123456").unwrap();
        let ns1 = encode_upc_e("1123456").unwrap();
        assert_ne!(ns0, ns1);
        assert_eq!(ns0[45..], bits("010101")[..]);
        assert!(encode_upc_e("2123456").is_err());
        assert!(encode_upc_e("01234564").is_err());
    }

    #[test]
    fn test_expand_upc_e() {
        assert_eq!(expand_upc_e("01234565").as_deref(), Some("012345000065"));
        assert_eq!(expand_upc_e("01234133").as_deref(), Some("012300000413"));
        assert_eq!(expand_upc_e("01234143").as_deref(), Some("012340000013"));
        assert_eq!(expand_upc_e("01234203").as_deref(), Some("012000003423"));
        assert_eq!(expand_upc_e("0123"), None);
    }

    #[test]
    fn test_with_check_digit_errors() {
        assert_eq!(
            with_check_digit("12", 8).unwrap_err(),
            "needs 7 or 8 digits"
        );
        assert!(with_check_digit("5901234123458", 13).is_err());
        assert!(with_check_digit("59012341234a", 13).is_err());
    }
}
