//! Code 39 encoding.
//!
//! Each character is nine elements (five bars, four spaces), three of them
//! wide. Characters are separated by a narrow space and the symbol is
//! framed by `*` on both ends.

/// Character set with wide-element masks (bit 8 = first bar).
const ALPHABET: [(char, u16); 44] = [
    ('0', 0x034),
    ('1', 0x121),
    ('2', 0x061),
    ('3', 0x160),
    ('4', 0x031),
    ('5', 0x130),
    ('6', 0x070),
    ('7', 0x025),
    ('8', 0x124),
    ('9', 0x064),
    ('A', 0x109),
    ('B', 0x049),
    ('C', 0x148),
    ('D', 0x019),
    ('E', 0x118),
    ('F', 0x058),
    ('G', 0x00D),
    ('H', 0x10C),
    ('I', 0x04C),
    ('J', 0x01C),
    ('K', 0x103),
    ('L', 0x043),
    ('M', 0x142),
    ('N', 0x013),
    ('O', 0x112),
    ('P', 0x052),
    ('Q', 0x007),
    ('R', 0x106),
    ('S', 0x046),
    ('T', 0x016),
    ('U', 0x181),
    ('V', 0x0C1),
    ('W', 0x1C0),
    ('X', 0x091),
    ('Y', 0x190),
    ('Z', 0x0D0),
    ('-', 0x085),
    ('.', 0x184),
    (' ', 0x0C4),
    ('$', 0x0A8),
    ('/', 0x0A2),
    ('+', 0x08A),
    ('%', 0x02A),
    ('*', 0x094),
];

const FRAME: char = '*';
const CHAR_RUNS: usize = 9;
const WIDE_MODULES: usize = 3;

fn mask_for(c: char) -> Option<u16> {
    ALPHABET.iter().find(|(ch, _)| *ch == c).map(|(_, mask)| *mask)
}

/// Encodes `text` as Code 39 modules (`true` = bar), framing included.
///
/// Lowercase letters are upper-cased; `*` is reserved for framing.
pub(crate) fn encode(text: &str) -> Result<Vec<bool>, String> {
    if text.is_empty() {
        return Err("text is empty".to_string());
    }

    let upper = text.to_ascii_uppercase();
    let mut masks = vec![mask_for(FRAME).unwrap_or_default()];
    for c in upper.chars() {
        match mask_for(c) {
            Some(mask) if c != FRAME => masks.push(mask),
            _ => return Err(format!("character '{c}' is not in the Code 39 set")),
        }
    }
    masks.push(mask_for(FRAME).unwrap_or_default());

    let mut modules = Vec::new();
    for (i, mask) in masks.iter().enumerate() {
        if i > 0 {
            modules.push(false);
        }
        for k in 0..CHAR_RUNS {
            let dark = k % 2 == 0;
            let wide = mask & (1 << (CHAR_RUNS - 1 - k)) != 0;
            let width = if wide { WIDE_MODULES } else { 1 };
            modules.extend(std::iter::repeat(dark).take(width));
        }
    }
    Ok(modules)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Modules per character: six narrow and three wide elements.
    const CHAR_MODULES: usize = 6 + 3 * WIDE_MODULES;

    #[test]
    fn test_every_mask_has_three_wide_elements() {
        for (c, mask) in ALPHABET {
            assert_eq!(mask.count_ones(), 3, "{c}");
        }
    }

    #[test]
    fn test_symbol_is_framed_and_gapped() {
        let modules = encode("AB").unwrap();
        // *AB* with three inter-character gaps
        assert_eq!(modules.len(), 4 * CHAR_MODULES + 3);
        assert!(modules[0]);
        assert!(!modules[CHAR_MODULES]);
        assert_eq!(
            modules[..CHAR_MODULES],
            modules[modules.len() - CHAR_MODULES..]
        );
    }

    #[test]
    fn test_lowercase_is_upper_cased() {
        assert_eq!(encode("abc").unwrap(), encode("ABC").unwrap());
    }

    #[test]
    fn test_rejects_unencodable() {
        assert!(encode("").is_err());
        assert!(encode("A*B").is_err());
        assert!(encode("é").is_err());
    }
}
