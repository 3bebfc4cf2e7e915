//! # Symbology Module
//!
//! Detected symbol text and the encoders used to render symbols.
//!
//! Decoding itself is done by the third-party engines wrapped in the
//! scanner crate; this module only describes what they report and draws
//! symbols for the CLI and for synthetic test frames.
//!
//! ## Render Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Rendering                                      │
//! │                                                                         │
//! │   text ──► encode_modules(symbology) ──► [bar, space, ...]             │
//! │                  │                                                      │
//! │      ┌───────────┼──────────────┬──────────────┐                        │
//! │      │ EAN-13/UPC-A │ EAN-8/UPC-E │   Code 39    │                        │
//! │      └───────────┴──────────────┴──────────────┘                        │
//! │                                  ▼                                      │
//! │              render(): quiet zones + module_px scaling → LumaImage      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod code39;
pub mod ean;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::image::LumaImage;
use crate::types::Symbology;

/// Raw text decoded from a symbol, before product code validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub text: String,
    pub symbology: Symbology,
}

impl Detection {
    pub fn new(text: impl Into<String>, symbology: Symbology) -> Self {
        Detection {
            text: text.into(),
            symbology,
        }
    }
}

// =============================================================================
// Encoding / Rendering
// =============================================================================

/// Encodes `text` as a module sequence (`true` = bar), without quiet zones.
///
/// ## Accepted Input
/// - EAN-13: 12 digits (check appended) or 13
/// - UPC-A: 11 or 12 digits, encoded as EAN-13 with leading `0`
/// - EAN-8: 7 or 8 digits
/// - UPC-E: 7 or 8 digits, number system 0 or 1
/// - Code 39: digits, upper-case letters and `-. $/+%`
pub fn encode_modules(symbology: Symbology, text: &str) -> CoreResult<Vec<bool>> {
    let unencodable = |reason: String| CoreError::Unencodable {
        symbology,
        text: text.to_string(),
        reason,
    };

    match symbology {
        Symbology::Ean13 => ean::with_check_digit(text, 13)
            .map(|d| ean::encode_ean13(&d))
            .map_err(unencodable),
        Symbology::UpcA => ean::with_check_digit(&format!("0{text}"), 13)
            .map(|d| ean::encode_ean13(&d))
            .map_err(|_| unencodable("needs 11 or 12 digits with a valid check digit".to_string())),
        Symbology::Ean8 => ean::with_check_digit(text, 8)
            .map(|d| ean::encode_ean8(&d))
            .map_err(unencodable),
        Symbology::UpcE => ean::encode_upc_e(text).map_err(unencodable),
        Symbology::Code39 => code39::encode(text).map_err(unencodable),
        Symbology::Code128 => Err(unencodable("no Code128 encoder available".to_string())),
    }
}

/// Quiet zone drawn on each side of a rendered symbol, in modules.
pub const RENDER_QUIET_MODULES: u32 = 10;

/// Renders a symbol as a black-on-white image.
///
/// Each module is `module_px` pixels wide; the image is `height` pixels
/// tall.
pub fn render(
    symbology: Symbology,
    text: &str,
    module_px: u32,
    height: u32,
) -> CoreResult<LumaImage> {
    if module_px == 0 || height == 0 {
        return Err(CoreError::EmptyImage);
    }
    let modules = encode_modules(symbology, text)?;

    let mut row = Vec::new();
    let quiet = (RENDER_QUIET_MODULES * module_px) as usize;
    row.extend(std::iter::repeat(255u8).take(quiet));
    for dark in modules {
        let value = if dark { 0 } else { 255 };
        row.extend(std::iter::repeat(value).take(module_px as usize));
    }
    row.extend(std::iter::repeat(255u8).take(quiet));

    let width = row.len() as u32;
    let data = row.repeat(height as usize);
    LumaImage::new(width, height, data)
}

// =============================================================================
// Unit Tests
// =============================================================================
