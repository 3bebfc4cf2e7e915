//! # Decoding Engines
//!
//! The two built-in frame decoders, each wrapping a barcode library. Both
//! are synchronous; the adapter in [`crate::decoder`] decides where they run.
//!
//! ## Engine Comparison
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Engine Comparison                                │
//! │                                                                         │
//! │  STRIP (engine A)                   │  LOCATOR (engine B)               │
//! │  ────────────────                   │  ──────────────────               │
//! │  • zedbar linear scanner            │  • rxing MultiFormatReader        │
//! │  • Raw frame                        │  • STANDARD preprocessing         │
//! │  • Scan lines every N pixels        │  • Hybrid (local) binarizer       │
//! │  • Symbologies enabled in zedbar    │  • Results filtered by format     │
//! │  • Inline on the frame loop         │  • Blocking worker when workers>0 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Symbology Mapping
//! ```text
//! Symbology   zedbar                 rxing
//! ─────────   ───────────────────    ──────────────
//! Ean13       config::Ean13          EAN_13
//! UpcA        config::Upca (+Ean13)  UPC_A
//! Ean8        config::Ean8           EAN_8
//! UpcE        config::Upce           UPC_E
//! Code39      config::Code39         CODE_39
//! Code128     config::Code128        CODE_128
//! ```
//! A detection outside the configured list is dropped unless it is another
//! spelling of an accepted code (UPC-A as a leading-zero EAN-13, UPC-E
//! expanded to UPC-A).

use std::sync::Arc;

use foodie_core::image::PreprocessPreset;
use foodie_core::symbology::ean::expand_upc_e;
use foodie_core::{Detection, Engine, EngineConfig, LumaImage, Symbology};
use rxing::common::HybridBinarizer;
use rxing::{BarcodeFormat, BinaryBitmap, Luma8LuminanceSource, MultiFormatReader, Reader};
use tracing::{debug, trace};
use zedbar::{config as zsym, DecoderConfig, Image, Scanner, SymbolType};

use crate::error::{ScanError, ScannerResult};

/// A synchronous frame decoder.
pub trait DecodeEngine: Send + Sync + 'static {
    fn engine(&self) -> Engine;

    fn config(&self) -> &EngineConfig;

    /// Symbologies this engine reports, in priority order.
    fn symbologies(&self) -> &[Symbology] {
        &self.config().symbologies
    }

    /// Decodes the highest-priority symbol found in `image`.
    fn decode(&self, image: &LumaImage) -> Option<Detection>;

    /// Returns true if decoding should run on a blocking worker thread.
    fn offload(&self) -> bool {
        self.config().workers > 0
    }
}

/// Checks that `config` belongs to `engine` and is usable.
fn check_config(engine: Engine, config: &EngineConfig) -> ScannerResult<()> {
    if config.engine != engine {
        return Err(ScanError::EngineInit(format!(
            "configuration for '{}' given to the {} engine",
            config.engine, engine
        )));
    }
    config
        .validate()
        .map_err(|e| ScanError::EngineInit(format!("{} engine: {}", engine, e)))
}

/// Returns the frame to decode, or `None` if it is too small.
fn prepare(config: &EngineConfig, image: &LumaImage) -> Option<LumaImage> {
    if image.width() < config.min_width || image.height() < config.min_height {
        return None;
    }
    Some(image.downscale_to_width(config.max_width))
}

/// Maps a library result onto the accepted symbologies.
fn classify(found: Symbology, text: &str, accepted: &[Symbology]) -> Option<Detection> {
    let has = |s: Symbology| accepted.contains(&s);

    if has(found) {
        return Some(Detection::new(text, found));
    }

    match found {
        Symbology::UpcA if has(Symbology::Ean13) => {
            Some(Detection::new(format!("0{text}"), Symbology::Ean13))
        }
        Symbology::Ean13 if text.len() == 13 && text.starts_with('0') && has(Symbology::UpcA) => {
            Some(Detection::new(&text[1..], Symbology::UpcA))
        }
        Symbology::UpcE => {
            let expanded = expand_upc_e(text)?;
            if has(Symbology::UpcA) {
                Some(Detection::new(expanded, Symbology::UpcA))
            } else if has(Symbology::Ean13) {
                Some(Detection::new(format!("0{expanded}"), Symbology::Ean13))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Position of `symbology` in the priority list; unknown ones sort last.
fn priority(accepted: &[Symbology], symbology: Symbology) -> usize {
    accepted
        .iter()
        .position(|s| *s == symbology)
        .unwrap_or(accepted.len())
}

// =============================================================================
// Strip Engine (zedbar)
// =============================================================================

fn from_zedbar(symbol_type: SymbolType) -> Option<Symbology> {
    match symbol_type {
        SymbolType::Ean13 => Some(Symbology::Ean13),
        SymbolType::Upca => Some(Symbology::UpcA),
        SymbolType::Ean8 => Some(Symbology::Ean8),
        SymbolType::Upce => Some(Symbology::UpcE),
        SymbolType::Code39 => Some(Symbology::Code39),
        SymbolType::Code128 => Some(Symbology::Code128),
        _ => None,
    }
}

/// zedbar configuration enabling exactly the accepted symbologies.
fn zedbar_config(config: &EngineConfig) -> DecoderConfig {
    let mut decoder = DecoderConfig::new().disable_all();
    for symbology in &config.symbologies {
        decoder = match symbology {
            Symbology::Ean13 => decoder.enable(zsym::Ean13),
            // UPC-A is reported through the EAN-13 decoder
            Symbology::UpcA => decoder.enable(zsym::Ean13).enable(zsym::Upca),
            Symbology::Ean8 => decoder.enable(zsym::Ean8),
            Symbology::UpcE => decoder.enable(zsym::Upce),
            Symbology::Code39 => decoder.enable(zsym::Code39),
            Symbology::Code128 => decoder.enable(zsym::Code128),
        };
    }
    decoder
        .scan_density(config.scan_density, config.scan_density)
        .test_inverted(config.try_inverted)
}

/// Engine A: zedbar scan lines over the raw frame.
pub struct StripEngine {
    config: EngineConfig,
    decoder: DecoderConfig,
}

impl StripEngine {
    pub fn new(config: EngineConfig) -> ScannerResult<Self> {
        check_config(Engine::Strip, &config)?;
        let decoder = zedbar_config(&config);
        Ok(StripEngine { config, decoder })
    }
}

impl DecodeEngine for StripEngine {
    fn engine(&self) -> Engine {
        Engine::Strip
    }

    fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn decode(&self, image: &LumaImage) -> Option<Detection> {
        let frame = prepare(&self.config, image)?;
        let mut zimage = match Image::from_gray(frame.data(), frame.width(), frame.height()) {
            Ok(zimage) => zimage,
            Err(e) => {
                debug!(error = %e, "zedbar rejected frame");
                return None;
            }
        };

        let mut scanner = Scanner::with_config(self.decoder.clone());
        let symbols = scanner.scan(&mut zimage);
        trace!(found = symbols.len(), "zedbar scan");

        symbols
            .into_iter()
            .filter_map(|symbol| {
                let found = from_zedbar(symbol.symbol_type())?;
                let text = std::str::from_utf8(symbol.data()).ok()?;
                classify(found, text, &self.config.symbologies)
            })
            .min_by_key(|d| priority(&self.config.symbologies, d.symbology))
    }
}

// =============================================================================
// Locator Engine (rxing)
// =============================================================================

fn from_rxing(format: &BarcodeFormat) -> Option<Symbology> {
    match format {
        BarcodeFormat::EAN_13 => Some(Symbology::Ean13),
        BarcodeFormat::UPC_A => Some(Symbology::UpcA),
        BarcodeFormat::EAN_8 => Some(Symbology::Ean8),
        BarcodeFormat::UPC_E => Some(Symbology::UpcE),
        BarcodeFormat::CODE_39 => Some(Symbology::Code39),
        BarcodeFormat::CODE_128 => Some(Symbology::Code128),
        _ => None,
    }
}

/// Engine B: enhanced frame read by rxing's multi-format reader.
pub struct LocatorEngine {
    config: EngineConfig,
}

impl LocatorEngine {
    pub fn new(config: EngineConfig) -> ScannerResult<Self> {
        check_config(Engine::Locator, &config)?;
        Ok(LocatorEngine { config })
    }

    fn read(&self, frame: &LumaImage) -> Option<Detection> {
        let source =
            Luma8LuminanceSource::new(frame.data().to_vec(), frame.width(), frame.height());
        let mut bitmap = BinaryBitmap::new(HybridBinarizer::new(source));

        match MultiFormatReader::default().decode(&mut bitmap) {
            Ok(result) => {
                let found = from_rxing(result.getBarcodeFormat())?;
                classify(found, result.getText(), &self.config.symbologies)
            }
            Err(e) => {
                trace!(error = ?e, "rxing found nothing");
                None
            }
        }
    }
}

impl DecodeEngine for LocatorEngine {
    fn engine(&self) -> Engine {
        Engine::Locator
    }

    fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn decode(&self, image: &LumaImage) -> Option<Detection> {
        let frame = prepare(&self.config, image)?.preprocess(&PreprocessPreset::Standard.options());
        self.read(&frame).or_else(|| {
            if self.config.try_inverted {
                self.read(&frame.inverted())
            } else {
                None
            }
        })
    }
}

/// Builds the engine for `config.engine`.
pub fn engine_for(config: &EngineConfig) -> ScannerResult<Arc<dyn DecodeEngine>> {
    let engine: Arc<dyn DecodeEngine> = match config.engine {
        Engine::Strip => Arc::new(StripEngine::new(config.clone())?),
        Engine::Locator => Arc::new(LocatorEngine::new(config.clone())?),
    };
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use foodie_core::symbology::render;

    /// Pastes `symbol` into a larger grey frame at (`x`, `y`).
    fn embed(symbol: &LumaImage, width: u32, height: u32, x: u32, y: u32) -> LumaImage {
        let mut data = vec![230u8; (width * height) as usize];
        for row in 0..symbol.height() {
            let src = symbol.row(row);
            let start = ((y + row) * width + x) as usize;
            data[start..start + src.len()].copy_from_slice(src);
        }
        LumaImage::new(width, height, data).unwrap()
    }

    #[test]
    fn test_classify_alternate_spellings() {
        let ean_only = [Symbology::Ean13];
        let upc_only = [Symbology::UpcA];

        let d = classify(Symbology::UpcA, "036000291452", &ean_only).unwrap();
        assert_eq!((d.text.as_str(), d.symbology), ("0036000291452", Symbology::Ean13));

        let d = classify(Symbology::Ean13, "0036000291452", &upc_only).unwrap();
        assert_eq!((d.text.as_str(), d.symbology), ("036000291452", Symbology::UpcA));

        let d = classify(Symbology::UpcE, "01234565", &upc_only).unwrap();
        assert_eq!(d.text, "012345000065");

        assert!(classify(Symbology::Ean13, "5901234123457", &upc_only).is_none());
        assert!(classify(Symbology::Code39, "ABC", &ean_only).is_none());
    }

    #[test]
    fn test_library_formats_map_to_symbologies() {
        assert_eq!(from_zedbar(SymbolType::Code128), Some(Symbology::Code128));
        assert_eq!(from_zedbar(SymbolType::Upce), Some(Symbology::UpcE));
        assert_eq!(from_zedbar(SymbolType::QrCode), None);
        assert_eq!(from_rxing(&BarcodeFormat::CODE_128), Some(Symbology::Code128));
        assert_eq!(from_rxing(&BarcodeFormat::UPC_A), Some(Symbology::UpcA));
        assert_eq!(from_rxing(&BarcodeFormat::QR_CODE), None);
    }

    #[test]
    fn test_zedbar_config_enables_accepted_symbologies() {
        let mut config = EngineConfig::for_engine(Engine::Strip);
        config.symbologies = vec![Symbology::Code128, Symbology::UpcA];
        let decoder = zedbar_config(&config);

        assert!(decoder.is_enabled(SymbolType::Code128));
        assert!(decoder.is_enabled(SymbolType::Upca));
        assert!(decoder.is_enabled(SymbolType::Ean13));
        assert!(!decoder.is_enabled(SymbolType::Code39));
        assert!(!decoder.is_enabled(SymbolType::QrCode));
    }

    #[test]
    fn test_strip_decodes_ean13_frame() {
        let symbol = render(Symbology::Ean13, "5901234123457", 2, 40).unwrap();
        let frame = embed(&symbol, 320, 120, 40, 40);
        let engine = StripEngine::new(EngineConfig::for_engine(Engine::Strip)).unwrap();
        let detection = engine.decode(&frame).unwrap();
        assert_eq!(detection.text, "5901234123457");
        assert_eq!(detection.symbology, Symbology::Ean13);
    }

    #[test]
    fn test_strip_ignores_disabled_symbology() {
        let symbol = render(Symbology::Ean8, "96385074", 2, 40).unwrap();
        let frame = embed(&symbol, 240, 100, 40, 30);
        let mut config = EngineConfig::for_engine(Engine::Strip);
        config.symbologies = vec![Symbology::Ean13, Symbology::Code39];
        let engine = StripEngine::new(config).unwrap();
        assert!(engine.decode(&frame).is_none());
    }

    #[test]
    fn test_locator_reads_upside_down_symbol() {
        let symbol = render(Symbology::UpcA, "036000291452", 2, 30).unwrap();
        let flipped: Vec<u8> = symbol.data().iter().rev().copied().collect();
        let flipped = LumaImage::new(symbol.width(), symbol.height(), flipped).unwrap();
        let frame = embed(&flipped, 300, 90, 20, 30);

        let engine = LocatorEngine::new(EngineConfig::for_engine(Engine::Locator)).unwrap();
        let detection = engine.decode(&frame).unwrap();
        assert_eq!(detection.text, "036000291452");
        assert_eq!(detection.symbology, Symbology::UpcA);
    }

    #[test]
    fn test_small_frames_are_skipped() {
        let engine = StripEngine::new(EngineConfig::for_engine(Engine::Strip)).unwrap();
        assert!(engine.decode(&LumaImage::filled(50, 50, 255)).is_none());
    }

    #[test]
    fn test_code128_only_config_initializes() {
        for engine in [Engine::Strip, Engine::Locator] {
            let mut config = EngineConfig::for_engine(engine);
            config.symbologies = vec![Symbology::Code128];
            let built = engine_for(&config).unwrap();
            assert_eq!(built.symbologies(), &[Symbology::Code128]);
        }
    }

    #[test]
    fn test_empty_symbology_list_fails_init() {
        let mut config = EngineConfig::for_engine(Engine::Locator);
        config.symbologies.clear();
        assert!(matches!(
            LocatorEngine::new(config),
            Err(ScanError::EngineInit(_))
        ));
    }

    #[test]
    fn test_mismatched_config_fails_init() {
        let config = EngineConfig::for_engine(Engine::Locator);
        assert!(StripEngine::new(config).is_err());
    }

    #[test]
    fn test_engine_for_builds_configured_engine() {
        let engine = engine_for(&EngineConfig::for_engine(Engine::Locator)).unwrap();
        assert_eq!(engine.engine(), Engine::Locator);
        assert!(engine.offload());
        assert!(engine.symbologies().contains(&Symbology::Code128));
    }
}
