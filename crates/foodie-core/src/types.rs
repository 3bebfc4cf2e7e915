//! # Domain Types
//!
//! Core domain types used throughout the scanning pipeline.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   ScanResult    │   │ SessionSnapshot │   │  EngineConfig   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  mode           │   │  engine         │       │
//! │  │  code (canon.)  │   │  engine         │   │  symbologies    │       │
//! │  │  engine/source  │   │  status         │   │  min/max size   │       │
//! │  │  scanned_at     │   │  last_error     │   │  workers        │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Symbology    │   │   ScanStatus    │   │     Engine      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  EAN-13, EAN-8  │   │  Idle           │   │  Strip  (A)     │       │
//! │  │  UPC-A, UPC-E   │   │  Scanning       │   │  Locator (B)    │       │
//! │  │  Code128/Code39 │   │  Processing     │   └─────────────────┘       │
//! │  └─────────────────┘   │  Success/Error  │                              │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::validation::{canonicalize_product_code, validate_product_code, ValidationResult};

// =============================================================================
// Symbology
// =============================================================================

/// A barcode encoding standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Symbology {
    Ean13,
    Ean8,
    UpcA,
    UpcE,
    Code128,
    Code39,
}

impl Symbology {
    /// Every symbology the scanner accepts, in default search priority.
    pub const ALL: [Symbology; 6] = [
        Symbology::Ean13,
        Symbology::Ean8,
        Symbology::UpcA,
        Symbology::UpcE,
        Symbology::Code128,
        Symbology::Code39,
    ];

    /// Returns true for the retail EAN/UPC family.
    pub fn is_retail(&self) -> bool {
        matches!(
            self,
            Symbology::Ean13 | Symbology::Ean8 | Symbology::UpcA | Symbology::UpcE
        )
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Symbology::Ean13 => "EAN-13",
            Symbology::Ean8 => "EAN-8",
            Symbology::UpcA => "UPC-A",
            Symbology::UpcE => "UPC-E",
            Symbology::Code128 => "Code128",
            Symbology::Code39 => "Code39",
        };
        f.write_str(name)
    }
}

impl FromStr for Symbology {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "ean13" => Ok(Symbology::Ean13),
            "ean8" => Ok(Symbology::Ean8),
            "upca" => Ok(Symbology::UpcA),
            "upce" => Ok(Symbology::UpcE),
            "code128" => Ok(Symbology::Code128),
            "code39" => Ok(Symbology::Code39),
            _ => Err(ValidationError::NotAllowed {
                field: "symbology".to_string(),
                allowed: Symbology::ALL.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Identifier of an interchangeable decoding engine.
///
/// ## Engines
/// - `Strip` (engine A): zedbar linear scanner over the raw frame
/// - `Locator` (engine B): rxing reader with a hybrid binarizer over a
///   preprocessed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    #[default]
    Strip,
    Locator,
}

impl Engine {
    /// The other engine, for A/B toggling.
    pub fn other(&self) -> Engine {
        match self {
            Engine::Strip => Engine::Locator,
            Engine::Locator => Engine::Strip,
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::Strip => write!(f, "strip"),
            Engine::Locator => write!(f, "locator"),
        }
    }
}

impl FromStr for Engine {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strip" | "a" | "engine-a" => Ok(Engine::Strip),
            "locator" | "b" | "engine-b" => Ok(Engine::Locator),
            _ => Err(ValidationError::NotAllowed {
                field: "engine".to_string(),
                allowed: vec!["strip".to_string(), "locator".to_string()],
            }),
        }
    }
}

// =============================================================================
// Scan Mode / Source
// =============================================================================

/// How the session acquires images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Continuous live frames from a camera.
    #[default]
    Camera,
    /// One uploaded image, decoded once.
    Image,
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Camera => write!(f, "camera"),
            ScanMode::Image => write!(f, "image"),
        }
    }
}

/// Where an accepted code came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ScanSource {
    Camera,
    Image,
    /// Typed into the manual barcode field.
    Manual,
}

impl From<ScanMode> for ScanSource {
    fn from(mode: ScanMode) -> Self {
        match mode {
            ScanMode::Camera => ScanSource::Camera,
            ScanMode::Image => ScanSource::Image,
        }
    }
}

// =============================================================================
// Scan Status
// =============================================================================

/// The status of a scan session.
///
/// ## State Machine
/// ```text
///            enter mode / select image
///   ┌──────┐ ─────────────────────────► ┌──────────┐   valid code   ┌─────────┐
///   │ Idle │                            │ Scanning │ ─────────────► │ Success │
///   └──────┘ ◄───────────────┐          └────┬─────┘                └─────────┘
///      ▲        restart /    │               │ image decode              ▲
///      │        teardown     │               ▼                           │
///      │                ┌─────────┐    ┌────────────┐   valid code       │
///      └─────────────── │  Error  │ ◄──│ Processing │ ───────────────────┘
///                       └─────────┘    └────────────┘
/// ```
/// Manual entry may jump to `Success` from any non-success state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    #[default]
    Idle,
    Scanning,
    Processing,
    Success,
    Error,
}

impl ScanStatus {
    /// Checks whether the state machine allows moving to `next`.
    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        use ScanStatus::*;

        match (self, next) {
            // Teardown and restart are always allowed
            (_, Idle) => true,
            (Idle, Scanning) => true,
            (Scanning, Processing) => true,
            (Scanning | Processing, Success | Error) => true,
            // Decoder could not be built
            (Idle, Error) => true,
            // Manual fallback entry
            (Idle | Error, Success) => true,
            _ => false,
        }
    }

    /// Returns true once a code has been accepted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Success)
    }

    /// Returns true while an adapter may be producing results.
    pub fn is_active(&self) -> bool {
        matches!(self, ScanStatus::Scanning | ScanStatus::Processing)
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScanStatus::Idle => "idle",
            ScanStatus::Scanning => "scanning",
            ScanStatus::Processing => "processing",
            ScanStatus::Success => "success",
            ScanStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// User-facing error class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ScanErrorKind {
    /// Camera access denied; fixed through browser/OS settings.
    Permission,
    /// Decoder or camera failed to start; retry or switch engine.
    EngineInit,
    /// Not an image, or decoded text is not a product code.
    Format,
    /// No barcode located in a static image.
    NotFound,
}

// =============================================================================
// Scan Result
// =============================================================================

/// An accepted, canonical product code.
///
/// Created only through [`ScanResult::accept`], which validates and
/// canonicalizes. Fields are read-only after creation. Stored results are
/// re-validated when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct ScanResult {
    id: String,
    /// Canonical code (12-digit UPC-A padded to EAN-13).
    code: String,
    /// Text exactly as decoded or typed.
    raw: String,
    symbology: Option<Symbology>,
    /// Engine that decoded the code; `None` for manual entry.
    engine: Option<Engine>,
    source: ScanSource,
    #[ts(as = "String")]
    scanned_at: DateTime<Utc>,
}

impl ScanResult {
    /// Validates `raw` and builds a result holding its canonical form.
    ///
    /// ## Example
    /// ```rust
    /// use foodie_core::{Engine, ScanResult, ScanSource, Symbology};
    ///
    /// let result = ScanResult::accept(
    ///     "036000291452",
    ///     Some(Symbology::UpcA),
    ///     Some(Engine::Strip),
    ///     ScanSource::Camera,
    /// ).unwrap();
    /// assert_eq!(result.code(), "0036000291452");
    ///
    /// assert!(ScanResult::accept("1234567", None, None, ScanSource::Manual).is_err());
    /// ```
    pub fn accept(
        raw: &str,
        symbology: Option<Symbology>,
        engine: Option<Engine>,
        source: ScanSource,
    ) -> ValidationResult<Self> {
        validate_product_code(raw)?;

        Ok(ScanResult {
            id: uuid::Uuid::new_v4().to_string(),
            code: canonicalize_product_code(raw),
            raw: raw.to_string(),
            symbology,
            engine,
            source,
            scanned_at: Utc::now(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The canonical code to use for product lookup.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn symbology(&self) -> Option<Symbology> {
        self.symbology
    }

    pub fn engine(&self) -> Option<Engine> {
        self.engine
    }

    pub fn source(&self) -> ScanSource {
        self.source
    }

    pub fn scanned_at(&self) -> DateTime<Utc> {
        self.scanned_at
    }

    /// Consumes the result, yielding the canonical code.
    pub fn into_code(self) -> String {
        self.code
    }
}

/// Wire form of a [`ScanResult`] before validation.
#[derive(Deserialize)]
struct StoredScanResult {
    id: String,
    code: String,
    raw: String,
    symbology: Option<Symbology>,
    engine: Option<Engine>,
    source: ScanSource,
    scanned_at: DateTime<Utc>,
}

impl TryFrom<StoredScanResult> for ScanResult {
    type Error = ValidationError;

    fn try_from(stored: StoredScanResult) -> ValidationResult<Self> {
        validate_product_code(&stored.raw)?;

        let canonical = canonicalize_product_code(&stored.raw);
        if stored.code != canonical {
            return Err(ValidationError::InvalidFormat {
                field: "code".to_string(),
                reason: format!("expected canonical form {canonical}"),
            });
        }

        if stored.id.is_empty() {
            return Err(ValidationError::Required {
                field: "id".to_string(),
            });
        }

        Ok(ScanResult {
            id: stored.id,
            code: stored.code,
            raw: stored.raw,
            symbology: stored.symbology,
            engine: stored.engine,
            source: stored.source,
            scanned_at: stored.scanned_at,
        })
    }
}

impl<'de> Deserialize<'de> for ScanResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let stored = StoredScanResult::deserialize(deserializer)?;
        ScanResult::try_from(stored).map_err(de::Error::custom)
    }
}

// =============================================================================
// Session Snapshot
// =============================================================================

/// Read-only view of a scan session, rendered by the scanning view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub mode: ScanMode,
    pub engine: Engine,
    pub status: ScanStatus,
    /// User-facing message of the most recent error.
    pub last_error: Option<String>,
    pub last_error_kind: Option<ScanErrorKind>,
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Static per-engine configuration.
///
/// ## Fields
/// - `symbologies`: accepted symbologies, in engine search priority
/// - `min_width`/`min_height`: frames below this are skipped
/// - `max_width`: larger frames are downscaled before decoding
/// - `workers`: 0 decodes inline, otherwise on blocking worker threads
/// - `scan_density`: pixel step between scan lines (strip engine)
/// - `try_inverted`: retry on the inverted frame when nothing is found
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EngineConfig {
    pub engine: Engine,
    pub symbologies: Vec<Symbology>,
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub workers: u8,
    pub scan_density: u32,
    pub try_inverted: bool,
}

impl EngineConfig {
    /// Default configuration for an engine.
    pub fn for_engine(engine: Engine) -> Self {
        match engine {
            Engine::Strip => EngineConfig {
                engine,
                symbologies: Symbology::ALL.to_vec(),
                min_width: 96,
                min_height: 1,
                max_width: 1280,
                workers: 0,
                scan_density: 1,
                try_inverted: false,
            },
            Engine::Locator => EngineConfig {
                engine,
                symbologies: vec![
                    Symbology::Ean13,
                    Symbology::UpcA,
                    Symbology::Ean8,
                    Symbology::UpcE,
                    Symbology::Code39,
                    Symbology::Code128,
                ],
                min_width: 96,
                min_height: 1,
                max_width: 800,
                workers: 2,
                scan_density: 1,
                try_inverted: true,
            },
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        if self.symbologies.is_empty() {
            return Err(ValidationError::Required {
                field: "symbologies".to_string(),
            });
        }

        for (i, symbology) in self.symbologies.iter().enumerate() {
            if self.symbologies[..i].contains(symbology) {
                return Err(ValidationError::InvalidFormat {
                    field: "symbologies".to_string(),
                    reason: format!("{} listed twice", symbology),
                });
            }
        }

        if self.min_width == 0 || self.min_height == 0 {
            return Err(ValidationError::InvalidFormat {
                field: "min_width/min_height".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.max_width < self.min_width {
            return Err(ValidationError::InvalidFormat {
                field: "max_width".to_string(),
                reason: format!("must be at least min_width ({})", self.min_width),
            });
        }

        if self.scan_density == 0 {
            return Err(ValidationError::InvalidFormat {
                field: "scan_density".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbology_parsing() {
        assert_eq!("EAN-13".parse::<Symbology>().unwrap(), Symbology::Ean13);
        assert_eq!("upc_a".parse::<Symbology>().unwrap(), Symbology::UpcA);
        assert_eq!("Code 39".parse::<Symbology>().unwrap(), Symbology::Code39);
        assert!("qr".parse::<Symbology>().is_err());
    }

    #[test]
    fn test_engine_parsing() {
        assert_eq!("a".parse::<Engine>().unwrap(), Engine::Strip);
        assert_eq!("Locator".parse::<Engine>().unwrap(), Engine::Locator);
        assert_eq!(Engine::Strip.other(), Engine::Locator);
        assert!("quagga".parse::<Engine>().is_err());
    }

    #[test]
    fn test_status_transitions() {
        use ScanStatus::*;

        assert!(Idle.can_transition_to(Scanning));
        assert!(Scanning.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Error));
        assert!(Error.can_transition_to(Idle));
        assert!(Error.can_transition_to(Success));
        assert!(Success.can_transition_to(Idle));
        assert!(Idle.can_transition_to(Error));

        assert!(!Error.can_transition_to(Scanning));
        assert!(!Idle.can_transition_to(Processing));
        assert!(!Success.can_transition_to(Scanning));
        assert!(!Success.can_transition_to(Success));
    }

    #[test]
    fn test_scan_result_accept_canonicalizes() {
        let result =
            ScanResult::accept("036000291452", Some(Symbology::UpcA), None, ScanSource::Image)
                .unwrap();
        assert_eq!(result.code(), "0036000291452");
        assert_eq!(result.raw(), "036000291452");
        assert_eq!(result.source(), ScanSource::Image);
        assert!(!result.id().is_empty());
    }

    #[test]
    fn test_scan_result_rejects_invalid() {
        assert!(ScanResult::accept("12345A78", None, None, ScanSource::Manual).is_err());
    }

    #[test]
    fn test_engine_config_defaults_are_valid() {
        for engine in [Engine::Strip, Engine::Locator] {
            let config = EngineConfig::for_engine(engine);
            assert!(config.validate().is_ok());
            assert_eq!(config.symbologies.len(), 6);
        }
    }

    #[test]
    fn test_engine_config_validation() {
        let mut config = EngineConfig::for_engine(Engine::Strip);
        config.symbologies.push(Symbology::Ean13);
        assert!(config.validate().is_err());

        let mut config = EngineConfig::for_engine(Engine::Strip);
        config.max_width = 10;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::for_engine(Engine::Strip);
        config.symbologies.clear();
        assert!(config.validate().is_err());

        let mut config = EngineConfig::for_engine(Engine::Locator);
        config.scan_density = 0;
        assert!(config.validate().is_err());
    }

    fn stored_json(code: &str, raw: &str) -> String {
        format!(
            r#"{{"id":"a1","code":"{code}","raw":"{raw}","symbology":"upc_a","engine":"strip","source":"camera","scanned_at":"2024-03-01T12:00:00Z"}}"#
        )
    }

    #[test]
    fn test_scan_result_loads_valid_stored_entry() {
        let result: ScanResult =
            serde_json::from_str(&stored_json("0036000291452", "036000291452")).unwrap();
        assert_eq!(result.id(), "a1");
        assert_eq!(result.code(), "0036000291452");
        assert_eq!(result.engine(), Some(Engine::Strip));
        assert_eq!(result.scanned_at().to_rfc3339(), "2024-03-01T12:00:00+00:00");
    }

    #[test]
    fn test_scan_result_rejects_tampered_stored_entry() {
        // Code disagrees with the canonical form of raw
        let err = serde_json::from_str::<ScanResult>(&stored_json("036000291452", "036000291452"))
            .unwrap_err();
        assert!(err.to_string().contains("canonical"));

        // Raw is not a product code
        assert!(serde_json::from_str::<ScanResult>(&stored_json("1234567", "1234567")).is_err());
    }

    #[test]
    fn test_scan_result_survives_serialization() {
        let result =
            ScanResult::accept("96385074", Some(Symbology::Ean8), None, ScanSource::Image).unwrap();
        let json = serde_json::to_string(&result).unwrap();
        let loaded: ScanResult = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, result);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&ScanStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }
}
