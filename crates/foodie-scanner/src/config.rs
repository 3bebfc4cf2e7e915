//! # Scanner Configuration
//!
//! Configuration management for the scanning pipeline.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FOODIE_SCAN_ENGINE=locator                                         │
//! │     FOODIE_SCAN_FPS=15                                                 │
//! │     FOODIE_HISTORY_PATH=/tmp/history.json                              │
//! │     FOODIE_HISTORY_ENABLED=false                                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/safety/scanner.toml (Linux)                              │
//! │     ~/Library/Application Support/com.foodie.safety/scanner.toml       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     Engine::Strip, 10 fps, rear camera, 1280x720                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # scanner.toml
//! [scanner]
//! default_engine = "strip"   # strip | locator
//! fps = 10
//! facing = "environment"     # environment | user | any
//! ideal_width = 1280
//! ideal_height = 720
//!
//! [engines.strip]            # omitted fields keep the engine defaults
//! workers = 1
//! scan_density = 2
//!
//! [engines.locator]
//! symbologies = ["ean13", "upc_a", "ean8"]
//! try_inverted = false
//!
//! [preprocess]
//! enabled = true
//! max_passes = 4
//!
//! [history]
//! enabled = true
//! max_entries = 200
//! ```

use std::path::PathBuf;
use std::time::Duration;

use foodie_core::{Engine, EngineConfig, Symbology};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ScanError, ScannerResult};

// =============================================================================
// Camera Facing
// =============================================================================

/// Which camera to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraFacing {
    /// Rear camera, pointed away from the user.
    #[default]
    Environment,
    /// Front camera.
    User,
    /// Whatever the platform offers first.
    Any,
}

impl std::fmt::Display for CameraFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraFacing::Environment => write!(f, "environment"),
            CameraFacing::User => write!(f, "user"),
            CameraFacing::Any => write!(f, "any"),
        }
    }
}

// =============================================================================
// Scanner Settings
// =============================================================================

/// Capture and session behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerSettings {
    /// Engine selected when a session starts.
    #[serde(default)]
    pub default_engine: Engine,

    /// Frames decoded per second in camera mode.
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Preferred camera.
    #[serde(default)]
    pub facing: CameraFacing,

    /// Requested frame width (the camera may deliver another size).
    #[serde(default = "default_ideal_width")]
    pub ideal_width: u32,

    /// Requested frame height.
    #[serde(default = "default_ideal_height")]
    pub ideal_height: u32,
}

fn default_fps() -> u32 {
    10
}

fn default_ideal_width() -> u32 {
    1280
}

fn default_ideal_height() -> u32 {
    720
}

impl Default for ScannerSettings {
    fn default() -> Self {
        ScannerSettings {
            default_engine: Engine::default(),
            fps: default_fps(),
            facing: CameraFacing::default(),
            ideal_width: default_ideal_width(),
            ideal_height: default_ideal_height(),
        }
    }
}

// =============================================================================
// Engine Settings
// =============================================================================

/// Per-engine decoder configuration.
///
/// Each table may be partial; missing fields take that engine's defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_strip", deserialize_with = "strip_table")]
    pub strip: EngineConfig,

    #[serde(default = "default_locator", deserialize_with = "locator_table")]
    pub locator: EngineConfig,
}

/// An `[engines.*]` table as written in the file.
#[derive(Debug, Default, Deserialize)]
struct EngineTable {
    engine: Option<Engine>,
    symbologies: Option<Vec<Symbology>>,
    min_width: Option<u32>,
    min_height: Option<u32>,
    max_width: Option<u32>,
    workers: Option<u8>,
    scan_density: Option<u32>,
    try_inverted: Option<bool>,
}

impl EngineTable {
    /// Fills missing fields from the defaults of `engine`.
    ///
    /// A conflicting `engine` tag is kept so validation can report it.
    fn over_defaults(self, engine: Engine) -> EngineConfig {
        let defaults = EngineConfig::for_engine(engine);
        EngineConfig {
            engine: self.engine.unwrap_or(engine),
            symbologies: self.symbologies.unwrap_or(defaults.symbologies),
            min_width: self.min_width.unwrap_or(defaults.min_width),
            min_height: self.min_height.unwrap_or(defaults.min_height),
            max_width: self.max_width.unwrap_or(defaults.max_width),
            workers: self.workers.unwrap_or(defaults.workers),
            scan_density: self.scan_density.unwrap_or(defaults.scan_density),
            try_inverted: self.try_inverted.unwrap_or(defaults.try_inverted),
        }
    }
}

fn strip_table<'de, D: Deserializer<'de>>(deserializer: D) -> Result<EngineConfig, D::Error> {
    Ok(EngineTable::deserialize(deserializer)?.over_defaults(Engine::Strip))
}

fn locator_table<'de, D: Deserializer<'de>>(deserializer: D) -> Result<EngineConfig, D::Error> {
    Ok(EngineTable::deserialize(deserializer)?.over_defaults(Engine::Locator))
}

fn default_strip() -> EngineConfig {
    EngineConfig::for_engine(Engine::Strip)
}

fn default_locator() -> EngineConfig {
    EngineConfig::for_engine(Engine::Locator)
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            strip: default_strip(),
            locator: default_locator(),
        }
    }
}

// =============================================================================
// Preprocess Settings
// =============================================================================

/// Still-image enhancement.
///
/// Static decoding first tries the unmodified image, then the preset picked
/// by quality analysis and its stronger escalations, up to `max_passes`
/// variants in total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_max_passes")]
    pub max_passes: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_passes() -> usize {
    4
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        PreprocessSettings {
            enabled: true,
            max_passes: default_max_passes(),
        }
    }
}

// =============================================================================
// History Settings
// =============================================================================

/// Scan history persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// History file; defaults to `history.json` in the data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Oldest entries beyond this count are dropped.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_max_entries() -> usize {
    200
}

impl Default for HistorySettings {
    fn default() -> Self {
        HistorySettings {
            enabled: true,
            path: None,
            max_entries: default_max_entries(),
        }
    }
}

// =============================================================================
// Main Scanner Configuration
// =============================================================================

/// Complete scanner configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default)]
    pub scanner: ScannerSettings,

    #[serde(default)]
    pub engines: EngineSettings,

    #[serde(default)]
    pub preprocess: PreprocessSettings,

    #[serde(default)]
    pub history: HistorySettings,
}

impl ScannerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (scanner.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ScannerResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading scanner config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| ScanError::ConfigLoadFailed(e.to_string()))?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load scanner config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ScannerResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ScanError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ScanError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ScanError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Scanner config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ScannerResult<()> {
        if self.scanner.fps == 0 || self.scanner.fps > 60 {
            return Err(ScanError::InvalidConfig(format!(
                "fps must be between 1 and 60, got {}",
                self.scanner.fps
            )));
        }

        if self.scanner.ideal_width == 0 || self.scanner.ideal_height == 0 {
            return Err(ScanError::InvalidConfig(
                "ideal_width and ideal_height must be greater than 0".into(),
            ));
        }

        for (expected, config) in [
            (Engine::Strip, &self.engines.strip),
            (Engine::Locator, &self.engines.locator),
        ] {
            if config.engine != expected {
                return Err(ScanError::InvalidConfig(format!(
                    "[engines.{}] declares engine '{}'",
                    expected, config.engine
                )));
            }
            config
                .validate()
                .map_err(|e| ScanError::InvalidConfig(format!("[engines.{}] {}", expected, e)))?;
        }

        if self.preprocess.max_passes == 0 {
            return Err(ScanError::InvalidConfig(
                "preprocess.max_passes must be greater than 0".into(),
            ));
        }

        if self.history.max_entries == 0 {
            return Err(ScanError::InvalidConfig(
                "history.max_entries must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`, keyed by environment variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(engine) = lookup("FOODIE_SCAN_ENGINE") {
            match engine.parse() {
                Ok(parsed) => {
                    debug!(engine = %engine, "Overriding default engine from environment");
                    self.scanner.default_engine = parsed;
                }
                Err(_) => warn!(engine = %engine, "Unknown engine in environment"),
            }
        }

        if let Some(fps) = lookup("FOODIE_SCAN_FPS") {
            if let Ok(parsed) = fps.parse::<u32>() {
                debug!(fps = parsed, "Overriding fps from environment");
                self.scanner.fps = parsed;
            }
        }

        if let Some(path) = lookup("FOODIE_HISTORY_PATH") {
            debug!(path = %path, "Overriding history path from environment");
            self.history.path = Some(PathBuf::from(path));
        }

        if let Some(enabled) = lookup("FOODIE_HISTORY_ENABLED") {
            match enabled.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.history.enabled = true,
                "0" | "false" | "no" | "off" => self.history.enabled = false,
                _ => warn!(value = %enabled, "Unknown FOODIE_HISTORY_ENABLED value"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "foodie", "safety")
            .map(|dirs| dirs.config_dir().join("scanner.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the configuration for `engine`.
    pub fn engine_config(&self, engine: Engine) -> &EngineConfig {
        match engine {
            Engine::Strip => &self.engines.strip,
            Engine::Locator => &self.engines.locator,
        }
    }

    /// Delay between decoded camera frames.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.scanner.fps.max(1)))
    }

    /// History file location, if one can be determined.
    pub fn history_path(&self) -> Option<PathBuf> {
        self.history.path.clone().or_else(|| {
            directories::ProjectDirs::from("com", "foodie", "safety")
                .map(|dirs| dirs.data_dir().join("history.json"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ScannerConfig::default();
        assert_eq!(config.scanner.default_engine, Engine::Strip);
        assert_eq!(config.scanner.fps, 10);
        assert_eq!(config.scanner.facing, CameraFacing::Environment);
        assert!(config.preprocess.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ScannerConfig = toml::from_str(
            r#"
            [scanner]
            default_engine = "locator"
            fps = 5

            [history]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.scanner.default_engine, Engine::Locator);
        assert_eq!(config.scanner.fps, 5);
        assert_eq!(config.scanner.ideal_width, 1280);
        assert!(!config.history.enabled);
        assert_eq!(config.history.max_entries, 200);
        assert_eq!(config.engines.locator.workers, 2);
    }

    #[test]
    fn test_partial_engine_table_keeps_engine_defaults() {
        let config: ScannerConfig = toml::from_str("[engines.strip]\nworkers = 1\n").unwrap();

        let expected = EngineConfig {
            workers: 1,
            ..EngineConfig::for_engine(Engine::Strip)
        };
        assert_eq!(config.engines.strip, expected);
        assert_eq!(config.engines.locator, EngineConfig::for_engine(Engine::Locator));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_locator_table() {
        let config: ScannerConfig = toml::from_str(
            r#"
            [engines.locator]
            symbologies = ["ean13", "code128"]
            try_inverted = false
            "#,
        )
        .unwrap();

        let locator = &config.engines.locator;
        assert_eq!(locator.engine, Engine::Locator);
        assert_eq!(locator.symbologies, vec![Symbology::Ean13, Symbology::Code128]);
        assert!(!locator.try_inverted);
        assert_eq!(locator.max_width, 800);
        assert_eq!(locator.workers, 2);
    }

    #[test]
    fn test_engine_table_with_wrong_tag_fails_validation() {
        let config: ScannerConfig =
            toml::from_str("[engines.strip]\nengine = \"locator\"\n").unwrap();
        assert_eq!(config.engines.strip.engine, Engine::Locator);
        assert!(matches!(config.validate(), Err(ScanError::InvalidConfig(_))));
    }

    #[test]
    fn test_saved_engine_tables_load_back() {
        let mut config = ScannerConfig::default();
        config.engines.strip.scan_density = 3;
        let text = toml::to_string_pretty(&config).unwrap();

        let loaded: ScannerConfig = toml::from_str(&text).unwrap();
        assert_eq!(loaded.engines.strip, config.engines.strip);
        assert_eq!(loaded.engines.locator, config.engines.locator);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = ScannerConfig::default();
        config.scanner.fps = 0;
        assert!(matches!(config.validate(), Err(ScanError::InvalidConfig(_))));

        let mut config = ScannerConfig::default();
        config.engines.strip.engine = Engine::Locator;
        assert!(config.validate().is_err());

        let mut config = ScannerConfig::default();
        config.engines.locator.symbologies.clear();
        assert!(config.validate().is_err());

        let mut config = ScannerConfig::default();
        config.preprocess.max_passes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FOODIE_SCAN_ENGINE", "b"),
            ("FOODIE_SCAN_FPS", "15"),
            ("FOODIE_HISTORY_PATH", "/tmp/scans.json"),
            ("FOODIE_HISTORY_ENABLED", "off"),
        ]
        .into_iter()
        .collect();

        let mut config = ScannerConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.scanner.default_engine, Engine::Locator);
        assert_eq!(config.scanner.fps, 15);
        assert_eq!(config.history_path(), Some(PathBuf::from("/tmp/scans.json")));
        assert!(!config.history.enabled);
    }

    #[test]
    fn test_unknown_override_is_ignored() {
        let mut config = ScannerConfig::default();
        config.apply_overrides(|key| (key == "FOODIE_SCAN_ENGINE").then(|| "quagga".to_string()));
        assert_eq!(config.scanner.default_engine, Engine::Strip);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("scanner.toml");

        let mut config = ScannerConfig::default();
        config.scanner.fps = 12;
        config.scanner.facing = CameraFacing::User;
        config.save(Some(path.clone())).unwrap();

        let loaded = ScannerConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.scanner.fps, 12);
        assert_eq!(loaded.scanner.facing, CameraFacing::User);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scanner.toml");
        std::fs::write(&path, "[scanner\nfps = ").unwrap();

        assert!(matches!(
            ScannerConfig::load(Some(path.clone())),
            Err(ScanError::ConfigLoadFailed(_))
        ));
        assert_eq!(ScannerConfig::load_or_default(Some(path)).scanner.fps, 10);
    }

    #[test]
    fn test_frame_interval() {
        let config = ScannerConfig::default();
        assert_eq!(config.frame_interval(), Duration::from_millis(100));
    }
}
