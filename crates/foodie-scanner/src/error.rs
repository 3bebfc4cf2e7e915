//! # Scanner Error Types
//!
//! Error types for capture, decoding and session operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Scanner Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Permission    │  │   EngineInit    │  │       Format            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  PermissionDen. │  │  EngineInit     │  │  UnsupportedFile        │ │
//! │  │                 │  │  CameraBusy     │  │  ImageDecode            │ │
//! │  │                 │  │  NoCamera       │  │  Rejected               │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    NotFound     │  │ Configuration   │  │      Internal           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  NotFound       │  │  InvalidConfig  │  │  History                │ │
//! │  │                 │  │  ConfigLoad/Save│  │  SessionClosed          │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The first four boxes are what the scanning view shows; [`ScanError::kind`]
//! maps every variant onto them.

use foodie_core::{CoreError, ScanErrorKind, ValidationError};
use thiserror::Error;

/// Result type alias for scanner operations.
pub type ScannerResult<T> = Result<T, ScanError>;

/// Scanner error type.
#[derive(Debug, Error, Clone)]
pub enum ScanError {
    // =========================================================================
    // Camera Errors
    // =========================================================================
    /// The user or platform refused camera access.
    #[error("Camera access was denied: {0}")]
    PermissionDenied(String),

    /// Another application holds the camera.
    #[error("Camera is in use by another application: {0}")]
    CameraBusy(String),

    /// No camera device is present.
    #[error("No camera found on this device")]
    NoCamera,

    // =========================================================================
    // Decoder Errors
    // =========================================================================
    /// A decoder could not be started or stopped working.
    #[error("Scanner failed to start: {0}")]
    EngineInit(String),

    /// No barcode was located in a static image.
    #[error("No barcode found in the image")]
    NotFound,

    // =========================================================================
    // Format Errors
    // =========================================================================
    /// The uploaded file is not an image.
    #[error("Unsupported file type '{mime}': please choose an image")]
    UnsupportedFile { mime: String },

    /// The upload claims to be an image but cannot be read.
    #[error("Could not read image: {0}")]
    ImageDecode(String),

    /// Decoded or typed text is not a product code.
    #[error("'{raw}' is not a valid product code: {reason}")]
    Rejected {
        raw: String,
        reason: ValidationError,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid scanner configuration.
    #[error("Invalid scanner configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Scan history could not be read or written.
    #[error("Scan history error: {0}")]
    History(String),

    /// The session was closed.
    #[error("Scan session is closed")]
    SessionClosed,

    /// Core library error.
    #[error(transparent)]
    Core(#[from] CoreError),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<toml::de::Error> for ScanError {
    fn from(err: toml::de::Error) -> Self {
        ScanError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ScanError {
    fn from(err: toml::ser::Error) -> Self {
        ScanError::ConfigSaveFailed(err.to_string())
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::History(err.to_string())
    }
}

impl From<image::ImageError> for ScanError {
    fn from(err: image::ImageError) -> Self {
        ScanError::ImageDecode(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl ScanError {
    /// Builds a rejection for text that failed product code validation.
    pub fn rejected(raw: impl Into<String>, reason: ValidationError) -> Self {
        ScanError::Rejected {
            raw: raw.into(),
            reason,
        }
    }

    /// The user-facing class of this error.
    ///
    /// ## Mapping
    /// - camera refusal → `Permission`
    /// - busy/missing camera, decoder start failures → `EngineInit`
    /// - non-image uploads, unreadable images, rejected codes → `Format`
    /// - nothing decoded from a still image → `NotFound`
    ///
    /// Configuration and storage errors have no user-facing class.
    pub fn kind(&self) -> Option<ScanErrorKind> {
        match self {
            ScanError::PermissionDenied(_) => Some(ScanErrorKind::Permission),
            ScanError::CameraBusy(_) | ScanError::NoCamera | ScanError::EngineInit(_) => {
                Some(ScanErrorKind::EngineInit)
            }
            ScanError::UnsupportedFile { .. }
            | ScanError::ImageDecode(_)
            | ScanError::Rejected { .. } => Some(ScanErrorKind::Format),
            ScanError::NotFound => Some(ScanErrorKind::NotFound),
            ScanError::Core(CoreError::Validation(_)) => Some(ScanErrorKind::Format),
            ScanError::Core(_) => Some(ScanErrorKind::EngineInit),
            ScanError::InvalidConfig(_)
            | ScanError::ConfigLoadFailed(_)
            | ScanError::ConfigSaveFailed(_)
            | ScanError::History(_)
            | ScanError::SessionClosed => None,
        }
    }

    /// Returns true if repeating the same action may succeed.
    ///
    /// Permission denials need a settings change and unsupported files need
    /// a different file, so neither is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScanError::CameraBusy(_)
                | ScanError::EngineInit(_)
                | ScanError::NotFound
                | ScanError::ImageDecode(_)
                | ScanError::Rejected { .. }
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ScanError::InvalidConfig(_)
                | ScanError::ConfigLoadFailed(_)
                | ScanError::ConfigSaveFailed(_)
        )
    }
}
