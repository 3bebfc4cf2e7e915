//! # Error Types
//!
//! Domain-specific error types for foodie-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  foodie-core errors (this file)                                        │
//! │  ├── CoreError        - Image and symbology failures                   │
//! │  └── ValidationError  - Product code rule violations                   │
//! │                                                                         │
//! │  foodie-scanner errors (separate crate)                                │
//! │  └── ScanError        - Permission / EngineInit / Format / NotFound    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ScanError → Scanning view          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (field, dimensions, symbology)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

use crate::types::Symbology;

// =============================================================================
// Core Error
// =============================================================================

/// Core scanning errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// Pixel buffer does not match the declared dimensions.
    ///
    /// ## When This Occurs
    /// - A camera backend hands over a truncated frame
    /// - RGBA data is passed where luma data is expected
    #[error("Image buffer has {actual} bytes, expected {expected} for {width}x{height}")]
    BufferSizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// Image has no pixels.
    #[error("Image is empty")]
    EmptyImage,

    /// Text cannot be represented in the requested symbology.
    #[error("Cannot encode '{text}' as {symbology}: {reason}")]
    Unencodable {
        symbology: Symbology,
        text: String,
        reason: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when decoded or typed text is not an acceptable
/// product code.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g., letters in a numeric code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
