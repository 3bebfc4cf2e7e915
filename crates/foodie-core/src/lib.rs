//! # foodie-core: Pure Scanning Logic for Foodie Safety
//!
//! This crate is the **heart** of the barcode scanner. It contains all
//! scanning logic that does not need a camera, a runtime or a file system.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Foodie Scanner Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Web Scanning View                            │   │
//! │  │    Camera preview ──► Upload button ──► Manual barcode field   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ ScanSession API                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               foodie-scanner (async pipeline)                   │   │
//! │  │    CaptureController, BarcodeDecoder, EngineSelector, Session   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ foodie-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   image   │  │ symbology │  │ validation│  │   │
//! │  │   │ ScanResult│  │ LumaImage │  │ EAN / UPC │  │ 8..=13    │  │   │
//! │  │   │ ScanStatus│  │ Presets   │  │ Code 39   │  │ canonical │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO CAMERA • NO NETWORK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (ScanResult, ScanStatus, EngineConfig, etc.)
//! - [`error`] - Domain error types
//! - [`validation`] - Product code validation and canonicalization
//! - [`image`] - Grayscale frames and preprocessing presets
//! - [`symbology`] - Detections and symbol rendering (EAN/UPC, Code 39)
//!
//! ## Example Usage
//!
//! ```rust
//! use foodie_core::validation::{canonicalize_product_code, validate_product_code};
//!
//! let raw = "036000291452";
//! validate_product_code(raw).unwrap();
//!
//! // UPC-A is looked up in its EAN-13 form
//! assert_eq!(canonicalize_product_code(raw), "0036000291452");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod image;
pub mod symbology;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use image::{LumaImage, PreprocessOptions, PreprocessPreset};
pub use symbology::Detection;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Shortest accepted product code (UPC-E / EAN-8).
pub const MIN_PRODUCT_CODE_LEN: usize = 8;

/// Longest accepted product code (EAN-13).
pub const MAX_PRODUCT_CODE_LEN: usize = 13;

/// Length of a UPC-A code, which is canonicalized to EAN-13.
pub const UPC_A_LEN: usize = 12;
