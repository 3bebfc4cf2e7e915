//! # foodie-scanner: Async Scanning Pipeline for Foodie Safety
//!
//! This crate turns camera frames and uploaded images into validated,
//! canonical product codes for the product lookup screen.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Scanning Pipeline                                │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                   ScanSession (State Machine)                    │  │
//! │  │                                                                  │  │
//! │  │  Idle → Scanning → (Processing) → Success / Error                │  │
//! │  │  Hands exactly one accepted ScanResult per round to the caller   │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │CaptureControl. │  │ EngineSelector │  │  ScanHistoryStore      │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Camera open/   │  │ One active     │  │ Accepted scans,        │    │
//! │  │ fallback,      │  │ BarcodeDecoder │  │ newest first           │    │
//! │  │ upload checks  │  │ A/B switching  │  │ (memory / JSON file)   │    │
//! │  └────────────────┘  └───────┬────────┘  └────────────────────────┘    │
//! │                              ▼                                          │
//! │                     ┌────────────────┐                                  │
//! │                     │ StreamingDeco. │  frame loop task per start,     │
//! │                     │ + DecodeEngine │  zedbar / rxing engines         │
//! │                     └────────────────┘                                  │
//! │                                                                         │
//! │  SESSION EVENTS (to the view via ScanEventEmitter):                    │
//! │  • emit_scan   - accepted code                                         │
//! │  • emit_status - state changes                                         │
//! │  • emit_error  - Permission / EngineInit / Format / NotFound           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`capture`] - Camera capability traits and upload ingestion
//! - [`config`] - Scanner configuration (TOML + environment)
//! - [`decoder`] - Decoder adapter contract and the streaming adapter
//! - [`engines`] - Strip (zedbar) and locator (rxing) decoding engines
//! - [`error`] - Scanner error types
//! - [`history`] - Scan history stores
//! - [`selector`] - Engine selector
//! - [`session`] - Scan session state machine
//!
//! ## Usage
//!
//! ```rust,ignore
//! use foodie_scanner::{ImageUpload, ScanSessionBuilder, ScannerConfig};
//!
//! let config = ScannerConfig::load_or_default(None);
//! let mut session = ScanSessionBuilder::new(config)
//!     .with_camera(camera)
//!     .build()?;
//!
//! session.enter_camera_mode().await?;
//! let result = session.wait_for_scan().await?;
//! println!("Product code: {}", result.code());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod capture;
pub mod config;
pub mod decoder;
pub mod engines;
pub mod error;
pub mod history;
pub mod selector;
pub mod session;

// =============================================================================
// Re-exports
// =============================================================================

pub use capture::{
    decode_luma, CameraError, CameraSource, CaptureConstraints, CaptureController, FrameStream,
    ImageUpload,
};
pub use config::{CameraFacing, ScannerConfig};
pub use decoder::{
    create_decoder, create_decoder_with, BarcodeDecoder, DecodeEvent, DecodeEventKind, DecodeSink,
    DecoderSettings,
};
pub use error::{ScanError, ScannerResult};
pub use history::{open_history, JsonFileHistory, MemoryHistory, ScanHistoryStore};
pub use selector::{DecoderFactory, EngineSelector};
pub use session::{NoOpEmitter, ScanEventEmitter, ScanSession, ScanSessionBuilder};
