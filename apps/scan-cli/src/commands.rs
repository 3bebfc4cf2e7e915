//! # CLI Commands
//!
//! One handler per subcommand. Each builds what it needs from the loaded
//! [`ScannerConfig`] and prints results to stdout; logs go to stderr.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use foodie_core::symbology::render;
use foodie_core::{Engine, ScanResult, Symbology};
use foodie_scanner::{
    open_history, ImageUpload, ScanError, ScanSession, ScanSessionBuilder, ScannerConfig,
};
use tracing::{debug, info};

use crate::camera::{mime_for_path, DirectoryCamera};

/// How accepted scans are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Text,
    Json,
}

fn print_result(result: &ScanResult, output: Output) -> Result<()> {
    match output {
        Output::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        Output::Text => {
            let symbology = result
                .symbology()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string());
            let engine = result
                .engine()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{}\t{}\t{}\t{:?}\t{}",
                result.code(),
                symbology,
                engine,
                result.source(),
                result.scanned_at().to_rfc3339()
            );
        }
    }
    Ok(())
}

/// Turns a session error into a user-facing failure.
fn scan_failed(err: ScanError) -> anyhow::Error {
    match err.kind() {
        Some(kind) => anyhow::anyhow!("{err} ({kind:?})"),
        None => anyhow::Error::new(err),
    }
}

fn session(
    config: &ScannerConfig,
    engine: Option<Engine>,
    camera: Option<DirectoryCamera>,
) -> Result<ScanSession> {
    let mut builder = ScanSessionBuilder::new(config.clone());
    if let Some(engine) = engine {
        builder = builder.with_engine(engine);
    }
    if let Some(camera) = camera {
        builder = builder.with_camera(Arc::new(camera));
    }
    if let Some(history) = open_history(config) {
        builder = builder.with_history(history);
    }
    builder.build().context("Failed to create scan session")
}

// =============================================================================
// Scanning
// =============================================================================

pub async fn scan_image(
    config: &ScannerConfig,
    engine: Option<Engine>,
    path: &Path,
    output: Output,
) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let upload = ImageUpload::new(mime_for_path(path), bytes);
    debug!(path = %path.display(), mime = %upload.mime, "Scanning image");

    let mut session = session(config, engine, None)?;
    let result = session.select_image(&upload).await;
    session.close().await;

    print_result(&result.map_err(scan_failed)?, output)
}

pub async fn scan_camera(
    config: &ScannerConfig,
    engine: Option<Engine>,
    frames: &Path,
    output: Output,
) -> Result<()> {
    if !frames.is_dir() {
        bail!("{} is not a directory of frames", frames.display());
    }

    let mut session = session(config, engine, Some(DirectoryCamera::new(frames)))?;
    session.enter_camera_mode().await.map_err(scan_failed)?;
    info!(engine = %session.engine(), "Scanning frames from {}", frames.display());

    let result = session.wait_for_scan().await;
    session.close().await;

    print_result(&result.map_err(scan_failed)?, output)
}

pub async fn manual(config: &ScannerConfig, code: &str, output: Output) -> Result<()> {
    let mut session = session(config, None, None)?;
    let result = session.submit_manual(code).await;
    session.close().await;

    match result.map_err(scan_failed)? {
        Some(result) => print_result(&result, output),
        None => bail!("Code was not accepted"),
    }
}

// =============================================================================
// Rendering
// =============================================================================

pub fn render_symbol(
    symbology: Symbology,
    text: &str,
    out: &Path,
    module_px: u32,
    height: u32,
) -> Result<()> {
    let symbol = render(symbology, text, module_px, height)
        .with_context(|| format!("Cannot render '{text}' as {symbology}"))?;

    let (width, height) = (symbol.width(), symbol.height());
    let Some(gray) = image::GrayImage::from_raw(width, height, symbol.into_raw()) else {
        bail!("Rendered buffer does not match {width}x{height}");
    };
    gray.save(out)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    info!(symbology = %symbology, width, height, "Symbol written to {}", out.display());
    Ok(())
}

// =============================================================================
// History
// =============================================================================

pub async fn history(config: &ScannerConfig, clear: bool, output: Output) -> Result<()> {
    let Some(store) = open_history(config) else {
        bail!("Scan history is disabled in the configuration");
    };

    if clear {
        store.clear().await.context("Failed to clear history")?;
        println!("History cleared");
        return Ok(());
    }

    let entries = store.list().await.context("Failed to read history")?;
    if entries.is_empty() && output == Output::Text {
        println!("No scans recorded");
    }
    match output {
        Output::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        Output::Text => {
            for entry in &entries {
                print_result(entry, output)?;
            }
        }
    }
    Ok(())
}
