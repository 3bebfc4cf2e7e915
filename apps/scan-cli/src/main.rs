//! foodie-scan - Scan product barcodes from images, frame folders or typed
//! input, and print the canonical product code.

mod camera;
mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use foodie_core::{Engine, Symbology};
use foodie_scanner::ScannerConfig;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::commands::Output;

/// Scan product barcodes and print canonical product codes
#[derive(Parser, Debug)]
#[command(name = "foodie-scan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Decoding engine (strip or locator); defaults to the configured one
    #[arg(short, long, global = true)]
    engine: Option<Engine>,

    /// Path to scanner.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a single image file
    Image {
        /// PNG or JPEG file
        file: PathBuf,
    },

    /// Scan a directory of frames as if it were a live camera
    Camera {
        /// Directory of PNG/JPEG frames, played in file name order
        #[arg(long)]
        frames: PathBuf,
    },

    /// Validate a typed product code
    Manual { code: String },

    /// Render a code as a PNG symbol
    Render {
        /// Text to encode
        code: String,

        /// Output PNG path
        out: PathBuf,

        /// Symbology (ean13, upca, ean8, upce, code39)
        #[arg(short, long, default_value = "ean13")]
        symbology: Symbology,

        /// Module width in pixels
        #[arg(long, default_value = "3")]
        module: u32,

        /// Symbol height in pixels
        #[arg(long, default_value = "80")]
        height: u32,
    },

    /// List or clear scan history
    History {
        /// Remove all recorded scans
        #[arg(long)]
        clear: bool,
    },
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides the verbosity.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn,foodie=info",
        1 => "info,foodie=debug",
        _ => "debug,foodie=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ScannerConfig::load(cli.config.clone()).context("Failed to load scanner config")?;
    debug!(?config, "Scanner config loaded");

    let output = if cli.json { Output::Json } else { Output::Text };

    match cli.command {
        Command::Image { file } => commands::scan_image(&config, cli.engine, &file, output).await,
        Command::Camera { frames } => {
            commands::scan_camera(&config, cli.engine, &frames, output).await
        }
        Command::Manual { code } => commands::manual(&config, &code, output).await,
        Command::Render {
            code,
            out,
            symbology,
            module,
            height,
        } => commands::render_symbol(symbology, &code, &out, module, height),
        Command::History { clear } => commands::history(&config, clear, output).await,
    }
}
