//! # Decoder Adapter
//!
//! A uniform start/stop/decode-static contract over one decoding engine.
//!
//! ## Adapter Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Decoder Adapter                                  │
//! │                                                                         │
//! │  start(frames, sink)                                                   │
//! │    └── spawns frame loop ───────────────────────────────┐              │
//! │                                                          ▼              │
//! │        ┌──────────────────────────────────────────────────────────┐    │
//! │        │  loop (paced at fps)                                     │    │
//! │        │    select! {                                             │    │
//! │        │      shutdown       → break                              │    │
//! │        │      next frame     → engine.decode ─► sink.detected()   │    │
//! │        │      stream ended   → sink.failed(EngineInit), break     │    │
//! │        │    }                                                     │    │
//! │        │  frames.close()   ← camera released here, always         │    │
//! │        └──────────────────────────────────────────────────────────┘    │
//! │                                                                         │
//! │  stop()                                                                │
//! │    └── signal shutdown, join the loop task; no-op if not running       │
//! │                                                                         │
//! │  decode_static(image)                                                  │
//! │    └── original image, then preprocessing presets, first hit wins      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every event carries the generation it was started with; the session
//! drops events whose generation is no longer current.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use foodie_core::image::{preprocess_plan, PreprocessPreset};
use foodie_core::{Detection, Engine, EngineConfig, LumaImage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::capture::FrameStream;
use crate::config::ScannerConfig;
use crate::engines::{engine_for, DecodeEngine};
use crate::error::{ScanError, ScannerResult};

// =============================================================================
// Decode Events
// =============================================================================

/// Capacity of the decode event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Something an adapter observed while running.
#[derive(Debug, Clone)]
pub struct DecodeEvent {
    pub generation: u64,
    pub kind: DecodeEventKind,
}

#[derive(Debug, Clone)]
pub enum DecodeEventKind {
    /// A symbol was decoded from a frame.
    Detected(Detection),
    /// The adapter stopped on its own.
    Failed(ScanError),
}

/// Where a running adapter delivers its events.
///
/// Sends never wait: a full channel drops the event, since the session
/// only honours the first detection anyway.
#[derive(Debug, Clone)]
pub struct DecodeSink {
    generation: u64,
    tx: mpsc::Sender<DecodeEvent>,
}

impl DecodeSink {
    pub fn new(generation: u64, tx: mpsc::Sender<DecodeEvent>) -> Self {
        DecodeSink { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns false once the receiving side is gone.
    pub fn detected(&self, detection: Detection) -> bool {
        self.emit(DecodeEventKind::Detected(detection))
    }

    /// Returns false once the receiving side is gone.
    pub fn failed(&self, error: ScanError) -> bool {
        self.emit(DecodeEventKind::Failed(error))
    }

    fn emit(&self, kind: DecodeEventKind) -> bool {
        let event = DecodeEvent {
            generation: self.generation,
            kind,
        };
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(generation = self.generation, "Decode event channel full, dropping event");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

// =============================================================================
// Decoder Contract
// =============================================================================

/// A decoding engine behind a uniform lifecycle.
#[async_trait]
pub trait BarcodeDecoder: Send + Sync {
    fn engine(&self) -> Engine;

    /// Starts decoding `frames`, delivering results to `sink`.
    ///
    /// Takes ownership of the stream; it is closed when decoding ends,
    /// including when `start` itself fails.
    async fn start(&mut self, frames: Box<dyn FrameStream>, sink: DecodeSink) -> ScannerResult<()>;

    /// Stops decoding and waits until the stream is released.
    ///
    /// Stopping a stopped adapter is a no-op.
    async fn stop(&mut self) -> ScannerResult<()>;

    /// Decodes a single still image.
    async fn decode_static(&self, image: &LumaImage) -> ScannerResult<Option<Detection>>;

    fn is_running(&self) -> bool;
}

/// Adapter tuning shared by every engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecoderSettings {
    /// Minimum delay between decoded frames.
    pub frame_interval: Duration,
    /// Whether still images get preprocessing passes.
    pub preprocess: bool,
    /// Variants tried per still image, the original included.
    pub max_passes: usize,
}

impl DecoderSettings {
    pub fn from_config(config: &ScannerConfig) -> Self {
        DecoderSettings {
            frame_interval: config.frame_interval(),
            preprocess: config.preprocess.enabled,
            max_passes: config.preprocess.max_passes,
        }
    }
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self::from_config(&ScannerConfig::default())
    }
}

/// Builds the adapter for `config.engine` with default settings.
pub fn create_decoder(config: &EngineConfig) -> ScannerResult<Box<dyn BarcodeDecoder>> {
    create_decoder_with(config, DecoderSettings::default())
}

/// Builds the adapter for `config.engine`.
pub fn create_decoder_with(
    config: &EngineConfig,
    settings: DecoderSettings,
) -> ScannerResult<Box<dyn BarcodeDecoder>> {
    let engine = engine_for(config)?;
    info!(engine = %engine.engine(), offload = engine.offload(), "Decoder created");
    Ok(Box::new(StreamingDecoder::new(engine, settings)))
}

// =============================================================================
// Streaming Decoder
// =============================================================================

struct RunningLoop {
    generation: u64,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

/// The adapter used for every built-in engine.
pub struct StreamingDecoder {
    engine: Arc<dyn DecodeEngine>,
    settings: DecoderSettings,
    running: Option<RunningLoop>,
}

impl StreamingDecoder {
    pub fn new(engine: Arc<dyn DecodeEngine>, settings: DecoderSettings) -> Self {
        StreamingDecoder {
            engine,
            settings,
            running: None,
        }
    }

    /// Drops a loop that already ended on its own.
    fn reap_finished(&mut self) {
        if self
            .running
            .as_ref()
            .is_some_and(|running| running.task.is_finished())
        {
            self.running = None;
        }
    }
}

/// Runs one decode, on a blocking worker when the engine asks for it.
async fn decode_frame(
    engine: &Arc<dyn DecodeEngine>,
    image: LumaImage,
) -> ScannerResult<Option<Detection>> {
    if engine.offload() {
        let engine = Arc::clone(engine);
        tokio::task::spawn_blocking(move || engine.decode(&image))
            .await
            .map_err(|e| ScanError::EngineInit(format!("decode worker failed: {e}")))
    } else {
        Ok(engine.decode(&image))
    }
}

async fn next_paced(frames: &mut dyn FrameStream, ticker: &mut Interval) -> Option<LumaImage> {
    ticker.tick().await;
    frames.next_frame().await
}

async fn frame_loop(
    engine: Arc<dyn DecodeEngine>,
    mut frames: Box<dyn FrameStream>,
    sink: DecodeSink,
    mut shutdown_rx: mpsc::Receiver<()>,
    frame_interval: Duration,
) {
    let generation = sink.generation();
    info!(engine = %engine.engine(), generation, "Frame loop starting");

    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut frames_seen: u64 = 0;

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.recv() => {
                debug!(generation, "Frame loop received shutdown");
                break;
            }

            frame = next_paced(frames.as_mut(), &mut ticker) => {
                let Some(frame) = frame else {
                    warn!(generation, frames_seen, "Camera stream ended");
                    sink.failed(ScanError::EngineInit("camera stream ended".into()));
                    break;
                };
                frames_seen += 1;

                match decode_frame(&engine, frame).await {
                    Ok(Some(detection)) => {
                        debug!(generation, text = %detection.text, "Frame decoded");
                        if !sink.detected(detection) {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        sink.failed(e);
                        break;
                    }
                }
            }
        }
    }

    frames.close();
    info!(engine = %engine.engine(), generation, frames_seen, "Frame loop stopped");
}

#[async_trait]
impl BarcodeDecoder for StreamingDecoder {
    fn engine(&self) -> Engine {
        self.engine.engine()
    }

    async fn start(
        &mut self,
        mut frames: Box<dyn FrameStream>,
        sink: DecodeSink,
    ) -> ScannerResult<()> {
        self.reap_finished();
        if let Some(running) = &self.running {
            frames.close();
            return Err(ScanError::EngineInit(format!(
                "{} decoder is already running (generation {})",
                self.engine.engine(),
                running.generation
            )));
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let generation = sink.generation();
        let task = tokio::spawn(frame_loop(
            Arc::clone(&self.engine),
            frames,
            sink,
            shutdown_rx,
            self.settings.frame_interval,
        ));

        self.running = Some(RunningLoop {
            generation,
            shutdown_tx,
            task,
        });
        Ok(())
    }

    async fn stop(&mut self) -> ScannerResult<()> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };

        let _ = running.shutdown_tx.try_send(());
        match running.task.await {
            Ok(()) => {
                debug!(generation = running.generation, "Decoder stopped");
                Ok(())
            }
            Err(e) => Err(ScanError::EngineInit(format!("decoder task failed: {e}"))),
        }
    }

    async fn decode_static(&self, image: &LumaImage) -> ScannerResult<Option<Detection>> {
        let plan = if self.settings.preprocess {
            preprocess_plan(image, self.settings.max_passes)
        } else {
            vec![PreprocessPreset::None]
        };

        for preset in plan {
            let variant = match preset {
                PreprocessPreset::None => image.clone(),
                other => image.preprocess(&other.options()),
            };
            if let Some(detection) = decode_frame(&self.engine, variant).await? {
                debug!(preset = ?preset, text = %detection.text, "Still image decoded");
                return Ok(Some(detection));
            }
        }
        Ok(None)
    }

    fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }
}

impl Drop for StreamingDecoder {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.shutdown_tx.try_send(());
        }
    }
}
