//! # Scan Session
//!
//! The state machine behind the scanning view. Ties capture, decoding,
//! validation and user feedback together and hands accepted codes to the
//! caller.
//!
//! ## Session Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Scan Session                                   │
//! │                                                                         │
//! │  enter_camera_mode()                                                   │
//! │    teardown → Idle → Scanning → open camera → selector.start(gen N)    │
//! │                                        │                               │
//! │                 DecodeEvent { gen N } ◄┘  (mpsc, bounded)              │
//! │                        │                                               │
//! │  process_event()       ▼                                               │
//! │    ├── stale generation / already succeeded → ignored                  │
//! │    ├── Detected + valid   → stop adapter → Success → emit_scan()       │
//! │    ├── Detected + invalid → last_error, keep Scanning                  │
//! │    └── Failed             → stop adapter → Error                       │
//! │                                                                         │
//! │  select_image(upload)                                                  │
//! │    teardown → Idle → Scanning → ingest → Processing → decode_static    │
//! │    ├── valid code      → Success → emit_scan()                         │
//! │    └── reject/nothing  → Error                                         │
//! │                                                                         │
//! │  submit_manual(text)   → Success (from any non-success state)          │
//! │  switch_engine / restart / close → teardown first                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Success Guard
//! At most one result is accepted per scan round. A round ends when the
//! session passes through `Idle` (restart, mode change, engine switch).
//! Every teardown also bumps the generation, so events from an adapter
//! that was already stopped are dropped.

use std::sync::Arc;

use foodie_core::{Engine, ScanMode, ScanResult, ScanSource, ScanStatus, SessionSnapshot};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capture::{CameraSource, CaptureConstraints, CaptureController, ImageUpload};
use crate::config::ScannerConfig;
use crate::decoder::{DecodeEvent, DecodeEventKind, DecodeSink, EVENT_CHANNEL_CAPACITY};
use crate::error::{ScanError, ScannerResult};
use crate::history::ScanHistoryStore;
use crate::selector::{config_factory, DecoderFactory, EngineSelector};

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives session notifications (implemented by the view layer).
pub trait ScanEventEmitter: Send + Sync {
    /// Emits an accepted code. Called at most once per scan round.
    fn emit_scan(&self, result: &ScanResult);

    /// Emits the session state after a status change.
    fn emit_status(&self, snapshot: &SessionSnapshot);

    /// Emits a user-facing error.
    fn emit_error(&self, error: &ScanError);
}

/// No-op event emitter for testing.
pub struct NoOpEmitter;

impl ScanEventEmitter for NoOpEmitter {
    fn emit_scan(&self, _result: &ScanResult) {}
    fn emit_status(&self, _snapshot: &SessionSnapshot) {}
    fn emit_error(&self, _error: &ScanError) {}
}

// =============================================================================
// Scan Session
// =============================================================================

pub struct ScanSession {
    id: Uuid,
    mode: ScanMode,
    status: ScanStatus,
    last_error: Option<ScanError>,

    selector: EngineSelector,
    capture: CaptureController,

    /// Adapters send through clones of `events_tx`.
    events_tx: mpsc::Sender<DecodeEvent>,
    events_rx: mpsc::Receiver<DecodeEvent>,

    /// Current adapter generation; events carrying another are stale.
    generation: u64,

    /// Set once a result is accepted in the current round.
    succeeded: bool,

    emitter: Arc<dyn ScanEventEmitter>,
    history: Option<Arc<dyn ScanHistoryStore>>,
    closed: bool,
}

impl ScanSession {
    fn new(
        selector: EngineSelector,
        capture: CaptureController,
        emitter: Arc<dyn ScanEventEmitter>,
        history: Option<Arc<dyn ScanHistoryStore>>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let id = Uuid::new_v4();
        info!(session_id = %id, engine = %selector.current(), "Scan session created");

        ScanSession {
            id,
            mode: ScanMode::default(),
            status: ScanStatus::Idle,
            last_error: None,
            selector,
            capture,
            events_tx,
            events_rx,
            generation: 0,
            succeeded: false,
            emitter,
            history,
            closed: false,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    pub fn status(&self) -> ScanStatus {
        self.status
    }

    pub fn engine(&self) -> Engine {
        self.selector.current()
    }

    pub fn last_error(&self) -> Option<&ScanError> {
        self.last_error.as_ref()
    }

    /// Generation that events from the running adapter carry.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns true if a decoder is currently consuming camera frames.
    pub fn is_capturing(&self) -> bool {
        self.selector.is_running()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.to_string(),
            mode: self.mode,
            engine: self.selector.current(),
            status: self.status,
            last_error: self.last_error.as_ref().map(ToString::to_string),
            last_error_kind: self.last_error.as_ref().and_then(ScanError::kind),
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Switches to live camera scanning.
    ///
    /// Tears down any previous capture first. A camera or decoder failure
    /// leaves the session in `Error` and is also returned.
    pub async fn enter_camera_mode(&mut self) -> ScannerResult<()> {
        self.ensure_open()?;
        self.teardown(ScanMode::Camera).await;
        self.start_camera().await
    }

    /// Scans one uploaded image.
    ///
    /// Starts a new round. On any failure (not an image, unreadable, no
    /// barcode, rejected code) the session is left in `Error`.
    pub async fn select_image(&mut self, upload: &ImageUpload) -> ScannerResult<ScanResult> {
        self.ensure_open()?;
        self.teardown(ScanMode::Image).await;
        self.set_status(ScanStatus::Scanning);

        let image = match self.capture.ingest_image(upload).await {
            Ok(image) => image,
            Err(e) => return Err(self.fail(e)),
        };

        self.set_status(ScanStatus::Processing);
        let engine = self.selector.current();
        let detection = match self.selector.decode_static(&image).await {
            Ok(Some(detection)) => detection,
            Ok(None) => return Err(self.fail(ScanError::NotFound)),
            Err(e) => return Err(self.fail(e)),
        };

        debug!(
            session_id = %self.id,
            engine = %engine,
            text = %detection.text,
            "Image decoded"
        );
        match ScanResult::accept(
            &detection.text,
            Some(detection.symbology),
            Some(engine),
            ScanSource::Image,
        ) {
            Ok(result) => Ok(self.succeed(result).await),
            Err(reason) => Err(self.fail(ScanError::rejected(detection.text, reason))),
        }
    }

    /// Accepts a code typed into the manual field.
    ///
    /// Stops any running capture on success. A rejected entry is reported
    /// but leaves the status unchanged.
    pub async fn submit_manual(&mut self, input: &str) -> ScannerResult<Option<ScanResult>> {
        self.ensure_open()?;
        if self.succeeded {
            debug!(session_id = %self.id, "Ignoring manual entry after success");
            return Ok(None);
        }

        match ScanResult::accept(input.trim(), None, None, ScanSource::Manual) {
            Ok(result) => Ok(Some(self.succeed(result).await)),
            Err(reason) => {
                let err = ScanError::rejected(input.trim(), reason);
                self.report(err.clone());
                Err(err)
            }
        }
    }

    /// Makes `engine` the active decoder.
    ///
    /// The session returns to `Idle`. If the camera was scanning, capture
    /// restarts with the new engine.
    pub async fn switch_engine(&mut self, engine: Engine) -> ScannerResult<()> {
        self.ensure_open()?;
        if self.selector.current() == engine {
            return Ok(());
        }

        let resume = self.mode == ScanMode::Camera && self.status.is_active();
        self.teardown(self.mode).await;

        if let Err(e) = self.selector.switch(engine).await {
            return Err(self.fail(e));
        }
        info!(session_id = %self.id, engine = %engine, resume, "Engine switched");

        if resume {
            self.start_camera().await
        } else {
            self.emitter.emit_status(&self.snapshot());
            Ok(())
        }
    }

    /// Returns to `Idle`, resuming capture in camera mode.
    pub async fn restart(&mut self) -> ScannerResult<()> {
        self.ensure_open()?;
        self.teardown(self.mode).await;

        match self.mode {
            ScanMode::Camera => self.start_camera().await,
            ScanMode::Image => Ok(()),
        }
    }

    /// Tears down capture for good. Later operations fail with
    /// [`ScanError::SessionClosed`]. Closing twice is a no-op.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.teardown(self.mode).await;
        self.closed = true;
        info!(session_id = %self.id, "Scan session closed");
    }

    // =========================================================================
    // Decode Events
    // =========================================================================

    /// Waits for the next adapter event.
    ///
    /// Only waits while scanning; otherwise returns whatever is already
    /// queued, or `None`.
    pub async fn next_event(&mut self) -> Option<DecodeEvent> {
        if self.status.is_active() && !self.closed {
            self.events_rx.recv().await
        } else {
            self.events_rx.try_recv().ok()
        }
    }

    /// Applies one adapter event, returning the accepted result if any.
    pub async fn process_event(&mut self, event: DecodeEvent) -> Option<ScanResult> {
        if self.closed
            || self.succeeded
            || event.generation != self.generation
            || !self.status.is_active()
        {
            debug!(
                session_id = %self.id,
                event_generation = event.generation,
                generation = self.generation,
                status = %self.status,
                "Ignoring stale decode event"
            );
            return None;
        }

        match event.kind {
            DecodeEventKind::Detected(detection) => {
                let engine = self.selector.current();
                match ScanResult::accept(
                    &detection.text,
                    Some(detection.symbology),
                    Some(engine),
                    ScanSource::from(self.mode),
                ) {
                    Ok(result) => Some(self.succeed(result).await),
                    Err(reason) => {
                        debug!(
                            session_id = %self.id,
                            text = %detection.text,
                            "Decoded text rejected, still scanning"
                        );
                        self.report(ScanError::rejected(detection.text, reason));
                        None
                    }
                }
            }
            DecodeEventKind::Failed(error) => {
                self.stop_adapter().await;
                self.generation += 1;
                self.fail(error);
                None
            }
        }
    }

    /// Processes events until a code is accepted or scanning ends.
    pub async fn wait_for_scan(&mut self) -> ScannerResult<ScanResult> {
        self.ensure_open()?;
        loop {
            match self.status {
                ScanStatus::Scanning | ScanStatus::Processing => {}
                ScanStatus::Error => {
                    return Err(self
                        .last_error
                        .clone()
                        .unwrap_or_else(|| ScanError::EngineInit("scanning stopped".into())))
                }
                ScanStatus::Idle | ScanStatus::Success => {
                    return Err(ScanError::EngineInit(format!(
                        "session is {}, not scanning",
                        self.status
                    )))
                }
            }

            let Some(event) = self.events_rx.recv().await else {
                return Err(ScanError::EngineInit("decode channel closed".into()));
            };
            if let Some(result) = self.process_event(event).await {
                return Ok(result);
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn ensure_open(&self) -> ScannerResult<()> {
        if self.closed {
            Err(ScanError::SessionClosed)
        } else {
            Ok(())
        }
    }

    async fn start_camera(&mut self) -> ScannerResult<()> {
        self.set_status(ScanStatus::Scanning);

        let frames = match self.capture.open_camera().await {
            Ok(frames) => frames,
            Err(e) => return Err(self.fail(e)),
        };

        let sink = DecodeSink::new(self.generation, self.events_tx.clone());
        if let Err(e) = self.selector.start(frames, sink).await {
            return Err(self.fail(e));
        }

        info!(
            session_id = %self.id,
            engine = %self.selector.current(),
            generation = self.generation,
            "Camera scanning started"
        );
        Ok(())
    }

    async fn stop_adapter(&mut self) {
        if let Err(e) = self.selector.stop().await {
            warn!(session_id = %self.id, error = %e, "Decoder stop failed");
        }
    }

    /// Stops capture, drops pending events and starts a new round in
    /// `mode`. The Idle snapshot already carries the new mode and no error.
    async fn teardown(&mut self, mode: ScanMode) {
        self.stop_adapter().await;
        self.generation += 1;
        while self.events_rx.try_recv().is_ok() {}
        self.succeeded = false;
        self.mode = mode;
        self.last_error = None;
        self.set_status(ScanStatus::Idle);
    }

    async fn succeed(&mut self, result: ScanResult) -> ScanResult {
        self.succeeded = true;
        self.stop_adapter().await;
        self.generation += 1;
        self.last_error = None;
        self.set_status(ScanStatus::Success);

        info!(
            session_id = %self.id,
            code = %result.code(),
            source = ?result.source(),
            "Scan accepted"
        );
        self.emitter.emit_scan(&result);

        if let Some(history) = &self.history {
            if let Err(e) = history.record(&result).await {
                warn!(session_id = %self.id, error = %e, "Failed to record scan history");
            }
        }
        result
    }

    /// Records and emits `error` without changing status.
    fn report(&mut self, error: ScanError) {
        self.emitter.emit_error(&error);
        self.last_error = Some(error);
    }

    /// Records `error`, moves to `Error` and hands the error back.
    fn fail(&mut self, error: ScanError) -> ScanError {
        warn!(session_id = %self.id, error = %error, "Scan failed");
        self.report(error.clone());
        self.set_status(ScanStatus::Error);
        error
    }

    fn set_status(&mut self, next: ScanStatus) {
        if self.status == next {
            return;
        }
        if !self.status.can_transition_to(next) {
            warn!(
                session_id = %self.id,
                from = %self.status,
                to = %next,
                "Ignoring invalid status transition"
            );
            return;
        }

        debug!(session_id = %self.id, from = %self.status, to = %next, "Status changed");
        self.status = next;
        self.emitter.emit_status(&self.snapshot());
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for creating a ScanSession with options.
pub struct ScanSessionBuilder {
    config: ScannerConfig,
    engine: Option<Engine>,
    camera: Option<Arc<dyn CameraSource>>,
    emitter: Option<Arc<dyn ScanEventEmitter>>,
    history: Option<Arc<dyn ScanHistoryStore>>,
    factory: Option<DecoderFactory>,
}

impl ScanSessionBuilder {
    /// Creates a new builder with the given config.
    pub fn new(config: ScannerConfig) -> Self {
        ScanSessionBuilder {
            config,
            engine: None,
            camera: None,
            emitter: None,
            history: None,
            factory: None,
        }
    }

    /// Sets the initial engine (defaults to `scanner.default_engine`).
    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Sets the camera. Without one, only image and manual input work.
    pub fn with_camera(mut self, camera: Arc<dyn CameraSource>) -> Self {
        self.camera = Some(camera);
        self
    }

    /// Sets the event emitter.
    pub fn with_emitter(mut self, emitter: Arc<dyn ScanEventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Sets the store that accepted scans are recorded in.
    pub fn with_history(mut self, history: Arc<dyn ScanHistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    /// Replaces the decoder factory built from the config.
    pub fn with_decoder_factory(mut self, factory: DecoderFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Builds the ScanSession.
    pub fn build(self) -> ScannerResult<ScanSession> {
        self.config.validate()?;

        let engine = self.engine.unwrap_or(self.config.scanner.default_engine);
        let factory = self.factory.unwrap_or_else(|| config_factory(&self.config));
        let selector = EngineSelector::new(engine, factory)?;

        let constraints = CaptureConstraints::from_config(&self.config);
        let capture = match self.camera {
            Some(camera) => CaptureController::new(camera, constraints),
            None => CaptureController::without_camera(constraints),
        };

        let emitter = self.emitter.unwrap_or_else(|| Arc::new(NoOpEmitter));

        Ok(ScanSession::new(selector, capture, emitter, self.history))
    }
}
