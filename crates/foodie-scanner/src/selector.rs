//! # Engine Selector
//!
//! Owns the single active decoder and swaps it on request.
//!
//! ## Switching
//! ```text
//! switch(next)
//!   ├── next == current → no-op
//!   ├── stop current (errors logged, never block the switch)
//!   ├── factory(next)
//!   │     ├── Ok  → becomes current
//!   │     └── Err → current stays (stopped), error returned
//!   └── caller restarts capture if it was scanning
//! ```

use std::sync::Arc;

use foodie_core::{Detection, Engine, LumaImage};
use tracing::{info, warn};

use crate::capture::FrameStream;
use crate::config::ScannerConfig;
use crate::decoder::{create_decoder_with, BarcodeDecoder, DecodeSink, DecoderSettings};
use crate::error::ScannerResult;

/// Builds the adapter for an engine.
pub type DecoderFactory =
    Arc<dyn Fn(Engine) -> ScannerResult<Box<dyn BarcodeDecoder>> + Send + Sync>;

/// A factory that builds adapters from `config`.
pub fn config_factory(config: &ScannerConfig) -> DecoderFactory {
    let config = config.clone();
    let settings = DecoderSettings::from_config(&config);
    Arc::new(move |engine| create_decoder_with(config.engine_config(engine), settings))
}

/// Holds exactly one decoder at a time.
pub struct EngineSelector {
    current: Box<dyn BarcodeDecoder>,
    factory: DecoderFactory,
}

impl EngineSelector {
    /// Creates a selector with `engine` active.
    pub fn new(engine: Engine, factory: DecoderFactory) -> ScannerResult<Self> {
        let current = factory(engine)?;
        Ok(EngineSelector { current, factory })
    }

    /// Creates a selector using adapters built from `config`.
    pub fn from_config(engine: Engine, config: &ScannerConfig) -> ScannerResult<Self> {
        Self::new(engine, config_factory(config))
    }

    pub fn current(&self) -> Engine {
        self.current.engine()
    }

    /// Makes `engine` the active decoder.
    ///
    /// The previous decoder is always stopped first. If the new one cannot
    /// be built, the previous one remains current and the error is returned.
    pub async fn switch(&mut self, engine: Engine) -> ScannerResult<()> {
        let previous = self.current.engine();
        if previous == engine {
            return Ok(());
        }

        if let Err(e) = self.current.stop().await {
            warn!(engine = %previous, error = %e, "Failed to stop decoder before switch");
        }

        match (self.factory)(engine) {
            Ok(next) => {
                self.current = next;
                info!(from = %previous, to = %engine, "Decoder engine switched");
                Ok(())
            }
            Err(e) => {
                warn!(from = %previous, to = %engine, error = %e, "Engine switch failed");
                Err(e)
            }
        }
    }

    pub async fn start(&mut self, frames: Box<dyn FrameStream>, sink: DecodeSink) -> ScannerResult<()> {
        self.current.start(frames, sink).await
    }

    pub async fn stop(&mut self) -> ScannerResult<()> {
        self.current.stop().await
    }

    pub async fn decode_static(&self, image: &LumaImage) -> ScannerResult<Option<Detection>> {
        self.current.decode_static(image).await
    }

    pub fn is_running(&self) -> bool {
        self.current.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records lifecycle calls into a shared log.
    struct RecordingDecoder {
        engine: Engine,
        log: Arc<Mutex<Vec<String>>>,
        running: bool,
    }

    #[async_trait]
    impl BarcodeDecoder for RecordingDecoder {
        fn engine(&self) -> Engine {
            self.engine
        }

        async fn start(
            &mut self,
            mut frames: Box<dyn FrameStream>,
            _sink: DecodeSink,
        ) -> ScannerResult<()> {
            frames.close();
            self.running = true;
            self.log.lock().unwrap().push(format!("start {}", self.engine));
            Ok(())
        }

        async fn stop(&mut self) -> ScannerResult<()> {
            self.running = false;
            self.log.lock().unwrap().push(format!("stop {}", self.engine));
            Ok(())
        }

        async fn decode_static(&self, _image: &LumaImage) -> ScannerResult<Option<Detection>> {
            Ok(None)
        }

        fn is_running(&self) -> bool {
            self.running
        }
    }

    fn recording_factory(
        log: Arc<Mutex<Vec<String>>>,
        built: Arc<AtomicUsize>,
        broken: Option<Engine>,
    ) -> DecoderFactory {
        Arc::new(move |engine| {
            if Some(engine) == broken {
                return Err(ScanError::EngineInit(format!("{engine} unavailable")));
            }
            built.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(RecordingDecoder {
                engine,
                log: Arc::clone(&log),
                running: false,
            }))
        })
    }

    #[tokio::test]
    async fn test_switch_stops_previous_decoder() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let built = Arc::new(AtomicUsize::new(0));
        let mut selector =
            EngineSelector::new(Engine::Strip, recording_factory(log.clone(), built.clone(), None))
                .unwrap();

        selector.switch(Engine::Locator).await.unwrap();
        assert_eq!(selector.current(), Engine::Locator);
        assert_eq!(*log.lock().unwrap(), vec!["stop strip".to_string()]);
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_switch_to_current_engine_is_noop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let built = Arc::new(AtomicUsize::new(0));
        let mut selector =
            EngineSelector::new(Engine::Strip, recording_factory(log.clone(), built.clone(), None))
                .unwrap();

        selector.switch(Engine::Strip).await.unwrap();
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_switch_keeps_previous_engine() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let built = Arc::new(AtomicUsize::new(0));
        let mut selector = EngineSelector::new(
            Engine::Strip,
            recording_factory(log.clone(), built, Some(Engine::Locator)),
        )
        .unwrap();

        let err = selector.switch(Engine::Locator).await.unwrap_err();
        assert!(matches!(err, ScanError::EngineInit(_)));
        assert_eq!(selector.current(), Engine::Strip);
        assert!(!selector.is_running());
    }

    #[tokio::test]
    async fn test_from_config_builds_real_decoders() {
        let config = ScannerConfig::default();
        let mut selector = EngineSelector::from_config(Engine::Locator, &config).unwrap();
        assert_eq!(selector.current(), Engine::Locator);

        selector.switch(Engine::Strip).await.unwrap();
        assert_eq!(selector.current(), Engine::Strip);
        assert!(!selector.is_running());
    }
}
