//! # Capture Controller
//!
//! Camera lifecycle and image upload ingestion.
//!
//! ## Capture Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Capture Controller                             │
//! │                                                                         │
//! │  CAMERA MODE                                                           │
//! │  ───────────                                                           │
//! │  open_camera()                                                         │
//! │    ├── CameraSource::open(facing = environment)                        │
//! │    │     └── NotFound? → retry with facing = any                       │
//! │    ├── PermissionDenied → ScanError::PermissionDenied                  │
//! │    ├── Busy            → ScanError::CameraBusy                         │
//! │    └── Ok(FrameStream) → handed to the active decoder, which closes    │
//! │                          it when its frame loop ends                   │
//! │                                                                         │
//! │  IMAGE MODE                                                            │
//! │  ──────────                                                            │
//! │  ingest_image(upload)                                                  │
//! │    ├── MIME not image/*  → ScanError::UnsupportedFile                  │
//! │    ├── undecodable bytes → ScanError::ImageDecode                      │
//! │    └── Ok(LumaImage)                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use foodie_core::LumaImage;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{CameraFacing, ScannerConfig};
use crate::error::{ScanError, ScannerResult};

// =============================================================================
// Camera Capability
// =============================================================================

/// Requested capture parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub facing: CameraFacing,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl CaptureConstraints {
    pub fn from_config(config: &ScannerConfig) -> Self {
        CaptureConstraints {
            facing: config.scanner.facing,
            ideal_width: config.scanner.ideal_width,
            ideal_height: config.scanner.ideal_height,
        }
    }

    /// The same constraints without a camera preference.
    pub fn any_facing(&self) -> Self {
        CaptureConstraints {
            facing: CameraFacing::Any,
            ..*self
        }
    }
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self::from_config(&ScannerConfig::default())
    }
}

/// Failures reported by a camera backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("device busy: {0}")]
    Busy(String),

    #[error("no matching camera")]
    NotFound,

    #[error("{0}")]
    Other(String),
}

impl From<CameraError> for ScanError {
    fn from(err: CameraError) -> Self {
        match err {
            CameraError::PermissionDenied(msg) => ScanError::PermissionDenied(msg),
            CameraError::Busy(msg) => ScanError::CameraBusy(msg),
            CameraError::NotFound => ScanError::NoCamera,
            CameraError::Other(msg) => ScanError::EngineInit(msg),
        }
    }
}

/// A live sequence of frames owned by one consumer.
#[async_trait]
pub trait FrameStream: Send {
    /// Waits for the next frame; `None` once the stream has ended.
    async fn next_frame(&mut self) -> Option<LumaImage>;

    /// Releases the device. Must be safe to call more than once.
    fn close(&mut self);
}

/// Access to a camera device.
#[async_trait]
pub trait CameraSource: Send + Sync {
    async fn open(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn FrameStream>, CameraError>;
}

// =============================================================================
// Image Upload
// =============================================================================

/// A user-selected file.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Declared MIME type, e.g. `image/png`.
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        ImageUpload {
            mime: mime.into(),
            bytes,
        }
    }

    /// Returns true if the declared type is `image/*`.
    pub fn is_image(&self) -> bool {
        self.mime
            .split(';')
            .next()
            .map(|essence| essence.trim().to_ascii_lowercase())
            .is_some_and(|essence| {
                essence
                    .strip_prefix("image/")
                    .is_some_and(|subtype| !subtype.is_empty())
            })
    }
}

// =============================================================================
// Capture Controller
// =============================================================================

/// Owns camera access and upload decoding for a session.
pub struct CaptureController {
    camera: Option<Arc<dyn CameraSource>>,
    constraints: CaptureConstraints,
}

impl CaptureController {
    pub fn new(camera: Arc<dyn CameraSource>, constraints: CaptureConstraints) -> Self {
        CaptureController {
            camera: Some(camera),
            constraints,
        }
    }

    /// A controller for image-only use; opening the camera fails.
    pub fn without_camera(constraints: CaptureConstraints) -> Self {
        CaptureController {
            camera: None,
            constraints,
        }
    }

    pub fn constraints(&self) -> &CaptureConstraints {
        &self.constraints
    }

    pub fn has_camera(&self) -> bool {
        self.camera.is_some()
    }

    /// Opens a frame stream, preferring the configured facing.
    ///
    /// If no camera matches the preferred facing, any camera is accepted.
    pub async fn open_camera(&self) -> ScannerResult<Box<dyn FrameStream>> {
        let camera = self.camera.as_ref().ok_or(ScanError::NoCamera)?;

        info!(facing = %self.constraints.facing, "Opening camera");
        match camera.open(&self.constraints).await {
            Ok(stream) => Ok(stream),
            Err(CameraError::NotFound) if self.constraints.facing != CameraFacing::Any => {
                debug!(
                    facing = %self.constraints.facing,
                    "Preferred camera not found, falling back to any camera"
                );
                camera
                    .open(&self.constraints.any_facing())
                    .await
                    .map_err(ScanError::from)
            }
            Err(e) => {
                warn!(error = %e, "Camera open failed");
                Err(e.into())
            }
        }
    }

    /// Validates and decodes an uploaded image into a grayscale frame.
    ///
    /// Decoding runs on a blocking worker thread.
    pub async fn ingest_image(&self, upload: &ImageUpload) -> ScannerResult<LumaImage> {
        if !upload.is_image() {
            debug!(mime = %upload.mime, "Rejecting non-image upload");
            return Err(ScanError::UnsupportedFile {
                mime: upload.mime.clone(),
            });
        }

        let bytes = upload.bytes.clone();
        let image = tokio::task::spawn_blocking(move || decode_luma(&bytes))
            .await
            .map_err(|e| ScanError::ImageDecode(format!("decode worker failed: {e}")))??;

        debug!(
            width = image.width(),
            height = image.height(),
            mime = %upload.mime,
            "Image ingested"
        );
        Ok(image)
    }
}

/// Decodes PNG/JPEG bytes into a grayscale frame (Rec. 601 weights).
///
/// Every image source goes through this, so uploads and frame files
/// produce identical luma.
pub fn decode_luma(bytes: &[u8]) -> ScannerResult<LumaImage> {
    let decoded = image::load_from_memory(bytes)?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(ScanError::ImageDecode("image has no pixels".into()));
    }
    Ok(LumaImage::from_rgba(width, height, rgba.as_raw())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Mutex;

    struct EmptyStream;

    #[async_trait]
    impl FrameStream for EmptyStream {
        async fn next_frame(&mut self) -> Option<LumaImage> {
            None
        }
        fn close(&mut self) {}
    }

    /// Only has a front camera; records requested facings.
    struct FrontOnlyCamera {
        requests: Mutex<Vec<CameraFacing>>,
    }

    #[async_trait]
    impl CameraSource for FrontOnlyCamera {
        async fn open(
            &self,
            constraints: &CaptureConstraints,
        ) -> Result<Box<dyn FrameStream>, CameraError> {
            self.requests.lock().unwrap().push(constraints.facing);
            match constraints.facing {
                CameraFacing::Environment => Err(CameraError::NotFound),
                _ => Ok(Box::new(EmptyStream)),
            }
        }
    }

    struct DeniedCamera;

    #[async_trait]
    impl CameraSource for DeniedCamera {
        async fn open(
            &self,
            _constraints: &CaptureConstraints,
        ) -> Result<Box<dyn FrameStream>, CameraError> {
            Err(CameraError::PermissionDenied("user dismissed prompt".into()))
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::GrayImage::from_pixel(4, 3, image::Luma([200u8]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_is_image() {
        assert!(ImageUpload::new("image/png", vec![]).is_image());
        assert!(ImageUpload::new("IMAGE/JPEG; q=1", vec![]).is_image());
        assert!(!ImageUpload::new("image/", vec![]).is_image());
        assert!(!ImageUpload::new("application/pdf", vec![]).is_image());
        assert!(!ImageUpload::new("", vec![]).is_image());
    }

    #[tokio::test]
    async fn test_rear_camera_falls_back_to_any() {
        let camera = Arc::new(FrontOnlyCamera {
            requests: Mutex::new(Vec::new()),
        });
        let capture = CaptureController::new(camera.clone(), CaptureConstraints::default());

        assert!(capture.open_camera().await.is_ok());
        assert_eq!(
            *camera.requests.lock().unwrap(),
            vec![CameraFacing::Environment, CameraFacing::Any]
        );
    }

    #[tokio::test]
    async fn test_permission_denied_maps_to_permission_error() {
        let capture = CaptureController::new(Arc::new(DeniedCamera), CaptureConstraints::default());
        let err = capture.open_camera().await.err().unwrap();
        assert!(matches!(err, ScanError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_missing_camera() {
        let capture = CaptureController::without_camera(CaptureConstraints::default());
        assert!(matches!(
            capture.open_camera().await.err(),
            Some(ScanError::NoCamera)
        ));
    }

    #[tokio::test]
    async fn test_ingest_rejects_non_image_mime() {
        let capture = CaptureController::without_camera(CaptureConstraints::default());
        let err = capture
            .ingest_image(&ImageUpload::new("text/plain", png_bytes()))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::UnsupportedFile { .. }));
    }

    #[tokio::test]
    async fn test_ingest_decodes_png() {
        let capture = CaptureController::without_camera(CaptureConstraints::default());
        let image = capture
            .ingest_image(&ImageUpload::new("image/png", png_bytes()))
            .await
            .unwrap();
        assert_eq!((image.width(), image.height()), (4, 3));
        assert!(image.data().iter().all(|&v| v == 200));
    }

    #[tokio::test]
    async fn test_ingest_rejects_corrupt_bytes() {
        let capture = CaptureController::without_camera(CaptureConstraints::default());
        let err = capture
            .ingest_image(&ImageUpload::new("image/png", vec![0, 1, 2, 3]))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::ImageDecode(_)));
    }

    #[test]
    fn test_decode_luma_uses_rec601_weights() {
        let img = image::RgbImage::from_pixel(2, 2, image::Rgb([255u8, 0, 0]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();

        let luma = decode_luma(&out.into_inner()).unwrap();
        let expected = LumaImage::from_rgba(1, 1, &[255, 0, 0, 255]).unwrap().data()[0];
        assert_eq!(luma.data()[0], expected);
        // 0.299 * 255, not the Rec. 709 0.2126 * 255
        assert_eq!(expected, 76);
    }
}
