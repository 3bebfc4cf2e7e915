//! # Directory Camera
//!
//! A [`CameraSource`] that plays image files from a directory as frames,
//! in file name order. Used to replay recorded captures.

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use foodie_core::LumaImage;
use foodie_scanner::{decode_luma, CameraError, CameraSource, CaptureConstraints, FrameStream};
use tracing::{debug, warn};

/// Returns the MIME type implied by a file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

pub struct DirectoryCamera {
    dir: PathBuf,
}

impl DirectoryCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectoryCamera { dir: dir.into() }
    }

    async fn frame_paths(&self) -> io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if is_file && mime_for_path(&path).starts_with("image/") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

#[async_trait]
impl CameraSource for DirectoryCamera {
    async fn open(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn FrameStream>, CameraError> {
        let paths = self.frame_paths().await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CameraError::NotFound,
            io::ErrorKind::PermissionDenied => CameraError::PermissionDenied(e.to_string()),
            _ => CameraError::Other(e.to_string()),
        })?;

        if paths.is_empty() {
            return Err(CameraError::NotFound);
        }

        debug!(
            dir = %self.dir.display(),
            frames = paths.len(),
            facing = %constraints.facing,
            "Directory camera opened"
        );
        Ok(Box::new(DirectoryFrames {
            paths: paths.into(),
            closed: false,
        }))
    }
}

struct DirectoryFrames {
    paths: VecDeque<PathBuf>,
    closed: bool,
}

async fn load_frame(path: &Path) -> Option<LumaImage> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping unreadable frame");
            return None;
        }
    };

    match decode_luma(&bytes) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping undecodable frame");
            None
        }
    }
}

#[async_trait]
impl FrameStream for DirectoryFrames {
    async fn next_frame(&mut self) -> Option<LumaImage> {
        while !self.closed {
            let path = self.paths.pop_front()?;
            if let Some(frame) = load_frame(&path).await {
                debug!(path = %path.display(), "Frame loaded");
                return Some(frame);
            }
        }
        None
    }

    fn close(&mut self) {
        self.closed = true;
        self.paths.clear();
    }
}
