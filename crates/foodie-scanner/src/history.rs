//! # Scan History
//!
//! Accepted scans, newest first, bounded to a maximum number of entries.
//!
//! ## Stores
//! - [`MemoryHistory`]: process lifetime only
//! - [`JsonFileHistory`]: a JSON document rewritten on every change
//!
//! ## File Format
//! ```json
//! {
//!   "version": 1,
//!   "updated_at": "2024-05-01T10:00:00Z",
//!   "entries": [ { "id": "…", "code": "0036000291452", … } ]
//! }
//! ```
//! Writes go to a sibling temp file which is then renamed over the
//! original, so a crash never leaves a half-written history.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use foodie_core::ScanResult;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::ScannerConfig;
use crate::error::{ScanError, ScannerResult};

/// Current history file version.
pub const HISTORY_FILE_VERSION: u32 = 1;

/// Persistence for accepted scans.
#[async_trait]
pub trait ScanHistoryStore: Send + Sync {
    /// Adds a result, evicting the oldest entries beyond capacity.
    async fn record(&self, result: &ScanResult) -> ScannerResult<()>;

    /// All stored results, newest first.
    async fn list(&self) -> ScannerResult<Vec<ScanResult>>;

    async fn clear(&self) -> ScannerResult<()>;
}

/// Builds the store described by `config.history`.
///
/// Returns `None` when history is disabled. Without a usable file path the
/// history is kept in memory.
pub fn open_history(config: &ScannerConfig) -> Option<Arc<dyn ScanHistoryStore>> {
    if !config.history.enabled {
        return None;
    }
    let max_entries = config.history.max_entries;
    let store: Arc<dyn ScanHistoryStore> = match config.history_path() {
        Some(path) => Arc::new(JsonFileHistory::new(path, max_entries)),
        None => Arc::new(MemoryHistory::new(max_entries)),
    };
    Some(store)
}

/// Pushes `result` to the front and trims to `max_entries`.
fn push_newest(entries: &mut VecDeque<ScanResult>, result: &ScanResult, max_entries: usize) {
    entries.push_front(result.clone());
    entries.truncate(max_entries.max(1));
}

// =============================================================================
// In-Memory Store
// =============================================================================

pub struct MemoryHistory {
    entries: RwLock<VecDeque<ScanResult>>,
    max_entries: usize,
}

impl MemoryHistory {
    pub fn new(max_entries: usize) -> Self {
        MemoryHistory {
            entries: RwLock::new(VecDeque::new()),
            max_entries,
        }
    }
}

#[async_trait]
impl ScanHistoryStore for MemoryHistory {
    async fn record(&self, result: &ScanResult) -> ScannerResult<()> {
        let mut entries = self.entries.write().await;
        push_newest(&mut entries, result, self.max_entries);
        Ok(())
    }

    async fn list(&self) -> ScannerResult<Vec<ScanResult>> {
        Ok(self.entries.read().await.iter().cloned().collect())
    }

    async fn clear(&self) -> ScannerResult<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

// =============================================================================
// JSON File Store
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct HistoryFile {
    version: u32,
    updated_at: DateTime<Utc>,
    entries: VecDeque<ScanResult>,
}

/// History persisted as a JSON file.
///
/// The file is read on every operation; concurrent writers within the
/// process are serialized by an internal lock.
pub struct JsonFileHistory {
    path: PathBuf,
    max_entries: usize,
    lock: RwLock<()>,
}

impl JsonFileHistory {
    pub fn new(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        JsonFileHistory {
            path: path.into(),
            max_entries,
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> ScannerResult<VecDeque<ScanResult>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(VecDeque::new()),
            Err(e) => {
                return Err(ScanError::History(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )))
            }
        };

        let file: HistoryFile = serde_json::from_str(&contents)?;
        if file.version > HISTORY_FILE_VERSION {
            return Err(ScanError::History(format!(
                "{} has unsupported version {}",
                self.path.display(),
                file.version
            )));
        }
        Ok(file.entries)
    }

    async fn write_entries(&self, entries: VecDeque<ScanResult>) -> ScannerResult<()> {
        let io_err =
            |e: std::io::Error| ScanError::History(format!("cannot write {}: {e}", self.path.display()));

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
            }
        }

        let file = HistoryFile {
            version: HISTORY_FILE_VERSION,
            updated_at: Utc::now(),
            entries,
        };
        let contents = serde_json::to_string_pretty(&file)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;

        debug!(path = %self.path.display(), entries = file.entries.len(), "History written");
        Ok(())
    }
}

#[async_trait]
impl ScanHistoryStore for JsonFileHistory {
    async fn record(&self, result: &ScanResult) -> ScannerResult<()> {
        let _guard = self.lock.write().await;
        let mut entries = self.read_entries().await?;
        push_newest(&mut entries, result, self.max_entries);
        self.write_entries(entries).await
    }

    async fn list(&self) -> ScannerResult<Vec<ScanResult>> {
        let _guard = self.lock.read().await;
        Ok(self.read_entries().await?.into_iter().collect())
    }

    async fn clear(&self) -> ScannerResult<()> {
        let _guard = self.lock.write().await;
        self.write_entries(VecDeque::new()).await?;
        info!(path = %self.path.display(), "History cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foodie_core::{ScanSource, Symbology};
    use pretty_assertions::assert_eq;

    fn scan(code: &str) -> ScanResult {
        ScanResult::accept(code, Some(Symbology::Ean13), None, ScanSource::Image).unwrap()
    }

    fn codes(results: &[ScanResult]) -> Vec<&str> {
        results.iter().map(|r| r.code()).collect()
    }

    #[tokio::test]
    async fn test_memory_history_newest_first_and_bounded() {
        let history = MemoryHistory::new(2);
        history.record(&scan("12345670")).await.unwrap();
        history.record(&scan("96385074")).await.unwrap();
        history.record(&scan("5901234123457")).await.unwrap();

        let list = history.list().await.unwrap();
        assert_eq!(codes(&list), vec!["5901234123457", "96385074"]);

        history.clear().await.unwrap();
        assert!(history.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_history_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let history = JsonFileHistory::new(dir.path().join("history.json"), 10);
        assert!(history.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_history_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.json");

        let first = scan("036000291452");
        JsonFileHistory::new(&path, 10).record(&first).await.unwrap();

        let reopened = JsonFileHistory::new(&path, 10);
        reopened.record(&scan("96385074")).await.unwrap();

        let list = reopened.list().await.unwrap();
        assert_eq!(codes(&list), vec!["96385074", "0036000291452"]);
        assert_eq!(list[1], first);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_history_clear() {
        let dir = tempfile::tempdir().unwrap();
        let history = JsonFileHistory::new(dir.path().join("history.json"), 10);
        history.record(&scan("96385074")).await.unwrap();

        history.clear().await.unwrap();
        assert!(history.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_history_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "not json").unwrap();

        let err = JsonFileHistory::new(&path, 10).list().await.unwrap_err();
        assert!(matches!(err, ScanError::History(_)));
    }

    #[tokio::test]
    async fn test_file_history_revalidates_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let history = JsonFileHistory::new(&path, 10);
        history.record(&scan("036000291452")).await.unwrap();

        // Hand-edited entry whose code no longer matches its raw text
        let contents = std::fs::read_to_string(&path).unwrap();
        let edited = contents.replace("\"code\": \"0036000291452\"", "\"code\": \"99\"");
        assert_ne!(contents, edited);
        std::fs::write(&path, edited).unwrap();

        let err = history.list().await.unwrap_err();
        assert!(matches!(err, ScanError::History(_)));
    }

    #[test]
    fn test_open_history_respects_settings() {
        let mut config = ScannerConfig::default();
        config.history.enabled = false;
        assert!(open_history(&config).is_none());

        config.history.enabled = true;
        config.history.path = Some(PathBuf::from("/tmp/foodie-history.json"));
        assert!(open_history(&config).is_some());
    }
}
