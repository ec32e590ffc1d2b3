use std::path::PathBuf;

use crate::error::AppResult;
use crate::models::{HistoryLog, RawHistory};
use crate::services::fetch::ScheduleFetcher;

/// File-backed holder of the history log consumed by the predictor.
///
/// Seeded from the local file when present, otherwise from the history fetch
/// collaborator; saved after every recorded day.
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the log, falling back to the fetch collaborator and finally to an
    /// empty log. Never fails: the predictor degrades to "insufficient data".
    pub async fn load(&self, fetcher: &dyn ScheduleFetcher) -> HistoryLog {
        match self.load_file().await {
            Ok(Some(raw)) => return HistoryLog::from_raw(&raw),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    "Failed to read history file {}: {} (stage: history)",
                    self.path.display(),
                    e
                );
            }
        }

        match fetcher.fetch_history().await {
            Ok(raw) => HistoryLog::from_raw(&raw),
            Err(e) => {
                tracing::warn!("History fetch failed, starting empty: {} (stage: history)", e);
                HistoryLog::default()
            }
        }
    }

    async fn load_file(&self) -> AppResult<Option<RawHistory>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    pub async fn save(&self, log: &HistoryLog) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(&log.to_raw())?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}
