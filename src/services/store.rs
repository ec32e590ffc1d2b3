use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

use crate::models::ScheduleDocument;
use crate::services::fetch::ScheduleFetcher;

struct Cached {
    doc: Arc<ScheduleDocument>,
    fetched_at: Instant,
}

/// TTL-cached holder of the latest canonical schedule snapshot.
///
/// Refreshes build a complete document and swap it in atomically; on any
/// fetch or parse failure the previous snapshot is retained, so the store
/// never regresses after a first successful load.
pub struct ScheduleStore {
    fetcher: Arc<dyn ScheduleFetcher>,
    ttl: Duration,
    persist_path: Option<PathBuf>,
    cached: RwLock<Option<Cached>>,
    // Held for the duration of a refresh; a concurrent trigger is a no-op.
    refresh_guard: Mutex<()>,
}

impl ScheduleStore {
    pub fn new(
        fetcher: Arc<dyn ScheduleFetcher>,
        ttl: Duration,
        persist_path: Option<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            ttl,
            persist_path,
            cached: RwLock::new(None),
            refresh_guard: Mutex::new(()),
        }
    }

    /// Latest snapshot without triggering any I/O.
    pub async fn snapshot(&self) -> Option<Arc<ScheduleDocument>> {
        self.cached.read().await.as_ref().map(|c| c.doc.clone())
    }

    /// Cached document while fresh; otherwise refreshes first. Returns the
    /// last-known-good snapshot even when the refresh fails.
    pub async fn get(&self) -> Option<Arc<ScheduleDocument>> {
        if let Some(doc) = self.fresh_snapshot().await {
            return Some(doc);
        }
        self.refresh().await;
        self.snapshot().await
    }

    /// Refresh only when the cache has expired. Returns the newly built
    /// document, or `None` when the cache was still fresh or the refresh
    /// failed or was already in flight.
    pub async fn refresh_if_stale(&self) -> Option<Arc<ScheduleDocument>> {
        if self.fresh_snapshot().await.is_some() {
            return None;
        }
        self.refresh().await
    }

    async fn fresh_snapshot(&self) -> Option<Arc<ScheduleDocument>> {
        let cached = self.cached.read().await;
        cached
            .as_ref()
            .filter(|c| c.fetched_at.elapsed() < self.ttl)
            .map(|c| c.doc.clone())
    }

    /// Fetch, canonicalize and swap in a new document.
    async fn refresh(&self) -> Option<Arc<ScheduleDocument>> {
        let Ok(_guard) = self.refresh_guard.try_lock() else {
            tracing::debug!("Schedule refresh already in flight; skipping");
            return None;
        };

        let raw = match self.fetcher.fetch_schedule().await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Schedule fetch failed: {} (stage: fetch)", e);
                return None;
            }
        };

        let doc = match ScheduleDocument::from_raw(&raw) {
            Ok(doc) => Arc::new(doc),
            Err(e) => {
                tracing::warn!(
                    "Schedule payload rejected, keeping previous snapshot: {} (stage: parse)",
                    e
                );
                return None;
            }
        };

        {
            let mut cached = self.cached.write().await;
            *cached = Some(Cached {
                doc: doc.clone(),
                fetched_at: Instant::now(),
            });
        }

        tracing::info!(
            "Schedule refreshed: {} groups today, {} tomorrow (updated {})",
            doc.today.groups.len(),
            doc.tomorrow.groups.len(),
            doc.source_updated_at
        );

        if let Some(path) = &self.persist_path {
            if let Err(e) = persist_document(path, &doc).await {
                tracing::warn!(
                    "Failed to persist schedule to {}: {} (stage: persist)",
                    path.display(),
                    e
                );
            }
        }

        Some(doc)
    }
}

/// Write the document in wire format to the well-known location consumed by
/// downstream adapters.
async fn persist_document(path: &Path, doc: &ScheduleDocument) -> crate::error::AppResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let json = serde_json::to_string_pretty(&doc.to_raw())?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{AppError, AppResult};
    use crate::models::{RawHistory, RawScheduleDocument};

    struct StubFetcher {
        responses: Mutex<VecDeque<AppResult<RawScheduleDocument>>>,
    }

    impl StubFetcher {
        fn new(responses: Vec<AppResult<RawScheduleDocument>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
            })
        }
    }

    #[async_trait]
    impl ScheduleFetcher for StubFetcher {
        async fn fetch_schedule(&self) -> AppResult<RawScheduleDocument> {
            self.responses
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Err(AppError::Payload("exhausted".to_string())))
        }

        async fn fetch_history(&self) -> AppResult<RawHistory> {
            Ok(RawHistory::default())
        }
    }

    fn raw(updated: &str, groups: serde_json::Value) -> RawScheduleDocument {
        serde_json::from_value(serde_json::json!({
            "timezone": "Europe/Kyiv",
            "updated": updated,
            "emergency": null,
            "today": { "date": "30.08.2026", "groups": groups },
            "tomorrow": { "date": "31.08.2026", "groups": {} }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn get_builds_and_caches_a_snapshot() {
        let fetcher = StubFetcher::new(vec![Ok(raw("t1", serde_json::json!({"1.1": ["08:00-10:00"]})))]);
        let store = ScheduleStore::new(fetcher, Duration::from_secs(300), None);

        let doc = store.get().await.unwrap();
        assert_eq!(doc.source_updated_at, "t1");

        // Fresh cache: no second fetch happens (the stub would error).
        let again = store.get().await.unwrap();
        assert_eq!(again.source_updated_at, "t1");
        assert!(store.refresh_if_stale().await.is_none());
    }

    #[tokio::test]
    async fn fetch_failure_keeps_last_known_good() {
        let fetcher = StubFetcher::new(vec![
            Ok(raw("t1", serde_json::json!({}))),
            Err(AppError::Payload("boom".to_string())),
        ]);
        let store = ScheduleStore::new(fetcher, Duration::ZERO, None);

        assert_eq!(store.get().await.unwrap().source_updated_at, "t1");
        // TTL zero forces a refresh, which fails; stale doc is served.
        assert_eq!(store.get().await.unwrap().source_updated_at, "t1");
    }

    #[tokio::test]
    async fn malformed_document_keeps_previous_snapshot() {
        let mut bad = raw("t2", serde_json::json!({}));
        bad.today.date = "garbage".to_string();

        let fetcher = StubFetcher::new(vec![Ok(raw("t1", serde_json::json!({}))), Ok(bad)]);
        let store = ScheduleStore::new(fetcher, Duration::ZERO, None);

        assert_eq!(store.get().await.unwrap().source_updated_at, "t1");
        assert!(store.refresh_if_stale().await.is_none());
        assert_eq!(store.snapshot().await.unwrap().source_updated_at, "t1");
    }

    #[tokio::test]
    async fn empty_store_returns_none_on_failure() {
        let fetcher = StubFetcher::new(vec![Err(AppError::Payload("down".to_string()))]);
        let store = ScheduleStore::new(fetcher, Duration::from_secs(300), None);
        assert!(store.get().await.is_none());
    }

    #[tokio::test]
    async fn persists_wire_format_to_well_known_path() {
        let dir = std::env::temp_dir().join(format!("outage-store-test-{}", std::process::id()));
        let path = dir.join("schedule.json");

        let fetcher =
            StubFetcher::new(vec![Ok(raw("t1", serde_json::json!({"2.2": ["22:00-24:00"]})))]);
        let store = ScheduleStore::new(fetcher, Duration::from_secs(300), Some(path.clone()));
        store.get().await.unwrap();

        let persisted: RawScheduleDocument =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(persisted.today.groups["2.2"], vec!["22:00-24:00"]);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
