use std::time::Duration;

use async_trait::async_trait;

use crate::config::SourceConfig;
use crate::error::{AppError, AppResult};
use crate::models::{RawHistory, RawScheduleDocument};

/// Collaborator contract for raw schedule acquisition.
///
/// Implementations only have to produce the fixed JSON shapes; scraping,
/// API polling and the like stay behind this seam.
#[async_trait]
pub trait ScheduleFetcher: Send + Sync {
    async fn fetch_schedule(&self) -> AppResult<RawScheduleDocument>;

    async fn fetch_history(&self) -> AppResult<RawHistory>;
}

/// HTTP fetcher with a bounded total timeout per request.
pub struct HttpScheduleFetcher {
    client: reqwest::Client,
    schedule_url: String,
    history_url: Option<String>,
}

impl HttpScheduleFetcher {
    pub fn new(source: &SourceConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(source.fetch_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            schedule_url: source.schedule_url.clone(),
            history_url: source.history_url.clone(),
        })
    }
}

#[async_trait]
impl ScheduleFetcher for HttpScheduleFetcher {
    async fn fetch_schedule(&self) -> AppResult<RawScheduleDocument> {
        let response = self
            .client
            .get(&self.schedule_url)
            .send()
            .await?
            .error_for_status()?;

        // A body that does not match the wire contract is a whole-document
        // parse failure; the caller keeps its previous snapshot.
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| AppError::Payload(format!("schedule document: {}", e)))
    }

    async fn fetch_history(&self) -> AppResult<RawHistory> {
        let Some(url) = &self.history_url else {
            return Ok(RawHistory::default());
        };

        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| AppError::Payload(format!("history: {}", e)))
    }
}
