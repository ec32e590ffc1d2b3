use std::path::PathBuf;

use crate::error::AppResult;
use crate::models::Subscription;

/// File-backed subscription collaborator.
///
/// The chat layer owns writes; this engine only reads the current set, once
/// per tick, so preference edits take effect without coordination.
pub struct SubscriptionStore {
    path: PathBuf,
}

impl SubscriptionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// All stored subscriptions; a missing file means no subscribers yet.
    pub async fn list_all(&self) -> AppResult<Vec<Subscription>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No subscription file at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let subscriptions: Vec<Subscription> = serde_json::from_slice(&bytes)?;
        Ok(subscriptions)
    }
}
