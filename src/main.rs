use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod i18n;
mod models;
mod services;

use config::Config;
use services::fetch::{HttpScheduleFetcher, ScheduleFetcher};
use services::history::HistoryStore;
use services::init;
use services::store::ScheduleStore;
use services::subscriptions::SubscriptionStore;
use services::telegram::Notifier;

pub struct AppState {
    pub config: Config,
    pub fetcher: Arc<dyn ScheduleFetcher>,
    pub store: ScheduleStore,
    pub subscriptions: SubscriptionStore,
    pub history: HistoryStore,
    pub notifier: Arc<dyn Notifier>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "outage_notifications=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Outage Notifications Service");

    // Initialize collaborators
    let fetcher: Arc<dyn ScheduleFetcher> = Arc::new(HttpScheduleFetcher::new(&config.source)?);
    let store = ScheduleStore::new(
        fetcher.clone(),
        Duration::from_secs(config.source.cache_ttl_seconds),
        Some(PathBuf::from(&config.storage.schedule_file)),
    );
    let subscriptions = SubscriptionStore::new(PathBuf::from(&config.storage.subscriptions_file));
    let history = HistoryStore::new(PathBuf::from(&config.storage.history_file));
    let notifier = init::initialize_notifier(&config).await;

    let app_state = Arc::new(AppState {
        config,
        fetcher,
        store,
        subscriptions,
        history,
        notifier,
    });

    // First load before the workers start ticking; a failure here is not
    // fatal, the refresh worker keeps retrying.
    if app_state.store.get().await.is_none() {
        tracing::warn!("Initial schedule fetch failed; starting with an empty cache");
    }

    // Create shutdown notifier for background workers
    let (shutdown_tx, _shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);

    // Spawn background workers (returns JoinHandles so we can await shutdown)
    let bg_handles = init::spawn_background_workers(app_state.clone(), shutdown_tx.clone());

    // Wait for a shutdown signal, then notify the workers.
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to bind SIGTERM");
        tokio::select! {
            _ = ctrl_c => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("Failed to bind Ctrl+C");
    }

    tracing::info!("Shutdown signal received, notifying background workers");
    let _ = shutdown_tx.send(());

    // Give background workers some time to finish their work.
    let shutdown_wait = Duration::from_secs(15);
    tracing::info!(
        "Waiting up to {}s for background workers to exit",
        shutdown_wait.as_secs()
    );

    let bg_wait = async {
        for h in bg_handles {
            let _ = h.await;
        }
    };
    let _ = tokio::time::timeout(shutdown_wait, bg_wait).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
