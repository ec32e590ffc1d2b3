//! Initialization helpers for the application:
//! - optional delivery integration (Telegram)
//! - background worker spawn helpers
//! - the refresh/change-detection and reminder passes the workers run

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Timelike;

use crate::i18n;
use crate::models::schedule::WIRE_DATE_FORMAT;
use crate::models::{HistoryLog, ScheduleDocument, Subscription, TimeInterval};
use crate::services::changes::{ChangeDetector, ChangeSignal, FingerprintKey};
use crate::services::predictor::{self, Prediction};
use crate::services::reminders::{due_reminders, DueReminder, ReminderLedger};
use crate::services::telegram::{LogNotifier, Notifier, TelegramService};

/// Initialize the delivery collaborator. A missing or invalid bot token
/// does not stop the daemon; sends are logged instead.
pub async fn initialize_notifier(config: &crate::config::Config) -> Arc<dyn Notifier> {
    if let Some(token) = &config.telegram.bot_token {
        tracing::info!("Initializing Telegram bot");
        match TelegramService::new(token.clone()).await {
            Ok(telegram) => return Arc::new(telegram),
            Err(e) => {
                tracing::warn!("Failed to initialize Telegram bot: {}", e);
            }
        }
    }
    tracing::warn!("No Telegram delivery configured; notifications will only be logged");
    Arc::new(LogNotifier)
}

/// Spawn background workers:
/// - periodic schedule refresh + change detection
/// - periodic reminder scanning
///
/// These are spawned as `tokio::spawn` tasks. The function returns a vector of
/// `JoinHandle<()>`s so callers can await task shutdown. Each worker listens
/// for a shutdown notification via a `tokio::sync::broadcast::Sender<()>`.
/// The two workers are independent; each reads the latest atomically-swapped
/// snapshot and never blocks the other.
pub fn spawn_background_workers(
    state: Arc<crate::AppState>,
    shutdown: tokio::sync::broadcast::Sender<()>,
) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();

    // Refresh / change-detection worker
    {
        let mut shutdown_rx = shutdown.subscribe();
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            let mut detector = ChangeDetector::default();
            let mut last_emergency: Option<String> = None;
            let mut history = state.history.load(state.fetcher.as_ref()).await;
            tracing::info!("History log loaded: {} days", history.len());

            loop {
                if let Some(doc) = state.store.refresh_if_stale().await {
                    process_refreshed_document(
                        &state,
                        &doc,
                        &mut detector,
                        &mut last_emergency,
                        &mut history,
                    )
                    .await;
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Refresh worker shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_secs(
                        state.config.scheduler.refresh_poll_seconds,
                    )) => {}
                }
            }
        }));
    }

    // Reminder worker
    {
        let mut shutdown_rx = shutdown.subscribe();
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            let mut ledger = ReminderLedger::default();

            loop {
                let now = chrono::Local::now();
                run_reminder_tick(
                    &state,
                    &mut ledger,
                    now.date_naive(),
                    (now.hour() * 60 + now.minute()) as u16,
                )
                .await;

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Reminder worker shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_secs(
                        state.config.scheduler.reminder_tick_seconds,
                    )) => {}
                }
            }
        }));
    }

    handles
}

/// One refresh-worker pass over a freshly swapped document: record history,
/// broadcast a changed emergency message, then run the global and per-user
/// change passes and dispatch alerts.
async fn process_refreshed_document(
    state: &Arc<crate::AppState>,
    doc: &ScheduleDocument,
    detector: &mut ChangeDetector,
    last_emergency: &mut Option<String>,
    history: &mut HistoryLog,
) {
    history.record(doc.today.date, doc.today.groups.clone());
    if let Err(e) = state.history.save(history).await {
        tracing::warn!("Failed to save history: {} (stage: history)", e);
    }

    let subscriptions = match state.subscriptions.list_all().await {
        Ok(subs) => subs,
        Err(e) => {
            tracing::warn!(
                "Failed to load subscriptions: {} (stage: change-detection)",
                e
            );
            return;
        }
    };

    log_forecasts(&subscriptions, history, doc.today.date);

    let mut outgoing: Vec<(i64, String)> = Vec::new();

    if doc.emergency != *last_emergency {
        if let Some(text) = &doc.emergency {
            let message = i18n::tr(None, "messages.emergency", Some(&[("text", text)]));
            for sub in subscriptions.iter().filter(|s| s.notifications_enabled) {
                outgoing.push((sub.user_id, message.clone()));
            }
            tracing::info!("Emergency message changed; alerting {} users", outgoing.len());
        }
        *last_emergency = doc.emergency.clone();
    }

    detector.prune_older_than(doc.today.date);

    for day in [&doc.today, &doc.tomorrow] {
        // Union of published and tracked groups: a group that disappears from
        // the schedule registers as a change to "no outages".
        let mut group_ids: BTreeSet<&str> = day.groups.keys().map(String::as_str).collect();
        for sub in &subscriptions {
            group_ids.extend(sub.groups.iter().map(|a| a.group_id.as_str()));
        }

        for group_id in group_ids {
            let intervals = day.intervals_for(group_id);
            let signal = detector.check(FingerprintKey::global(day.date, group_id), intervals);

            match signal {
                ChangeSignal::Baseline => {
                    // Seed per-user baselines so a later change can match.
                    for sub in tracking(&subscriptions, group_id) {
                        detector.check(
                            FingerprintKey::for_user(day.date, group_id, sub.user_id),
                            intervals,
                        );
                    }
                }
                ChangeSignal::Unchanged => {}
                ChangeSignal::Changed { .. } => {
                    tracing::info!("Schedule changed for group {} on {}", group_id, day.date);
                    for sub in tracking(&subscriptions, group_id) {
                        let user_signal = detector.check(
                            FingerprintKey::for_user(day.date, group_id, sub.user_id),
                            intervals,
                        );
                        if let ChangeSignal::Changed { old, new } = user_signal {
                            if sub.notifications_enabled && sub.compare_enabled {
                                outgoing.push((
                                    sub.user_id,
                                    render_change_alert(group_id, day.date, &old, &new),
                                ));
                            }
                        }
                    }
                }
            }
        }
    }

    dispatch_all(state, outgoing).await;
}

/// One reminder-worker tick at the given local date and minute.
async fn run_reminder_tick(
    state: &Arc<crate::AppState>,
    ledger: &mut ReminderLedger,
    today: chrono::NaiveDate,
    minute_of_day: u16,
) {
    ledger.purge_if_new_day(today);

    let Some(doc) = state.store.snapshot().await else {
        return;
    };
    // A snapshot one refresh cycle stale may still carry today's schedule in
    // its tomorrow section just after midnight.
    let Some(day) = doc.for_date(today) else {
        return;
    };

    let subscriptions = match state.subscriptions.list_all().await {
        Ok(subs) => subs,
        Err(e) => {
            tracing::warn!("Failed to load subscriptions: {} (stage: reminders)", e);
            return;
        }
    };

    let outgoing = due_reminders(&subscriptions, day, minute_of_day, ledger)
        .into_iter()
        .map(|due| (due.user_id, render_reminder(&due)))
        .collect();
    dispatch_all(state, outgoing).await;
}

/// Pre-compute weekday-matched forecasts for every tracked primary group
/// after each refresh. Insufficient data stays silent; a forecast is only a
/// log line until the presentation layer asks for it.
fn log_forecasts(
    subscriptions: &[Subscription],
    history: &HistoryLog,
    today: chrono::NaiveDate,
) {
    let target = predictor::default_target(today);
    let primary_groups: BTreeSet<&str> = subscriptions
        .iter()
        .filter_map(|sub| sub.primary_group())
        .map(|a| a.group_id.as_str())
        .collect();

    for group_id in primary_groups {
        if let Prediction::Forecast(forecast) = predictor::predict(history, group_id, target) {
            tracing::debug!(
                "Forecast for group {} on {}: {} ({}, {}% confidence, base {})",
                group_id,
                target,
                render_interval_list(&forecast.intervals),
                i18n::format_duration(forecast.total_minutes),
                forecast.confidence,
                forecast.based_on
            );
        }
    }
}

fn tracking<'a>(
    subscriptions: &'a [Subscription],
    group_id: &'a str,
) -> impl Iterator<Item = &'a Subscription> {
    subscriptions
        .iter()
        .filter(move |sub| sub.groups.iter().any(|a| a.group_id == group_id))
}

fn render_interval_list(intervals: &[TimeInterval]) -> String {
    if intervals.is_empty() {
        return i18n::t("messages.no_outages");
    }
    intervals
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_change_alert(
    group_id: &str,
    date: chrono::NaiveDate,
    old: &[TimeInterval],
    new: &[TimeInterval],
) -> String {
    i18n::tr(
        None,
        "messages.schedule_changed",
        Some(&[
            ("group", group_id),
            ("date", &date.format(WIRE_DATE_FORMAT).to_string()),
            ("old", &render_interval_list(old)),
            ("new", &render_interval_list(new)),
        ]),
    )
}

fn render_reminder(due: &DueReminder) -> String {
    i18n::tr(
        None,
        "messages.reminder",
        Some(&[
            ("lead", &due.lead_minutes.to_string()),
            ("group", &due.group_id),
            ("label", &due.label),
            ("interval", &due.interval.to_string()),
            ("duration", &i18n::format_duration(due.interval.duration_minutes() as u32)),
        ]),
    )
}

/// Fire-and-forget delivery: one failed recipient is logged and never aborts
/// the rest of the batch or the current tick.
async fn dispatch_all(state: &Arc<crate::AppState>, outgoing: Vec<(i64, String)>) {
    if outgoing.is_empty() {
        return;
    }

    let sends = outgoing.into_iter().map(|(user_id, text)| {
        let notifier = state.notifier.clone();
        async move {
            if let Err(e) = notifier.notify(user_id, &text).await {
                tracing::warn!("Delivery to {} failed: {}", user_id, e);
            }
        }
    });
    futures::future::join_all(sends).await;
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use tokio::sync::Mutex;

    use super::*;
    use crate::config::Config;
    use crate::error::{AppError, AppResult};
    use crate::models::{RawHistory, RawScheduleDocument};
    use crate::services::fetch::ScheduleFetcher;
    use crate::services::history::HistoryStore;
    use crate::services::store::ScheduleStore;
    use crate::services::subscriptions::SubscriptionStore;
    use crate::AppState;

    struct StubFetcher {
        responses: Mutex<VecDeque<AppResult<RawScheduleDocument>>>,
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

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(i64, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, user_id: i64, text: &str) -> AppResult<()> {
            self.sent.lock().await.push((user_id, text.to_string()));
            Ok(())
        }
    }

    fn raw_doc(groups_today: serde_json::Value, emergency: Option<&str>) -> RawScheduleDocument {
        serde_json::from_value(serde_json::json!({
            "timezone": "Europe/Kyiv",
            "updated": "2026-08-30 14:00:00",
            "emergency": emergency,
            "today": { "date": "30.08.2026", "groups": groups_today },
            "tomorrow": { "date": "31.08.2026", "groups": {} }
        }))
        .unwrap()
    }

    fn test_state(dir: &std::path::Path, notifier: Arc<RecordingNotifier>) -> Arc<AppState> {
        let fetcher: Arc<dyn ScheduleFetcher> = Arc::new(StubFetcher {
            responses: Mutex::new(VecDeque::new()),
        });
        Arc::new(AppState {
            config: Config::default(),
            fetcher: fetcher.clone(),
            store: ScheduleStore::new(fetcher, std::time::Duration::from_secs(300), None),
            subscriptions: SubscriptionStore::new(dir.join("subscriptions.json")),
            history: HistoryStore::new(dir.join("history.json")),
            notifier,
        })
    }

    fn write_subscriptions(dir: &std::path::Path, subs: serde_json::Value) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("subscriptions.json"), subs.to_string()).unwrap();
    }

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("outage-init-{}-{}", tag, std::process::id()))
    }

    #[tokio::test]
    async fn baseline_then_change_alerts_tracking_user_once() {
        let dir = temp_dir("change");
        write_subscriptions(
            &dir,
            serde_json::json!([
                { "user_id": 42, "groups": [{ "label": "Дім", "group_id": "1.1" }] },
                { "user_id": 7, "groups": [{ "label": "Дім", "group_id": "2.2" }] }
            ]),
        );

        let notifier = Arc::new(RecordingNotifier::default());
        let state = test_state(&dir, notifier.clone());
        let mut detector = ChangeDetector::default();
        let mut last_emergency = None;
        let mut history = HistoryLog::default();

        let first = ScheduleDocument::from_raw(&raw_doc(
            serde_json::json!({"1.1": ["08:00-12:00"]}),
            None,
        ))
        .unwrap();
        process_refreshed_document(&state, &first, &mut detector, &mut last_emergency, &mut history)
            .await;
        assert!(notifier.sent.lock().await.is_empty(), "baseline must not alert");

        let second = ScheduleDocument::from_raw(&raw_doc(
            serde_json::json!({"1.1": ["08:00-12:00", "16:00-18:00"]}),
            None,
        ))
        .unwrap();
        process_refreshed_document(
            &state,
            &second,
            &mut detector,
            &mut last_emergency,
            &mut history,
        )
        .await;

        let sent = notifier.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 42);
        assert!(sent[0].1.contains("16:00-18:00"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn unchanged_refresh_stays_silent() {
        let dir = temp_dir("silent");
        write_subscriptions(
            &dir,
            serde_json::json!([
                { "user_id": 42, "groups": [{ "label": "Дім", "group_id": "1.1" }] }
            ]),
        );

        let notifier = Arc::new(RecordingNotifier::default());
        let state = test_state(&dir, notifier.clone());
        let mut detector = ChangeDetector::default();
        let mut last_emergency = None;
        let mut history = HistoryLog::default();

        let doc = ScheduleDocument::from_raw(&raw_doc(
            serde_json::json!({"1.1": ["08:00-12:00"]}),
            None,
        ))
        .unwrap();
        for _ in 0..3 {
            process_refreshed_document(
                &state,
                &doc,
                &mut detector,
                &mut last_emergency,
                &mut history,
            )
            .await;
        }
        assert!(notifier.sent.lock().await.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn emergency_change_broadcasts_to_enabled_users_once() {
        let dir = temp_dir("emergency");
        write_subscriptions(
            &dir,
            serde_json::json!([
                { "user_id": 1, "groups": [{ "label": "Дім", "group_id": "1.1" }] },
                { "user_id": 2, "groups": [], "notifications_enabled": false }
            ]),
        );

        let notifier = Arc::new(RecordingNotifier::default());
        let state = test_state(&dir, notifier.clone());
        let mut detector = ChangeDetector::default();
        let mut last_emergency = None;
        let mut history = HistoryLog::default();

        let doc = ScheduleDocument::from_raw(&raw_doc(
            serde_json::json!({}),
            Some("Екстрені відключення по всьому місту"),
        ))
        .unwrap();
        process_refreshed_document(&state, &doc, &mut detector, &mut last_emergency, &mut history)
            .await;
        // same emergency again: no repeat broadcast
        process_refreshed_document(&state, &doc, &mut detector, &mut last_emergency, &mut history)
            .await;

        let sent = notifier.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 1);
        assert!(sent[0].1.contains("Екстрені"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn reminder_tick_dispatches_and_dedups() {
        let dir = temp_dir("reminder");
        write_subscriptions(
            &dir,
            serde_json::json!([
                {
                    "user_id": 42,
                    "groups": [{ "label": "Дім", "group_id": "1.1" }],
                    "reminder_lead": 15
                }
            ]),
        );

        let notifier = Arc::new(RecordingNotifier::default());

        // seed the store with a snapshot for 30.08.2026
        let fetcher: Arc<dyn ScheduleFetcher> = Arc::new(StubFetcher {
            responses: Mutex::new(
                vec![Ok(raw_doc(serde_json::json!({"1.1": ["14:00-16:00"]}), None))].into(),
            ),
        });
        let state = Arc::new(AppState {
            store: ScheduleStore::new(fetcher.clone(), std::time::Duration::from_secs(300), None),
            fetcher,
            config: Config::default(),
            subscriptions: SubscriptionStore::new(dir.join("subscriptions.json")),
            history: HistoryStore::new(dir.join("history.json")),
            notifier: notifier.clone(),
        });
        state.store.get().await.unwrap();

        let today = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
        let mut ledger = ReminderLedger::default();

        run_reminder_tick(&state, &mut ledger, today, 825).await;
        run_reminder_tick(&state, &mut ledger, today, 825).await;

        let sent = notifier.sent.lock().await;
        assert_eq!(sent.len(), 1, "reminder must fire exactly once");
        assert_eq!(sent[0].0, 42);
        assert!(sent[0].1.contains("14:00-16:00"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
