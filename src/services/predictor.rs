use chrono::{Datelike, Days, NaiveDate};

use crate::models::interval::total_minutes;
use crate::models::{HistoryLog, TimeInterval};

/// Minimum history depth before any forecast is attempted.
pub const MIN_HISTORY_DAYS: usize = 7;

const BASE_CONFIDENCE: u8 = 40;
const CONFIDENCE_STEP: u8 = 20;
const MAX_EXTRA_MATCHES: usize = 3;

/// A weekday-matched forecast derived from the history log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forecast {
    pub group_id: String,
    pub target_date: NaiveDate,
    /// Most recent history date on the same weekday with data for the group.
    pub based_on: NaiveDate,
    pub intervals: Vec<TimeInterval>,
    pub total_minutes: u32,
    /// 40..=100; grows with each older weekday match identical to the base.
    pub confidence: u8,
}

/// Predictor outcome. Insufficient data is an explicit result, never a
/// fabricated schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prediction {
    Forecast(Forecast),
    InsufficientData { history_days: usize },
}

/// Default forecast target: the first day beyond the live snapshot.
pub fn default_target(today: NaiveDate) -> NaiveDate {
    today + Days::new(2)
}

/// Forecast a group's schedule for `target_date` from same-weekday history.
pub fn predict(history: &HistoryLog, group_id: &str, target_date: NaiveDate) -> Prediction {
    if history.len() < MIN_HISTORY_DAYS {
        return Prediction::InsufficientData {
            history_days: history.len(),
        };
    }

    let weekday = target_date.weekday();
    let mut matches = history
        .dates()
        .rev()
        .filter(|d| d.weekday() == weekday)
        .filter_map(|d| history.intervals_on(d, group_id).map(|ivs| (d, ivs)));

    let Some((based_on, base_intervals)) = matches.next() else {
        tracing::debug!(
            "No {} history for group {} (target {})",
            weekday,
            group_id,
            target_date
        );
        return Prediction::InsufficientData {
            history_days: history.len(),
        };
    };

    let identical_older = matches
        .take(MAX_EXTRA_MATCHES)
        .filter(|(_, ivs)| *ivs == base_intervals)
        .count();
    let confidence =
        (BASE_CONFIDENCE + CONFIDENCE_STEP * identical_older as u8).min(100);

    Prediction::Forecast(Forecast {
        group_id: group_id.to_string(),
        target_date,
        based_on,
        intervals: base_intervals.to_vec(),
        total_minutes: total_minutes(base_intervals),
        confidence,
    })
}
