use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::interval::TimeInterval;
use crate::models::schedule::{DaySchedule, RawDaySection, WIRE_DATE_FORMAT};

/// Retention cap for the history log; oldest entries are evicted first.
pub const HISTORY_CAP: usize = 30;

/// One recorded day in the raw history file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawHistoryDay {
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

/// Raw history file shape: `{"days": {"DD.MM.YYYY": {...}}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawHistory {
    #[serde(default)]
    pub days: BTreeMap<String, RawHistoryDay>,
}

/// Rolling log of past daily schedules, feeding the predictor only.
///
/// Keyed by date so iteration is chronological; independent of the live
/// snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryLog {
    days: BTreeMap<NaiveDate, BTreeMap<String, Vec<TimeInterval>>>,
}

impl HistoryLog {
    /// Canonicalize a raw history file. Days with unparseable dates are
    /// dropped with a warning; malformed groups skip only themselves.
    pub fn from_raw(raw: &RawHistory) -> Self {
        let mut log = Self::default();
        for (date, day) in &raw.days {
            let section = RawDaySection {
                date: date.clone(),
                groups: day.groups.clone(),
            };
            match DaySchedule::from_raw(&section) {
                Ok(schedule) => log.record(schedule.date, schedule.groups),
                Err(e) => {
                    tracing::warn!("Skipping history day {}: {} (stage: history)", date, e);
                }
            }
        }
        log
    }

    pub fn to_raw(&self) -> RawHistory {
        RawHistory {
            days: self
                .days
                .iter()
                .map(|(date, groups)| {
                    (
                        date.format(WIRE_DATE_FORMAT).to_string(),
                        RawHistoryDay {
                            groups: groups
                                .iter()
                                .map(|(g, ivs)| {
                                    (g.clone(), ivs.iter().map(ToString::to_string).collect())
                                })
                                .collect(),
                            updated: None,
                        },
                    )
                })
                .collect(),
        }
    }

    /// Record one day, evicting the oldest entries beyond [`HISTORY_CAP`].
    /// Empty days are not recorded.
    pub fn record(&mut self, date: NaiveDate, groups: BTreeMap<String, Vec<TimeInterval>>) {
        if groups.is_empty() {
            return;
        }
        self.days.insert(date, groups);
        while self.days.len() > HISTORY_CAP {
            let oldest = *self.days.keys().next().expect("non-empty");
            self.days.remove(&oldest);
        }
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Interval list recorded for a group on a given date, if any.
    pub fn intervals_on(&self, date: NaiveDate, group_id: &str) -> Option<&[TimeInterval]> {
        self.days.get(&date)?.get(group_id).map(Vec::as_slice)
    }

    /// All recorded dates, oldest first.
    pub fn dates(&self) -> impl DoubleEndedIterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }
}
