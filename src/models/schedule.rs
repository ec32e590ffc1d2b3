use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::interval::{merge_ranges, TimeInterval};

/// Wire date format shared with the acquisition adapters.
pub const WIRE_DATE_FORMAT: &str = "%d.%m.%Y";

/// One day section of the raw fetch payload, exactly as published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDaySection {
    pub date: String,
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,
}

/// Raw schedule payload produced by the acquisition adapters.
///
/// Deserialization fails when a required top-level field is missing, which
/// aborts the whole refresh cycle (the previous snapshot is retained).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawScheduleDocument {
    pub timezone: String,
    pub updated: String,
    #[serde(default)]
    pub emergency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announcement: Option<String>,
    pub today: RawDaySection,
    pub tomorrow: RawDaySection,
}

/// Canonical outage schedule for one calendar day: group id mapped to an
/// ordered, non-overlapping, maximally-merged interval list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub groups: BTreeMap<String, Vec<TimeInterval>>,
}

impl DaySchedule {
    /// Canonicalize one raw day section.
    ///
    /// A malformed entry skips only its own group (logged with context);
    /// an unparseable date fails the whole section.
    pub fn from_raw(raw: &RawDaySection) -> AppResult<Self> {
        let date = NaiveDate::parse_from_str(&raw.date, WIRE_DATE_FORMAT)
            .map_err(|e| AppError::Payload(format!("bad date {:?}: {}", raw.date, e)))?;

        let mut groups = BTreeMap::new();
        for (group_id, entries) in &raw.groups {
            let mut ranges = Vec::with_capacity(entries.len());
            let mut ok = true;
            for entry in entries {
                match entry.parse::<TimeInterval>() {
                    Ok(iv) => ranges.push(iv),
                    Err(e) => {
                        tracing::warn!(
                            "Skipping group {} for {}: {} (stage: canonicalize)",
                            group_id,
                            raw.date,
                            e
                        );
                        ok = false;
                        break;
                    }
                }
            }
            if ok {
                groups.insert(group_id.clone(), merge_ranges(ranges));
            }
        }

        Ok(Self { date, groups })
    }

    pub fn intervals_for(&self, group_id: &str) -> &[TimeInterval] {
        self.groups.get(group_id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn to_raw(&self) -> RawDaySection {
        RawDaySection {
            date: self.date.format(WIRE_DATE_FORMAT).to_string(),
            groups: self
                .groups
                .iter()
                .map(|(g, ivs)| (g.clone(), ivs.iter().map(ToString::to_string).collect()))
                .collect(),
        }
    }
}

/// Canonical in-memory schedule snapshot.
///
/// Rebuilt from scratch on every successful refresh and swapped in whole;
/// consumers always observe an internally consistent document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleDocument {
    pub today: DaySchedule,
    pub tomorrow: DaySchedule,
    pub timezone: String,
    pub source_updated_at: String,
    pub emergency: Option<String>,
    pub announcement: Option<String>,
}

impl ScheduleDocument {
    pub fn from_raw(raw: &RawScheduleDocument) -> AppResult<Self> {
        Ok(Self {
            today: DaySchedule::from_raw(&raw.today)?,
            tomorrow: DaySchedule::from_raw(&raw.tomorrow)?,
            timezone: raw.timezone.clone(),
            source_updated_at: raw.updated.clone(),
            emergency: raw.emergency.clone(),
            announcement: raw.announcement.clone(),
        })
    }

    /// Serialize back to the exact wire shape (interval strings included) so
    /// the persisted document stays parseable by downstream adapters.
    pub fn to_raw(&self) -> RawScheduleDocument {
        RawScheduleDocument {
            timezone: self.timezone.clone(),
            updated: self.source_updated_at.clone(),
            emergency: self.emergency.clone(),
            announcement: self.announcement.clone(),
            today: self.today.to_raw(),
            tomorrow: self.tomorrow.to_raw(),
        }
    }

    /// Schedule for a concrete date, if the snapshot covers it.
    pub fn for_date(&self, date: NaiveDate) -> Option<&DaySchedule> {
        if self.today.date == date {
            Some(&self.today)
        } else if self.tomorrow.date == date {
            Some(&self.tomorrow)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_doc(json: serde_json::Value) -> RawScheduleDocument {
        serde_json::from_value(json).unwrap()
    }

    fn sample() -> RawScheduleDocument {
        raw_doc(serde_json::json!({
            "timezone": "Europe/Kyiv",
            "updated": "2026-08-30 14:00:00",
            "emergency": null,
            "today": {
                "date": "30.08.2026",
                "groups": {
                    "1.1": ["16:00-18:00", "08:00-10:00", "10:00-12:00"],
                    "2.2": ["22:00-24:00"]
                }
            },
            "tomorrow": { "date": "31.08.2026", "groups": {} }
        }))
    }

    #[test]
    fn from_raw_canonicalizes_each_group() {
        let doc = ScheduleDocument::from_raw(&sample()).unwrap();
        let ivs: Vec<String> = doc
            .today
            .intervals_for("1.1")
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(ivs, vec!["08:00-12:00", "16:00-18:00"]);
        assert_eq!(doc.today.date, NaiveDate::from_ymd_opt(2026, 8, 30).unwrap());
        assert!(doc.tomorrow.groups.is_empty());
    }

    #[test]
    fn malformed_entry_skips_only_its_group() {
        let mut raw = sample();
        raw.today
            .groups
            .insert("3.1".to_string(), vec!["nonsense".to_string()]);

        let doc = ScheduleDocument::from_raw(&raw).unwrap();
        assert!(!doc.today.groups.contains_key("3.1"));
        assert!(doc.today.groups.contains_key("1.1"));
        assert!(doc.today.groups.contains_key("2.2"));
    }

    #[test]
    fn bad_date_fails_whole_document() {
        let mut raw = sample();
        raw.today.date = "2026-08-30".to_string();
        assert!(ScheduleDocument::from_raw(&raw).is_err());
    }

    #[test]
    fn missing_top_level_field_is_a_deserialize_error() {
        let res: Result<RawScheduleDocument, _> = serde_json::from_value(serde_json::json!({
            "timezone": "Europe/Kyiv",
            "today": { "date": "30.08.2026", "groups": {} }
        }));
        assert!(res.is_err());
    }

    #[test]
    fn to_raw_preserves_wire_interval_form() {
        let doc = ScheduleDocument::from_raw(&sample()).unwrap();
        let raw = doc.to_raw();
        assert_eq!(raw.today.date, "30.08.2026");
        assert_eq!(raw.today.groups["2.2"], vec!["22:00-24:00".to_string()]);
    }

    #[test]
    fn for_date_matches_today_and_tomorrow() {
        let doc = ScheduleDocument::from_raw(&sample()).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
        let later = NaiveDate::from_ymd_opt(2026, 9, 2).unwrap();
        assert!(doc.for_date(today).is_some());
        assert!(doc.for_date(later).is_none());
    }
}
