use std::collections::HashMap;

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use crate::models::TimeInterval;

/// Structured fingerprint key: global per (day, group), or per user when
/// `user_id` is set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FingerprintKey {
    pub date: NaiveDate,
    pub group_id: String,
    pub user_id: Option<i64>,
}

impl FingerprintKey {
    pub fn global(date: NaiveDate, group_id: &str) -> Self {
        Self {
            date,
            group_id: group_id.to_string(),
            user_id: None,
        }
    }

    pub fn for_user(date: NaiveDate, group_id: &str, user_id: i64) -> Self {
        Self {
            date,
            group_id: group_id.to_string(),
            user_id: Some(user_id),
        }
    }
}

/// Stable hash of the canonical, order-preserving serialization of an
/// interval list.
pub fn fingerprint(intervals: &[TimeInterval]) -> String {
    let serialized = intervals
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    hex::encode(Sha256::digest(serialized.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSignal {
    /// First sighting of this key: stored as a baseline, no signal fires.
    Baseline,
    Unchanged,
    Changed {
        old: Vec<TimeInterval>,
        new: Vec<TimeInterval>,
    },
}

struct Observation {
    fingerprint: String,
    intervals: Vec<TimeInterval>,
}

/// Tracks the last observed interval list per key and emits change signals.
///
/// Owned by the refresh worker; explicit state, no globals.
#[derive(Default)]
pub struct ChangeDetector {
    seen: HashMap<FingerprintKey, Observation>,
}

impl ChangeDetector {
    pub fn check(&mut self, key: FingerprintKey, intervals: &[TimeInterval]) -> ChangeSignal {
        let new_fingerprint = fingerprint(intervals);

        match self.seen.get_mut(&key) {
            None => {
                self.seen.insert(
                    key,
                    Observation {
                        fingerprint: new_fingerprint,
                        intervals: intervals.to_vec(),
                    },
                );
                ChangeSignal::Baseline
            }
            Some(observation) if observation.fingerprint == new_fingerprint => {
                ChangeSignal::Unchanged
            }
            Some(observation) => {
                let old = std::mem::replace(&mut observation.intervals, intervals.to_vec());
                observation.fingerprint = new_fingerprint;
                ChangeSignal::Changed {
                    old,
                    new: intervals.to_vec(),
                }
            }
        }
    }

    /// Drop fingerprints for days that can no longer appear in a snapshot.
    pub fn prune_older_than(&mut self, date: NaiveDate) {
        self.seen.retain(|key, _| key.date >= date);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.seen.len()
    }
}
