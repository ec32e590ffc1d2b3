use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sentinel end-of-day value, rendered as "24:00" on the wire.
pub const MINUTES_PER_DAY: u16 = 1440;

/// Half-open outage window within one calendar day, in minutes of day.
///
/// Invariant: `0 <= start < end <= 1440`. Construction through [`TimeInterval::new`]
/// enforces it; zero-length and inverted ranges are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: u16,
    pub end: u16,
}

impl TimeInterval {
    /// Build an interval, clamping an end that crosses midnight to the
    /// 1440-minute boundary. Returns `None` for zero-length or inverted ranges.
    pub fn new(start: u16, end: u16) -> Option<Self> {
        let end = end.min(MINUTES_PER_DAY);
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    pub fn duration_minutes(&self) -> u16 {
        self.end - self.start
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid interval string: {0}")]
pub struct IntervalParseError(String);

fn parse_hhmm(s: &str) -> Option<u16> {
    let (h, m) = s.split_once(':')?;
    let h: u16 = h.parse().ok()?;
    let m: u16 = m.parse().ok()?;
    if h > 24 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

impl FromStr for TimeInterval {
    type Err = IntervalParseError;

    /// Parse the wire form `"HH:MM-HH:MM"` (24-hour clock, end may be `"24:00"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| IntervalParseError(s.to_string()))?;
        let start = parse_hhmm(start.trim()).ok_or_else(|| IntervalParseError(s.to_string()))?;
        let end = parse_hhmm(end.trim()).ok_or_else(|| IntervalParseError(s.to_string()))?;
        TimeInterval::new(start, end).ok_or_else(|| IntervalParseError(s.to_string()))
    }
}

impl fmt::Display for TimeInterval {
    /// Render the exact wire form, preserving the `"24:00"` day-end sentinel.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start / 60,
            self.start % 60,
            self.end / 60,
            self.end % 60
        )
    }
}

/// Merge raw ranges into a minimal sorted interval list.
///
/// Sorts by start, then folds in a single scan; a range whose start is at or
/// before the running end extends it (covers both overlap and exact adjacency).
pub fn merge_ranges(mut ranges: Vec<TimeInterval>) -> Vec<TimeInterval> {
    ranges.sort();

    let mut merged: Vec<TimeInterval> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(running) if range.start <= running.end => {
                running.end = running.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Convert a fixed-granularity boolean slot vector (true = outage) into
/// merged intervals. Contiguous true runs become single intervals.
pub fn from_slots(slots: &[bool], slot_minutes: u16) -> Vec<TimeInterval> {
    let mut intervals = Vec::new();
    let mut run_start: Option<u16> = None;

    for (i, &on) in slots.iter().enumerate() {
        match (on, run_start) {
            (true, None) => run_start = Some(i as u16 * slot_minutes),
            (false, Some(start)) => {
                if let Some(iv) = TimeInterval::new(start, i as u16 * slot_minutes) {
                    intervals.push(iv);
                }
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        if let Some(iv) = TimeInterval::new(start, slots.len() as u16 * slot_minutes) {
            intervals.push(iv);
        }
    }
    intervals
}

/// Convert fractional-hour ranges (e.g. YASNO's `{start: 9.0, end: 12.5}`)
/// into merged intervals. Fractions truncate to whole minutes.
pub fn from_fractional_hours(ranges: &[(f64, f64)]) -> Vec<TimeInterval> {
    let to_minutes = |hours: f64| (hours * 60.0).floor().clamp(0.0, MINUTES_PER_DAY as f64) as u16;

    let ranges = ranges
        .iter()
        .filter_map(|&(start, end)| TimeInterval::new(to_minutes(start), to_minutes(end)))
        .collect();
    merge_ranges(ranges)
}

/// Total outage minutes across a canonical interval list.
pub fn total_minutes(intervals: &[TimeInterval]) -> u32 {
    intervals.iter().map(|iv| iv.duration_minutes() as u32).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(s: &str) -> TimeInterval {
        s.parse().unwrap()
    }

    #[test]
    fn parse_and_display_round_trip() {
        assert_eq!(iv("08:00-12:30").to_string(), "08:00-12:30");
        assert_eq!(iv("22:00-24:00").to_string(), "22:00-24:00");
        assert_eq!(iv("00:00-01:00"), TimeInterval { start: 0, end: 60 });
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<TimeInterval>().is_err());
        assert!("08:00".parse::<TimeInterval>().is_err());
        assert!("8am-9am".parse::<TimeInterval>().is_err());
        assert!("25:00-26:00".parse::<TimeInterval>().is_err());
        // inverted and zero-length
        assert!("12:00-08:00".parse::<TimeInterval>().is_err());
        assert!("12:00-12:00".parse::<TimeInterval>().is_err());
    }

    #[test]
    fn merge_empty_is_empty() {
        assert_eq!(merge_ranges(vec![]), vec![]);
    }

    #[test]
    fn merge_joins_exact_adjacency() {
        let merged = merge_ranges(vec![iv("00:00-01:00"), iv("01:00-02:00")]);
        assert_eq!(merged, vec![iv("00:00-02:00")]);
    }

    #[test]
    fn merge_is_order_independent() {
        let a = vec![iv("16:00-18:00"), iv("08:00-10:00"), iv("09:30-12:00")];
        let b = vec![iv("09:30-12:00"), iv("16:00-18:00"), iv("08:00-10:00")];
        assert_eq!(merge_ranges(a), merge_ranges(b));
        assert_eq!(
            merge_ranges(vec![
                iv("08:00-10:00"),
                iv("09:30-12:00"),
                iv("16:00-18:00")
            ]),
            vec![iv("08:00-12:00"), iv("16:00-18:00")]
        );
    }

    #[test]
    fn slots_contiguous_runs_become_single_intervals() {
        // 48 half-hour slots: 01:00-02:30 and 23:30-24:00
        let mut slots = vec![false; 48];
        for s in slots.iter_mut().take(5).skip(2) {
            *s = true;
        }
        slots[47] = true;

        let intervals = from_slots(&slots, 30);
        assert_eq!(intervals, vec![iv("01:00-02:30"), iv("23:30-24:00")]);
    }

    #[test]
    fn slots_all_false_is_empty() {
        assert!(from_slots(&[false; 48], 30).is_empty());
    }

    fn expand(intervals: &[TimeInterval], slot_minutes: u16) -> Vec<bool> {
        let n = (MINUTES_PER_DAY / slot_minutes) as usize;
        let mut slots = vec![false; n];
        for iv in intervals {
            for slot in slots
                .iter_mut()
                .take((iv.end / slot_minutes) as usize)
                .skip((iv.start / slot_minutes) as usize)
            {
                *slot = true;
            }
        }
        slots
    }

    #[test]
    fn slot_round_trip_is_idempotent() {
        let patterns: [&[usize]; 3] = [&[], &[0, 1, 2, 46, 47], &[5, 7, 9, 10, 11]];
        for on in patterns {
            let mut slots = vec![false; 48];
            for &i in on {
                slots[i] = true;
            }
            let intervals = from_slots(&slots, 30);
            assert_eq!(expand(&intervals, 30), slots);
            // and a second pass changes nothing
            assert_eq!(from_slots(&expand(&intervals, 30), 30), intervals);
        }
    }

    #[test]
    fn fractional_hours_floor_to_minutes_and_clamp() {
        let intervals = from_fractional_hours(&[(9.0, 12.5), (12.5, 13.0), (23.0, 25.0)]);
        assert_eq!(intervals, vec![iv("09:00-13:00"), iv("23:00-24:00")]);
        // inverted / zero-length dropped silently
        assert!(from_fractional_hours(&[(5.0, 5.0), (7.0, 6.0)]).is_empty());
    }

    #[test]
    fn total_minutes_sums_durations() {
        assert_eq!(total_minutes(&[iv("08:00-12:00"), iv("16:00-16:30")]), 270);
        assert_eq!(total_minutes(&[]), 0);
    }
}
