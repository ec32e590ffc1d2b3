use std::collections::HashSet;

use chrono::NaiveDate;

use crate::models::{DaySchedule, Subscription, TimeInterval};

/// Structured delivery-dedup key; one reminder ever fires per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReminderKey {
    pub user_id: i64,
    pub group_id: String,
    pub start_minute: u16,
    pub date: NaiveDate,
}

/// Record of reminders already delivered, purged once per local day.
///
/// Owned by the reminder worker; explicit state, no globals.
#[derive(Default)]
pub struct ReminderLedger {
    sent: HashSet<ReminderKey>,
    last_seen_date: Option<NaiveDate>,
}

impl ReminderLedger {
    /// Nightly cleanup: on the first tick of a new local day, drop every
    /// record whose date key is not today.
    pub fn purge_if_new_day(&mut self, today: NaiveDate) {
        if self.last_seen_date == Some(today) {
            return;
        }
        let before = self.sent.len();
        self.sent.retain(|key| key.date == today);
        if before > 0 {
            tracing::debug!(
                "Reminder ledger purge for {}: {} -> {} records",
                today,
                before,
                self.sent.len()
            );
        }
        self.last_seen_date = Some(today);
    }

    /// Record a delivery; returns false when the key was already present.
    fn mark(&mut self, key: ReminderKey) -> bool {
        self.sent.insert(key)
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, key: &ReminderKey) -> bool {
        self.sent.contains(key)
    }
}

/// A reminder that must be dispatched this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueReminder {
    pub user_id: i64,
    pub label: String,
    pub group_id: String,
    pub lead_minutes: u16,
    pub interval: TimeInterval,
}

/// Match subscriptions against today's schedule at the current minute.
///
/// A reminder fires when the minutes until an interval start equal the
/// subscription's lead exactly; the tick period is at most one minute, so an
/// exact match cannot be skipped over. Past intervals never match, and the
/// ledger guarantees at most one reminder per (user, group, start, day).
pub fn due_reminders(
    subscriptions: &[Subscription],
    today: &DaySchedule,
    minute_of_day: u16,
    ledger: &mut ReminderLedger,
) -> Vec<DueReminder> {
    let mut due = Vec::new();

    for sub in subscriptions {
        let lead = sub.reminder_lead.minutes();
        if !sub.notifications_enabled || lead == 0 {
            continue;
        }

        for assignment in &sub.groups {
            for interval in today.intervals_for(&assignment.group_id) {
                let minutes_until = interval.start as i32 - minute_of_day as i32;
                if minutes_until != lead as i32 || minutes_until < 0 {
                    continue;
                }

                let key = ReminderKey {
                    user_id: sub.user_id,
                    group_id: assignment.group_id.clone(),
                    start_minute: interval.start,
                    date: today.date,
                };
                if ledger.mark(key) {
                    due.push(DueReminder {
                        user_id: sub.user_id,
                        label: assignment.label.clone(),
                        group_id: assignment.group_id.clone(),
                        lead_minutes: lead,
                        interval: *interval,
                    });
                }
            }
        }
    }

    due
}
