pub mod history;
pub mod interval;
pub mod schedule;
pub mod subscription;

pub use history::{HistoryLog, RawHistory};
pub use interval::{TimeInterval, MINUTES_PER_DAY};
pub use schedule::{DaySchedule, RawScheduleDocument, ScheduleDocument};
pub use subscription::{GroupAssignment, ReminderLead, Subscription};
