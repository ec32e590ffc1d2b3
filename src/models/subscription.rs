use serde::{Deserialize, Serialize};

/// Reminder lead preference: minutes of advance notice before an outage
/// starts. Only the published presets are representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum ReminderLead {
    #[default]
    Off,
    Min15,
    Min30,
}

impl ReminderLead {
    pub fn minutes(self) -> u16 {
        match self {
            ReminderLead::Off => 0,
            ReminderLead::Min15 => 15,
            ReminderLead::Min30 => 30,
        }
    }
}

impl TryFrom<u16> for ReminderLead {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ReminderLead::Off),
            15 => Ok(ReminderLead::Min15),
            30 => Ok(ReminderLead::Min30),
            other => Err(format!("unsupported reminder lead: {} minutes", other)),
        }
    }
}

impl From<ReminderLead> for u16 {
    fn from(lead: ReminderLead) -> Self {
        lead.minutes()
    }
}

/// A labelled outage group a user tracks ("Дім" -> "1.1").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAssignment {
    pub label: String,
    pub group_id: String,
}

fn default_true() -> bool {
    true
}

/// Per-user preferences, as stored by the subscription collaborator.
///
/// `groups` keeps insertion order; the first entry is the primary group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub user_id: i64,
    #[serde(default)]
    pub groups: Vec<GroupAssignment>,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default)]
    pub reminder_lead: ReminderLead,
    #[serde(default = "default_true")]
    pub compare_enabled: bool,
}

impl Subscription {
    pub fn primary_group(&self) -> Option<&GroupAssignment> {
        self.groups.first()
    }
}
