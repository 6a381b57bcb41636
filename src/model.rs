use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Outreach medium of a sequence step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Channel {
    Email,
    LinkedIn,
    Phone,
    #[serde(rename = "In Person")]
    InPerson,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Email,
        Channel::LinkedIn,
        Channel::Phone,
        Channel::InPerson,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "Email",
            Channel::LinkedIn => "LinkedIn",
            Channel::Phone => "Phone",
            Channel::InPerson => "In Person",
        }
    }

    /// Case-insensitive; accepts `in-person` / `inperson` spellings for CLI input.
    pub fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "email" => Some(Channel::Email),
            "linkedin" => Some(Channel::LinkedIn),
            "phone" => Some(Channel::Phone),
            "inperson" => Some(Channel::InPerson),
            _ => None,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contact {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub role: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields accepted when creating a contact. Blank strings are stored as null.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewContact {
    pub name: String,
    pub role: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactPatch {
    pub name: Option<String>,
    pub role: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
}

impl ContactPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.role.is_none()
            && self.company.is_none()
            && self.email.is_none()
            && self.notes.is_none()
    }
}

/// `{id, name}` pair returned by the scoped contact and sequence reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamedRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sequence {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SequenceStep {
    pub id: String,
    pub sequence_id: String,
    pub step_order: i64,
    pub channel: Channel,
    pub label: String,
    pub suggested_timing: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SequenceWithSteps {
    #[serde(flatten)]
    pub sequence: Sequence,
    pub steps: Vec<SequenceStep>,
}

/// Step definition supplied when a sequence is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewStep {
    pub step_order: i64,
    pub channel: Channel,
    pub label: String,
    pub suggested_timing: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assignment {
    pub contact_id: String,
    pub sequence_id: String,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssignedContact {
    pub contact_id: String,
    pub contact_name: String,
}

/// A user's record that one step of one enrollment is done.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionMark {
    pub contact_id: String,
    pub sequence_id: String,
    pub step_order: i64,
}

/// Identity of a derived task for completion lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey {
    pub contact_id: String,
    pub sequence_id: String,
    pub step_order: i64,
}

impl From<CompletionMark> for TaskKey {
    fn from(mark: CompletionMark) -> Self {
        Self {
            contact_id: mark.contact_id,
            sequence_id: mark.sequence_id,
            step_order: mark.step_order,
        }
    }
}

/// One step owed to one assigned contact. Computed on every read, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DerivedTask {
    pub id: String,
    pub contact_id: String,
    pub contact_name: String,
    pub sequence_id: String,
    pub sequence_name: String,
    pub step_order: i64,
    pub channel: Channel,
    pub label: String,
    pub suggested_timing: Option<String>,
    pub due_date: NaiveDate,
    pub assigned_at: NaiveDate,
    pub completed: bool,
}

impl DerivedTask {
    pub fn key(&self) -> TaskKey {
        TaskKey {
            contact_id: self.contact_id.clone(),
            sequence_id: self.sequence_id.clone(),
            step_order: self.step_order,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_contacts: i64,
    pub active_sequences: i64,
    pub assigned_contacts: i64,
}
