use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use uuid::Uuid;

use crate::error::UnknownStatus;

// Due time given to tasks that only carry a due date
pub fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::default())
}

// Stored as its ordinal: ACTIVE = 0, COMPLETED = 1, EXPIRED = 2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Active,
    Completed,
    Expired,
}

impl TaskStatus {
    pub fn ordinal(self) -> u8 {
        match self {
            TaskStatus::Active => 0,
            TaskStatus::Completed => 1,
            TaskStatus::Expired => 2,
        }
    }

    pub fn from_ordinal(n: u8) -> Option<Self> {
        match n {
            0 => Some(TaskStatus::Active),
            1 => Some(TaskStatus::Completed),
            2 => Some(TaskStatus::Expired),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "active" => Some(TaskStatus::Active),
            "completed" => Some(TaskStatus::Completed),
            "expired" => Some(TaskStatus::Expired),
            _ => None,
        }
    }

    // Completed and expired tasks are never revisited by the engine
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Active)
    }
}

// Variant order is the ordinal order, so `Ord` sorts LOW < ... < VERY_HIGH.
// Stored as its ordinal (0..=3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Priority {
    pub fn ordinal(self) -> u8 {
        match self {
            Priority::Low => 0,
            Priority::Medium => 1,
            Priority::High => 2,
            Priority::VeryHigh => 3,
        }
    }

    pub fn from_ordinal(n: u8) -> Option<Self> {
        match n {
            0 => Some(Priority::Low),
            1 => Some(Priority::Medium),
            2 => Some(Priority::High),
            3 => Some(Priority::VeryHigh),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            "very_high" => Some(Priority::VeryHigh),
            _ => None,
        }
    }
}

// -----------------------------
// Ordinal encoding
// Writes the number; reads a number or, leniently, a name
// -----------------------------
#[derive(Deserialize)]
#[serde(untagged)]
enum OrdinalRepr {
    Ordinal(u8),
    Name(String),
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.ordinal())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parsed = match OrdinalRepr::deserialize(deserializer)? {
            OrdinalRepr::Ordinal(n) => TaskStatus::from_ordinal(n),
            OrdinalRepr::Name(name) => TaskStatus::from_name(&name),
        };
        parsed.ok_or_else(|| de::Error::custom("task status must be 0..=2"))
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.ordinal())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parsed = match OrdinalRepr::deserialize(deserializer)? {
            OrdinalRepr::Ordinal(n) => Priority::from_ordinal(n),
            OrdinalRepr::Name(name) => Priority::from_name(&name),
        };
        parsed.ok_or_else(|| de::Error::custom("priority must be 0..=3"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub content: String,
    pub creation_date: NaiveDate,
    pub creation_time: NaiveTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_time: Option<NaiveTime>,
    pub priority: Priority,
    #[serde(default)]
    pub get_notified: bool,
    #[serde(default)]
    pub notification_offset: u32, // minutes before the due instant
    #[serde(default)]
    pub notification_timestamp: i64, // epoch ms, 0 = none
    pub status: TaskStatus,
    pub modification_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<NaiveTime>,
}

impl Task {
    pub fn has_due_date(&self) -> bool {
        self.due_date.is_some()
    }

    // Wall-clock due instant, without a timezone attached.
    //
    // Records written by hand may carry a date without a time; those fall
    // due at the end of that day, like freshly created ones.
    pub fn due_at(&self) -> Option<NaiveDateTime> {
        let date = self.due_date?;
        Some(date.and_time(self.due_time.unwrap_or_else(end_of_day)))
    }

    pub fn is_active(&self) -> bool {
        self.status == TaskStatus::Active
    }
}

// Which slice of the collection a query is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(TaskStatus),
}

impl StatusFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(status) => task.status == status,
        }
    }
}

impl From<TaskStatus> for StatusFilter {
    fn from(status: TaskStatus) -> Self {
        StatusFilter::Only(status)
    }
}

// Accepts "all", status names and their ordinals ("0", "1", "2")
impl FromStr for StatusFilter {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        let status = match raw.parse::<u8>() {
            Ok(n) => TaskStatus::from_ordinal(n),
            Err(_) => TaskStatus::from_name(raw),
        };
        status
            .map(StatusFilter::Only)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

// Raw values collected by the task form.
//
// Empty strings count as "not given" for the due date and time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaskInput {
    pub content: String,
    pub due_date: Option<String>, // "YYYY-MM-DD"
    pub due_time: Option<String>, // "HH:MM"
    pub priority: u8,             // 0..=3
    pub wants_notification: bool,
    pub notification_offset_minutes: u32,
}

// Result of a sorted listing
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SortedTasks {
    pub with_due_date: Vec<Task>,
    pub no_due_date: Vec<Task>,
    pub all: Vec<Task>, // with_due_date followed by no_due_date
}
