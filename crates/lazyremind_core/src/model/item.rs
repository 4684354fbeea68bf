//! Reminder and task domain model.
//!
//! # Responsibility
//! - Define the stored shape of reminder/task items and their wire names.
//! - Provide draft and partial-update types used by item use-cases.
//!
//! # Invariants
//! - `id` is assigned once at creation and never patched.
//! - `sent` starts `false`; only the scheduler and rollover flip it.
//! - `due_date` keeps the caller's ISO-8601 text; writes validate it parses.
//! - Unknown `recurrence_interval`, `priority` and `status` strings are
//!   preserved verbatim.

use crate::model::due_date::DueDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Opaque item identifier, unique within one user's collection.
pub type ItemId = String;

/// Validation and parsing failures for a single item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemError {
    /// `due_date` does not match any accepted ISO-8601 shape.
    MalformedDate(String),
    /// Advancing `due_date` left the representable range.
    DateOverflow(String),
    /// `title` is empty after trim.
    BlankTitle,
}

impl Display for ItemError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedDate(value) => write!(f, "malformed due_date: `{value}`"),
            Self::DateOverflow(value) => write!(f, "due_date out of range after advance: `{value}`"),
            Self::BlankTitle => write!(f, "title must not be blank"),
        }
    }
}

impl Error for ItemError {}

/// Collection field an item type is stored under in the user document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemField {
    Reminders,
    Tasks,
}

impl ItemField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reminders => "reminders",
            Self::Tasks => "tasks",
        }
    }
}

impl Display for ItemField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recurrence cadence for recurring items.
///
/// Serialized as `"daily" | "weekly" | "monthly"` or `null`. Any other
/// string round-trips as `Unrecognized` and is skipped by rollover.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RecurrenceInterval {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Unrecognized(String),
}

impl RecurrenceInterval {
    /// Maps stored text to an interval. Matching is exact.
    pub fn parse(value: &str) -> Self {
        match value {
            "daily" => Self::Daily,
            "weekly" => Self::Weekly,
            "monthly" => Self::Monthly,
            "none" => Self::None,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Daily => Some("daily"),
            Self::Weekly => Some("weekly"),
            Self::Monthly => Some("monthly"),
            Self::Unrecognized(value) => Some(value.as_str()),
        }
    }

    /// Fixed day offset to the next occurrence.
    ///
    /// Monthly is a flat 30 days, not a calendar month.
    pub fn step_days(&self) -> Option<i64> {
        match self {
            Self::Daily => Some(1),
            Self::Weekly => Some(7),
            Self::Monthly => Some(30),
            Self::None | Self::Unrecognized(_) => None,
        }
    }
}

impl Serialize for RecurrenceInterval {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_str() {
            Some(value) => serializer.serialize_str(value),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for RecurrenceInterval {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|value| Self::parse(&value)).unwrap_or_default())
    }
}

/// Task priority.
///
/// Written as `"low" | "medium" | "high"`. Legacy capitalized spellings are
/// accepted on input, `null` reads as medium, and any other string
/// round-trips as `Unrecognized`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Unrecognized(String),
}

impl Priority {
    pub fn parse(value: &str) -> Self {
        match value {
            "low" | "Low" => Self::Low,
            "medium" | "Medium" => Self::Medium,
            "high" | "High" => Self::High,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Unrecognized(value) => value.as_str(),
        }
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|value| Self::parse(&value)).unwrap_or_default())
    }
}

/// Task lifecycle state.
///
/// Written as `"pending" | "in_progress" | "completed"`. Same leniency as
/// [`Priority`]: legacy spellings accepted, `null` reads as pending, unknown
/// strings kept as `Unrecognized`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Unrecognized(String),
}

impl TaskStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "pending" | "Pending" => Self::Pending,
            "in_progress" | "InProgress" | "In Progress" => Self::InProgress,
            "completed" | "Completed" => Self::Completed,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Unrecognized(value) => value.as_str(),
        }
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|value| Self::parse(&value)).unwrap_or_default())
    }
}

/// Accessors shared by every item the recurrence engine and scheduler touch.
pub trait RecurringItem {
    fn id(&self) -> &str;
    fn title(&self) -> &str;
    fn due_date(&self) -> &str;
    fn set_due_date(&mut self, value: String);
    fn is_recurring(&self) -> bool;
    fn recurrence_interval(&self) -> &RecurrenceInterval;
    fn is_sent(&self) -> bool;
    fn set_sent(&mut self, sent: bool);
}

/// Stored reminder record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderItem {
    pub id: ItemId,
    pub title: String,
    /// ISO-8601 text as written by the caller.
    pub due_date: String,
    #[serde(default)]
    pub recurring: bool,
    /// Meaningful only when `recurring` is true.
    #[serde(default)]
    pub recurrence_interval: RecurrenceInterval,
    #[serde(default)]
    pub sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Stored task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: ItemId,
    pub title: String,
    pub due_date: String,
    #[serde(default)]
    pub recurring: bool,
    #[serde(default)]
    pub recurrence_interval: RecurrenceInterval,
    #[serde(default)]
    pub sent: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TaskItem {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

impl RecurringItem for ReminderItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn due_date(&self) -> &str {
        &self.due_date
    }

    fn set_due_date(&mut self, value: String) {
        self.due_date = value;
    }

    fn is_recurring(&self) -> bool {
        self.recurring
    }

    fn recurrence_interval(&self) -> &RecurrenceInterval {
        &self.recurrence_interval
    }

    fn is_sent(&self) -> bool {
        self.sent
    }

    fn set_sent(&mut self, sent: bool) {
        self.sent = sent;
    }
}

impl RecurringItem for TaskItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn due_date(&self) -> &str {
        &self.due_date
    }

    fn set_due_date(&mut self, value: String) {
        self.due_date = value;
    }

    fn is_recurring(&self) -> bool {
        self.recurring
    }

    fn recurrence_interval(&self) -> &RecurrenceInterval {
        &self.recurrence_interval
    }

    fn is_sent(&self) -> bool {
        self.sent
    }

    fn set_sent(&mut self, sent: bool) {
        self.sent = sent;
    }
}

/// Creation request for a reminder. `id` and `sent` are assigned on add.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewReminder {
    pub title: String,
    pub due_date: String,
    #[serde(default)]
    pub recurring: bool,
    #[serde(default)]
    pub recurrence_interval: RecurrenceInterval,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewReminder {
    /// Validates the draft and materializes it with an empty id.
    pub fn into_item(self) -> Result<ReminderItem, ItemError> {
        let title = normalize_title(&self.title)?;
        DueDate::parse(&self.due_date)?;
        Ok(ReminderItem {
            id: ItemId::new(),
            title,
            due_date: self.due_date.trim().to_string(),
            recurring: self.recurring,
            recurrence_interval: self.recurrence_interval,
            sent: false,
            description: self.description,
        })
    }
}

/// Creation request for a task. Missing priority defaults to medium.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub due_date: String,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub recurring: bool,
    #[serde(default)]
    pub recurrence_interval: RecurrenceInterval,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewTask {
    /// Validates the draft and materializes it with an empty id.
    pub fn into_item(self) -> Result<TaskItem, ItemError> {
        let title = normalize_title(&self.title)?;
        DueDate::parse(&self.due_date)?;
        Ok(TaskItem {
            id: ItemId::new(),
            title,
            due_date: self.due_date.trim().to_string(),
            recurring: self.recurring,
            recurrence_interval: self.recurrence_interval,
            sent: false,
            priority: self.priority.unwrap_or_default(),
            category: self.category,
            status: TaskStatus::Pending,
            description: self.description,
        })
    }
}

/// Partial update for a reminder. `None` leaves a field unchanged.
///
/// `description` is clearable: `Some(None)` (JSON `null`) removes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReminderPatch {
    pub title: Option<String>,
    pub due_date: Option<String>,
    pub recurring: Option<bool>,
    pub recurrence_interval: Option<RecurrenceInterval>,
    pub sent: Option<bool>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub description: Option<Option<String>>,
}

impl ReminderPatch {
    /// Patch that only flips the `sent` flag.
    pub fn sent(sent: bool) -> Self {
        Self {
            sent: Some(sent),
            ..Self::default()
        }
    }

    /// Applies the patch. The item is untouched when validation fails.
    pub fn apply(&self, item: &mut ReminderItem) -> Result<(), ItemError> {
        let title = self.title.as_deref().map(normalize_title).transpose()?;
        let due_date = self.due_date.as_deref().map(validated_due_date).transpose()?;

        if let Some(title) = title {
            item.title = title;
        }
        if let Some(due_date) = due_date {
            item.due_date = due_date;
        }
        if let Some(recurring) = self.recurring {
            item.recurring = recurring;
        }
        if let Some(interval) = &self.recurrence_interval {
            item.recurrence_interval = interval.clone();
        }
        if let Some(sent) = self.sent {
            item.sent = sent;
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        Ok(())
    }
}

/// Partial update for a task. `None` leaves a field unchanged; `category`
/// and `description` take `Some(None)` to clear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub due_date: Option<String>,
    pub recurring: Option<bool>,
    pub recurrence_interval: Option<RecurrenceInterval>,
    pub sent: Option<bool>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub category: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub description: Option<Option<String>>,
}

impl TaskPatch {
    pub fn sent(sent: bool) -> Self {
        Self {
            sent: Some(sent),
            ..Self::default()
        }
    }

    pub fn apply(&self, item: &mut TaskItem) -> Result<(), ItemError> {
        let title = self.title.as_deref().map(normalize_title).transpose()?;
        let due_date = self.due_date.as_deref().map(validated_due_date).transpose()?;

        if let Some(title) = title {
            item.title = title;
        }
        if let Some(due_date) = due_date {
            item.due_date = due_date;
        }
        if let Some(recurring) = self.recurring {
            item.recurring = recurring;
        }
        if let Some(interval) = &self.recurrence_interval {
            item.recurrence_interval = interval.clone();
        }
        if let Some(sent) = self.sent {
            item.sent = sent;
        }
        if let Some(priority) = &self.priority {
            item.priority = priority.clone();
        }
        if let Some(category) = &self.category {
            item.category = category.clone();
        }
        if let Some(status) = &self.status {
            item.status = status.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        Ok(())
    }
}

/// A present field maps to `Some`, including `null`; `#[serde(default)]`
/// covers the absent case.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn normalize_title(value: &str) -> Result<String, ItemError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ItemError::BlankTitle);
    }
    Ok(trimmed.to_string())
}

fn validated_due_date(value: &str) -> Result<String, ItemError> {
    DueDate::parse(value)?;
    Ok(value.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::{
        ItemError, NewReminder, NewTask, Priority, RecurrenceInterval, ReminderItem,
        ReminderPatch, TaskItem, TaskPatch, TaskStatus,
    };

    #[test]
    fn new_reminder_rejects_blank_title_and_bad_date() {
        let blank = NewReminder {
            title: "   ".to_string(),
            due_date: "2024-01-01T00:00:00".to_string(),
            ..NewReminder::default()
        };
        assert_eq!(blank.into_item().unwrap_err(), ItemError::BlankTitle);

        let bad_date = NewReminder {
            title: "dentist".to_string(),
            due_date: "soon".to_string(),
            ..NewReminder::default()
        };
        assert!(matches!(
            bad_date.into_item().unwrap_err(),
            ItemError::MalformedDate(_)
        ));
    }

    #[test]
    fn new_task_defaults_priority_and_status() {
        let task = NewTask {
            title: "file taxes".to_string(),
            due_date: "2024-04-15".to_string(),
            ..NewTask::default()
        }
        .into_item()
        .unwrap();
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(!task.sent);
    }

    #[test]
    fn patch_with_invalid_date_leaves_item_untouched() {
        let mut item = NewReminder {
            title: "call mom".to_string(),
            due_date: "2024-01-01T10:00:00".to_string(),
            ..NewReminder::default()
        }
        .into_item()
        .unwrap();
        let before = item.clone();

        let patch = ReminderPatch {
            title: Some("call dad".to_string()),
            due_date: Some("not-a-date".to_string()),
            ..ReminderPatch::default()
        };
        assert!(patch.apply(&mut item).is_err());
        assert_eq!(item, before);
    }

    #[test]
    fn interval_parse_is_exact() {
        assert_eq!(RecurrenceInterval::parse("weekly"), RecurrenceInterval::Weekly);
        assert_eq!(
            RecurrenceInterval::parse("Weekly"),
            RecurrenceInterval::Unrecognized("Weekly".to_string())
        );
        assert_eq!(RecurrenceInterval::parse("none"), RecurrenceInterval::None);
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let item: ReminderItem = serde_json::from_str(
            r#"{"id":"r1","title":"t","due_date":"2024-01-01T00:00:00"}"#,
        )
        .unwrap();
        assert!(!item.recurring);
        assert!(!item.sent);
        assert_eq!(item.recurrence_interval, RecurrenceInterval::None);
    }

    #[test]
    fn unknown_priority_and_status_are_kept() {
        let task: TaskItem = serde_json::from_str(
            r#"{"id":"t1","title":"t","due_date":"2024-01-01","priority":null,"status":"archived"}"#,
        )
        .unwrap();
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.status, TaskStatus::Unrecognized("archived".to_string()));
        assert!(!task.is_completed());

        let out = serde_json::to_value(&task).unwrap();
        assert_eq!(out["priority"], "medium");
        assert_eq!(out["status"], "archived");
        assert_eq!(Priority::parse("urgent").as_str(), "urgent");
    }

    #[test]
    fn null_in_patch_clears_and_absence_keeps() {
        let mut task = NewTask {
            title: "report".to_string(),
            due_date: "2024-04-15".to_string(),
            category: Some("work".to_string()),
            description: Some("q1 numbers".to_string()),
            ..NewTask::default()
        }
        .into_item()
        .unwrap();

        let keep: TaskPatch = serde_json::from_str(r#"{"title":"report v2"}"#).unwrap();
        keep.apply(&mut task).unwrap();
        assert_eq!(task.category.as_deref(), Some("work"));
        assert_eq!(task.description.as_deref(), Some("q1 numbers"));

        let clear: TaskPatch =
            serde_json::from_str(r#"{"category":null,"description":null}"#).unwrap();
        assert_eq!(clear.description, Some(None));
        clear.apply(&mut task).unwrap();
        assert_eq!(task.title, "report v2");
        assert_eq!(task.category, None);
        assert_eq!(task.description, None);

        let mut reminder = NewReminder {
            title: "call".to_string(),
            due_date: "2024-01-01T10:00:00".to_string(),
            description: Some("bring notes".to_string()),
            ..NewReminder::default()
        }
        .into_item()
        .unwrap();
        let clear: ReminderPatch = serde_json::from_str(r#"{"description":null}"#).unwrap();
        clear.apply(&mut reminder).unwrap();
        assert_eq!(reminder.description, None);
    }
}
