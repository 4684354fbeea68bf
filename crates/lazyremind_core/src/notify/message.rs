//! Email message shape and notification templates.

use crate::model::item::{Priority, ReminderItem, TaskItem};

const NO_DESCRIPTION: &str = "No description provided.";

/// One outgoing email.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    /// Plain-text body.
    pub text: String,
    pub html: Option<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
}

impl EmailMessage {
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Notice for a reminder whose due date has been reached.
pub fn reminder_due(recipient: &str, reminder: &ReminderItem) -> EmailMessage {
    EmailMessage::new(
        recipient,
        format!("Reminder: {}", reminder.title),
        format!(
            "Your reminder '{}' is due on {}.",
            reminder.title, reminder.due_date
        ),
    )
}

/// Notice for a task whose due date has been reached.
pub fn task_due(recipient: &str, task: &TaskItem) -> EmailMessage {
    EmailMessage::new(
        recipient,
        format!("Task due: {}", task.title),
        format!("Your task '{}' is due on {}.", task.title, task.due_date),
    )
}

/// Daily digest entry for an incomplete task past its due date.
pub fn task_overdue(recipient: &str, task: &TaskItem) -> EmailMessage {
    let description = task
        .description
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(NO_DESCRIPTION);

    EmailMessage::new(
        recipient,
        format!("Overdue Task: {}", task.title),
        format!(
            "Your task '{}' was due on {}.\n\n\
             Description: {}\n\
             Priority: {}\n\n\
             Please complete it as soon as possible.",
            task.title,
            task.due_date,
            description,
            priority_label(&task.priority)
        ),
    )
}

/// Items the due-check job can notify about.
pub trait DueNotice {
    /// Whether the item still wants a due notice at all.
    fn awaits_due_notice(&self) -> bool {
        true
    }

    fn due_notice(&self, recipient: &str) -> EmailMessage;
}

impl DueNotice for ReminderItem {
    fn due_notice(&self, recipient: &str) -> EmailMessage {
        reminder_due(recipient, self)
    }
}

impl DueNotice for TaskItem {
    fn awaits_due_notice(&self) -> bool {
        !self.is_completed()
    }

    fn due_notice(&self, recipient: &str) -> EmailMessage {
        task_due(recipient, self)
    }
}

fn priority_label(priority: &Priority) -> &str {
    match priority {
        Priority::Low => "Low",
        Priority::Medium => "Medium",
        Priority::High => "High",
        Priority::Unrecognized(value) => value,
    }
}
