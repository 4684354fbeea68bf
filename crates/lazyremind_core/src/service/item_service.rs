//! Reminder/task use-case service.
//!
//! # Responsibility
//! - Provide add/list/get/update/search entry points keyed by user id.
//! - Validate drafts and patches before anything reaches the store.
//!
//! # Invariants
//! - Updates are read-modify-write guarded by the loaded revision.
//! - Service layer remains storage-agnostic.

use crate::model::item::{
    ItemError, NewReminder, NewTask, ReminderItem, ReminderPatch, TaskItem, TaskPatch,
};
use crate::recurrence::engine::is_overdue;
use crate::repo::item_store::{ItemStore, StoreError, StoredItem};
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for reminder/task use-cases.
#[derive(Debug)]
pub enum ItemServiceError {
    /// Draft or patch failed validation.
    Invalid(ItemError),
    /// No document exists for this user.
    UserNotFound(String),
    /// No item with this id in the user's collection.
    ItemNotFound { user_id: String, item_id: String },
    /// Persistence-layer failure, including revision conflicts.
    Store(StoreError),
}

impl Display for ItemServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(err) => write!(f, "{err}"),
            Self::UserNotFound(user_id) => write!(f, "user not found: {user_id}"),
            Self::ItemNotFound { user_id, item_id } => {
                write!(f, "item {item_id} not found for user {user_id}")
            }
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ItemServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ItemError> for ItemServiceError {
    fn from(value: ItemError) -> Self {
        Self::Invalid(value)
    }
}

impl From<StoreError> for ItemServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::UserNotFound(user_id) => Self::UserNotFound(user_id),
            StoreError::ItemNotFound { user_id, item_id } => {
                Self::ItemNotFound { user_id, item_id }
            }
            other => Self::Store(other),
        }
    }
}

pub type ItemServiceResult<T> = Result<T, ItemServiceError>;

/// Use-case facade over an item store implementation.
pub struct ItemService<S: ItemStore> {
    store: S,
}

impl<S: ItemStore> ItemService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates a reminder with a fresh id and `sent = false`.
    pub fn add_reminder(&self, user_id: &str, draft: NewReminder) -> ItemServiceResult<ReminderItem> {
        let reminder = self.store.create(user_id, draft.into_item()?)?;
        info!(
            "event=item_add module=service status=ok field=reminders user_id={} item_id={}",
            user_id, reminder.id
        );
        Ok(reminder)
    }

    /// Creates a task with a fresh id, `status = pending`, `sent = false`.
    pub fn add_task(&self, user_id: &str, draft: NewTask) -> ItemServiceResult<TaskItem> {
        let task = self.store.create(user_id, draft.into_item()?)?;
        info!(
            "event=item_add module=service status=ok field=tasks user_id={} item_id={}",
            user_id, task.id
        );
        Ok(task)
    }

    pub fn list_reminders(&self, user_id: &str) -> ItemServiceResult<Vec<ReminderItem>> {
        self.list(user_id)
    }

    pub fn list_tasks(&self, user_id: &str) -> ItemServiceResult<Vec<TaskItem>> {
        self.list(user_id)
    }

    pub fn get_reminder(&self, user_id: &str, item_id: &str) -> ItemServiceResult<ReminderItem> {
        self.get(user_id, item_id)
    }

    pub fn get_task(&self, user_id: &str, item_id: &str) -> ItemServiceResult<TaskItem> {
        self.get(user_id, item_id)
    }

    /// Applies a partial update to one reminder and returns the stored result.
    pub fn update_reminder(
        &self,
        user_id: &str,
        item_id: &str,
        patch: &ReminderPatch,
    ) -> ItemServiceResult<ReminderItem> {
        self.update_with(user_id, item_id, |item: &mut ReminderItem| patch.apply(item))
    }

    /// Applies a partial update to one task and returns the stored result.
    pub fn update_task(
        &self,
        user_id: &str,
        item_id: &str,
        patch: &TaskPatch,
    ) -> ItemServiceResult<TaskItem> {
        self.update_with(user_id, item_id, |item: &mut TaskItem| patch.apply(item))
    }

    /// Case-insensitive substring search over title, description and category.
    pub fn search_tasks(&self, user_id: &str, query: &str) -> ItemServiceResult<Vec<TaskItem>> {
        let needle = query.trim().to_lowercase();
        let tasks = self.list_tasks(user_id)?;
        Ok(tasks
            .into_iter()
            .filter(|task| task_matches(task, needle.as_str()))
            .collect())
    }

    /// Incomplete tasks strictly past due at `now`. Malformed dates are skipped.
    pub fn overdue_tasks(&self, user_id: &str, now: DateTime<Utc>) -> ItemServiceResult<Vec<TaskItem>> {
        let tasks = self.list_tasks(user_id)?;
        Ok(tasks
            .into_iter()
            .filter(|task| match is_overdue(task, now) {
                Ok(overdue) => overdue,
                Err(err) => {
                    warn!(
                        "event=overdue_check module=service status=skip user_id={} item_id={} error={}",
                        user_id, task.id, err
                    );
                    false
                }
            })
            .collect())
    }

    fn list<T: StoredItem>(&self, user_id: &str) -> ItemServiceResult<Vec<T>> {
        let collection = self
            .store
            .load::<T>(user_id)?
            .ok_or_else(|| ItemServiceError::UserNotFound(user_id.to_string()))?;
        Ok(collection.items)
    }

    fn get<T: StoredItem>(&self, user_id: &str, item_id: &str) -> ItemServiceResult<T> {
        self.list::<T>(user_id)?
            .into_iter()
            .find(|item| item.id() == item_id)
            .ok_or_else(|| ItemServiceError::ItemNotFound {
                user_id: user_id.to_string(),
                item_id: item_id.to_string(),
            })
    }

    fn update_with<T: StoredItem>(
        &self,
        user_id: &str,
        item_id: &str,
        apply: impl FnOnce(&mut T) -> Result<(), ItemError>,
    ) -> ItemServiceResult<T> {
        let mut collection = self
            .store
            .load::<T>(user_id)?
            .ok_or_else(|| ItemServiceError::UserNotFound(user_id.to_string()))?;
        let index = collection
            .position(item_id)
            .ok_or_else(|| ItemServiceError::ItemNotFound {
                user_id: user_id.to_string(),
                item_id: item_id.to_string(),
            })?;

        apply(&mut collection.items[index])?;
        let updated = collection.items[index].clone();
        self.store
            .replace(user_id, &collection.items, collection.revision)?;

        info!(
            "event=item_update module=service status=ok field={} user_id={} item_id={}",
            T::FIELD,
            user_id,
            item_id
        );
        Ok(updated)
    }
}

fn task_matches(task: &TaskItem, needle: &str) -> bool {
    let haystacks = [
        Some(task.title.as_str()),
        task.description.as_deref(),
        task.category.as_deref(),
    ];
    haystacks
        .into_iter()
        .flatten()
        .any(|value| value.to_lowercase().contains(needle))
}
