//! Recurrence rollover and due-check state transitions.
//!
//! # Responsibility
//! - Decide per item whether a notification is due.
//! - Roll sent recurring items forward to their next occurrence.
//!
//! # Invariants
//! - Only `recurring && sent` items with a known interval are advanced.
//! - Advancing always resets `sent` to `false`; nothing else changes.
//! - Batch output keeps every input item exactly once, in input order.
//! - A malformed date fails its own item only.

use crate::model::due_date::DueDate;
use crate::model::item::{ItemError, ItemId, RecurrenceInterval, RecurringItem, TaskItem};
use chrono::{DateTime, Utc};

/// Result of rolling one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloverOutcome {
    /// `due_date` moved and `sent` was reset.
    Advanced { from: String, to: String },
    /// Item did not match the advance predicate.
    Unchanged,
}

/// Due-check verdict for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueState {
    /// `due_date <= now` and not yet sent.
    Due,
    /// `due_date` is still in the future.
    NotDue,
    /// Notification already dispatched for this occurrence.
    AlreadySent,
}

/// Output of a whole-collection rollover.
#[derive(Debug, Clone, PartialEq)]
pub struct RolloverBatch<T> {
    /// Replacement collection, same length and order as the input.
    pub items: Vec<T>,
    /// Ids of items whose due date was advanced.
    pub advanced: Vec<ItemId>,
    /// Items left as-is because their date could not be advanced.
    pub failures: Vec<(ItemId, ItemError)>,
}

impl<T> RolloverBatch<T> {
    pub fn is_noop(&self) -> bool {
        self.advanced.is_empty()
    }
}

/// Computes the next occurrence of `due` for `interval`.
///
/// Returns `Ok(None)` for `None`/unrecognized intervals.
pub fn next_occurrence(
    due: &DueDate,
    interval: &RecurrenceInterval,
) -> Result<Option<DueDate>, ItemError> {
    let Some(days) = interval.step_days() else {
        return Ok(None);
    };
    due.checked_add_days(days)
        .map(Some)
        .ok_or_else(|| ItemError::DateOverflow(due.to_iso_string()))
}

/// Rolls one item forward in place when it is recurring and already sent.
///
/// # Errors
/// - `ItemError::MalformedDate` / `ItemError::DateOverflow`; the item is not
///   modified in either case.
pub fn rollover_item<T: RecurringItem>(item: &mut T) -> Result<RolloverOutcome, ItemError> {
    if !item.is_recurring() || !item.is_sent() {
        return Ok(RolloverOutcome::Unchanged);
    }
    if item.recurrence_interval().step_days().is_none() {
        return Ok(RolloverOutcome::Unchanged);
    }

    let due = DueDate::parse(item.due_date())?;
    let Some(next) = next_occurrence(&due, item.recurrence_interval())? else {
        return Ok(RolloverOutcome::Unchanged);
    };

    let from = item.due_date().to_string();
    let to = next.to_iso_string();
    item.set_due_date(to.clone());
    item.set_sent(false);
    Ok(RolloverOutcome::Advanced { from, to })
}

/// Rolls every eligible item of one user's collection.
///
/// Running this twice without marking anything sent in between is a no-op
/// the second time.
pub fn rollover_items<T: RecurringItem>(items: Vec<T>) -> RolloverBatch<T> {
    let mut advanced = Vec::new();
    let mut failures = Vec::new();
    let mut rolled = Vec::with_capacity(items.len());

    for mut item in items {
        match rollover_item(&mut item) {
            Ok(RolloverOutcome::Advanced { .. }) => advanced.push(item.id().to_string()),
            Ok(RolloverOutcome::Unchanged) => {}
            Err(err) => failures.push((item.id().to_string(), err)),
        }
        rolled.push(item);
    }

    RolloverBatch {
        items: rolled,
        advanced,
        failures,
    }
}

/// Decides whether `item` should be notified at `now`.
///
/// Sent items are never due, whatever their date.
pub fn due_check<T: RecurringItem>(item: &T, now: DateTime<Utc>) -> Result<DueState, ItemError> {
    if item.is_sent() {
        return Ok(DueState::AlreadySent);
    }
    let due = DueDate::parse(item.due_date())?;
    if due.is_at_or_before(now) {
        Ok(DueState::Due)
    } else {
        Ok(DueState::NotDue)
    }
}

/// Returns whether an incomplete task is strictly past its due date.
///
/// Independent of `sent`: overdue digests repeat daily until completion.
pub fn is_overdue(task: &TaskItem, now: DateTime<Utc>) -> Result<bool, ItemError> {
    if task.is_completed() {
        return Ok(false);
    }
    let due = DueDate::parse(&task.due_date)?;
    Ok(due.to_utc() < now)
}
