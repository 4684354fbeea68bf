//! Retention policy for delivered one-shot items.

use crate::model::due_date::DueDate;
use crate::model::item::{ItemId, RecurringItem};
use chrono::{DateTime, Utc};

/// Result of applying the retention policy to one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiryBatch<T> {
    /// Items that stay, in input order.
    pub kept: Vec<T>,
    /// Ids removed by the policy.
    pub expired: Vec<ItemId>,
}

/// Drops non-recurring, already-sent items whose due date is older than
/// `threshold`. Unparseable dates are kept.
pub fn expire_items<T: RecurringItem>(items: Vec<T>, threshold: DateTime<Utc>) -> ExpiryBatch<T> {
    let mut kept = Vec::with_capacity(items.len());
    let mut expired = Vec::new();

    for item in items {
        if is_expired(&item, threshold) {
            expired.push(item.id().to_string());
        } else {
            kept.push(item);
        }
    }

    ExpiryBatch { kept, expired }
}

fn is_expired<T: RecurringItem>(item: &T, threshold: DateTime<Utc>) -> bool {
    if item.is_recurring() || !item.is_sent() {
        return false;
    }
    match DueDate::parse(item.due_date()) {
        Ok(due) => due.to_utc() < threshold,
        Err(_) => false,
    }
}
