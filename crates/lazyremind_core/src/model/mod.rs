//! Reminder/task domain model.
//!
//! # Responsibility
//! - Define the stored item shapes shared by store, engine, and scheduler.
//! - Parse and re-serialize ISO-8601 due dates.
//!
//! # Invariants
//! - Every item is identified by an id unique within its user collection.
//! - Items are never physically deleted by rollover.

pub mod due_date;
pub mod item;
