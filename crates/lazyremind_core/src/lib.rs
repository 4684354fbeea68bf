//! Core domain logic for LazyRemind.
//! Reminder/task storage, the recurrence engine and the polling scheduler.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod recurrence;
pub mod repo;
pub mod scheduler;
pub mod service;

pub use config::{Config, ConfigError, MailerConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status, LogSink};
pub use model::due_date::{DueDate, NaiveShape};
pub use model::item::{
    ItemError, ItemField, ItemId, NewReminder, NewTask, Priority, RecurrenceInterval,
    RecurringItem, ReminderItem, ReminderPatch, TaskItem, TaskPatch, TaskStatus,
};
pub use notify::mailersend::{MailerSendSender, SenderIdentity};
pub use notify::message::EmailMessage;
pub use notify::sender::{LogOnlySender, NotificationSender, TransportError};
pub use recurrence::engine::{due_check, next_occurrence, rollover_items, DueState};
pub use recurrence::retention::expire_items;
pub use repo::item_store::{ItemCollection, ItemStore, SqliteItemStore, StoreError, StoreResult};
pub use repo::job_ledger::{JobLedger, SqliteJobLedger};
pub use repo::user_directory::{DirectoryError, SqliteUserDirectory, UserDirectory, UserPage};
pub use scheduler::report::{JobReport, PollError};
pub use scheduler::runner::Scheduler;
pub use scheduler::schedule::{DailyAt, JobKind, Schedule, SchedulerSettings};
pub use service::item_service::{ItemService, ItemServiceError, ItemServiceResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
