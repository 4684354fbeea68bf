//! Outgoing notifications.
//!
//! # Responsibility
//! - Define the single-recipient sender contract used by the scheduler.
//! - Provide the MailerSend transport and a log-only dry-run sender.
//! - Render reminder/task notification text.

pub mod mailersend;
pub mod message;
pub mod sender;
