//! Recurrence engine: pure per-item state transitions.
//!
//! # Responsibility
//! - Compute next occurrences and due/sent transitions without I/O.
//! - Apply the retention policy for delivered one-shot items.
//!
//! # State machine
//! - Recurring: `PENDING(sent=false) --due--> NOTIFIED(sent=true)
//!   --rollover--> PENDING(sent=false, due_date=next)`.
//! - One-shot: `PENDING --due--> NOTIFIED` (terminal).

pub mod engine;
pub mod retention;
