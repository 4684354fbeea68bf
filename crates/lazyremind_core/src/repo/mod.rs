//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the document-store, user-directory and job-ledger contracts.
//! - Isolate SQLite query details from services and the scheduler.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`UserNotFound`, `Conflict`) in
//!   addition to DB transport errors.
//! - Collections are written whole, guarded by an expected revision.

pub mod item_store;
pub mod job_ledger;
pub mod user_directory;
