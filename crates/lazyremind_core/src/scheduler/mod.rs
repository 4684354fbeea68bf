//! Polling scheduler for due notices, rollover, retention and overdue digests.
//!
//! # Responsibility
//! - Own the job table and the cooperative tick loop.
//! - Report per-job counters instead of failing whole runs.

pub mod report;
pub mod runner;
pub mod schedule;
