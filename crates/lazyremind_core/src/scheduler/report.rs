//! Per-user failure kinds and per-run counters.

use crate::notify::sender::TransportError;
use crate::repo::item_store::StoreError;
use crate::repo::user_directory::DirectoryError;
use crate::scheduler::schedule::JobKind;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Why one user's pass of a job stopped early.
#[derive(Debug)]
pub enum PollError {
    /// The user has no document; counted as skipped, not failed.
    NotFound,
    /// Delivery failed; remaining items for this user wait for the next run.
    Transport(TransportError),
    /// Load or replace failed, including revision conflicts.
    Persistence(StoreError),
    /// No valid notification address on file for the user.
    RecipientUnavailable(String),
    Directory(DirectoryError),
}

impl PollError {
    /// Short tag for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Transport(_) => "transport",
            Self::Persistence(_) => "persistence",
            Self::RecipientUnavailable(_) => "recipient_unavailable",
            Self::Directory(_) => "directory",
        }
    }
}

impl Display for PollError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "user document not found"),
            Self::Transport(err) => write!(f, "{err}"),
            Self::Persistence(err) => write!(f, "{err}"),
            Self::RecipientUnavailable(user_id) => {
                write!(f, "no notification address for user {user_id}")
            }
            Self::Directory(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PollError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            Self::Persistence(err) => Some(err),
            Self::Directory(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransportError> for PollError {
    fn from(value: TransportError) -> Self {
        Self::Transport(value)
    }
}

impl From<StoreError> for PollError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::UserNotFound(_) => Self::NotFound,
            other => Self::Persistence(other),
        }
    }
}

impl From<DirectoryError> for PollError {
    fn from(value: DirectoryError) -> Self {
        Self::Directory(value)
    }
}

/// Counters for one execution of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub job: JobKind,
    pub users_processed: usize,
    /// Users listed by the directory but with no document.
    pub users_skipped: usize,
    pub notifications_sent: usize,
    pub items_advanced: usize,
    pub items_expired: usize,
    pub malformed_dates: usize,
    pub transport_errors: usize,
    pub persistence_errors: usize,
    pub recipient_missing: usize,
    pub directory_errors: usize,
}

impl JobReport {
    pub fn new(job: JobKind) -> Self {
        Self {
            job,
            users_processed: 0,
            users_skipped: 0,
            notifications_sent: 0,
            items_advanced: 0,
            items_expired: 0,
            malformed_dates: 0,
            transport_errors: 0,
            persistence_errors: 0,
            recipient_missing: 0,
            directory_errors: 0,
        }
    }

    /// Counts one user-level failure.
    pub fn record(&mut self, err: &PollError) {
        match err {
            PollError::NotFound => self.users_skipped += 1,
            PollError::Transport(_) => self.transport_errors += 1,
            PollError::Persistence(_) => self.persistence_errors += 1,
            PollError::RecipientUnavailable(_) => self.recipient_missing += 1,
            PollError::Directory(_) => self.directory_errors += 1,
        }
    }

    /// Number of failures of any kind, excluding skipped users.
    pub fn error_count(&self) -> usize {
        self.malformed_dates
            + self.transport_errors
            + self.persistence_errors
            + self.recipient_missing
            + self.directory_errors
    }
}
