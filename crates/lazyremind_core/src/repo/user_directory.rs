//! User enumeration and notification-address lookup.
//!
//! # Responsibility
//! - Page through every known user id in stable order.
//! - Resolve the owning user's email for scheduled notifications.
//!
//! # Invariants
//! - Pages are ordered by `user_id ASC`; the cursor is the last id returned.
//! - Stored emails always pass `is_valid_email`.

use crate::db::DbError;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)+$")
        .expect("valid email regex")
});

pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[derive(Debug)]
pub enum DirectoryError {
    Db(DbError),
    InvalidUserId(String),
    InvalidEmail(String),
}

impl Display for DirectoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidUserId(value) => write!(f, "invalid user id: `{value}`"),
            Self::InvalidEmail(value) => write!(f, "invalid email address: `{value}`"),
        }
    }
}

impl Error for DirectoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for DirectoryError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One page of user ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPage {
    pub user_ids: Vec<String>,
    /// Cursor for the following page; `None` on the last page.
    pub next: Option<String>,
}

/// Read/write access to user profiles relevant for notifications.
pub trait UserDirectory {
    /// Lists up to `limit` user ids strictly after `after`.
    fn list_user_ids(&self, after: Option<&str>, limit: u32) -> DirectoryResult<UserPage>;

    /// Returns the user's notification address, if one is on file.
    fn recipient_for(&self, user_id: &str) -> DirectoryResult<Option<String>>;

    /// Creates or updates a user's email.
    fn upsert_user(&self, user_id: &str, email: &str) -> DirectoryResult<()>;
}

/// Collects every user id by walking all pages.
pub fn list_all_user_ids<D: UserDirectory>(
    directory: &D,
    page_size: u32,
) -> DirectoryResult<Vec<String>> {
    let page_size = page_size.max(1);
    let mut all = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = directory.list_user_ids(cursor.as_deref(), page_size)?;
        all.extend(page.user_ids);
        match page.next {
            Some(next) => cursor = Some(next),
            None => return Ok(all),
        }
    }
}

/// Returns whether `value` looks like a deliverable email address.
pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

/// SQLite-backed user directory over the `users` table.
pub struct SqliteUserDirectory<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserDirectory<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl UserDirectory for SqliteUserDirectory<'_> {
    fn list_user_ids(&self, after: Option<&str>, limit: u32) -> DirectoryResult<UserPage> {
        let limit = limit.max(1);
        let mut stmt = self.conn.prepare(
            "SELECT user_id
             FROM users
             WHERE (?1 IS NULL OR user_id > ?1)
             ORDER BY user_id ASC
             LIMIT ?2;",
        )?;
        let user_ids = stmt
            .query_map(params![after, i64::from(limit)], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let next = if user_ids.len() == limit as usize {
            user_ids.last().cloned()
        } else {
            None
        };
        Ok(UserPage { user_ids, next })
    }

    fn recipient_for(&self, user_id: &str) -> DirectoryResult<Option<String>> {
        let email = self
            .conn
            .query_row(
                "SELECT email FROM users WHERE user_id = ?1;",
                [user_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();
        Ok(email.filter(|value| is_valid_email(value)))
    }

    fn upsert_user(&self, user_id: &str, email: &str) -> DirectoryResult<()> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(DirectoryError::InvalidUserId(user_id.to_string()));
        }
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(DirectoryError::InvalidEmail(email.to_string()));
        }

        self.conn.execute(
            "INSERT INTO users (user_id, email) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET
                email = excluded.email,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![user_id, email],
        )?;
        Ok(())
    }
}
