//! Item store contract and SQLite document implementation.
//!
//! # Responsibility
//! - Load and replace one user's reminder/task collection as a whole document.
//! - Guard every replace with the revision observed at load time.
//!
//! # Invariants
//! - A missing user document is `Ok(None)`, never an error.
//! - A present user with no collection yet loads as empty at revision 0.
//! - `replace` only applies when the stored revision equals the expected one,
//!   and bumps it by exactly one.
//! - Item ids are unique within a stored collection.

use crate::db::DbError;
use crate::model::item::{ItemField, ItemId, RecurringItem, ReminderItem, TaskItem};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from item document persistence.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// Stored document body could not be decoded or encoded.
    Json {
        field: ItemField,
        message: String,
    },
    UserNotFound(String),
    ItemNotFound {
        user_id: String,
        item_id: ItemId,
    },
    DuplicateItemId(ItemId),
    /// The document changed since it was loaded.
    Conflict {
        user_id: String,
        field: ItemField,
        expected_revision: i64,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Json { field, message } => {
                write!(f, "invalid `{field}` document: {message}")
            }
            Self::UserNotFound(user_id) => write!(f, "user not found: {user_id}"),
            Self::ItemNotFound { user_id, item_id } => {
                write!(f, "item {item_id} not found for user {user_id}")
            }
            Self::DuplicateItemId(item_id) => write!(f, "duplicate item id: {item_id}"),
            Self::Conflict {
                user_id,
                field,
                expected_revision,
            } => write!(
                f,
                "`{field}` document for user {user_id} changed since revision {expected_revision}"
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Item type persisted under one field of the user document.
pub trait StoredItem: RecurringItem + Serialize + DeserializeOwned + Clone {
    const FIELD: ItemField;

    /// Sets the id on a freshly created item.
    fn assign_id(&mut self, id: ItemId);
}

impl StoredItem for ReminderItem {
    const FIELD: ItemField = ItemField::Reminders;

    fn assign_id(&mut self, id: ItemId) {
        self.id = id;
    }
}

impl StoredItem for TaskItem {
    const FIELD: ItemField = ItemField::Tasks;

    fn assign_id(&mut self, id: ItemId) {
        self.id = id;
    }
}

/// One loaded collection plus the revision it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemCollection<T> {
    pub revision: i64,
    pub items: Vec<T>,
}

impl<T: RecurringItem> ItemCollection<T> {
    pub fn position(&self, item_id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id() == item_id)
    }

    pub fn find(&self, item_id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.id() == item_id)
    }
}

/// Whole-document access to a user's item collections.
pub trait ItemStore {
    /// Loads the collection for `T::FIELD`. `None` when the user is unknown.
    fn load<T: StoredItem>(&self, user_id: &str) -> StoreResult<Option<ItemCollection<T>>>;

    /// Replaces the whole collection if it is still at `expected_revision`.
    ///
    /// Returns the new revision.
    fn replace<T: StoredItem>(
        &self,
        user_id: &str,
        items: &[T],
        expected_revision: i64,
    ) -> StoreResult<i64>;

    /// Appends `item` with a freshly assigned id, creating the user document
    /// when missing. Returns the stored item.
    fn create<T: StoredItem>(&self, user_id: &str, item: T) -> StoreResult<T>;
}

/// SQLite-backed document store: one JSON array per `(user_id, field)`.
pub struct SqliteItemStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteItemStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ItemStore for SqliteItemStore<'_> {
    fn load<T: StoredItem>(&self, user_id: &str) -> StoreResult<Option<ItemCollection<T>>> {
        load_collection(self.conn, user_id)
    }

    fn replace<T: StoredItem>(
        &self,
        user_id: &str,
        items: &[T],
        expected_revision: i64,
    ) -> StoreResult<i64> {
        if !user_exists(self.conn, user_id)? {
            return Err(StoreError::UserNotFound(user_id.to_string()));
        }
        replace_collection(self.conn, user_id, items, expected_revision)
    }

    fn create<T: StoredItem>(&self, user_id: &str, mut item: T) -> StoreResult<T> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO users (user_id) VALUES (?1)
             ON CONFLICT(user_id) DO NOTHING;",
            [user_id],
        )?;

        let mut collection = load_collection::<T>(&tx, user_id)?
            .ok_or_else(|| StoreError::UserNotFound(user_id.to_string()))?;
        item.assign_id(new_item_id());
        collection.items.push(item.clone());
        replace_collection(&tx, user_id, &collection.items, collection.revision)?;
        tx.commit()?;

        Ok(item)
    }
}

fn load_collection<T: StoredItem>(
    conn: &Connection,
    user_id: &str,
) -> StoreResult<Option<ItemCollection<T>>> {
    if !user_exists(conn, user_id)? {
        return Ok(None);
    }

    let row = conn
        .query_row(
            "SELECT body, revision FROM item_documents WHERE user_id = ?1 AND field = ?2;",
            params![user_id, T::FIELD.as_str()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()?;

    let Some((body, revision)) = row else {
        return Ok(Some(ItemCollection {
            revision: 0,
            items: Vec::new(),
        }));
    };

    let items = serde_json::from_str::<Vec<T>>(&body).map_err(|err| StoreError::Json {
        field: T::FIELD,
        message: err.to_string(),
    })?;
    Ok(Some(ItemCollection { revision, items }))
}

fn replace_collection<T: StoredItem>(
    conn: &Connection,
    user_id: &str,
    items: &[T],
    expected_revision: i64,
) -> StoreResult<i64> {
    ensure_unique_ids(items)?;
    let body = serde_json::to_string(items).map_err(|err| StoreError::Json {
        field: T::FIELD,
        message: err.to_string(),
    })?;

    let changed = conn.execute(
        "UPDATE item_documents
         SET
            body = ?3,
            revision = revision + 1,
            updated_at = (strftime('%s', 'now') * 1000)
         WHERE user_id = ?1
           AND field = ?2
           AND revision = ?4;",
        params![user_id, T::FIELD.as_str(), body, expected_revision],
    )?;
    if changed == 1 {
        return Ok(expected_revision + 1);
    }

    if expected_revision == 0 {
        let inserted = conn.execute(
            "INSERT INTO item_documents (user_id, field, body, revision)
             VALUES (?1, ?2, ?3, 1)
             ON CONFLICT(user_id, field) DO NOTHING;",
            params![user_id, T::FIELD.as_str(), body],
        )?;
        if inserted == 1 {
            return Ok(1);
        }
    }

    Err(StoreError::Conflict {
        user_id: user_id.to_string(),
        field: T::FIELD,
        expected_revision,
    })
}

fn user_exists(conn: &Connection, user_id: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE user_id = ?1);",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn ensure_unique_ids<T: RecurringItem>(items: &[T]) -> StoreResult<()> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.id()) {
            return Err(StoreError::DuplicateItemId(item.id().to_string()));
        }
    }
    Ok(())
}

fn new_item_id() -> ItemId {
    Uuid::new_v4().simple().to_string()
}
