//! Persisted last-run instants for scheduler jobs.

use crate::db::DbResult;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

/// Records when each scheduler job last completed a pass.
pub trait JobLedger {
    fn last_run(&self, job: &str) -> DbResult<Option<DateTime<Utc>>>;
    fn record_run(&self, job: &str, at: DateTime<Utc>) -> DbResult<()>;
}

/// SQLite-backed ledger over the `job_runs` table.
pub struct SqliteJobLedger<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteJobLedger<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl JobLedger for SqliteJobLedger<'_> {
    fn last_run(&self, job: &str) -> DbResult<Option<DateTime<Utc>>> {
        let millis = self
            .conn
            .query_row(
                "SELECT last_run_at FROM job_runs WHERE job = ?1;",
                [job],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(millis.and_then(DateTime::<Utc>::from_timestamp_millis))
    }

    fn record_run(&self, job: &str, at: DateTime<Utc>) -> DbResult<()> {
        self.conn.execute(
            "INSERT INTO job_runs (job, last_run_at) VALUES (?1, ?2)
             ON CONFLICT(job) DO UPDATE SET last_run_at = excluded.last_run_at;",
            params![job, at.timestamp_millis()],
        )?;
        Ok(())
    }
}
