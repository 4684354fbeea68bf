//! Polling scheduler: decides which jobs fire and runs them user by user.
//!
//! # Responsibility
//! - Fire interval and daily jobs from one cooperative loop.
//! - Apply the recurrence engine and notification sender to every user.
//! - Persist job last-run instants so restarts do not re-fire daily jobs.
//!
//! # Invariants
//! - One user's failure never stops the pass over later users.
//! - An item is marked sent before its notice goes out; a failed send is
//!   compensated by unmarking, so a notice can be missed but never duplicated.
//! - Every collection write is guarded by the revision it was loaded at.

use crate::model::item::{ReminderItem, TaskItem};
use crate::notify::message::{task_overdue, DueNotice};
use crate::notify::sender::NotificationSender;
use crate::recurrence::engine::{due_check, is_overdue, rollover_items, DueState};
use crate::recurrence::retention::expire_items;
use crate::repo::item_store::{ItemStore, StoredItem};
use crate::repo::job_ledger::JobLedger;
use crate::repo::user_directory::{list_all_user_ids, UserDirectory};
use crate::scheduler::report::{JobReport, PollError};
use crate::scheduler::schedule::{JobKind, ScheduledJob, SchedulerSettings};
use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::thread;

const TICK_SLEEP: std::time::Duration = std::time::Duration::from_secs(1);

/// Single-threaded job driver over injected collaborators.
pub struct Scheduler<S, D, N, L> {
    store: S,
    directory: D,
    sender: N,
    ledger: L,
    settings: SchedulerSettings,
    jobs: Vec<ScheduledJob>,
    last_runs: HashMap<JobKind, DateTime<Utc>>,
}

impl<S, D, N, L> Scheduler<S, D, N, L>
where
    S: ItemStore,
    D: UserDirectory,
    N: NotificationSender,
    L: JobLedger,
{
    pub fn new(store: S, directory: D, sender: N, ledger: L, settings: SchedulerSettings) -> Self {
        Self {
            store,
            directory,
            sender,
            ledger,
            jobs: settings.jobs(),
            settings,
            last_runs: HashMap::new(),
        }
    }

    pub fn jobs(&self) -> &[ScheduledJob] {
        &self.jobs
    }

    /// Runs every job whose schedule is due at `now` and records its run.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<JobReport> {
        let mut reports = Vec::new();
        for job in self.jobs.clone() {
            let Some(last_run) = self.last_run(job.kind) else {
                continue;
            };
            if !job.schedule.is_due(last_run, now) {
                continue;
            }
            reports.push(self.run_job(job.kind, now));
            self.mark_ran(job.kind, now);
        }
        reports
    }

    /// Runs every job once at `now`, ignoring schedules, and records the runs.
    pub fn run_all(&mut self, now: DateTime<Utc>) -> Vec<JobReport> {
        JobKind::ALL
            .into_iter()
            .map(|kind| {
                let report = self.run_job(kind, now);
                self.mark_ran(kind, now);
                report
            })
            .collect()
    }

    /// Process loop: tick, sleep one second, repeat until `stop` says so.
    pub fn run_until(&mut self, mut stop: impl FnMut() -> bool) {
        info!(
            "event=scheduler_run module=scheduler status=start jobs={}",
            self.jobs.len()
        );
        while !stop() {
            self.tick(Utc::now());
            thread::sleep(TICK_SLEEP);
        }
        info!("event=scheduler_run module=scheduler status=ok");
    }

    /// One full pass of `kind` over every known user.
    pub fn run_job(&self, kind: JobKind, now: DateTime<Utc>) -> JobReport {
        let mut report = JobReport::new(kind);
        let user_ids = match list_all_user_ids(&self.directory, self.settings.user_page_size) {
            Ok(user_ids) => user_ids,
            Err(err) => {
                report.directory_errors += 1;
                error!(
                    "event=job_run module=scheduler status=error job={} error_kind=directory error={}",
                    kind, err
                );
                return report;
            }
        };

        for user_id in &user_ids {
            let result = match kind {
                JobKind::DueReminders => {
                    self.notify_due::<ReminderItem>(user_id, now, &mut report)
                }
                JobKind::DueTasks => self.notify_due::<TaskItem>(user_id, now, &mut report),
                JobKind::RolloverReminders => {
                    self.rollover::<ReminderItem>(user_id, &mut report)
                }
                JobKind::RolloverTasks => self.rollover::<TaskItem>(user_id, &mut report),
                JobKind::ExpireReminders => self.expire(user_id, now, &mut report),
                JobKind::OverdueTasks => self.notify_overdue(user_id, now, &mut report),
            };

            match result {
                Ok(()) => report.users_processed += 1,
                Err(PollError::NotFound) => {
                    report.record(&PollError::NotFound);
                    debug!(
                        "event=poll_user module=scheduler status=skip job={} user_id={}",
                        kind, user_id
                    );
                }
                Err(err) => {
                    report.record(&err);
                    error!(
                        "event=poll_user module=scheduler status=error job={} user_id={} error_kind={} error={}",
                        kind,
                        user_id,
                        err.kind(),
                        err
                    );
                }
            }
        }

        let status = if report.error_count() == 0 { "ok" } else { "error" };
        info!(
            "event=job_run module=scheduler status={} job={} users={} skipped={} sent={} advanced={} expired={} errors={}",
            status,
            kind,
            user_ids.len(),
            report.users_skipped,
            report.notifications_sent,
            report.items_advanced,
            report.items_expired,
            report.error_count()
        );
        report
    }

    /// Effective last run, or `None` to skip the job this tick.
    ///
    /// The in-memory instant wins when it is newer so a failing ledger write
    /// cannot make a daily job fire every tick.
    fn last_run(&self, kind: JobKind) -> Option<Option<DateTime<Utc>>> {
        let remembered = self.last_runs.get(&kind).copied();
        match self.ledger.last_run(kind.as_str()) {
            Ok(stored) => Some(stored.max(remembered)),
            Err(err) => {
                error!(
                    "event=job_ledger_read module=scheduler status=error job={} error={}",
                    kind, err
                );
                remembered.map(Some)
            }
        }
    }

    fn mark_ran(&mut self, kind: JobKind, now: DateTime<Utc>) {
        self.last_runs.insert(kind, now);
        if let Err(err) = self.ledger.record_run(kind.as_str(), now) {
            error!(
                "event=job_ledger_write module=scheduler status=error job={} error={}",
                kind, err
            );
        }
    }

    fn notify_due<T: StoredItem + DueNotice>(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        report: &mut JobReport,
    ) -> Result<(), PollError> {
        let mut collection = self
            .store
            .load::<T>(user_id)?
            .ok_or(PollError::NotFound)?;

        let mut due_ids = Vec::new();
        for item in collection.items.iter().filter(|item| item.awaits_due_notice()) {
            match due_check(item, now) {
                Ok(DueState::Due) => due_ids.push(item.id().to_string()),
                Ok(DueState::NotDue | DueState::AlreadySent) => {}
                Err(err) => {
                    report.malformed_dates += 1;
                    warn!(
                        "event=due_check module=scheduler status=error field={} user_id={} item_id={} error={}",
                        T::FIELD,
                        user_id,
                        item.id(),
                        err
                    );
                }
            }
        }
        if due_ids.is_empty() {
            return Ok(());
        }

        let recipient = self
            .directory
            .recipient_for(user_id)?
            .ok_or_else(|| PollError::RecipientUnavailable(user_id.to_string()))?;

        for item_id in due_ids {
            let Some(index) = collection.position(&item_id) else {
                continue;
            };

            collection.items[index].set_sent(true);
            collection.revision =
                self.store
                    .replace(user_id, &collection.items, collection.revision)?;

            let message = collection.items[index].due_notice(&recipient);
            if let Err(send_err) = self.sender.send(&message) {
                collection.items[index].set_sent(false);
                if let Err(unmark_err) =
                    self.store
                        .replace(user_id, &collection.items, collection.revision)
                {
                    error!(
                        "event=notify_unmark module=scheduler status=error field={} user_id={} item_id={} send_error={} error={}",
                        T::FIELD,
                        user_id,
                        item_id,
                        send_err,
                        unmark_err
                    );
                    return Err(PollError::Persistence(unmark_err));
                }
                return Err(PollError::Transport(send_err));
            }

            report.notifications_sent += 1;
            info!(
                "event=notify_due module=scheduler status=ok field={} user_id={} item_id={}",
                T::FIELD,
                user_id,
                item_id
            );
        }
        Ok(())
    }

    fn rollover<T: StoredItem>(&self, user_id: &str, report: &mut JobReport) -> Result<(), PollError> {
        let collection = self
            .store
            .load::<T>(user_id)?
            .ok_or(PollError::NotFound)?;

        let batch = rollover_items(collection.items);
        for (item_id, err) in &batch.failures {
            report.malformed_dates += 1;
            warn!(
                "event=rollover module=scheduler status=error field={} user_id={} item_id={} error={}",
                T::FIELD,
                user_id,
                item_id,
                err
            );
        }
        if batch.is_noop() {
            return Ok(());
        }

        self.store
            .replace(user_id, &batch.items, collection.revision)?;
        report.items_advanced += batch.advanced.len();
        info!(
            "event=rollover module=scheduler status=ok field={} user_id={} advanced={}",
            T::FIELD,
            user_id,
            batch.advanced.len()
        );
        Ok(())
    }

    fn expire(&self, user_id: &str, now: DateTime<Utc>, report: &mut JobReport) -> Result<(), PollError> {
        let collection = self
            .store
            .load::<ReminderItem>(user_id)?
            .ok_or(PollError::NotFound)?;

        let threshold = Duration::try_days(self.settings.expiry_days)
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let batch = expire_items(collection.items, threshold);
        if batch.expired.is_empty() {
            return Ok(());
        }

        self.store
            .replace(user_id, &batch.kept, collection.revision)?;
        report.items_expired += batch.expired.len();
        info!(
            "event=expire module=scheduler status=ok user_id={} expired={}",
            user_id,
            batch.expired.len()
        );
        Ok(())
    }

    fn notify_overdue(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        report: &mut JobReport,
    ) -> Result<(), PollError> {
        let collection = self
            .store
            .load::<TaskItem>(user_id)?
            .ok_or(PollError::NotFound)?;

        let mut overdue = Vec::new();
        for task in &collection.items {
            match is_overdue(task, now) {
                Ok(true) => overdue.push(task),
                Ok(false) => {}
                Err(err) => {
                    report.malformed_dates += 1;
                    warn!(
                        "event=overdue_check module=scheduler status=error user_id={} item_id={} error={}",
                        user_id, task.id, err
                    );
                }
            }
        }
        if overdue.is_empty() {
            return Ok(());
        }

        let recipient = self
            .directory
            .recipient_for(user_id)?
            .ok_or_else(|| PollError::RecipientUnavailable(user_id.to_string()))?;

        for task in overdue {
            self.sender.send(&task_overdue(&recipient, task))?;
            report.notifications_sent += 1;
            info!(
                "event=notify_overdue module=scheduler status=ok user_id={} item_id={}",
                user_id, task.id
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Scheduler;
    use crate::db::open_db_in_memory;
    use crate::model::item::{NewReminder, RecurrenceInterval, ReminderItem};
    use crate::notify::message::EmailMessage;
    use crate::notify::sender::{NotificationSender, TransportError};
    use crate::repo::item_store::{ItemStore, SqliteItemStore};
    use crate::repo::job_ledger::SqliteJobLedger;
    use crate::repo::user_directory::{SqliteUserDirectory, UserDirectory};
    use crate::scheduler::schedule::{JobKind, SchedulerSettings};
    use chrono::{TimeZone, Utc};
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingSender {
        sent: RefCell<Vec<EmailMessage>>,
    }

    impl NotificationSender for RecordingSender {
        fn send(&self, message: &EmailMessage) -> Result<(), TransportError> {
            self.sent.borrow_mut().push(message.clone());
            Ok(())
        }
    }

    #[test]
    fn due_reminder_is_sent_once_and_marked() {
        let conn = open_db_in_memory().unwrap();
        let directory = SqliteUserDirectory::new(&conn);
        directory.upsert_user("u1", "ada@example.com").unwrap();
        let store = SqliteItemStore::new(&conn);
        store
            .create(
                "u1",
                NewReminder {
                    title: "Standup".to_string(),
                    due_date: "2024-01-01T09:00:00".to_string(),
                    recurring: true,
                    recurrence_interval: RecurrenceInterval::Daily,
                    ..NewReminder::default()
                }
                .into_item()
                .unwrap(),
            )
            .unwrap();

        let sender = RecordingSender::default();
        let scheduler = Scheduler::new(
            SqliteItemStore::new(&conn),
            SqliteUserDirectory::new(&conn),
            &sender,
            SqliteJobLedger::new(&conn),
            SchedulerSettings::default(),
        );
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 30).unwrap();

        let first = scheduler.run_job(JobKind::DueReminders, now);
        let second = scheduler.run_job(JobKind::DueReminders, now);

        assert_eq!(first.notifications_sent, 1);
        assert_eq!(second.notifications_sent, 0);
        assert_eq!(sender.sent.borrow().len(), 1);
        assert_eq!(sender.sent.borrow()[0].to, "ada@example.com");

        let stored = store.load::<ReminderItem>("u1").unwrap().unwrap();
        assert!(stored.items[0].sent);
    }
}
