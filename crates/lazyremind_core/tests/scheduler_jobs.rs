use chrono::{DateTime, Duration, TimeZone, Utc};
use lazyremind_core::db::open_db_in_memory;
use lazyremind_core::repo::item_store::{
    ItemCollection, ItemStore, SqliteItemStore, StoreError, StoreResult, StoredItem,
};
use lazyremind_core::repo::job_ledger::SqliteJobLedger;
use lazyremind_core::repo::user_directory::{
    DirectoryResult, SqliteUserDirectory, UserDirectory, UserPage,
};
use lazyremind_core::{
    EmailMessage, JobKind, NewReminder, NewTask, NotificationSender, RecurrenceInterval,
    ReminderItem, Scheduler, SchedulerSettings, TaskItem, TransportError,
};
use rusqlite::Connection;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

#[derive(Default)]
struct RecordingSender {
    sent: RefCell<Vec<EmailMessage>>,
    failing_recipients: RefCell<Vec<String>>,
}

impl RecordingSender {
    fn fail_for(&self, recipient: &str) {
        self.failing_recipients
            .borrow_mut()
            .push(recipient.to_string());
    }

    fn heal(&self) {
        self.failing_recipients.borrow_mut().clear();
    }

    fn recipients(&self) -> Vec<String> {
        self.sent
            .borrow()
            .iter()
            .map(|message| message.to.clone())
            .collect()
    }
}

impl NotificationSender for RecordingSender {
    fn send(&self, message: &EmailMessage) -> Result<(), TransportError> {
        if self.failing_recipients.borrow().contains(&message.to) {
            return Err(TransportError::Http {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        self.sent.borrow_mut().push(message.clone());
        Ok(())
    }
}

fn at(day: u32, hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, min, 0).unwrap()
}

fn add_user(conn: &Connection, user_id: &str, email: &str) {
    SqliteUserDirectory::new(conn)
        .upsert_user(user_id, email)
        .unwrap();
}

fn add_reminder(conn: &Connection, user_id: &str, due_date: &str, interval: RecurrenceInterval) -> ReminderItem {
    let draft = NewReminder {
        title: format!("reminder for {user_id}"),
        due_date: due_date.to_string(),
        recurring: interval != RecurrenceInterval::None,
        recurrence_interval: interval,
        ..NewReminder::default()
    };
    SqliteItemStore::new(conn)
        .create(user_id, draft.into_item().unwrap())
        .unwrap()
}

fn reminders_of(conn: &Connection, user_id: &str) -> Vec<ReminderItem> {
    SqliteItemStore::new(conn)
        .load::<ReminderItem>(user_id)
        .unwrap()
        .unwrap()
        .items
}

fn scheduler<'a, D: UserDirectory>(
    conn: &'a Connection,
    directory: D,
    sender: &'a RecordingSender,
) -> Scheduler<SqliteItemStore<'a>, D, &'a RecordingSender, SqliteJobLedger<'a>> {
    Scheduler::new(
        SqliteItemStore::new(conn),
        directory,
        sender,
        SqliteJobLedger::new(conn),
        SchedulerSettings::default(),
    )
}

#[test]
fn one_failing_user_does_not_block_later_users() {
    let conn = open_db_in_memory().unwrap();
    add_user(&conn, "u1", "first@example.com");
    add_user(&conn, "u2", "second@example.com");
    add_reminder(&conn, "u1", "2024-01-01T08:00:00", RecurrenceInterval::None);
    add_reminder(&conn, "u2", "2024-01-01T08:00:00", RecurrenceInterval::None);

    let sender = RecordingSender::default();
    sender.fail_for("first@example.com");
    let scheduler = scheduler(&conn, SqliteUserDirectory::new(&conn), &sender);

    let report = scheduler.run_job(JobKind::DueReminders, at(1, 9, 0));
    assert_eq!(report.transport_errors, 1);
    assert_eq!(report.notifications_sent, 1);
    assert_eq!(report.users_processed, 1);
    assert_eq!(sender.recipients(), vec!["second@example.com".to_string()]);
    assert!(reminders_of(&conn, "u2")[0].sent);
}

#[test]
fn failed_send_is_unmarked_and_retried_exactly_once() {
    let conn = open_db_in_memory().unwrap();
    add_user(&conn, "u1", "ada@example.com");
    add_reminder(&conn, "u1", "2024-01-01T08:00:00", RecurrenceInterval::None);

    let sender = RecordingSender::default();
    sender.fail_for("ada@example.com");
    let scheduler = scheduler(&conn, SqliteUserDirectory::new(&conn), &sender);

    let failed = scheduler.run_job(JobKind::DueReminders, at(1, 9, 0));
    assert_eq!(failed.transport_errors, 1);
    assert!(!reminders_of(&conn, "u1")[0].sent);

    sender.heal();
    let retried = scheduler.run_job(JobKind::DueReminders, at(1, 9, 1));
    let again = scheduler.run_job(JobKind::DueReminders, at(1, 9, 2));
    assert_eq!(retried.notifications_sent, 1);
    assert_eq!(again.notifications_sent, 0);
    assert_eq!(sender.sent.borrow().len(), 1);
    assert!(reminders_of(&conn, "u1")[0].sent);
}

/// Store that lets the first `replace` through and rejects the rest.
struct FailingAfterFirstReplace<'a> {
    inner: SqliteItemStore<'a>,
    replaces: Cell<usize>,
}

impl ItemStore for FailingAfterFirstReplace<'_> {
    fn load<T: StoredItem>(&self, user_id: &str) -> StoreResult<Option<ItemCollection<T>>> {
        self.inner.load(user_id)
    }

    fn replace<T: StoredItem>(
        &self,
        user_id: &str,
        items: &[T],
        expected_revision: i64,
    ) -> StoreResult<i64> {
        self.replaces.set(self.replaces.get() + 1);
        if self.replaces.get() > 1 {
            return Err(StoreError::Conflict {
                user_id: user_id.to_string(),
                field: T::FIELD,
                expected_revision,
            });
        }
        self.inner.replace(user_id, items, expected_revision)
    }

    fn create<T: StoredItem>(&self, user_id: &str, item: T) -> StoreResult<T> {
        self.inner.create(user_id, item)
    }
}

#[test]
fn failed_unmark_after_failed_send_counts_one_persistence_error() {
    let conn = open_db_in_memory().unwrap();
    add_user(&conn, "u1", "ada@example.com");
    add_reminder(&conn, "u1", "2024-01-01T08:00:00", RecurrenceInterval::None);

    let sender = RecordingSender::default();
    sender.fail_for("ada@example.com");
    let scheduler = Scheduler::new(
        FailingAfterFirstReplace {
            inner: SqliteItemStore::new(&conn),
            replaces: Cell::new(0),
        },
        SqliteUserDirectory::new(&conn),
        &sender,
        SqliteJobLedger::new(&conn),
        SchedulerSettings::default(),
    );

    let report = scheduler.run_job(JobKind::DueReminders, at(1, 9, 0));
    assert_eq!(report.persistence_errors, 1);
    assert_eq!(report.transport_errors, 0);
    assert_eq!(report.error_count(), 1);
    assert!(reminders_of(&conn, "u1")[0].sent);
}

struct StoreInspectingSender<'a> {
    conn: &'a Connection,
    seen_sent_flags: RefCell<Vec<bool>>,
}

impl NotificationSender for StoreInspectingSender<'_> {
    fn send(&self, _message: &EmailMessage) -> Result<(), TransportError> {
        let items = reminders_of(self.conn, "u1");
        self.seen_sent_flags.borrow_mut().push(items[0].sent);
        Ok(())
    }
}

#[test]
fn item_is_marked_sent_before_the_notice_goes_out() {
    let conn = open_db_in_memory().unwrap();
    add_user(&conn, "u1", "ada@example.com");
    add_reminder(&conn, "u1", "2024-01-01T08:00:00", RecurrenceInterval::None);

    let sender = StoreInspectingSender {
        conn: &conn,
        seen_sent_flags: RefCell::new(Vec::new()),
    };
    let scheduler = Scheduler::new(
        SqliteItemStore::new(&conn),
        SqliteUserDirectory::new(&conn),
        &sender,
        SqliteJobLedger::new(&conn),
        SchedulerSettings::default(),
    );

    scheduler.run_job(JobKind::DueReminders, at(1, 9, 0));
    assert_eq!(*sender.seen_sent_flags.borrow(), vec![true]);
}

#[test]
fn user_without_email_is_reported_and_item_stays_pending() {
    let conn = open_db_in_memory().unwrap();
    add_reminder(&conn, "no-email", "2024-01-01T08:00:00", RecurrenceInterval::None);

    let sender = RecordingSender::default();
    let scheduler = scheduler(&conn, SqliteUserDirectory::new(&conn), &sender);

    let report = scheduler.run_job(JobKind::DueReminders, at(1, 9, 0));
    assert_eq!(report.recipient_missing, 1);
    assert!(sender.sent.borrow().is_empty());
    assert!(!reminders_of(&conn, "no-email")[0].sent);
}

/// Directory fake serving fixed ids two per page.
struct FixedDirectory {
    user_ids: Vec<String>,
    emails: HashMap<String, String>,
    pages_served: Cell<usize>,
}

impl UserDirectory for FixedDirectory {
    fn list_user_ids(&self, after: Option<&str>, limit: u32) -> DirectoryResult<UserPage> {
        self.pages_served.set(self.pages_served.get() + 1);
        let start = match after {
            Some(cursor) => self
                .user_ids
                .iter()
                .position(|id| id == cursor)
                .map_or(self.user_ids.len(), |index| index + 1),
            None => 0,
        };
        let user_ids: Vec<String> = self
            .user_ids
            .iter()
            .skip(start)
            .take(limit as usize)
            .cloned()
            .collect();
        let next = if start + user_ids.len() < self.user_ids.len() {
            user_ids.last().cloned()
        } else {
            None
        };
        Ok(UserPage { user_ids, next })
    }

    fn recipient_for(&self, user_id: &str) -> DirectoryResult<Option<String>> {
        Ok(self.emails.get(user_id).cloned())
    }

    fn upsert_user(&self, _user_id: &str, _email: &str) -> DirectoryResult<()> {
        Ok(())
    }
}

#[test]
fn users_without_documents_are_skipped_across_pages() {
    let conn = open_db_in_memory().unwrap();
    add_reminder(&conn, "b", "2024-01-01T08:00:00", RecurrenceInterval::None);

    let directory = FixedDirectory {
        user_ids: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        emails: HashMap::from([("b".to_string(), "b@example.com".to_string())]),
        pages_served: Cell::new(0),
    };
    let sender = RecordingSender::default();
    let mut settings = SchedulerSettings::default();
    settings.user_page_size = 2;
    let scheduler = Scheduler::new(
        SqliteItemStore::new(&conn),
        directory,
        &sender,
        SqliteJobLedger::new(&conn),
        settings,
    );

    let report = scheduler.run_job(JobKind::DueReminders, at(1, 9, 0));
    assert_eq!(report.users_skipped, 2);
    assert_eq!(report.users_processed, 1);
    assert_eq!(report.error_count(), 0);
    assert_eq!(sender.recipients(), vec!["b@example.com".to_string()]);
}

#[test]
fn rollover_then_due_check_notifies_next_occurrence() {
    let conn = open_db_in_memory().unwrap();
    add_user(&conn, "u1", "ada@example.com");
    add_reminder(&conn, "u1", "2024-01-01T08:00:00", RecurrenceInterval::Daily);

    let sender = RecordingSender::default();
    let scheduler = scheduler(&conn, SqliteUserDirectory::new(&conn), &sender);

    scheduler.run_job(JobKind::DueReminders, at(1, 8, 0));
    let rolled = scheduler.run_job(JobKind::RolloverReminders, at(2, 0, 0));
    assert_eq!(rolled.items_advanced, 1);

    let stored = &reminders_of(&conn, "u1")[0];
    assert_eq!(stored.due_date, "2024-01-02T08:00:00");
    assert!(!stored.sent);

    scheduler.run_job(JobKind::DueReminders, at(2, 7, 59));
    scheduler.run_job(JobKind::DueReminders, at(2, 8, 0));
    assert_eq!(sender.sent.borrow().len(), 2);
}

#[test]
fn expiry_removes_only_old_delivered_one_shots() {
    let conn = open_db_in_memory().unwrap();
    add_user(&conn, "u1", "ada@example.com");
    let old = add_reminder(&conn, "u1", "2023-11-01T08:00:00", RecurrenceInterval::None);
    let recurring = add_reminder(&conn, "u1", "2023-11-01T08:00:00", RecurrenceInterval::Weekly);
    let recent = add_reminder(&conn, "u1", "2023-12-20T08:00:00", RecurrenceInterval::None);

    let sender = RecordingSender::default();
    let scheduler = scheduler(&conn, SqliteUserDirectory::new(&conn), &sender);
    scheduler.run_job(JobKind::DueReminders, at(1, 9, 0));
    assert_eq!(sender.sent.borrow().len(), 3);

    let report = scheduler.run_job(JobKind::ExpireReminders, at(1, 0, 0));
    assert_eq!(report.items_expired, 1);

    let ids: Vec<String> = reminders_of(&conn, "u1")
        .into_iter()
        .map(|item| item.id)
        .collect();
    assert!(!ids.contains(&old.id));
    assert_eq!(ids, vec![recurring.id, recent.id]);
}

#[test]
fn overdue_digest_covers_incomplete_tasks_only() {
    let conn = open_db_in_memory().unwrap();
    add_user(&conn, "u1", "ada@example.com");
    let store = SqliteItemStore::new(&conn);
    let mut done = NewTask {
        title: "Done".to_string(),
        due_date: "2024-01-01T08:00:00".to_string(),
        ..NewTask::default()
    }
    .into_item()
    .unwrap();
    done.status = lazyremind_core::TaskStatus::Completed;
    store.create("u1", done).unwrap();
    store
        .create(
            "u1",
            NewTask {
                title: "Late".to_string(),
                due_date: "2024-01-01T08:00:00".to_string(),
                ..NewTask::default()
            }
            .into_item()
            .unwrap(),
        )
        .unwrap();

    let sender = RecordingSender::default();
    let scheduler = scheduler(&conn, SqliteUserDirectory::new(&conn), &sender);
    let report = scheduler.run_job(JobKind::OverdueTasks, at(2, 9, 0));

    assert_eq!(report.notifications_sent, 1);
    assert_eq!(sender.sent.borrow()[0].subject, "Overdue Task: Late");
    let tasks = store.load::<TaskItem>("u1").unwrap().unwrap();
    assert!(tasks.items.iter().all(|task| !task.sent));
}

#[test]
fn daily_jobs_fire_once_per_day_across_restarts() {
    let conn = open_db_in_memory().unwrap();
    let sender = RecordingSender::default();

    let fired = |reports: &[lazyremind_core::JobReport], kind: JobKind| {
        reports.iter().any(|report| report.job == kind)
    };

    let mut first = scheduler(&conn, SqliteUserDirectory::new(&conn), &sender);
    let morning = first.tick(at(2, 9, 0));
    assert!(fired(&morning, JobKind::OverdueTasks));
    assert!(fired(&morning, JobKind::RolloverReminders));
    assert!(fired(&morning, JobKind::DueReminders));

    let soon = first.tick(at(2, 9, 0) + Duration::seconds(30));
    assert!(soon.is_empty());
    drop(first);

    let mut restarted = scheduler(&conn, SqliteUserDirectory::new(&conn), &sender);
    let later = restarted.tick(at(2, 9, 5));
    assert!(!fired(&later, JobKind::OverdueTasks));
    assert!(!fired(&later, JobKind::RolloverTasks));
    assert!(fired(&later, JobKind::DueTasks));

    let next_midnight = restarted.tick(at(3, 0, 0));
    assert!(fired(&next_midnight, JobKind::RolloverTasks));
    assert!(fired(&next_midnight, JobKind::ExpireReminders));
    assert!(!fired(&next_midnight, JobKind::OverdueTasks));
}

#[test]
fn legacy_task_enums_do_not_block_due_notices() {
    let conn = open_db_in_memory().unwrap();
    add_user(&conn, "u1", "ada@example.com");
    conn.execute(
        "INSERT INTO item_documents (user_id, field, body) VALUES ('u1', 'tasks', ?1);",
        [r#"[
            {"id":"t1","title":"Legacy","due_date":"2024-01-01T00:00:00","priority":null,"status":"archived"},
            {"id":"t2","title":"Plain","due_date":"2024-01-01T00:00:00"}
        ]"#],
    )
    .unwrap();

    let sender = RecordingSender::default();
    let scheduler = scheduler(&conn, SqliteUserDirectory::new(&conn), &sender);
    let report = scheduler.run_job(JobKind::DueTasks, at(2, 0, 0));

    assert_eq!(report.persistence_errors, 0);
    assert_eq!(report.users_processed, 1);
    assert_eq!(report.notifications_sent, 2);
}
