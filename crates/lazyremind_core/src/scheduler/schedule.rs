//! Job identities and their firing schedules.

use chrono::{DateTime, NaiveTime, Utc};
use std::fmt::{Display, Formatter};

/// How often a job should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Run every `secs` seconds.
    Interval { secs: u64 },
    /// Run once per UTC day at `hour:min`.
    Daily { hour: u32, min: u32 },
}

impl Schedule {
    /// Returns whether the job should fire at `now` given its last run.
    ///
    /// Interval jobs fire when never run or once `secs` have elapsed. Daily
    /// jobs fire once `now` reaches today's slot and the last run predates it.
    pub fn is_due(&self, last_run: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match *self {
            Self::Interval { secs } => match last_run {
                None => true,
                Some(last) => (now - last).num_seconds() >= secs as i64,
            },
            Self::Daily { hour, min } => {
                let Some(slot_time) = NaiveTime::from_hms_opt(hour, min, 0) else {
                    return false;
                };
                let slot = now.date_naive().and_time(slot_time).and_utc();
                match last_run {
                    None => now >= slot,
                    Some(last) => last < slot && now >= slot,
                }
            }
        }
    }
}

impl Display for Schedule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interval { secs } => write!(f, "every {secs}s"),
            Self::Daily { hour, min } => write!(f, "daily at {hour:02}:{min:02} UTC"),
        }
    }
}

/// Every job the scheduler knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    DueReminders,
    DueTasks,
    RolloverReminders,
    RolloverTasks,
    ExpireReminders,
    OverdueTasks,
}

impl JobKind {
    pub const ALL: [JobKind; 6] = [
        JobKind::DueReminders,
        JobKind::DueTasks,
        JobKind::RolloverReminders,
        JobKind::RolloverTasks,
        JobKind::ExpireReminders,
        JobKind::OverdueTasks,
    ];

    /// Stable name used in logs and the job ledger.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DueReminders => "due_reminders",
            Self::DueTasks => "due_tasks",
            Self::RolloverReminders => "rollover_reminders",
            Self::RolloverTasks => "rollover_tasks",
            Self::ExpireReminders => "expire_reminders",
            Self::OverdueTasks => "overdue_tasks",
        }
    }
}

impl Display for JobKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One registered job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledJob {
    pub kind: JobKind,
    pub schedule: Schedule,
}

/// UTC time of day, `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyAt {
    pub hour: u32,
    pub min: u32,
}

impl DailyAt {
    /// Parses `HH:MM` with `0 <= HH < 24` and `0 <= MM < 60`.
    pub fn parse(value: &str) -> Option<Self> {
        let (hour, min) = value.trim().split_once(':')?;
        let hour = hour.parse::<u32>().ok()?;
        let min = min.parse::<u32>().ok()?;
        if hour >= 24 || min >= 60 {
            return None;
        }
        Some(Self { hour, min })
    }

    fn schedule(self) -> Schedule {
        Schedule::Daily {
            hour: self.hour,
            min: self.min,
        }
    }
}

/// Cadence and policy knobs for the polling scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub due_check_secs: u64,
    pub rollover_at: DailyAt,
    pub overdue_at: DailyAt,
    pub expiry_days: i64,
    pub user_page_size: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            due_check_secs: 60,
            rollover_at: DailyAt { hour: 0, min: 0 },
            overdue_at: DailyAt { hour: 9, min: 0 },
            expiry_days: 30,
            user_page_size: 100,
        }
    }
}

impl SchedulerSettings {
    /// Builds the job table for these settings.
    pub fn jobs(&self) -> Vec<ScheduledJob> {
        let due = Schedule::Interval {
            secs: self.due_check_secs.max(1),
        };
        JobKind::ALL
            .into_iter()
            .map(|kind| {
                let schedule = match kind {
                    JobKind::DueReminders | JobKind::DueTasks => due,
                    JobKind::RolloverReminders
                    | JobKind::RolloverTasks
                    | JobKind::ExpireReminders => self.rollover_at.schedule(),
                    JobKind::OverdueTasks => self.overdue_at.schedule(),
                };
                ScheduledJob { kind, schedule }
            })
            .collect()
    }
}
