//! LazyRemind command-line entry point.
//!
//! # Responsibility
//! - Load configuration, start logging, open the database.
//! - Construct store, directory, sender and ledger and inject them.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use lazyremind_core::{
    init_logging, init_stderr_logging, open_db, Config, JobReport, LogOnlySender,
    MailerSendSender, NotificationSender, Scheduler, SqliteItemStore, SqliteJobLedger,
    SqliteUserDirectory, UserDirectory,
};
use log::info;
use rusqlite::Connection;

/// LazyRemind: reminder and task notifications on a polling schedule.
#[derive(Parser)]
#[command(name = "lazyremind", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler loop until the process is stopped.
    Run,

    /// Run every job once, ignoring schedules.
    Tick,

    /// Create a user or replace their notification email.
    AddUser { user_id: String, email: String },

    /// Print core health and version.
    Ping,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if let Command::Ping = cli.command {
        println!(
            "lazyremind_core ping={} version={}",
            lazyremind_core::ping(),
            lazyremind_core::core_version()
        );
        return Ok(());
    }

    let config = Config::from_env().context("failed to load configuration")?;
    let logging = match config.log_dir.as_deref() {
        Some(dir) => init_logging(config.log_level, dir),
        None => init_stderr_logging(config.log_level),
    };
    logging
        .map_err(anyhow::Error::msg)
        .context("failed to initialize logging")?;

    let conn = open_db(&config.db_path)
        .with_context(|| format!("failed to open database `{}`", config.db_path.display()))?;

    match cli.command {
        Command::AddUser { user_id, email } => {
            SqliteUserDirectory::new(&conn)
                .upsert_user(&user_id, &email)
                .with_context(|| format!("failed to save user `{user_id}`"))?;
            println!("saved user {user_id}");
            Ok(())
        }
        Command::Run => {
            with_sender(&config, |sender| {
                let mut scheduler = build_scheduler(&conn, &config, sender);
                scheduler.run_until(|| false);
            });
            Ok(())
        }
        Command::Tick => {
            let reports = with_sender(&config, |sender| {
                build_scheduler(&conn, &config, sender).run_all(Utc::now())
            });
            for report in &reports {
                print_report(report);
            }
            Ok(())
        }
        Command::Ping => Ok(()),
    }
}

/// Calls `f` with the configured sender: MailerSend, or log-only in dry run.
fn with_sender<R>(config: &Config, f: impl FnOnce(&dyn NotificationSender) -> R) -> R {
    match &config.mailer {
        Some(mailer) => {
            info!("event=sender_select module=cli status=ok sender=mailersend");
            let sender = MailerSendSender::new(mailer.api_key.clone(), mailer.from.clone());
            f(&sender)
        }
        None => {
            info!("event=sender_select module=cli status=ok sender=dry_run");
            f(&LogOnlySender)
        }
    }
}

fn build_scheduler<'a>(
    conn: &'a Connection,
    config: &Config,
    sender: &'a dyn NotificationSender,
) -> Scheduler<
    SqliteItemStore<'a>,
    SqliteUserDirectory<'a>,
    &'a dyn NotificationSender,
    SqliteJobLedger<'a>,
> {
    Scheduler::new(
        SqliteItemStore::new(conn),
        SqliteUserDirectory::new(conn),
        sender,
        SqliteJobLedger::new(conn),
        config.scheduler,
    )
}

fn print_report(report: &JobReport) {
    println!(
        "{} users={} skipped={} sent={} advanced={} expired={} errors={}",
        report.job,
        report.users_processed,
        report.users_skipped,
        report.notifications_sent,
        report.items_advanced,
        report.items_expired,
        report.error_count()
    );
}
