//! Process configuration read from environment variables.
//!
//! # Responsibility
//! - Parse every setting once, at startup, into a typed `Config`.
//! - Keep parsing independent from the real environment so it is testable.
//!
//! # Invariants
//! - Mailer credentials are required unless dry run is enabled.
//! - Numeric settings are strictly positive.

use crate::logging::{default_log_level, normalize_level, normalize_log_dir};
use crate::notify::mailersend::SenderIdentity;
use crate::repo::user_directory::is_valid_email;
use crate::scheduler::schedule::{DailyAt, SchedulerSettings};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = "lazyremind.sqlite3";
pub const DEFAULT_SENDER_NAME: &str = "Personal Assistant App";

/// Configuration failure for one variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid {
        key: &'static str,
        reason: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(key) => write!(f, "missing required setting `{key}`"),
            Self::Invalid { key, reason } => write!(f, "invalid `{key}`: {reason}"),
        }
    }
}

impl Error for ConfigError {}

/// MailerSend credentials and sender identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailerConfig {
    pub api_key: String,
    pub from: SenderIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub log_level: &'static str,
    /// Absolute log directory; stderr when unset.
    pub log_dir: Option<String>,
    /// `None` in dry-run mode.
    pub mailer: Option<MailerConfig>,
    pub scheduler: SchedulerSettings,
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let db_path = get("LAZYREMIND_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        let log_level = match get("LAZYREMIND_LOG_LEVEL") {
            Some(value) => normalize_level(&value).map_err(|reason| ConfigError::Invalid {
                key: "LAZYREMIND_LOG_LEVEL",
                reason,
            })?,
            None => default_log_level(),
        };

        let log_dir = match get("LAZYREMIND_LOG_DIR") {
            Some(value) => {
                normalize_log_dir(&value).map_err(|reason| ConfigError::Invalid {
                    key: "LAZYREMIND_LOG_DIR",
                    reason,
                })?;
                Some(value)
            }
            None => None,
        };

        let dry_run = parse_flag("LAZYREMIND_DRY_RUN", get("LAZYREMIND_DRY_RUN"))?;
        let mailer = if dry_run {
            None
        } else {
            Some(mailer_config(&get)?)
        };

        let defaults = SchedulerSettings::default();
        let scheduler = SchedulerSettings {
            due_check_secs: parse_positive(
                "LAZYREMIND_DUE_CHECK_SECS",
                get("LAZYREMIND_DUE_CHECK_SECS"),
                defaults.due_check_secs,
            )?,
            rollover_at: parse_daily_at(
                "LAZYREMIND_ROLLOVER_AT",
                get("LAZYREMIND_ROLLOVER_AT"),
                defaults.rollover_at,
            )?,
            overdue_at: parse_daily_at(
                "LAZYREMIND_OVERDUE_AT",
                get("LAZYREMIND_OVERDUE_AT"),
                defaults.overdue_at,
            )?,
            expiry_days: parse_positive(
                "LAZYREMIND_EXPIRY_DAYS",
                get("LAZYREMIND_EXPIRY_DAYS"),
                defaults.expiry_days,
            )?,
            user_page_size: parse_positive(
                "LAZYREMIND_USER_PAGE_SIZE",
                get("LAZYREMIND_USER_PAGE_SIZE"),
                defaults.user_page_size,
            )?,
        };

        Ok(Self {
            db_path,
            log_level,
            log_dir,
            mailer,
            scheduler,
        })
    }

    pub fn is_dry_run(&self) -> bool {
        self.mailer.is_none()
    }
}

fn mailer_config(get: &impl Fn(&str) -> Option<String>) -> Result<MailerConfig, ConfigError> {
    let api_key = get("MAILERSEND_API_KEY").ok_or(ConfigError::Missing("MAILERSEND_API_KEY"))?;
    let email = get("MAILERSEND_SENDER_EMAIL")
        .ok_or(ConfigError::Missing("MAILERSEND_SENDER_EMAIL"))?;
    if !is_valid_email(&email) {
        return Err(ConfigError::Invalid {
            key: "MAILERSEND_SENDER_EMAIL",
            reason: format!("`{email}` is not an email address"),
        });
    }
    let name = get("MAILERSEND_SENDER_NAME").unwrap_or_else(|| DEFAULT_SENDER_NAME.to_string());

    Ok(MailerConfig {
        api_key,
        from: SenderIdentity { email, name },
    })
}

fn parse_flag(key: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("0") | Some("false") | Some("no") => Ok(false),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some(other) => Err(ConfigError::Invalid {
            key,
            reason: format!("expected 1|0|true|false, got `{other}`"),
        }),
    }
}

fn parse_positive<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let Some(raw) = value else {
        return Ok(default);
    };
    match raw.parse::<T>() {
        Ok(parsed) if parsed > T::default() => Ok(parsed),
        _ => Err(ConfigError::Invalid {
            key,
            reason: format!("expected a positive integer, got `{raw}`"),
        }),
    }
}

fn parse_daily_at(
    key: &'static str,
    value: Option<String>,
    default: DailyAt,
) -> Result<DailyAt, ConfigError> {
    let Some(raw) = value else {
        return Ok(default);
    };
    DailyAt::parse(&raw).ok_or_else(|| ConfigError::Invalid {
        key,
        reason: format!("expected UTC `HH:MM`, got `{raw}`"),
    })
}
