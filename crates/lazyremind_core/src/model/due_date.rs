//! ISO-8601 due-date parsing and fixed-offset arithmetic.
//!
//! # Responsibility
//! - Parse stored `due_date` strings without assuming a local timezone.
//! - Advance a due date by whole days and re-serialize it in its source shape.
//!
//! # Invariants
//! - Naive values stay naive and zoned values keep their offset on rollover.
//! - Output keeps the input's shape: `Z` stays `Z`, `HH:MM` stays `HH:MM`,
//!   and a bare date stays a bare date.
//! - Naive values are compared against UTC wall-clock time.
//! - Fractional seconds are printed only when non-zero.

use crate::model::item::ItemError;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use std::fmt::{Display, Formatter};

const NAIVE_SECONDS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const NAIVE_MINUTES_FORMAT: &str = "%Y-%m-%dT%H:%M";
const DATE_ONLY_FORMAT: &str = "%Y-%m-%d";

/// Text layout a naive due date was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaiveShape {
    /// `YYYY-MM-DDTHH:MM:SS[.fff]`
    Seconds,
    /// `YYYY-MM-DDTHH:MM`
    Minutes,
    /// `YYYY-MM-DD`, read as midnight.
    DateOnly,
}

impl NaiveShape {
    fn format(self) -> &'static str {
        match self {
            Self::Seconds => NAIVE_SECONDS_FORMAT,
            Self::Minutes => NAIVE_MINUTES_FORMAT,
            Self::DateOnly => DATE_ONLY_FORMAT,
        }
    }
}

/// Parsed due instant plus the layout needed to write it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueDate {
    /// Source text carried no offset.
    Naive {
        value: NaiveDateTime,
        shape: NaiveShape,
    },
    /// Source text carried `Z` (`utc_z`) or `±HH:MM`.
    Zoned {
        value: DateTime<FixedOffset>,
        utc_z: bool,
    },
}

impl DueDate {
    /// Parses RFC 3339, naive date-time, or bare date input.
    ///
    /// # Errors
    /// - Returns `ItemError::MalformedDate` with the raw input when no
    ///   accepted shape matches.
    pub fn parse(value: &str) -> Result<Self, ItemError> {
        let trimmed = value.trim();
        if let Ok(zoned) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self::Zoned {
                value: zoned,
                utc_z: trimmed.ends_with(['Z', 'z']),
            });
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, NAIVE_SECONDS_FORMAT) {
            return Ok(Self::naive(naive, NaiveShape::Seconds));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, NAIVE_MINUTES_FORMAT) {
            return Ok(Self::naive(naive, NaiveShape::Minutes));
        }
        if let Some(naive) = NaiveDate::parse_from_str(trimmed, DATE_ONLY_FORMAT)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
        {
            return Ok(Self::naive(naive, NaiveShape::DateOnly));
        }

        Err(ItemError::MalformedDate(value.to_string()))
    }

    fn naive(value: NaiveDateTime, shape: NaiveShape) -> Self {
        Self::Naive { value, shape }
    }

    /// Returns this instant on the UTC timeline.
    pub fn to_utc(&self) -> DateTime<Utc> {
        match self {
            Self::Naive { value, .. } => value.and_utc(),
            Self::Zoned { value, .. } => value.with_timezone(&Utc),
        }
    }

    /// Returns whether this instant is at or before `now`.
    pub fn is_at_or_before(&self, now: DateTime<Utc>) -> bool {
        self.to_utc() <= now
    }

    /// Adds a fixed number of 24-hour days, keeping the source shape.
    ///
    /// Returns `None` when the result leaves chrono's representable range.
    pub fn checked_add_days(&self, days: i64) -> Option<Self> {
        let step = Duration::try_days(days)?;
        match *self {
            Self::Naive { value, shape } => value
                .checked_add_signed(step)
                .map(|value| Self::Naive { value, shape }),
            Self::Zoned { value, utc_z } => value
                .checked_add_signed(step)
                .map(|value| Self::Zoned { value, utc_z }),
        }
    }

    /// Serializes back to ISO-8601 in the shape it was parsed from.
    pub fn to_iso_string(&self) -> String {
        match self {
            Self::Naive { value, shape } => value.format(shape.format()).to_string(),
            Self::Zoned { value, utc_z } => value.to_rfc3339_opts(SecondsFormat::AutoSi, *utc_z),
        }
    }
}

impl Display for DueDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso_string())
    }
}
