//! Time types for calendar events.
//!
//! This module provides [`EventTime`] for representing event start/end times
//! (which may be either a specific datetime or an all-day date),
//! [`TimeWindow`] for defining query ranges, and [`Zone`], the time zone in
//! which calendar days are computed.

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone, Utc,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Represents the time of a calendar event.
///
/// Calendar events can have two types of times:
/// - **DateTime**: A specific point in time (stored as UTC)
/// - **AllDay**: A date without a specific time (all-day events)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventTime {
    /// A specific datetime, stored in UTC.
    DateTime(DateTime<Utc>),
    /// An all-day event date (no specific time).
    AllDay(NaiveDate),
}

impl EventTime {
    /// Creates a new `EventTime::DateTime` from a UTC datetime.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }

    /// Creates a new `EventTime::AllDay` from a date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::AllDay(date)
    }

    /// Returns `true` if this is an all-day event time.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    /// Returns the datetime if this is a `DateTime` variant.
    pub fn as_datetime(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::DateTime(dt) => Some(dt),
            Self::AllDay(_) => None,
        }
    }

    /// Returns the date if this is an `AllDay` variant.
    pub fn as_date(&self) -> Option<&NaiveDate> {
        match self {
            Self::AllDay(d) => Some(d),
            Self::DateTime(_) => None,
        }
    }

    /// Converts to a UTC datetime for comparison purposes.
    ///
    /// For all-day events, returns midnight UTC on that date.
    pub fn to_utc_datetime(&self) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => *dt,
            Self::AllDay(date) => date.and_time(NaiveTime::MIN).and_utc(),
        }
    }

    /// Converts to an instant, resolving all-day dates at midnight in `zone`.
    pub fn to_instant(&self, zone: &Zone) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => *dt,
            Self::AllDay(date) => zone.start_of_day(*date),
        }
    }

    /// Returns the calendar date of this time as seen from `zone`.
    pub fn date_in(&self, zone: &Zone) -> NaiveDate {
        match self {
            Self::DateTime(dt) => zone.date_of(*dt),
            Self::AllDay(date) => *date,
        }
    }
}

impl PartialOrd for EventTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_utc_datetime().cmp(&other.to_utc_datetime())
    }
}

/// A time window for querying calendar events.
///
/// Represents a half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window.
    ///
    /// An `end` before `start` collapses the window to an empty one at `start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Creates a time window from a start time and duration.
    pub fn from_duration(start: DateTime<Utc>, duration: Duration) -> Self {
        Self::new(start, start + duration)
    }

    /// Creates a window covering the dates `[first, last_exclusive)` in `zone`.
    pub fn for_dates(first: NaiveDate, last_exclusive: NaiveDate, zone: &Zone) -> Self {
        Self::new(zone.start_of_day(first), zone.start_of_day(last_exclusive))
    }

    /// Creates the seven-day window starting at `monday` in `zone`.
    pub fn for_week(monday: NaiveDate, zone: &Zone) -> Self {
        Self::for_dates(monday, add_days(monday, 7), zone)
    }

    /// Returns the duration of this time window.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Checks if a datetime falls within this window.
    ///
    /// Uses half-open interval semantics: `[start, end)`.
    pub fn contains(&self, dt: DateTime<Utc>) -> bool {
        self.start <= dt && dt < self.end
    }

    /// Checks if the span `[start, end)` overlaps with this window.
    ///
    /// Zero-length spans overlap when their instant lies inside the window.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        if end <= start {
            return self.contains(start);
        }
        start < self.end && end > self.start
    }

    /// Extends the window by the given duration on both ends.
    pub fn extend(&self, duration: Duration) -> Self {
        Self {
            start: self.start - duration,
            end: self.end + duration,
        }
    }
}

/// Returns the Monday of the ISO week containing `date`.
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    let offset = i64::from(date.weekday().num_days_from_monday());
    add_days(date, -offset)
}

/// Adds a (possibly negative) number of days, saturating at the calendar limits.
pub fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(days))
        .unwrap_or(if days < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

/// The time zone used to turn instants into calendar days.
///
/// Besides IANA zones this covers the forms accepted on the command line:
/// `UTC`/`GMT`, `LOCAL` (the system zone) and fixed offsets like `+05:30`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Zone {
    /// Coordinated Universal Time.
    #[default]
    Utc,
    /// The system's local time zone.
    Local,
    /// A fixed offset from UTC.
    Fixed(FixedOffset),
    /// A named IANA time zone.
    Named(Tz),
}

/// Error returned when a time zone string cannot be understood.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time zone: {0}")]
pub struct InvalidZone(pub String);

impl Zone {
    /// Converts an instant to the wall-clock time of this zone.
    pub fn naive_local(&self, dt: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Utc => dt.naive_utc(),
            Self::Local => dt.with_timezone(&Local).naive_local(),
            Self::Fixed(offset) => dt.with_timezone(offset).naive_local(),
            Self::Named(tz) => dt.with_timezone(tz).naive_local(),
        }
    }

    /// Resolves a wall-clock time of this zone to an instant.
    ///
    /// Ambiguous times (DST fall-back) resolve to the earlier instant; times
    /// inside a DST gap are moved forward by one hour.
    pub fn resolve(&self, naive: NaiveDateTime) -> DateTime<Utc> {
        self.resolve_exact(naive)
            .or_else(|| self.resolve_exact(naive + Duration::hours(1)))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
    }

    fn resolve_exact(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            Self::Utc => Some(Utc.from_utc_datetime(&naive)),
            Self::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            Self::Fixed(offset) => offset
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            Self::Named(tz) => tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }

    /// Returns the instant at which `date` begins in this zone.
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        self.resolve(date.and_time(NaiveTime::MIN))
    }

    /// Returns the calendar date of an instant in this zone.
    pub fn date_of(&self, dt: DateTime<Utc>) -> NaiveDate {
        self.naive_local(dt).date()
    }

    /// Returns "today" in this zone.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.date_of(now)
    }
}

impl FromStr for Zone {
    type Err = InvalidZone;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "UTC" | "GMT" | "Z" => return Ok(Self::Utc),
            "LOCAL" => return Ok(Self::Local),
            _ => {}
        }

        if let Some(offset) = parse_offset(trimmed) {
            return Ok(Self::Fixed(offset));
        }

        trimmed
            .parse::<Tz>()
            .map(Self::Named)
            .map_err(|_| InvalidZone(s.to_string()))
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utc => write!(f, "UTC"),
            Self::Local => write!(f, "LOCAL"),
            Self::Fixed(offset) => write!(f, "{}", offset),
            Self::Named(tz) => write!(f, "{}", tz.name()),
        }
    }
}

/// Parses `+HH:MM`, `-HHMM` or `+HH` into a fixed offset.
fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (
            digits[..2].parse::<i32>().ok()?,
            digits[2..].parse::<i32>().ok()?,
        ),
        _ => return None,
    };
    if hours > 23 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
