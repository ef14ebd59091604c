//! Recurrence rules.
//!
//! Only the subset needed for weekly views is modelled: a frequency, an
//! interval and at most one of `COUNT` / `UNTIL`. Other `RRULE` parts are
//! accepted and ignored.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::time::Zone;

/// How often a recurring event repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// Returns the `FREQ` value for this frequency.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }
}

impl FromStr for Frequency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Ok(Self::Daily),
            "WEEKLY" => Ok(Self::Weekly),
            "MONTHLY" => Ok(Self::Monthly),
            "YEARLY" => Ok(Self::Yearly),
            other => Err(CoreError::malformed_rule(format!(
                "unsupported frequency '{}'",
                other
            ))),
        }
    }
}

/// The last instant a rule may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Until {
    /// An absolute instant (`UNTIL=...Z`).
    Instant(DateTime<Utc>),
    /// A wall-clock time in the event's own zone.
    Floating(NaiveDateTime),
    /// A date; every candidate on or before it is allowed.
    Date(NaiveDate),
}

impl Until {
    /// Returns true if a candidate starting at `start` lies beyond this bound.
    pub fn is_exceeded_by(&self, start: DateTime<Utc>, zone: &Zone) -> bool {
        match self {
            Self::Instant(until) => start > *until,
            Self::Floating(naive) => start > zone.resolve(*naive),
            Self::Date(date) => zone.date_of(start) > *date,
        }
    }
}

/// A recurrence rule attached to a master event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecurrenceRule {
    /// Repetition unit.
    pub frequency: Frequency,
    /// Number of units between candidates. Must be positive.
    pub interval: u32,
    /// Maximum number of generated candidates.
    pub count: Option<u32>,
    /// Last allowed candidate start.
    pub until: Option<Until>,
}

impl RecurrenceRule {
    /// Creates an unbounded rule repeating every unit.
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            count: None,
            until: None,
        }
    }

    /// Builder: set the interval.
    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    /// Builder: bound the rule by a number of candidates.
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    /// Builder: bound the rule by a last start.
    pub fn with_until(mut self, until: Until) -> Self {
        self.until = Some(until);
        self
    }

    /// Checks the rule invariants.
    pub fn validate(&self) -> CoreResult<()> {
        if self.interval == 0 {
            return Err(CoreError::malformed_rule("interval must be positive"));
        }
        if self.count.is_some() && self.until.is_some() {
            return Err(CoreError::malformed_rule(
                "COUNT and UNTIL are mutually exclusive",
            ));
        }
        Ok(())
    }

    /// Returns true if neither `COUNT` nor `UNTIL` bounds the rule.
    pub fn is_unbounded(&self) -> bool {
        self.count.is_none() && self.until.is_none()
    }
}

impl FromStr for RecurrenceRule {
    type Err = CoreError;

    /// Parses an `RRULE` value such as `FREQ=WEEKLY;INTERVAL=2;COUNT=5`.
    ///
    /// A leading `RRULE:` is tolerated.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.trim();
        let body = body.strip_prefix("RRULE:").unwrap_or(body);

        let mut frequency = None;
        let mut interval = 1;
        let mut count = None;
        let mut until = None;

        for part in body.split(';').filter(|p| !p.is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                return Err(CoreError::malformed_rule(format!("invalid part '{}'", part)));
            };
            match key.trim().to_ascii_uppercase().as_str() {
                "FREQ" => frequency = Some(value.parse::<Frequency>()?),
                "INTERVAL" => {
                    let parsed: i64 = value.trim().parse().map_err(|_| {
                        CoreError::malformed_rule(format!("invalid INTERVAL '{}'", value))
                    })?;
                    interval = u32::try_from(parsed)
                        .ok()
                        .filter(|v| *v > 0)
                        .ok_or_else(|| CoreError::malformed_rule("interval must be positive"))?;
                }
                "COUNT" => {
                    count = Some(value.trim().parse::<u32>().map_err(|_| {
                        CoreError::malformed_rule(format!("invalid COUNT '{}'", value))
                    })?);
                }
                "UNTIL" => {
                    until = Some(parse_until(value).ok_or_else(|| {
                        CoreError::malformed_rule(format!("invalid UNTIL '{}'", value))
                    })?);
                }
                other => debug!(part = %other, "Ignoring unsupported RRULE part"),
            }
        }

        let rule = Self {
            frequency: frequency.ok_or_else(|| CoreError::malformed_rule("missing FREQ"))?,
            interval,
            count,
            until,
        };
        rule.validate()?;
        Ok(rule)
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FREQ={}", self.frequency.as_str())?;
        if self.interval != 1 {
            write!(f, ";INTERVAL={}", self.interval)?;
        }
        if let Some(count) = self.count {
            write!(f, ";COUNT={}", count)?;
        }
        match self.until {
            Some(Until::Instant(dt)) => write!(f, ";UNTIL={}", dt.format("%Y%m%dT%H%M%SZ"))?,
            Some(Until::Floating(naive)) => write!(f, ";UNTIL={}", naive.format("%Y%m%dT%H%M%S"))?,
            Some(Until::Date(date)) => write!(f, ";UNTIL={}", date.format("%Y%m%d"))?,
            None => {}
        }
        Ok(())
    }
}

fn parse_until(value: &str) -> Option<Until> {
    let value = value.trim();
    if let Some(stripped) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(stripped, "%Y%m%dT%H%M%S").ok()?;
        return Some(Until::Instant(naive.and_utc()));
    }
    if value.len() == 8 {
        return NaiveDate::parse_from_str(value, "%Y%m%d")
            .ok()
            .map(Until::Date);
    }
    NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
        .ok()
        .map(Until::Floating)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_weekly_with_count() {
        let rule: RecurrenceRule = "FREQ=WEEKLY;INTERVAL=2;COUNT=5".parse().unwrap();
        assert_eq!(rule.frequency, Frequency::Weekly);
        assert_eq!(rule.interval, 2);
        assert_eq!(rule.count, Some(5));
        assert!(rule.until.is_none());
    }

    #[test]
    fn parses_until_forms() {
        let rule: RecurrenceRule = "RRULE:FREQ=DAILY;UNTIL=20251031T235959Z".parse().unwrap();
        assert_eq!(
            rule.until,
            Some(Until::Instant(Utc.with_ymd_and_hms(2025, 10, 31, 23, 59, 59).unwrap()))
        );

        let rule: RecurrenceRule = "FREQ=DAILY;UNTIL=20251031".parse().unwrap();
        assert_eq!(
            rule.until,
            Some(Until::Date(NaiveDate::from_ymd_opt(2025, 10, 31).unwrap()))
        );
    }

    #[test]
    fn ignores_unsupported_parts() {
        let rule: RecurrenceRule = "FREQ=WEEKLY;BYDAY=MO,WE;WKST=MO".parse().unwrap();
        assert_eq!(rule, RecurrenceRule::new(Frequency::Weekly));
    }

    #[test]
    fn rejects_non_positive_interval() {
        assert!(matches!(
            "FREQ=DAILY;INTERVAL=0".parse::<RecurrenceRule>(),
            Err(CoreError::MalformedRule { .. })
        ));
        assert!(matches!(
            "FREQ=DAILY;INTERVAL=-2".parse::<RecurrenceRule>(),
            Err(CoreError::MalformedRule { .. })
        ));
    }

    #[test]
    fn rejects_count_and_until() {
        let err = "FREQ=DAILY;COUNT=3;UNTIL=20251031".parse::<RecurrenceRule>();
        assert!(matches!(err, Err(CoreError::MalformedRule { .. })));
    }

    #[test]
    fn rejects_missing_or_unknown_frequency() {
        assert!("INTERVAL=2".parse::<RecurrenceRule>().is_err());
        assert!("FREQ=HOURLY".parse::<RecurrenceRule>().is_err());
    }

    #[test]
    fn display_round_trips() {
        let text = "FREQ=MONTHLY;INTERVAL=3;COUNT=4";
        let rule: RecurrenceRule = text.parse().unwrap();
        assert_eq!(rule.to_string(), text);
    }

    #[test]
    fn until_date_compares_in_zone() {
        let until = Until::Date(NaiveDate::from_ymd_opt(2025, 10, 31).unwrap());
        let zone: Zone = "-05:00".parse().unwrap();
        // 2025-11-01 03:00 UTC is still Oct 31 at -05:00.
        let start = Utc.with_ymd_and_hms(2025, 11, 1, 3, 0, 0).unwrap();
        assert!(!until.is_exceeded_by(start, &zone));
        assert!(until.is_exceeded_by(start, &Zone::Utc));
    }
}
