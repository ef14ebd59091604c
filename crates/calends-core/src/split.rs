//! Splitting occurrences into per-day segments.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};

use crate::expand::Occurrence;
use crate::time::{Zone, add_days};

/// A time of day in seconds, where `24:00` marks the end of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayTime(u32);

impl DayTime {
    /// `00:00`.
    pub const MIDNIGHT: Self = Self(0);
    /// `24:00`.
    pub const END_OF_DAY: Self = Self(86_400);

    /// Creates a time of day, clamping to `24:00`.
    pub fn from_seconds(seconds: u32) -> Self {
        Self(seconds.min(86_400))
    }

    pub fn from_hm(hour: u32, minute: u32) -> Self {
        Self::from_seconds(hour * 3600 + minute * 60)
    }

    pub fn seconds(&self) -> u32 {
        self.0
    }

    pub fn hour(&self) -> u32 {
        self.0 / 3600
    }

    pub fn minute(&self) -> u32 {
        (self.0 % 3600) / 60
    }
}

impl fmt::Display for DayTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// What part of a day a segment covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentSpan {
    /// The whole date, no time of day.
    AllDay,
    /// A time range within the date.
    Timed { start: DayTime, end: DayTime },
}

/// An occurrence clipped to one calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySegment {
    /// The calendar date of this piece.
    pub date: NaiveDate,
    /// The displayed span.
    pub span: SegmentSpan,
    /// True if the occurrence started on an earlier day.
    pub continues_from_previous: bool,
    /// True if the occurrence goes on past this day.
    pub continues_to_next: bool,
    /// Clipped start instant.
    pub start: DateTime<Utc>,
    /// Clipped end instant.
    pub end: DateTime<Utc>,
    /// The occurrence this piece belongs to.
    pub occurrence: Occurrence,
}

impl DaySegment {
    pub fn is_all_day(&self) -> bool {
        matches!(self.span, SegmentSpan::AllDay)
    }
}

/// Splits `occurrence` into one segment per calendar day of `zone` it touches.
///
/// Segments come earliest first and partition the occurrence's span. An end
/// exactly at midnight closes the previous day at `24:00`.
pub fn split(occurrence: &Occurrence, zone: &Zone) -> Vec<DaySegment> {
    if occurrence.is_all_day() {
        split_all_day(occurrence, zone)
    } else {
        split_timed(occurrence, zone)
    }
}

fn split_all_day(occurrence: &Occurrence, zone: &Zone) -> Vec<DaySegment> {
    let first = occurrence.start.date_in(zone);
    let end = occurrence.end.date_in(zone);
    let days = (end - first).num_days().max(1);

    (0..days)
        .map(|i| {
            let date = add_days(first, i);
            DaySegment {
                date,
                span: SegmentSpan::AllDay,
                continues_from_previous: i > 0,
                continues_to_next: i + 1 < days,
                start: zone.start_of_day(date),
                end: zone.start_of_day(add_days(date, 1)),
                occurrence: occurrence.clone(),
            }
        })
        .collect()
}

fn split_timed(occurrence: &Occurrence, zone: &Zone) -> Vec<DaySegment> {
    let start = occurrence.start_instant(zone);
    let end = occurrence.end_instant(zone).max(start);

    let first = zone.date_of(start);
    let last = if end > start {
        zone.date_of(end - Duration::nanoseconds(1))
    } else {
        first
    };

    let mut segments = Vec::new();
    let mut date = first;
    loop {
        let day_start = zone.start_of_day(date);
        let next_day_start = zone.start_of_day(add_days(date, 1));
        let seg_start = start.max(day_start);
        let seg_end = end.min(next_day_start);

        segments.push(DaySegment {
            date,
            span: SegmentSpan::Timed {
                start: time_of_day(seg_start, day_start, zone),
                end: if end > start && seg_end >= next_day_start {
                    DayTime::END_OF_DAY
                } else {
                    time_of_day(seg_end, day_start, zone)
                },
            },
            continues_from_previous: date > first,
            continues_to_next: date < last,
            start: seg_start,
            end: seg_end,
            occurrence: occurrence.clone(),
        });

        if date >= last {
            break;
        }
        date = add_days(date, 1);
    }
    segments
}

fn time_of_day(instant: DateTime<Utc>, day_start: DateTime<Utc>, zone: &Zone) -> DayTime {
    if instant <= day_start {
        return DayTime::MIDNIGHT;
    }
    DayTime::from_seconds(zone.naive_local(instant).num_seconds_from_midnight())
}
