//! Week assembly.
//!
//! [`assemble`] expands and splits the events of every calendar and buckets
//! the resulting segments into the seven days of a [`WeekGrid`].

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use tracing::{debug, warn};

use crate::event::CalendarEvents;
use crate::expand::expand;
use crate::split::{DaySegment, split};
use crate::time::{TimeWindow, Zone, add_days, monday_of};

/// Position of a segment relative to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalClass {
    Past,
    Ongoing,
    Future,
}

impl TemporalClass {
    /// Classifies a timed span `[start, end)`.
    pub fn of_span(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if end <= now {
            Self::Past
        } else if start <= now {
            Self::Ongoing
        } else {
            Self::Future
        }
    }

    /// Classifies an all-day date against today's date.
    pub fn of_date(date: NaiveDate, today: NaiveDate) -> Self {
        match date.cmp(&today) {
            Ordering::Less => Self::Past,
            Ordering::Equal => Self::Ongoing,
            Ordering::Greater => Self::Future,
        }
    }
}

/// A classified segment in a day bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridEntry {
    pub segment: DaySegment,
    pub class: TemporalClass,
}

impl GridEntry {
    pub fn title(&self) -> &str {
        &self.segment.occurrence.event.title
    }

    pub fn uid(&self) -> &str {
        &self.segment.occurrence.event.uid
    }

    pub fn calendar(&self) -> &str {
        &self.segment.occurrence.event.calendar
    }

    fn sort_key(&self) -> (bool, DateTime<Utc>, DateTime<Utc>, &str, &str, &str) {
        (
            !self.segment.is_all_day(),
            self.segment.start,
            self.segment.end,
            self.title(),
            self.uid(),
            self.calendar(),
        )
    }
}

/// The entries of one calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub entries: Vec<GridEntry>,
}

impl DayBucket {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A problem found while assembling; the offending event is left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyWarning {
    pub calendar: String,
    pub uid: String,
    pub message: String,
}

impl fmt::Display for AssemblyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: skipped event {}: {}",
            self.calendar, self.uid, self.message
        )
    }
}

/// Seven ordered day buckets starting on a Monday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekGrid {
    /// The Monday the week starts on.
    pub monday: NaiveDate,
    /// One bucket per day, Monday first.
    pub days: Vec<DayBucket>,
    /// Events that could not be placed.
    pub warnings: Vec<AssemblyWarning>,
    /// Zone the grid was built in.
    pub zone: Zone,
    /// Reference instant used for classification.
    pub now: DateTime<Utc>,
}

impl WeekGrid {
    /// Total number of entries across all days.
    pub fn total_entries(&self) -> usize {
        self.days.iter().map(|d| d.entries.len()).sum()
    }

    /// ISO week number of the grid's Monday.
    pub fn week_number(&self) -> u32 {
        self.monday.iso_week().week()
    }

    /// The Sunday closing the week.
    pub fn sunday(&self) -> NaiveDate {
        add_days(self.monday, 6)
    }

    /// Returns true if no day has any entry.
    pub fn is_empty(&self) -> bool {
        self.days.iter().all(DayBucket::is_empty)
    }

    /// Iterates over all entries in display order.
    pub fn entries(&self) -> impl Iterator<Item = &GridEntry> {
        self.days.iter().flat_map(|d| d.entries.iter())
    }

    /// Returns true if the week contains today's date.
    pub fn contains_today(&self) -> bool {
        let today = self.zone.today(self.now);
        self.monday <= today && today <= self.sunday()
    }

    /// Number of distinct calendars with at least one entry.
    pub fn calendar_count(&self) -> usize {
        let mut names: Vec<&str> = self.entries().map(GridEntry::calendar).collect();
        names.sort_unstable();
        names.dedup();
        names.len()
    }
}

/// Builds the grid for the week containing `week_start`.
///
/// Assembling twice with the same inputs and `now` yields equal grids.
pub fn assemble(
    week_start: NaiveDate,
    calendars: &[CalendarEvents],
    now: DateTime<Utc>,
    zone: &Zone,
) -> WeekGrid {
    let monday = monday_of(week_start);
    let sunday = add_days(monday, 6);
    let today = zone.today(now);
    let window = TimeWindow::for_week(monday, zone).extend(Duration::days(1));

    let mut days: Vec<DayBucket> = (0..7)
        .map(|i| DayBucket {
            date: add_days(monday, i),
            entries: Vec::new(),
        })
        .collect();
    let mut warnings = Vec::new();

    for calendar in calendars {
        for event in &calendar.events {
            let occurrences = match expand(event, &window) {
                Ok(occurrences) => occurrences,
                Err(e) => {
                    warn!(calendar = %calendar.name, uid = %event.uid, error = %e, "Skipping event");
                    warnings.push(AssemblyWarning {
                        calendar: calendar.name.clone(),
                        uid: event.uid.clone(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            for occurrence in &occurrences {
                for segment in split(occurrence, zone) {
                    if segment.date < monday || segment.date > sunday {
                        continue;
                    }
                    let class = if segment.is_all_day() {
                        TemporalClass::of_date(segment.date, today)
                    } else {
                        TemporalClass::of_span(segment.start, segment.end, now)
                    };
                    let index = (segment.date - monday).num_days() as usize;
                    days[index].entries.push(GridEntry { segment, class });
                }
            }
        }
    }

    for day in &mut days {
        day.entries.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    }

    let grid = WeekGrid {
        monday,
        days,
        warnings,
        zone: *zone,
        now,
    };
    debug!(
        monday = %grid.monday,
        entries = grid.total_entries(),
        warnings = grid.warnings.len(),
        "Assembled week"
    );
    grid
}
