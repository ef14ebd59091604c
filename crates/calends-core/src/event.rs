//! Event types for calendar events.
//!
//! - [`MasterEvent`]: an event as parsed from a calendar, possibly recurring
//! - [`CalendarEvents`]: the events of one calendar, ready to be assembled

use std::sync::Arc;

use chrono::Duration;

use crate::rrule::RecurrenceRule;
use crate::time::{EventTime, Zone};

/// A calendar event as defined in its source, before recurrence expansion.
///
/// Immutable once parsed. Expanded occurrences share it through an [`Arc`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterEvent {
    /// Unique identifier of the event within its calendar.
    pub uid: String,
    /// The event title/summary.
    pub title: String,
    /// When the (first occurrence of the) event starts.
    pub start: EventTime,
    /// When the (first occurrence of the) event ends.
    pub end: EventTime,
    /// The location field, if any.
    pub location: Option<String>,
    /// The description, already stripped of markup.
    pub description: Option<String>,
    /// Display names of the attendees.
    pub attendees: Vec<String>,
    /// Name of the calendar this event belongs to.
    pub calendar: String,
    /// Recurrence rule, for recurring events.
    pub rrule: Option<RecurrenceRule>,
    /// Instances removed from the recurrence set.
    pub exdates: Vec<EventTime>,
    /// Identity of the source the event was read from.
    pub source: String,
    /// Zone in which recurrence arithmetic happens.
    pub zone: Zone,
}

impl MasterEvent {
    /// Creates a new non-recurring event.
    pub fn new(
        uid: impl Into<String>,
        title: impl Into<String>,
        start: EventTime,
        end: EventTime,
    ) -> Self {
        Self {
            uid: uid.into(),
            title: title.into(),
            start,
            end,
            location: None,
            description: None,
            attendees: Vec::new(),
            calendar: String::new(),
            rrule: None,
            exdates: Vec::new(),
            source: String::new(),
            zone: Zone::Utc,
        }
    }

    /// Returns true if this is an all-day event.
    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }

    /// Returns true if the event carries a recurrence rule.
    pub fn is_recurring(&self) -> bool {
        self.rrule.is_some()
    }

    /// Returns the length of one occurrence.
    ///
    /// Never negative; an end before the start counts as zero length.
    pub fn duration(&self) -> Duration {
        let duration = match (self.start, self.end) {
            (EventTime::AllDay(start), EventTime::AllDay(end)) => end - start,
            (start, end) => end.to_instant(&self.zone) - start.to_instant(&self.zone),
        };
        duration.max(Duration::zero())
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder method to add an attendee.
    pub fn with_attendee(mut self, attendee: impl Into<String>) -> Self {
        self.attendees.push(attendee.into());
        self
    }

    /// Builder method to set the owning calendar name.
    pub fn with_calendar(mut self, calendar: impl Into<String>) -> Self {
        self.calendar = calendar.into();
        self
    }

    /// Builder method to set the recurrence rule.
    pub fn with_rrule(mut self, rrule: RecurrenceRule) -> Self {
        self.rrule = Some(rrule);
        self
    }

    /// Builder method to add an exception date.
    pub fn with_exdate(mut self, exdate: EventTime) -> Self {
        self.exdates.push(exdate);
        self
    }

    /// Builder method to set the source identity.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Builder method to set the zone used for recurrence arithmetic.
    pub fn with_zone(mut self, zone: Zone) -> Self {
        self.zone = zone;
        self
    }
}

/// The parsed events of one calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvents {
    /// Identity of the source (absolute path or URL).
    pub source: String,
    /// Display name of the calendar.
    pub name: String,
    /// Master events, shared with the occurrences built from them.
    pub events: Vec<Arc<MasterEvent>>,
}

impl CalendarEvents {
    pub fn new(source: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
            events: Vec::new(),
        }
    }

    /// Builder method to add an event.
    pub fn with_event(mut self, event: MasterEvent) -> Self {
        self.events.push(Arc::new(event));
        self
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rrule::Frequency;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn timed_duration() {
        let event = MasterEvent::new(
            "a",
            "Standup",
            EventTime::from_utc(utc(2025, 10, 20, 9, 0)),
            EventTime::from_utc(utc(2025, 10, 20, 9, 15)),
        );
        assert_eq!(event.duration(), Duration::minutes(15));
        assert!(!event.is_all_day());
        assert!(!event.is_recurring());
    }

    #[test]
    fn all_day_duration_counts_days() {
        let event = MasterEvent::new(
            "b",
            "Conference",
            EventTime::from_date(date(2025, 10, 23)),
            EventTime::from_date(date(2025, 10, 26)),
        );
        assert_eq!(event.duration(), Duration::days(3));
        assert!(event.is_all_day());
    }

    #[test]
    fn inverted_end_is_zero_length() {
        let event = MasterEvent::new(
            "c",
            "Broken",
            EventTime::from_utc(utc(2025, 10, 20, 10, 0)),
            EventTime::from_utc(utc(2025, 10, 20, 9, 0)),
        );
        assert_eq!(event.duration(), Duration::zero());
    }

    #[test]
    fn builders() {
        let event = MasterEvent::new(
            "d",
            "Review",
            EventTime::from_utc(utc(2025, 10, 20, 9, 0)),
            EventTime::from_utc(utc(2025, 10, 20, 10, 0)),
        )
        .with_location("Room 1")
        .with_attendee("Alice")
        .with_calendar("work")
        .with_rrule(RecurrenceRule::new(Frequency::Weekly))
        .with_exdate(EventTime::from_utc(utc(2025, 10, 27, 9, 0)));

        assert_eq!(event.location.as_deref(), Some("Room 1"));
        assert_eq!(event.attendees, vec!["Alice".to_string()]);
        assert_eq!(event.calendar, "work");
        assert!(event.is_recurring());
        assert_eq!(event.exdates.len(), 1);

        let calendar = CalendarEvents::new("/tmp/work.ics", "work").with_event(event);
        assert_eq!(calendar.len(), 1);
        assert!(!calendar.is_empty());
    }
}
