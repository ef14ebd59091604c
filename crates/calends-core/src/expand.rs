//! Recurrence expansion.
//!
//! [`expand`] turns a [`MasterEvent`] into the concrete [`Occurrence`]s that
//! intersect a [`TimeWindow`]. The k-th candidate is always computed from the
//! event's original start, in the event's own zone, so month-end clamping
//! never drifts the cadence.

use std::sync::Arc;

use chrono::{Datelike, DateTime, Days, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tracing::trace;

use crate::error::CoreResult;
use crate::event::MasterEvent;
use crate::rrule::{Frequency, RecurrenceRule};
use crate::time::{EventTime, TimeWindow, Zone};

/// One concrete instance of a (possibly recurring) event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    /// The event this occurrence was generated from.
    pub event: Arc<MasterEvent>,
    /// Start of this instance.
    pub start: EventTime,
    /// End of this instance.
    pub end: EventTime,
}

impl Occurrence {
    /// Returns true if this is an all-day occurrence.
    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }

    /// Start instant, resolving all-day dates in `zone`.
    pub fn start_instant(&self, zone: &Zone) -> DateTime<Utc> {
        self.start.to_instant(zone)
    }

    /// End instant, resolving all-day dates in `zone`.
    pub fn end_instant(&self, zone: &Zone) -> DateTime<Utc> {
        self.end.to_instant(zone)
    }
}

/// Expands `event` into the occurrences overlapping `window`, ordered by start.
///
/// Returns an error only for a malformed recurrence rule.
pub fn expand(event: &Arc<MasterEvent>, window: &TimeWindow) -> CoreResult<Vec<Occurrence>> {
    let Some(rule) = &event.rrule else {
        let occurrence = Occurrence {
            event: Arc::clone(event),
            start: event.start,
            end: event.end,
        };
        let zone = event.zone;
        if window.overlaps(occurrence.start_instant(&zone), occurrence.end_instant(&zone)) {
            return Ok(vec![occurrence]);
        }
        return Ok(Vec::new());
    };

    rule.validate()?;

    let zone = event.zone;
    let duration = event.duration();
    let mut occurrences = Vec::new();
    let mut generated: u32 = 0;
    let mut k = first_index(event, rule, window, duration);

    loop {
        if rule.count.is_some_and(|count| generated >= count) {
            break;
        }
        let Some(start) = nth_candidate(event, rule, k) else {
            break;
        };
        let start_instant = start.to_instant(&zone);
        if rule
            .until
            .is_some_and(|until| until.is_exceeded_by(start_instant, &zone))
        {
            break;
        }
        if start_instant >= window.end {
            break;
        }

        generated += 1;
        k += 1;

        if is_excluded(event, start) {
            trace!(uid = %event.uid, start = ?start, "Skipping excluded occurrence");
            continue;
        }

        let Some(end) = shift_by(start, duration) else {
            break;
        };
        if window.overlaps(start_instant, end.to_instant(&zone)) {
            occurrences.push(Occurrence {
                event: Arc::clone(event),
                start,
                end,
            });
        }
    }

    trace!(
        uid = %event.uid,
        generated,
        kept = occurrences.len(),
        "Expanded recurring event"
    );
    Ok(occurrences)
}

/// Returns the candidate index to start generating from.
///
/// Rules bounded by `COUNT` always start at zero since every candidate counts.
/// Otherwise candidates that certainly end before the window are skipped.
fn first_index(
    event: &MasterEvent,
    rule: &RecurrenceRule,
    window: &TimeWindow,
    duration: Duration,
) -> u64 {
    if rule.count.is_some() {
        return 0;
    }

    let zone = event.zone;
    let anchor = local_anchor(event);
    let Some(earliest) = window
        .start
        .checked_sub_signed(duration + Duration::days(2))
        .map(|dt| zone.naive_local(dt))
    else {
        return 0;
    };
    if earliest <= anchor {
        return 0;
    }

    let units = match rule.frequency {
        Frequency::Daily => (earliest - anchor).num_days(),
        Frequency::Weekly => (earliest - anchor).num_days() / 7,
        Frequency::Monthly => months_between(anchor.date(), earliest.date()),
        Frequency::Yearly => months_between(anchor.date(), earliest.date()) / 12,
    };
    let steps = u64::try_from(units).unwrap_or(0) / u64::from(rule.interval);
    steps.saturating_sub(1)
}

fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    i64::from(to.year() - from.year()) * 12 + i64::from(to.month()) - i64::from(from.month())
}

fn local_anchor(event: &MasterEvent) -> NaiveDateTime {
    match event.start {
        EventTime::DateTime(dt) => event.zone.naive_local(dt),
        EventTime::AllDay(date) => date.and_time(NaiveTime::MIN),
    }
}

/// Computes the k-th candidate start, or `None` past the calendar limits.
fn nth_candidate(event: &MasterEvent, rule: &RecurrenceRule, k: u64) -> Option<EventTime> {
    let steps = k.checked_mul(u64::from(rule.interval))?;
    match event.start {
        EventTime::AllDay(date) => shift_date(date, rule.frequency, steps).map(EventTime::AllDay),
        EventTime::DateTime(dt) => {
            let local = event.zone.naive_local(dt);
            let date = shift_date(local.date(), rule.frequency, steps)?;
            Some(EventTime::DateTime(
                event.zone.resolve(date.and_time(local.time())),
            ))
        }
    }
}

/// Adds `steps` frequency units to `date`, clamping to month ends.
fn shift_date(date: NaiveDate, frequency: Frequency, steps: u64) -> Option<NaiveDate> {
    match frequency {
        Frequency::Daily => date.checked_add_days(Days::new(steps)),
        Frequency::Weekly => date.checked_add_days(Days::new(steps.checked_mul(7)?)),
        Frequency::Monthly => date.checked_add_months(Months::new(u32::try_from(steps).ok()?)),
        Frequency::Yearly => {
            let months = u32::try_from(steps.checked_mul(12)?).ok()?;
            date.checked_add_months(Months::new(months))
        }
    }
}

fn shift_by(start: EventTime, duration: Duration) -> Option<EventTime> {
    match start {
        EventTime::AllDay(date) => {
            let days = u64::try_from(duration.num_days()).ok()?;
            date.checked_add_days(Days::new(days)).map(EventTime::AllDay)
        }
        EventTime::DateTime(dt) => dt.checked_add_signed(duration).map(EventTime::DateTime),
    }
}

/// Returns true if `candidate` matches one of the event's exception dates.
///
/// A date-only exception removes every candidate on that date.
fn is_excluded(event: &MasterEvent, candidate: EventTime) -> bool {
    let zone = event.zone;
    event.exdates.iter().any(|exdate| match (exdate, candidate) {
        (EventTime::AllDay(date), candidate) => candidate.date_in(&zone) == *date,
        (EventTime::DateTime(excluded), EventTime::DateTime(start)) => *excluded == start,
        (EventTime::DateTime(excluded), EventTime::AllDay(start)) => {
            zone.date_of(*excluded) == start
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::rrule::Until;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn timed(start: DateTime<Utc>, minutes: i64) -> MasterEvent {
        MasterEvent::new(
            "uid-1",
            "Standup",
            EventTime::from_utc(start),
            EventTime::from_utc(start + Duration::minutes(minutes)),
        )
    }

    fn starts(occurrences: &[Occurrence]) -> Vec<EventTime> {
        occurrences.iter().map(|o| o.start).collect()
    }

    fn q4_2025() -> TimeWindow {
        TimeWindow::new(utc(2025, 10, 1, 0, 0), utc(2025, 12, 31, 0, 0))
    }

    #[test]
    fn weekly_count_three() {
        let event = Arc::new(
            timed(utc(2025, 10, 20, 9, 0), 30)
                .with_rrule(RecurrenceRule::new(Frequency::Weekly).with_count(3)),
        );
        let occurrences = expand(&event, &q4_2025()).unwrap();
        assert_eq!(
            starts(&occurrences),
            vec![
                EventTime::from_utc(utc(2025, 10, 20, 9, 0)),
                EventTime::from_utc(utc(2025, 10, 27, 9, 0)),
                EventTime::from_utc(utc(2025, 11, 3, 9, 0)),
            ]
        );
        assert_eq!(
            occurrences[0].end,
            EventTime::from_utc(utc(2025, 10, 20, 9, 30))
        );
    }

    #[test]
    fn count_only_yields_exactly_count() {
        for count in [1, 5, 17] {
            let event = Arc::new(
                timed(utc(2025, 10, 1, 8, 0), 60)
                    .with_rrule(RecurrenceRule::new(Frequency::Daily).with_count(count)),
            );
            let occurrences = expand(&event, &q4_2025()).unwrap();
            assert_eq!(occurrences.len(), count as usize);
        }
    }

    #[test]
    fn count_zero_is_empty() {
        let event = Arc::new(
            timed(utc(2025, 10, 1, 8, 0), 60)
                .with_rrule(RecurrenceRule::new(Frequency::Daily).with_count(0)),
        );
        assert!(expand(&event, &q4_2025()).unwrap().is_empty());
    }

    #[test]
    fn until_is_never_exceeded() {
        let until = utc(2025, 10, 10, 8, 0);
        let event = Arc::new(
            timed(utc(2025, 10, 1, 8, 0), 60).with_rrule(
                RecurrenceRule::new(Frequency::Daily)
                    .with_interval(3)
                    .with_until(Until::Instant(until)),
            ),
        );
        let occurrences = expand(&event, &q4_2025()).unwrap();
        assert_eq!(occurrences.len(), 4);
        assert!(occurrences.iter().all(|o| o.start_instant(&Zone::Utc) <= until));
    }

    #[test]
    fn start_past_until_is_empty() {
        let event = Arc::new(timed(utc(2025, 10, 20, 9, 0), 30).with_rrule(
            RecurrenceRule::new(Frequency::Weekly)
                .with_until(Until::Date(date(2025, 10, 1))),
        ));
        assert!(expand(&event, &q4_2025()).unwrap().is_empty());
    }

    #[test]
    fn exdates_are_skipped_but_counted() {
        let event = Arc::new(
            timed(utc(2025, 10, 20, 9, 0), 30)
                .with_rrule(RecurrenceRule::new(Frequency::Weekly).with_count(3))
                .with_exdate(EventTime::from_utc(utc(2025, 10, 27, 9, 0))),
        );
        let occurrences = expand(&event, &q4_2025()).unwrap();
        assert_eq!(
            starts(&occurrences),
            vec![
                EventTime::from_utc(utc(2025, 10, 20, 9, 0)),
                EventTime::from_utc(utc(2025, 11, 3, 9, 0)),
            ]
        );
    }

    #[test]
    fn date_only_exdate_removes_whole_day() {
        let zone: Zone = "America/New_York".parse().unwrap();
        // 23:30 on Oct 20 in New York is already Oct 21 in UTC.
        let event = Arc::new(
            timed(utc(2025, 10, 21, 3, 30), 30)
                .with_zone(zone)
                .with_rrule(RecurrenceRule::new(Frequency::Daily).with_count(3))
                .with_exdate(EventTime::from_date(date(2025, 10, 21))),
        );
        let occurrences = expand(&event, &q4_2025()).unwrap();
        assert_eq!(occurrences.len(), 2);
        assert_eq!(
            occurrences[0].start,
            EventTime::from_utc(utc(2025, 10, 21, 3, 30))
        );
        assert!(
            occurrences
                .iter()
                .all(|o| o.start.date_in(&zone) != date(2025, 10, 21))
        );
    }

    #[test]
    fn monthly_clamps_without_drift() {
        let event = Arc::new(
            timed(utc(2025, 1, 31, 12, 0), 60)
                .with_rrule(RecurrenceRule::new(Frequency::Monthly).with_count(4)),
        );
        let window = TimeWindow::new(utc(2025, 1, 1, 0, 0), utc(2026, 1, 1, 0, 0));
        let occurrences = expand(&event, &window).unwrap();
        let dates: Vec<_> = occurrences
            .iter()
            .map(|o| o.start.date_in(&Zone::Utc))
            .collect();
        assert_eq!(
            dates,
            vec![
                date(2025, 1, 31),
                date(2025, 2, 28),
                date(2025, 3, 31),
                date(2025, 4, 30)
            ]
        );
    }

    #[test]
    fn yearly_leap_day_clamps() {
        let event = Arc::new(
            MasterEvent::new(
                "leap",
                "Leap birthday",
                EventTime::from_date(date(2024, 2, 29)),
                EventTime::from_date(date(2024, 3, 1)),
            )
            .with_rrule(RecurrenceRule::new(Frequency::Yearly)),
        );
        let window = TimeWindow::new(utc(2025, 2, 1, 0, 0), utc(2025, 3, 31, 0, 0));
        let occurrences = expand(&event, &window).unwrap();
        assert_eq!(starts(&occurrences), vec![EventTime::from_date(date(2025, 2, 28))]);
        assert_eq!(occurrences[0].end, EventTime::from_date(date(2025, 3, 1)));
    }

    #[test]
    fn keeps_wall_clock_across_dst() {
        let zone = Zone::Named(chrono_tz::Europe::Paris);
        // 09:00 CEST on 2025-10-20, DST ends on 2025-10-26.
        let event = Arc::new(
            timed(utc(2025, 10, 20, 7, 0), 60)
                .with_zone(zone)
                .with_rrule(RecurrenceRule::new(Frequency::Weekly).with_count(2)),
        );
        let occurrences = expand(&event, &q4_2025()).unwrap();
        assert_eq!(
            starts(&occurrences),
            vec![
                EventTime::from_utc(utc(2025, 10, 20, 7, 0)),
                EventTime::from_utc(utc(2025, 10, 27, 8, 0)),
            ]
        );
    }

    #[test]
    fn occurrences_before_window_are_discarded() {
        let event = Arc::new(
            timed(utc(2025, 9, 1, 9, 0), 60)
                .with_rrule(RecurrenceRule::new(Frequency::Weekly).with_count(10)),
        );
        let window = TimeWindow::new(utc(2025, 10, 1, 0, 0), utc(2025, 10, 15, 0, 0));
        let occurrences = expand(&event, &window).unwrap();
        // Sep 1 + 5 weeks = Oct 6; Oct 13 is the 7th of 10.
        assert_eq!(
            starts(&occurrences),
            vec![
                EventTime::from_utc(utc(2025, 10, 6, 9, 0)),
                EventTime::from_utc(utc(2025, 10, 13, 9, 0)),
            ]
        );
    }

    #[test]
    fn long_running_unbounded_rule_skips_ahead() {
        let event = Arc::new(
            timed(utc(1990, 1, 1, 6, 0), 30)
                .with_rrule(RecurrenceRule::new(Frequency::Daily).with_interval(2)),
        );
        let window = TimeWindow::for_week(date(2025, 10, 20), &Zone::Utc);
        let occurrences = expand(&event, &window).unwrap();
        let expected_first = (0..)
            .map(|k| utc(1990, 1, 1, 6, 0) + Duration::days(2 * k))
            .find(|dt| *dt >= window.start)
            .unwrap();
        assert_eq!(occurrences[0].start, EventTime::from_utc(expected_first));
        assert!(occurrences.len() >= 3 && occurrences.len() <= 4);
    }

    #[test]
    fn malformed_rule_is_rejected() {
        let event = Arc::new(
            timed(utc(2025, 10, 20, 9, 0), 30)
                .with_rrule(RecurrenceRule::new(Frequency::Daily).with_interval(0)),
        );
        assert!(matches!(
            expand(&event, &q4_2025()),
            Err(CoreError::MalformedRule { .. })
        ));

        let event = Arc::new(timed(utc(2025, 10, 20, 9, 0), 30).with_rrule(
            RecurrenceRule::new(Frequency::Daily)
                .with_count(2)
                .with_until(Until::Date(date(2025, 11, 1))),
        ));
        assert!(expand(&event, &q4_2025()).is_err());
    }

    #[test]
    fn single_event_inside_and_outside_window() {
        let event = Arc::new(timed(utc(2025, 10, 20, 9, 0), 30));
        assert_eq!(expand(&event, &q4_2025()).unwrap().len(), 1);

        let window = TimeWindow::new(utc(2025, 11, 1, 0, 0), utc(2025, 11, 8, 0, 0));
        assert!(expand(&event, &window).unwrap().is_empty());
    }

    #[test]
    fn expansion_is_deterministic() {
        let event = Arc::new(
            timed(utc(2025, 10, 2, 14, 0), 45)
                .with_rrule(RecurrenceRule::new(Frequency::Weekly).with_interval(2)),
        );
        let first = expand(&event, &q4_2025()).unwrap();
        let second = expand(&event, &q4_2025()).unwrap();
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| w[0].start < w[1].start));
    }
}
