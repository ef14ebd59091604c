//! ICS/iCalendar parsing.
//!
//! Parses iCalendar (RFC 5545) text with the `icalendar` parser and maps each
//! VEVENT to a [`MasterEvent`]. Malformed events are skipped and reported as
//! [`ParseWarning`]s; one bad event never hides the rest of the calendar.

use std::fmt;
use std::sync::LazyLock;

use calends_core::{CalendarEvents, EventTime, MasterEvent, RecurrenceRule, Zone};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use icalendar::parser::{Component, Property, read_calendar, unfold};
use regex::Regex;
use tracing::{debug, trace, warn};

use crate::source::CalendarSource;

const DEFAULT_TITLE: &str = "Untitled Event";

static BREAK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>|</p\s*>|</div\s*>|</li\s*>").expect("Invalid break regex"));
static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid tag regex"));
static BLANK_LINES_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("Invalid blank lines regex"));

/// A non-fatal problem found while parsing a calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// Name of the calendar.
    pub calendar: String,
    /// UID of the affected event, if known.
    pub uid: Option<String>,
    pub message: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.uid {
            Some(uid) => write!(f, "{}: event {}: {}", self.calendar, uid, self.message),
            None => write!(f, "{}: {}", self.calendar, self.message),
        }
    }
}

/// The events and warnings of one parsed calendar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCalendar {
    pub events: Vec<MasterEvent>,
    pub warnings: Vec<ParseWarning>,
}

impl ParsedCalendar {
    /// Wraps the events for the week assembler.
    pub fn into_calendar_events(self, calendar: &CalendarSource) -> (CalendarEvents, Vec<ParseWarning>) {
        let mut events = CalendarEvents::new(calendar.key(), calendar.name.clone());
        events.events = self.events.into_iter().map(std::sync::Arc::new).collect();
        (events, self.warnings)
    }
}

/// Parses `text` with floating times interpreted in UTC.
pub fn parse_calendar(text: &str, calendar: &CalendarSource) -> ParsedCalendar {
    IcsParser::default().parse(text, calendar)
}

/// iCalendar parser with a zone for floating times.
#[derive(Debug, Clone, Copy, Default)]
pub struct IcsParser {
    default_zone: Zone,
}

struct ParsedEvent {
    event: MasterEvent,
    recurrence_id: Option<EventTime>,
}

impl IcsParser {
    /// Creates a parser resolving floating times and all-day dates in `zone`.
    pub fn new(default_zone: Zone) -> Self {
        Self { default_zone }
    }

    /// Parses a calendar.
    pub fn parse(&self, text: &str, calendar: &CalendarSource) -> ParsedCalendar {
        let mut result = ParsedCalendar::default();

        let unfolded = unfold(text);
        let parsed = match read_calendar(&unfolded) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(calendar = %calendar.name, error = %e, "Failed to parse ICS content");
                result.warnings.push(ParseWarning {
                    calendar: calendar.name.clone(),
                    uid: None,
                    message: format!("invalid iCalendar data: {}", e),
                });
                return result;
            }
        };

        let mut vevents = Vec::new();
        collect_events(&parsed.components, &mut vevents);

        let mut overrides = Vec::new();
        for (index, component) in vevents.into_iter().enumerate() {
            match self.parse_event(component, index, calendar, &mut result.warnings) {
                Ok(parsed) => {
                    if let Some(recurrence_id) = parsed.recurrence_id {
                        overrides.push((parsed.event.uid.clone(), recurrence_id));
                    }
                    result.events.push(parsed.event);
                }
                Err((uid, message)) => {
                    warn!(calendar = %calendar.name, uid = ?uid, reason = %message, "Skipping event");
                    result.warnings.push(ParseWarning {
                        calendar: calendar.name.clone(),
                        uid,
                        message,
                    });
                }
            }
        }

        for (uid, recurrence_id) in overrides {
            if let Some(master) = result
                .events
                .iter_mut()
                .find(|e| e.uid == uid && e.rrule.is_some())
            {
                trace!(uid = %uid, instance = ?recurrence_id, "Override replaces generated instance");
                master.exdates.push(recurrence_id);
            }
        }

        debug!(
            calendar = %calendar.name,
            events = result.events.len(),
            warnings = result.warnings.len(),
            "Parsed calendar"
        );
        result
    }

    fn parse_event(
        &self,
        component: &Component<'_>,
        index: usize,
        calendar: &CalendarSource,
        warnings: &mut Vec<ParseWarning>,
    ) -> Result<ParsedEvent, (Option<String>, String)> {
        let uid = property(component, "UID")
            .map(|p| p.val.as_str().trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| format!("{}-{}", calendar.name, index));
        let fail = |message: String| (Some(uid.clone()), message);

        let mut zone_warning = |message: String| {
            warnings.push(ParseWarning {
                calendar: calendar.name.clone(),
                uid: Some(uid.clone()),
                message,
            })
        };

        let dtstart = property(component, "DTSTART").ok_or_else(|| fail("missing DTSTART".into()))?;
        let (start, zone) = self
            .parse_time(dtstart, &mut zone_warning)
            .ok_or_else(|| fail(format!("invalid DTSTART '{}'", dtstart.val.as_str())))?;

        let end = if let Some(dtend) = property(component, "DTEND") {
            self.parse_time(dtend, &mut zone_warning)
                .map(|(end, _)| end)
                .ok_or_else(|| fail(format!("invalid DTEND '{}'", dtend.val.as_str())))?
        } else if let Some(duration) = property(component, "DURATION") {
            let duration = parse_duration(duration.val.as_str())
                .ok_or_else(|| fail(format!("invalid DURATION '{}'", duration.val.as_str())))?;
            add_duration(start, duration)
        } else {
            match start {
                EventTime::AllDay(_) => add_duration(start, Duration::days(1)),
                EventTime::DateTime(_) => add_duration(start, Duration::hours(1)),
            }
        };

        let title = text_property(component, "SUMMARY")
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        let mut event = MasterEvent::new(uid.clone(), title, start, end)
            .with_calendar(calendar.name.clone())
            .with_source(calendar.key())
            .with_zone(zone);

        if let Some(location) = text_property(component, "LOCATION").filter(|l| !l.is_empty()) {
            event = event.with_location(location);
        }
        if let Some(description) = text_property(component, "DESCRIPTION")
            .map(|d| strip_html(&d))
            .filter(|d| !d.is_empty())
        {
            event = event.with_description(description);
        }
        for attendee in properties(component, "ATTENDEE") {
            if let Some(name) = attendee_name(attendee) {
                event = event.with_attendee(name);
            }
        }

        if let Some(rrule) = property(component, "RRULE") {
            let rule: RecurrenceRule = rrule
                .val
                .as_str()
                .parse()
                .map_err(|e| fail(format!("{}", e)))?;
            event = event.with_rrule(rule);
        }

        for exdate in properties(component, "EXDATE") {
            for value in exdate.val.as_str().split(',') {
                match self.parse_value(value, exdate, &mut zone_warning) {
                    Some((time, _)) => event = event.with_exdate(time),
                    None => zone_warning(format!("ignoring invalid EXDATE '{}'", value)),
                }
            }
        }

        let recurrence_id = match property(component, "RECURRENCE-ID") {
            Some(p) => Some(
                self.parse_time(p, &mut zone_warning)
                    .map(|(time, _)| time)
                    .ok_or_else(|| fail(format!("invalid RECURRENCE-ID '{}'", p.val.as_str())))?,
            ),
            None => None,
        };

        trace!(uid = %event.uid, title = %event.title, start = ?event.start, "Parsed event from ICS");
        Ok(ParsedEvent {
            event,
            recurrence_id,
        })
    }

    fn parse_time(
        &self,
        property: &Property<'_>,
        on_warning: &mut impl FnMut(String),
    ) -> Option<(EventTime, Zone)> {
        self.parse_value(property.val.as_str(), property, on_warning)
    }

    /// Parses a date or date-time value using the parameters of `property`.
    fn parse_value(
        &self,
        value: &str,
        property: &Property<'_>,
        on_warning: &mut impl FnMut(String),
    ) -> Option<(EventTime, Zone)> {
        let value = value.trim();
        let is_date = param(property, "VALUE").is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
            || (value.len() == 8 && value.chars().all(|c| c.is_ascii_digit()));

        if is_date {
            let date = NaiveDate::parse_from_str(value, "%Y%m%d").ok()?;
            return Some((EventTime::from_date(date), self.default_zone));
        }

        if let Some(utc) = value.strip_suffix('Z').or_else(|| value.strip_suffix('z')) {
            let naive = parse_naive(utc)?;
            return Some((EventTime::from_utc(naive.and_utc()), Zone::Utc));
        }

        let naive = parse_naive(value)?;
        let zone = match param(property, "TZID") {
            Some(tzid) => {
                let tzid = tzid.trim_start_matches('/');
                match tzid.parse::<Zone>() {
                    Ok(zone) => zone,
                    Err(_) => {
                        on_warning(format!("unknown time zone '{}', using UTC", tzid));
                        Zone::Utc
                    }
                }
            }
            None => self.default_zone,
        };
        Some((EventTime::from_utc(zone.resolve(naive)), zone))
    }
}

fn collect_events<'c, 'a>(components: &'c [Component<'a>], out: &mut Vec<&'c Component<'a>>) {
    for component in components {
        if component.name.as_str().eq_ignore_ascii_case("VEVENT") {
            out.push(component);
        } else {
            collect_events(&component.components, out);
        }
    }
}

fn property<'c, 'a>(component: &'c Component<'a>, name: &'c str) -> Option<&'c Property<'a>> {
    properties(component, name).next()
}

fn properties<'c, 'a>(
    component: &'c Component<'a>,
    name: &'c str,
) -> impl Iterator<Item = &'c Property<'a>> {
    component
        .properties
        .iter()
        .filter(move |p| p.name.as_str().eq_ignore_ascii_case(name))
}

fn param<'c>(property: &'c Property<'_>, key: &str) -> Option<&'c str> {
    property
        .params
        .iter()
        .find(|p| p.key.as_str().eq_ignore_ascii_case(key))
        .and_then(|p| p.val.as_ref())
        .map(|v| v.as_str().trim_matches('"'))
}

fn text_property(component: &Component<'_>, name: &str) -> Option<String> {
    property(component, name).map(|p| unescape_text(p.val.as_str()).trim().to_string())
}

fn attendee_name(property: &Property<'_>) -> Option<String> {
    if let Some(cn) = param(property, "CN").map(str::trim).filter(|cn| !cn.is_empty()) {
        return Some(cn.to_string());
    }
    let value = property.val.as_str().trim();
    let address = match value.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("mailto:") => {
            value.get(7..).unwrap_or_default()
        }
        _ => value,
    };
    (!address.is_empty()).then(|| address.to_string())
}

fn parse_naive(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M"))
        .ok()
}

fn add_duration(start: EventTime, duration: Duration) -> EventTime {
    match start {
        EventTime::AllDay(date) => {
            let days = duration.num_days().max(if duration > Duration::zero() { 1 } else { 0 });
            EventTime::AllDay(calends_core::add_days(date, days))
        }
        EventTime::DateTime(dt) => EventTime::DateTime(dt.checked_add_signed(duration).unwrap_or(dt)),
    }
}

/// Parses an ISO-8601 duration as used by iCalendar (`P1W`, `P1DT2H`, `-PT15M`).
pub fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim();
    let (negative, rest) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let rest = rest.strip_prefix('P').or_else(|| rest.strip_prefix('p'))?;
    if rest.is_empty() {
        return None;
    }

    let mut total: i64 = 0;
    let mut number = String::new();
    let mut in_time = false;
    for c in rest.chars() {
        match c.to_ascii_uppercase() {
            '0'..='9' => number.push(c),
            'T' if number.is_empty() => in_time = true,
            unit => {
                let n: i64 = number.parse().ok()?;
                number.clear();
                let seconds = match (unit, in_time) {
                    ('W', false) => 604_800,
                    ('D', false) => 86_400,
                    ('H', true) => 3_600,
                    ('M', true) => 60,
                    ('S', true) => 1,
                    _ => return None,
                };
                total = total.checked_add(n.checked_mul(seconds)?)?;
            }
        }
    }
    if !number.is_empty() {
        return None;
    }

    Some(Duration::seconds(if negative { -total } else { total }))
}

/// Reverses iCalendar TEXT escaping.
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Removes HTML markup from a description, keeping line breaks.
pub fn strip_html(text: &str) -> String {
    if !text.contains('<') && !text.contains('&') {
        return text.trim().to_string();
    }
    let with_breaks = BREAK_REGEX.replace_all(text, "\n");
    let without_tags = TAG_REGEX.replace_all(&with_breaks, "");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&");
    BLANK_LINES_REGEX
        .replace_all(&decoded, "\n\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Source;
    use calends_core::Frequency;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn calendar() -> CalendarSource {
        CalendarSource::new(Source::Local(PathBuf::from("/cal/work.ics")))
    }

    fn ics(events: &[&[&str]]) -> String {
        let mut lines = vec!["BEGIN:VCALENDAR", "VERSION:2.0", "PRODID:-//calends//test//EN"];
        for event in events {
            lines.push("BEGIN:VEVENT");
            lines.extend_from_slice(event);
            lines.push("END:VEVENT");
        }
        lines.push("END:VCALENDAR");
        let mut text = lines.join("\r\n");
        text.push_str("\r\n");
        text
    }

    fn parse(events: &[&[&str]]) -> ParsedCalendar {
        parse_calendar(&ics(events), &calendar())
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> EventTime {
        EventTime::from_utc(Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap())
    }

    fn date(y: i32, m: u32, d: u32) -> EventTime {
        EventTime::from_date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn parse_basic_event() {
        let parsed = parse(&[&[
            "UID:standup@example.com",
            "SUMMARY:Team Standup",
            "DTSTART:20251020T090000Z",
            "DTEND:20251020T091500Z",
            "LOCATION:Room 1",
        ]]);
        assert!(parsed.warnings.is_empty());
        let event = &parsed.events[0];
        assert_eq!(event.uid, "standup@example.com");
        assert_eq!(event.title, "Team Standup");
        assert_eq!(event.start, utc(2025, 10, 20, 9, 0));
        assert_eq!(event.end, utc(2025, 10, 20, 9, 15));
        assert_eq!(event.location.as_deref(), Some("Room 1"));
        assert_eq!(event.calendar, "work");
        assert_eq!(event.source, "/cal/work.ics");
        assert_eq!(event.zone, Zone::Utc);
    }

    #[test]
    fn parse_all_day_event() {
        let parsed = parse(&[&[
            "UID:offsite",
            "SUMMARY:Offsite",
            "DTSTART;VALUE=DATE:20251023",
            "DTEND;VALUE=DATE:20251026",
        ]]);
        let event = &parsed.events[0];
        assert!(event.is_all_day());
        assert_eq!(event.start, date(2025, 10, 23));
        assert_eq!(event.end, date(2025, 10, 26));
    }

    #[test]
    fn default_durations_and_title() {
        let parsed = parse(&[
            &["UID:a", "DTSTART:20251020T090000Z"],
            &["UID:b", "SUMMARY:Holiday", "DTSTART;VALUE=DATE:20251024"],
        ]);
        assert_eq!(parsed.events[0].title, "Untitled Event");
        assert_eq!(parsed.events[0].end, utc(2025, 10, 20, 10, 0));
        assert_eq!(parsed.events[1].end, date(2025, 10, 25));
    }

    #[test]
    fn duration_property() {
        let parsed = parse(&[&[
            "UID:a",
            "DTSTART:20251020T090000Z",
            "DURATION:PT1H30M",
        ]]);
        assert_eq!(parsed.events[0].end, utc(2025, 10, 20, 10, 30));
    }

    #[test]
    fn tzid_is_resolved() {
        let parsed = parse(&[&[
            "UID:paris",
            "DTSTART;TZID=Europe/Paris:20251020T090000",
            "DTEND;TZID=Europe/Paris:20251020T100000",
        ]]);
        let event = &parsed.events[0];
        assert_eq!(event.start, utc(2025, 10, 20, 7, 0));
        assert_eq!(event.zone, Zone::Named(chrono_tz::Europe::Paris));
    }

    #[test]
    fn unknown_tzid_falls_back_to_utc_with_warning() {
        let parsed = parse(&[&[
            "UID:odd",
            "DTSTART;TZID=Mars/Olympus:20251020T090000",
        ]]);
        assert_eq!(parsed.events.len(), 1);
        assert_eq!(parsed.events[0].start, utc(2025, 10, 20, 9, 0));
        assert_eq!(parsed.warnings.len(), 1);
        assert!(parsed.warnings[0].message.contains("Mars/Olympus"));
    }

    #[test]
    fn floating_times_use_default_zone() {
        let zone: Zone = "+02:00".parse().unwrap();
        let parsed = IcsParser::new(zone).parse(
            &ics(&[&["UID:f", "DTSTART:20251020T090000"]]),
            &calendar(),
        );
        assert_eq!(parsed.events[0].start, utc(2025, 10, 20, 7, 0));
        assert_eq!(parsed.events[0].zone, zone);
    }

    #[test]
    fn description_is_unescaped_and_stripped() {
        let parsed = parse(&[&[
            "UID:d",
            "DTSTART:20251020T090000Z",
            "DESCRIPTION:<p>Agenda<br>Review &amp; plan</p>",
            "SUMMARY:Plan\\, review",
        ]]);
        let event = &parsed.events[0];
        assert_eq!(event.description.as_deref(), Some("Agenda\nReview & plan"));
        assert_eq!(event.title, "Plan, review");
    }

    #[test]
    fn attendees_from_cn_or_mailto() {
        let parsed = parse(&[&[
            "UID:m",
            "DTSTART:20251020T090000Z",
            "ATTENDEE;CN=Alice Smith:mailto:alice@example.com",
            "ATTENDEE:mailto:bob@example.com",
        ]]);
        assert_eq!(
            parsed.events[0].attendees,
            vec!["Alice Smith".to_string(), "bob@example.com".to_string()]
        );
    }

    #[test]
    fn non_ascii_attendee_is_kept() {
        let parsed = parse(&[&[
            "UID:m",
            "DTSTART:20251020T090000Z",
            "ATTENDEE:aaaaaa\u{e9}",
            "ATTENDEE:MAILTO:j\u{f6}rg@example.com",
            "ATTENDEE:\u{e9}",
        ]]);
        assert!(parsed.warnings.is_empty());
        assert_eq!(
            parsed.events[0].attendees,
            vec![
                "aaaaaa\u{e9}".to_string(),
                "j\u{f6}rg@example.com".to_string(),
                "\u{e9}".to_string(),
            ]
        );
    }

    #[test]
    fn rrule_and_exdates() {
        let parsed = parse(&[&[
            "UID:r",
            "DTSTART:20251020T090000Z",
            "RRULE:FREQ=WEEKLY;COUNT=5",
            "EXDATE:20251027T090000Z,20251103T090000Z",
            "EXDATE;VALUE=DATE:20251110",
        ]]);
        let event = &parsed.events[0];
        assert_eq!(
            event.rrule,
            Some(RecurrenceRule::new(Frequency::Weekly).with_count(5))
        );
        assert_eq!(
            event.exdates,
            vec![
                utc(2025, 10, 27, 9, 0),
                utc(2025, 11, 3, 9, 0),
                date(2025, 11, 10)
            ]
        );
    }

    #[test]
    fn recurrence_id_override_excludes_instance() {
        let parsed = parse(&[
            &[
                "UID:weekly",
                "SUMMARY:Sync",
                "DTSTART:20251020T090000Z",
                "RRULE:FREQ=WEEKLY",
            ],
            &[
                "UID:weekly",
                "SUMMARY:Sync (moved)",
                "RECURRENCE-ID:20251027T090000Z",
                "DTSTART:20251028T140000Z",
            ],
        ]);
        assert_eq!(parsed.events.len(), 2);
        assert_eq!(parsed.events[0].exdates, vec![utc(2025, 10, 27, 9, 0)]);
        assert_eq!(parsed.events[1].title, "Sync (moved)");
        assert!(parsed.events[1].rrule.is_none());
    }

    #[test]
    fn malformed_events_are_skipped_with_warnings() {
        let parsed = parse(&[
            &["UID:no-start", "SUMMARY:Nothing"],
            &["UID:bad-rule", "DTSTART:20251020T090000Z", "RRULE:FREQ=DAILY;INTERVAL=0"],
            &["UID:bad-date", "DTSTART:tomorrow"],
            &["UID:ok", "DTSTART:20251020T090000Z"],
        ]);
        assert_eq!(parsed.events.len(), 1);
        assert_eq!(parsed.events[0].uid, "ok");
        let uids: Vec<_> = parsed
            .warnings
            .iter()
            .map(|w| w.uid.clone().unwrap_or_default())
            .collect();
        assert_eq!(uids, vec!["no-start", "bad-rule", "bad-date"]);
        assert!(parsed.warnings[0].to_string().starts_with("work: event no-start"));
    }

    #[test]
    fn missing_uid_is_generated() {
        let parsed = parse(&[&["DTSTART:20251020T090000Z"], &["DTSTART:20251021T090000Z"]]);
        assert_eq!(parsed.events[0].uid, "work-0");
        assert_eq!(parsed.events[1].uid, "work-1");
    }

    #[test]
    fn folded_lines_are_unfolded() {
        let text = ics(&[&[
            "UID:fold",
            "DTSTART:20251020T090000Z",
            "SUMMARY:A very long",
            "  title",
        ]]);
        let parsed = parse_calendar(&text, &calendar());
        assert_eq!(parsed.events[0].title, "A very long title");
    }

    #[test]
    fn duration_parsing() {
        assert_eq!(parse_duration("PT1H"), Some(Duration::hours(1)));
        assert_eq!(parse_duration("P1W"), Some(Duration::weeks(1)));
        assert_eq!(
            parse_duration("P1DT2H30M"),
            Some(Duration::days(1) + Duration::hours(2) + Duration::minutes(30))
        );
        assert_eq!(parse_duration("-PT15M"), Some(Duration::minutes(-15)));
        assert_eq!(parse_duration("P"), None);
        assert_eq!(parse_duration("PT5"), None);
        assert_eq!(parse_duration("P1H"), None);
        assert_eq!(parse_duration("1H"), None);
    }

    #[test]
    fn strip_html_plain_text_untouched() {
        assert_eq!(strip_html("  just text "), "just text");
        assert_eq!(strip_html("a &lt;b&gt;"), "a <b>");
    }

    #[test]
    fn into_calendar_events_keeps_name_and_key() {
        let parsed = parse(&[&["UID:x", "DTSTART:20251020T090000Z"]]);
        let (events, warnings) = parsed.into_calendar_events(&calendar());
        assert_eq!(events.name, "work");
        assert_eq!(events.source, "/cal/work.ics");
        assert_eq!(events.len(), 1);
        assert!(warnings.is_empty());
    }
}
