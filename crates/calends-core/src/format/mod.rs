//! Terminal formatting for week grids.
//!
//! [`WeekFormatter`] turns a [`WeekGrid`] into the text printed by the
//! one-shot view and redrawn by the interactive one:
//!
//! ```text
//! ================================================================================
//! Week 43, October 2025
//! ================================================================================
//!
//! Monday, Oct 20
//! --------------------------------------------------------------------------------
//!   09:00 - 09:15  Standup
//!                    ⚲ Room 1
//! ```

use std::borrow::Cow;

use chrono::{DateTime, Utc};

use crate::split::SegmentSpan;
use crate::time::Zone;
use crate::week::{GridEntry, TemporalClass, WeekGrid};


const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const REVERSE: &str = "\x1b[7m";
const GREEN: &str = "\x1b[92m";
const YELLOW: &str = "\x1b[93m";
const BLUE: &str = "\x1b[94m";
const CYAN: &str = "\x1b[96m";
const WHITE: &str = "\x1b[97m";

const CONTINUATION: &str = "…";

/// Configuration options for week formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    /// Emit ANSI colour codes.
    pub color: bool,
    /// Width of the `=` and `-` rules.
    pub rule_width: usize,
    /// Maximum length of the location line.
    pub location_width: usize,
    /// Show the calendar name next to each entry. `None` shows it when the
    /// week holds entries from more than one calendar.
    pub show_calendar: Option<bool>,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            color: true,
            rule_width: 80,
            location_width: 60,
            show_calendar: None,
        }
    }
}

impl FormatOptions {
    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    #[must_use]
    pub fn with_show_calendar(mut self, show: bool) -> Self {
        self.show_calendar = Some(show);
        self
    }
}

/// Formatter for week grids.
#[derive(Debug, Clone)]
pub struct WeekFormatter {
    options: FormatOptions,
}

impl WeekFormatter {
    /// Creates a new WeekFormatter with the given options.
    pub fn new(options: FormatOptions) -> Self {
        Self { options }
    }

    /// Creates a new WeekFormatter with default options.
    pub fn with_defaults() -> Self {
        Self::new(FormatOptions::default())
    }

    pub fn options(&self) -> &FormatOptions {
        &self.options
    }

    /// Formats the week with its footer and the given extra warnings.
    pub fn format_week(&self, grid: &WeekGrid, warnings: &[String]) -> String {
        self.format_week_selected(grid, warnings, None)
    }

    /// Formats the week, highlighting the entry at `selected` (an index into
    /// [`WeekGrid::entries`]) and appending its details.
    pub fn format_week_selected(
        &self,
        grid: &WeekGrid,
        warnings: &[String],
        selected: Option<usize>,
    ) -> String {
        let rule = "=".repeat(self.options.rule_width);
        let thin_rule = "-".repeat(self.options.rule_width);
        let show_calendar = self
            .options
            .show_calendar
            .unwrap_or_else(|| grid.calendar_count() > 1);
        let today = grid.zone.today(grid.now);

        let mut lines = vec![
            String::new(),
            self.paint(&rule, &[BOLD]),
            self.paint(
                &format!(
                    "Week {}, {}",
                    grid.week_number(),
                    grid.monday.format("%B %Y")
                ),
                &[BOLD, CYAN],
            ),
            self.paint(&rule, &[BOLD]),
        ];

        let mut index = 0;
        for day in &grid.days {
            let color = if day.date == today {
                GREEN
            } else if day.date < today {
                DIM
            } else {
                WHITE
            };
            lines.push(String::new());
            lines.push(self.paint(&day.date.format("%A, %b %d").to_string(), &[BOLD, color]));
            lines.push(self.paint(&thin_rule, &[DIM]));

            if day.is_empty() {
                lines.push(self.paint("  No events", &[DIM]));
            }
            for entry in &day.entries {
                let is_selected = selected == Some(index);
                lines.push(self.format_entry(entry, show_calendar, is_selected));
                if let Some(location) = entry
                    .segment
                    .occurrence
                    .event
                    .location
                    .as_deref()
                    .filter(|l| !l.is_empty())
                {
                    lines.push(self.paint(
                        &format!(
                            "                   ⚲ {}",
                            ellipsis(location, self.options.location_width)
                        ),
                        &[CYAN],
                    ));
                }
                index += 1;
            }
        }

        lines.push(String::new());
        lines.push(self.paint(&rule, &[BOLD]));
        lines.push(self.paint(
            &format!("Total events: {}", grid.total_entries()),
            &[BOLD],
        ));

        let all_warnings: Vec<String> = grid
            .warnings
            .iter()
            .map(ToString::to_string)
            .chain(warnings.iter().cloned())
            .collect();
        if !all_warnings.is_empty() {
            lines.push(String::new());
            lines.push(self.paint("Warnings:", &[BOLD, YELLOW]));
            for warning in &all_warnings {
                lines.push(self.paint(&format!("  ! {}", warning), &[YELLOW]));
            }
        }

        if let Some(entry) = selected.and_then(|i| grid.entries().nth(i)) {
            lines.push(String::new());
            lines.push(self.paint(&thin_rule, &[DIM]));
            lines.push(self.format_details(entry, &grid.zone));
        }

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    /// Formats a single entry line.
    pub fn format_entry(&self, entry: &GridEntry, show_calendar: bool, selected: bool) -> String {
        let time_range = match entry.segment.span {
            SegmentSpan::AllDay => "All day".to_string(),
            SegmentSpan::Timed { start, end } => format!("{} - {}", start, end),
        };

        let mut title = String::new();
        if entry.segment.continues_from_previous {
            title.push_str(CONTINUATION);
            title.push(' ');
        }
        title.push_str(entry.title());
        if entry.segment.continues_to_next {
            title.push(' ');
            title.push_str(CONTINUATION);
        }
        if show_calendar && !entry.calendar().is_empty() {
            title.push_str(&format!(" [{}]", entry.calendar()));
        }

        let marker = if selected { "> " } else { "  " };
        let line = format!("{}{:<15}{}", marker, time_range, title);

        let mut codes = vec![match entry.class {
            TemporalClass::Past => DIM,
            TemporalClass::Ongoing => YELLOW,
            TemporalClass::Future => BLUE,
        }];
        if entry.class == TemporalClass::Ongoing {
            codes.push(BOLD);
        }
        if selected {
            codes.push(REVERSE);
        }
        self.paint(&line, &codes)
    }

    /// Formats the details panel for an entry.
    pub fn format_details(&self, entry: &GridEntry, zone: &Zone) -> String {
        let occurrence = &entry.segment.occurrence;
        let event = &occurrence.event;

        let when = match (occurrence.start.as_datetime(), occurrence.end.as_datetime()) {
            (Some(start), Some(end)) => format!(
                "{} - {}",
                format_instant(*start, zone),
                format_instant(*end, zone)
            ),
            _ => {
                let first = occurrence.start.date_in(zone);
                let days = (occurrence.end.date_in(zone) - first).num_days();
                if days > 1 {
                    format!("{} (all day, {} days)", first.format("%a %b %d"), days)
                } else {
                    format!("{} (all day)", first.format("%a %b %d"))
                }
            }
        };

        let mut lines = vec![
            self.paint(entry.title(), &[BOLD]),
            format!("  When:        {}", when),
        ];
        if !event.calendar.is_empty() {
            lines.push(format!("  Calendar:    {}", event.calendar));
        }
        if let Some(location) = event.location.as_deref().filter(|l| !l.is_empty()) {
            lines.push(format!("  Location:    {}", location));
        }
        if !event.attendees.is_empty() {
            lines.push(format!("  Attendees:   {}", event.attendees.join(", ")));
        }
        if let Some(description) = event.description.as_deref().filter(|d| !d.is_empty()) {
            lines.push("  Description:".to_string());
            lines.extend(description.lines().map(|l| format!("    {}", l)));
        }
        lines.join("\n")
    }

    fn paint(&self, text: &str, codes: &[&str]) -> String {
        if !self.options.color || codes.is_empty() {
            return text.to_string();
        }
        format!("{}{}{}", codes.concat(), text, RESET)
    }
}

fn format_instant(instant: DateTime<Utc>, zone: &Zone) -> String {
    zone.naive_local(instant)
        .format("%a %b %d %H:%M")
        .to_string()
}

/// Truncates a string with ellipsis if it exceeds the given length.
pub fn ellipsis(s: &str, max_len: usize) -> Cow<'_, str> {
    if max_len == 0 {
        return Cow::Borrowed("");
    }
    if s.chars().count() <= max_len {
        return Cow::Borrowed(s);
    }
    let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
    Cow::Owned(format!("{}...", truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod ellipsis_tests {
        use super::*;

        #[test]
        fn short_string_unchanged() {
            assert_eq!(ellipsis("Room 4", 60), "Room 4");
        }

        #[test]
        fn long_string_truncated() {
            assert_eq!(ellipsis("Building 12, floor 3", 10), "Buildin...");
        }

        #[test]
        fn counts_characters_not_bytes() {
            assert_eq!(ellipsis("Zürich Hauptbahnhof", 19), "Zürich Hauptbahnhof");
        }

        #[test]
        fn zero_length() {
            assert_eq!(ellipsis("hello", 0), "");
        }
    }

    #[test]
    fn paint_respects_color_flag() {
        let plain = WeekFormatter::new(FormatOptions::default().with_color(false));
        assert_eq!(plain.paint("x", &[BOLD]), "x");

        let colored = WeekFormatter::with_defaults();
        assert_eq!(colored.paint("x", &[BOLD, CYAN]), "\x1b[1m\x1b[96mx\x1b[0m");
    }
}
