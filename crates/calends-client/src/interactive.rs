//! Interactive week browser.
//!
//! Runs on a blocking thread. Keys move between weeks and entries; the
//! refresh controller publishes new snapshots in the background and the
//! screen is redrawn when one arrives.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use calends_core::{WeekFormatter, WeekGrid, Zone, add_days};
use calends_refresh::{RefreshHandle, RefreshPhase, RefreshStatus, WeekSnapshot};
use chrono::{DateTime, NaiveDate, Utc};
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode,
    enable_raw_mode,
};
use crossterm::{execute, queue};
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

const HELP: &str = "\
Keys
  n, →, space   next week
  p, ←          previous week
  t             current week
  j, ↓          next entry
  k, ↑          previous entry
  r             refresh now
  h, ?          toggle this help
  q, Esc        quit";

/// What a key press asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    NextWeek,
    PreviousWeek,
    CurrentWeek,
    SelectNext,
    SelectPrevious,
    Refresh,
    ToggleHelp,
    Quit,
}

/// Maps a key press to an action.
pub fn key_action(key: &KeyEvent) -> Option<KeyAction> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(KeyAction::Quit),
            _ => None,
        };
    }
    match key.code {
        KeyCode::Char('n') | KeyCode::Right | KeyCode::Char(' ') => Some(KeyAction::NextWeek),
        KeyCode::Char('p') | KeyCode::Left => Some(KeyAction::PreviousWeek),
        KeyCode::Char('t') => Some(KeyAction::CurrentWeek),
        KeyCode::Char('j') | KeyCode::Down => Some(KeyAction::SelectNext),
        KeyCode::Char('k') | KeyCode::Up => Some(KeyAction::SelectPrevious),
        KeyCode::Char('r') => Some(KeyAction::Refresh),
        KeyCode::Char('h') | KeyCode::Char('?') => Some(KeyAction::ToggleHelp),
        KeyCode::Char('q') | KeyCode::Esc => Some(KeyAction::Quit),
        _ => None,
    }
}

/// Identity of an entry across snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EntryKey {
    uid: String,
    date: NaiveDate,
    start: DateTime<Utc>,
}

impl EntryKey {
    fn at(grid: &WeekGrid, index: usize) -> Option<Self> {
        grid.entries().nth(index).map(|entry| Self {
            uid: entry.uid().to_string(),
            date: entry.segment.date,
            start: entry.segment.occurrence.start.to_utc_datetime(),
        })
    }

    fn matches(&self, grid: &WeekGrid) -> Option<usize> {
        grid.entries().position(|entry| {
            entry.uid() == self.uid
                && entry.segment.date == self.date
                && entry.segment.occurrence.start.to_utc_datetime() == self.start
        })
    }
}

/// Finds `previous` in the new grid, else clamps `index` to its entries.
fn restore_selection(
    grid: &WeekGrid,
    previous: Option<&EntryKey>,
    index: Option<usize>,
) -> Option<usize> {
    let len = grid.total_entries();
    if len == 0 {
        return None;
    }
    previous
        .and_then(|key| key.matches(grid))
        .or_else(|| index.map(|i| i.min(len - 1)))
}

/// View state independent of the terminal.
#[derive(Debug)]
struct ViewState {
    handle: RefreshHandle,
    formatter: WeekFormatter,
    zone: Zone,
    snapshot: Option<Arc<WeekSnapshot>>,
    selected: Option<usize>,
    selected_key: Option<EntryKey>,
    show_help: bool,
}

impl ViewState {
    fn new(handle: RefreshHandle, formatter: WeekFormatter, zone: Zone) -> Self {
        let snapshot = handle.snapshot();
        Self {
            handle,
            formatter,
            zone,
            snapshot,
            selected: None,
            selected_key: None,
            show_help: false,
        }
    }

    /// Picks up the latest snapshot, keeping the selection where possible.
    fn sync(&mut self) {
        let latest = self.handle.snapshot();
        let same = match (&latest, &self.snapshot) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        if same {
            return;
        }
        self.snapshot = latest;
        self.selected = self.snapshot.as_ref().and_then(|snapshot| {
            restore_selection(&snapshot.grid, self.selected_key.as_ref(), self.selected)
        });
        self.remember_selection();
    }

    fn remember_selection(&mut self) {
        self.selected_key = match (&self.snapshot, self.selected) {
            (Some(snapshot), Some(index)) => EntryKey::at(&snapshot.grid, index),
            _ => None,
        };
    }

    /// Applies an action. Returns false when the view should close.
    fn apply(&mut self, action: KeyAction, now: DateTime<Utc>) -> bool {
        match action {
            KeyAction::NextWeek => self.move_to_week(add_days(self.handle.week(), 7)),
            KeyAction::PreviousWeek => self.move_to_week(add_days(self.handle.week(), -7)),
            KeyAction::CurrentWeek => self.move_to_week(self.zone.today(now)),
            KeyAction::SelectNext => self.move_selection(1),
            KeyAction::SelectPrevious => self.move_selection(-1),
            KeyAction::Refresh => {
                if let Err(e) = self.handle.try_refresh() {
                    warn!(error = %e, "Refresh request failed");
                }
            }
            KeyAction::ToggleHelp => self.show_help = !self.show_help,
            KeyAction::Quit => return false,
        }
        true
    }

    fn move_to_week(&mut self, date: NaiveDate) {
        if self.handle.set_week(date) {
            debug!(week = %self.handle.week(), "Selected week");
            self.selected = None;
            self.selected_key = None;
        }
    }

    fn move_selection(&mut self, step: isize) {
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        let len = snapshot.grid.total_entries();
        if len == 0 {
            return;
        }
        self.selected = Some(match self.selected {
            None if step > 0 => 0,
            None => len - 1,
            Some(index) => index.saturating_add_signed(step).min(len - 1),
        });
        self.remember_selection();
    }

    /// Renders the whole screen.
    fn render(&self, now: DateTime<Utc>) -> String {
        let status = self.handle.status();
        let week = self.handle.week();

        let body = if self.show_help {
            HELP.to_string()
        } else {
            match &self.snapshot {
                None => "Loading calendars…\n".to_string(),
                Some(snapshot) => {
                    let mut text = self.formatter.format_week_selected(
                        &snapshot.grid,
                        &snapshot.warnings,
                        self.selected,
                    );
                    if snapshot.grid.monday != week {
                        text.push_str(&format!("\nLoading week of {}…\n", week.format("%b %d")));
                    }
                    text
                }
            }
        };

        let mut screen = body;
        if !screen.ends_with('\n') {
            screen.push('\n');
        }
        screen.push('\n');
        screen.push_str(&status_line(&status, &self.zone, now));
        screen.replace('\n', "\r\n")
    }
}

/// Formats the controller status for the bottom line.
fn status_line(status: &RefreshStatus, zone: &Zone, now: DateTime<Utc>) -> String {
    let mut parts = vec![format!("[{}]", status.phase.as_str())];
    if let Some(at) = status.last_success {
        let age = (now - at).num_minutes();
        parts.push(format!(
            "updated {} ({} min ago)",
            zone.naive_local(at).format("%H:%M"),
            age.max(0)
        ));
    }
    if status.phase == RefreshPhase::Error
        && let Some(error) = &status.last_error
    {
        parts.push(format!("error: {}", error));
    }
    parts.push("h: help, q: quit".to_string());
    parts.join("  ")
}

/// Restores the terminal when dropped.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let guard = Self;
        execute!(io::stdout(), EnterAlternateScreen, Hide)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = execute!(io::stdout(), Show, LeaveAlternateScreen) {
            warn!(error = %e, "Failed to leave alternate screen");
        }
        if let Err(e) = disable_raw_mode() {
            warn!(error = %e, "Failed to disable raw mode");
        }
    }
}

fn draw(out: &mut impl Write, screen: &str) -> io::Result<()> {
    queue!(out, MoveTo(0, 0), Clear(ClearType::All))?;
    out.write_all(screen.as_bytes())?;
    out.flush()
}

/// Runs the interactive view until the user quits.
pub fn run(handle: RefreshHandle, formatter: WeekFormatter, zone: Zone) -> io::Result<()> {
    let _guard = TerminalGuard::enter()?;
    let mut stdout = io::stdout();
    let mut watcher = handle.clone();
    let mut state = ViewState::new(handle, formatter, zone);
    info!(week = %state.handle.week(), "Interactive view started");

    draw(&mut stdout, &state.render(Utc::now()))?;
    loop {
        let mut dirty = false;

        if event::poll(POLL_INTERVAL)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if let Some(action) = key_action(&key) {
                        if !state.apply(action, Utc::now()) {
                            break;
                        }
                        dirty = true;
                    }
                }
                Event::Resize(..) => dirty = true,
                _ => {}
            }
        }

        if watcher.take_changed() {
            state.sync();
            dirty = true;
        }

        if dirty {
            draw(&mut stdout, &state.render(Utc::now()))?;
        }
    }

    debug!("Interactive view closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calends_core::{CalendarEvents, EventTime, FormatOptions, MasterEvent, assemble};
    use calends_refresh::{RefreshConfig, RefreshController};
    use chrono::TimeZone;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 22, 12, 0, 0).unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 20).unwrap()
    }

    fn event(uid: &str, day: u32, hour: u32) -> MasterEvent {
        let start = Utc.with_ymd_and_hms(2025, 10, day, hour, 0, 0).unwrap();
        MasterEvent::new(
            uid,
            uid,
            EventTime::from_utc(start),
            EventTime::from_utc(start + chrono::Duration::minutes(30)),
        )
    }

    fn grid(uids: &[(&str, u32, u32)]) -> WeekGrid {
        let calendar = uids
            .iter()
            .fold(CalendarEvents::new("/cal/work.ics", "work"), |calendar, (uid, day, hour)| {
                calendar.with_event(event(uid, *day, *hour))
            });
        assemble(monday(), &[calendar], now(), &Zone::Utc)
    }

    fn state() -> ViewState {
        let controller = RefreshController::new(RefreshConfig::default(), monday());
        ViewState::new(
            controller.handle(),
            WeekFormatter::new(FormatOptions::default().with_color(false)),
            Zone::Utc,
        )
    }

    fn with_snapshot(state: &mut ViewState, grid: WeekGrid) {
        state.snapshot = Some(Arc::new(WeekSnapshot::new(grid, Vec::new(), now())));
    }

    #[test]
    fn keys_map_to_actions() {
        let cases = [
            (KeyCode::Char('n'), KeyAction::NextWeek),
            (KeyCode::Right, KeyAction::NextWeek),
            (KeyCode::Char(' '), KeyAction::NextWeek),
            (KeyCode::Char('p'), KeyAction::PreviousWeek),
            (KeyCode::Left, KeyAction::PreviousWeek),
            (KeyCode::Char('t'), KeyAction::CurrentWeek),
            (KeyCode::Char('j'), KeyAction::SelectNext),
            (KeyCode::Down, KeyAction::SelectNext),
            (KeyCode::Char('k'), KeyAction::SelectPrevious),
            (KeyCode::Up, KeyAction::SelectPrevious),
            (KeyCode::Char('r'), KeyAction::Refresh),
            (KeyCode::Char('h'), KeyAction::ToggleHelp),
            (KeyCode::Char('?'), KeyAction::ToggleHelp),
            (KeyCode::Char('q'), KeyAction::Quit),
            (KeyCode::Esc, KeyAction::Quit),
        ];
        for (code, action) in cases {
            assert_eq!(key_action(&press(code)), Some(action), "{:?}", code);
        }
        assert_eq!(key_action(&press(KeyCode::Char('x'))), None);
        assert_eq!(
            key_action(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(KeyAction::Quit)
        );
        assert_eq!(
            key_action(&KeyEvent::new(KeyCode::Char('n'), KeyModifiers::CONTROL)),
            None
        );
    }

    #[test]
    fn selection_follows_entry_identity() {
        let before = grid(&[("a", 20, 9), ("b", 21, 9), ("c", 22, 9)]);
        let key = EntryKey::at(&before, 1).unwrap();
        assert_eq!(key.uid, "b");

        let after = grid(&[("new", 20, 8), ("a", 20, 9), ("b", 21, 9), ("c", 22, 9)]);
        assert_eq!(restore_selection(&after, Some(&key), Some(1)), Some(2));
    }

    #[test]
    fn selection_clamps_when_entry_disappears() {
        let key = EntryKey::at(&grid(&[("a", 20, 9), ("b", 21, 9), ("c", 22, 9)]), 2).unwrap();
        let after = grid(&[("a", 20, 9)]);
        assert_eq!(restore_selection(&after, Some(&key), Some(2)), Some(0));
        assert_eq!(restore_selection(&grid(&[]), Some(&key), Some(2)), None);
        assert_eq!(restore_selection(&after, None, None), None);
    }

    #[test]
    fn selection_moves_within_bounds() {
        let mut state = state();
        with_snapshot(&mut state, grid(&[("a", 20, 9), ("b", 21, 9)]));

        state.apply(KeyAction::SelectPrevious, now());
        assert_eq!(state.selected, Some(1));
        state.apply(KeyAction::SelectNext, now());
        assert_eq!(state.selected, Some(1));
        state.apply(KeyAction::SelectPrevious, now());
        state.apply(KeyAction::SelectPrevious, now());
        assert_eq!(state.selected, Some(0));
        assert_eq!(state.selected_key.as_ref().map(|k| k.uid.as_str()), Some("a"));
    }

    #[test]
    fn week_navigation_resets_selection() {
        let mut state = state();
        with_snapshot(&mut state, grid(&[("a", 20, 9)]));
        state.apply(KeyAction::SelectNext, now());
        assert_eq!(state.selected, Some(0));

        assert!(state.apply(KeyAction::NextWeek, now()));
        assert_eq!(state.handle.week(), NaiveDate::from_ymd_opt(2025, 10, 27).unwrap());
        assert_eq!(state.selected, None);

        state.apply(KeyAction::PreviousWeek, now());
        state.apply(KeyAction::PreviousWeek, now());
        assert_eq!(state.handle.week(), NaiveDate::from_ymd_opt(2025, 10, 13).unwrap());

        state.apply(KeyAction::CurrentWeek, now());
        assert_eq!(state.handle.week(), monday());
        assert!(!state.apply(KeyAction::Quit, now()));
    }

    #[test]
    fn render_shows_loading_help_and_status() {
        let mut state = state();
        let screen = state.render(now());
        assert!(screen.starts_with("Loading calendars…\r\n"));
        assert_eq!(screen, "Loading calendars…\r\n\r\n[idle]  h: help, q: quit");
        assert!(!screen.replace("\r\n", "").contains('\n'));

        state.apply(KeyAction::ToggleHelp, now());
        assert!(state.render(now()).contains("refresh now"));
        state.apply(KeyAction::ToggleHelp, now());

        with_snapshot(&mut state, grid(&[("a", 20, 9)]));
        state.apply(KeyAction::SelectNext, now());
        let screen = state.render(now());
        assert!(screen.contains("> 09:00 - 09:30  a"));
        assert!(screen.contains("Total events: 1"));

        state.apply(KeyAction::NextWeek, now());
        assert!(state.render(now()).contains("Loading week of Oct 27…"));
    }

    #[test]
    fn status_line_reports_age_and_errors() {
        let status = RefreshStatus {
            phase: RefreshPhase::Error,
            last_success: Some(now() - chrono::Duration::minutes(5)),
            last_error: Some("could not load any calendar: offline".into()),
            consecutive_failures: 1,
            cycles: 2,
        };
        let line = status_line(&status, &Zone::Utc, now());
        assert!(line.starts_with("[error]  updated 11:55 (5 min ago)"));
        assert!(line.contains("error: could not load any calendar: offline"));
    }
}
