//! One refresh cycle: fetch, parse, assemble.

use std::sync::Arc;

use calends_core::{CalendarEvents, WeekGrid, Zone, assemble};
use calends_providers::{CalendarSource, Fetcher, IcsParser};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

use crate::error::{RefreshError, RefreshResult};

/// An assembled week ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekSnapshot {
    pub grid: WeekGrid,
    /// Source and parse warnings. Assembly warnings live in the grid.
    pub warnings: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl WeekSnapshot {
    pub fn new(grid: WeekGrid, warnings: Vec<String>, generated_at: DateTime<Utc>) -> Self {
        Self {
            grid,
            warnings,
            generated_at,
        }
    }
}

/// Parsed calendars of one fetch, with the warnings gathered on the way.
#[derive(Debug, Clone, Default)]
pub struct LoadedCalendars {
    pub calendars: Vec<CalendarEvents>,
    pub warnings: Vec<String>,
}

/// Runs fetch, parse and assembly for a fixed set of sources.
#[derive(Debug)]
pub struct Pipeline {
    fetcher: Arc<Fetcher>,
    sources: Vec<CalendarSource>,
    parser: IcsParser,
    zone: Zone,
}

impl Pipeline {
    /// Creates a pipeline displaying in `zone`.
    ///
    /// Floating times in the calendars are read in the same zone.
    pub fn new(fetcher: Fetcher, sources: Vec<CalendarSource>, zone: Zone) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            sources,
            parser: IcsParser::new(zone),
            zone,
        }
    }

    pub fn sources(&self) -> &[CalendarSource] {
        &self.sources
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Fetches and parses every source.
    ///
    /// Failing sources become warnings; only a total failure is an error.
    pub async fn load(&self) -> RefreshResult<LoadedCalendars> {
        if self.sources.is_empty() {
            return Err(RefreshError::NoSources);
        }

        let report = self
            .fetcher
            .fetch_all(&self.sources)
            .await
            .map_err(RefreshError::TotalFailure)?;

        let mut loaded = LoadedCalendars::default();
        for source in &report.sources {
            match &source.result {
                Ok(fetched) => {
                    let parsed = self.parser.parse(&fetched.payload, &source.calendar);
                    debug!(
                        calendar = %source.calendar.name,
                        origin = ?fetched.origin,
                        events = parsed.events.len(),
                        "Loaded calendar"
                    );
                    let (events, warnings) = parsed.into_calendar_events(&source.calendar);
                    loaded
                        .warnings
                        .extend(warnings.iter().map(ToString::to_string));
                    loaded.calendars.push(events);
                }
                Err(err) => loaded
                    .warnings
                    .push(format!("{}: {}", source.calendar.name, err)),
            }
        }
        Ok(loaded)
    }

    /// Assembles the week containing `week` from already loaded calendars.
    pub fn assemble(&self, loaded: &LoadedCalendars, week: NaiveDate, now: DateTime<Utc>) -> WeekSnapshot {
        let grid = assemble(week, &loaded.calendars, now, &self.zone);
        info!(
            week = %grid.monday,
            entries = grid.total_entries(),
            warnings = loaded.warnings.len() + grid.warnings.len(),
            "Assembled week"
        );
        WeekSnapshot::new(grid, loaded.warnings.clone(), now)
    }

    /// Runs a full cycle for the week containing `week`.
    pub async fn run(&self, week: NaiveDate) -> RefreshResult<WeekSnapshot> {
        let loaded = self.load().await?;
        Ok(self.assemble(&loaded, week, self.fetcher.store().now()))
    }
}
