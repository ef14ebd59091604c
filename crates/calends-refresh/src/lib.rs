//! Refresh pipeline and controller for calends.
//!
//! - [`Pipeline`] runs one cycle: fetch every source, parse, assemble a week
//! - [`RefreshController`] repeats cycles in the background and publishes
//!   each [`WeekSnapshot`] on a watch channel for the interactive view
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use calends_core::Zone;
//! use calends_providers::{CacheStore, CalendarSource, Fetcher, HttpConfig, HttpTransport};
//! use calends_refresh::Pipeline;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = CacheStore::open("/tmp/calends-cache")?;
//!     let transport = Arc::new(HttpTransport::new(HttpConfig::default())?);
//!     let sources = vec![CalendarSource::parse("https://example.com/work.ics", None)?];
//!     let pipeline = Pipeline::new(Fetcher::new(store, transport), sources, Zone::Local);
//!
//!     let today = chrono::Local::now().date_naive();
//!     let snapshot = pipeline.run(today).await?;
//!     println!("{} events", snapshot.grid.total_entries());
//!     Ok(())
//! }
//! ```

mod config;
mod controller;
mod error;
mod pipeline;

pub use config::{RefreshConfig, default_cache_dir};
pub use controller::{RefreshCommand, RefreshController, RefreshHandle, RefreshPhase, RefreshStatus};
pub use error::{RefreshError, RefreshResult};
pub use pipeline::{LoadedCalendars, Pipeline, WeekSnapshot};
