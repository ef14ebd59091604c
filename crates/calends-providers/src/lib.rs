//! Calendar sources for calends.
//!
//! This crate turns configured sources into parsed events:
//!
//! - [`Source`] / [`CalendarSource`] - Local paths and remote URLs with display names
//! - [`Transport`] - The network seam, implemented by [`HttpTransport`]
//! - [`CacheStore`] - On-disk payload cache with TTL and validators
//! - [`Fetcher`] - Concurrent, cache-aware fetching of every source
//! - [`IcsParser`] - iCalendar text to [`calends_core::MasterEvent`]s
//!
//! # Architecture
//!
//! ```text
//!  CalendarSource ──► Fetcher ──► (Local file | CacheStore ─► Transport)
//!                        │
//!                        ▼ payload
//!                    IcsParser ──► ParsedCalendar { events, warnings }
//! ```

pub mod cache;
pub mod error;
pub mod fetcher;
pub mod ics;
pub mod source;
pub mod transport;

pub use cache::{
    CacheEntry, CacheError, CacheResult, CacheStats, CacheStore, Clock, DEFAULT_TTL, fingerprint,
    system_clock,
};
pub use error::{FetchError, FetchErrorCode, FetchResult};
pub use fetcher::{FetchOrigin, FetchReport, FetchedSource, Fetcher, FetcherConfig, SourceReport};
pub use ics::{IcsParser, ParseWarning, ParsedCalendar, parse_calendar, parse_duration, strip_html};
pub use source::{CalendarSource, Source};
pub use transport::{
    BoxFuture, HttpConfig, HttpTransport, Transport, TransportResponse, Validators,
};
