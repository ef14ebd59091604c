//! Core types: time, events, recurrence expansion, week assembly, formatting

pub mod error;
pub mod event;
pub mod expand;
pub mod format;
pub mod rrule;
pub mod split;
pub mod time;
pub mod tracing;
pub mod week;

pub use error::{CoreError, CoreResult};
pub use event::{CalendarEvents, MasterEvent};
pub use expand::{Occurrence, expand};
pub use format::{FormatOptions, WeekFormatter, ellipsis};
pub use rrule::{Frequency, RecurrenceRule, Until};
pub use split::{DaySegment, DayTime, SegmentSpan, split};
pub use time::{EventTime, InvalidZone, TimeWindow, Zone, add_days, monday_of};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, TracingSink, init_tracing};
pub use week::{AssemblyWarning, DayBucket, GridEntry, TemporalClass, WeekGrid, assemble};
