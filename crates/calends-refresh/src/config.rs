//! Refresh configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Refresh controller configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Time between background cycles, also the retry delay after a total
    /// failure. Zero disables background refresh.
    pub interval: Duration,

    /// Capacity of the command channel.
    pub command_buffer: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            command_buffer: 16,
        }
    }
}

impl RefreshConfig {
    /// Creates a configuration with the given interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Builder: set the refresh interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Returns true if cycles run on a timer.
    pub fn is_periodic(&self) -> bool {
        !self.interval.is_zero()
    }
}

/// Returns the default cache directory.
///
/// Uses `$XDG_CACHE_HOME/calends` (or the platform equivalent), falling back
/// to a directory under the system temp dir.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("calends"))
        .unwrap_or_else(|| std::env::temp_dir().join("calends-cache"))
}
