//! Client configuration.
//!
//! Settings are read from one file, in this order:
//! - the file given with `--config`
//! - `calendars.json` or `calends.json` in the current directory, when no
//!   sources are given on the command line
//! - `~/.config/calends/config.toml`
//!
//! Files ending in `.json` are parsed as JSON, anything else as TOML. The
//! `calendars` key is either a list of sources or a table mapping display
//! names to sources.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use calends_core::Zone;
use calends_providers::{CalendarSource, FetcherConfig, Source};
use calends_refresh::{RefreshConfig, default_cache_dir};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON files picked up from the current directory.
pub const DISCOVERED_FILES: [&str; 2] = ["calendars.json", "calends.json"];

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid '{key}': {message}")]
    Invalid { key: &'static str, message: String },
}

impl ConfigError {
    fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            message: message.into(),
        }
    }
}

/// Calendar sources, plain or keyed by display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CalendarList {
    Sources(Vec<String>),
    Named(BTreeMap<String, String>),
}

impl CalendarList {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Sources(sources) => sources.is_empty(),
            Self::Named(named) => named.is_empty(),
        }
    }

    /// Returns `(source, alias)` pairs.
    pub fn entries(&self) -> Vec<(&str, Option<&str>)> {
        match self {
            Self::Sources(sources) => sources.iter().map(|s| (s.as_str(), None)).collect(),
            Self::Named(named) => named
                .iter()
                .map(|(alias, source)| (source.as_str(), Some(alias.as_str())))
                .collect(),
        }
    }
}

/// Configuration for the calends client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Display timezone: `UTC`, `GMT`, `LOCAL`, `±HH:MM` or an IANA name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    /// Seconds a downloaded calendar stays fresh.
    pub cache_expiration: i64,

    /// Seconds between background refreshes in interactive mode, 0 disables.
    pub refresh_interval: i64,

    /// Maximum number of remote calendars fetched at once.
    pub max_concurrent_fetches: i64,

    /// Seconds allowed for a whole fetch cycle.
    pub fetch_timeout: i64,

    /// Send conditional requests when the server provided validators.
    pub conditional_requests: bool,

    /// Cache directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendars: Option<CalendarList>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timezone: None,
            cache_expiration: 3600,
            refresh_interval: 300,
            max_concurrent_fetches: 4,
            fetch_timeout: 30,
            conditional_requests: true,
            cache_dir: None,
            calendars: None,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    /// Parses `content`, choosing the format from the extension of `path`.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            serde_json::from_str(content).map_err(|e| e.to_string())
        } else {
            toml::from_str(content).map_err(|e| e.to_string())
        };
        parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Returns the first discoverable JSON file in `dir`.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        DISCOVERED_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calends")
    }

    /// Checks every value, naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.calendars.as_ref().is_some_and(CalendarList::is_empty) {
            return Err(ConfigError::invalid("calendars", "must not be empty"));
        }
        if let Some(CalendarList::Named(named)) = &self.calendars
            && let Some((alias, _)) = named.iter().find(|(_, source)| source.trim().is_empty())
        {
            return Err(ConfigError::invalid(
                "calendars",
                format!("source for '{}' is empty", alias),
            ));
        }
        non_negative("cache_expiration", self.cache_expiration)?;
        non_negative("refresh_interval", self.refresh_interval)?;
        non_negative("fetch_timeout", self.fetch_timeout)?;
        if self.max_concurrent_fetches < 1 {
            return Err(ConfigError::invalid(
                "max_concurrent_fetches",
                format!("must be at least 1, got {}", self.max_concurrent_fetches),
            ));
        }
        self.zone()?;
        Ok(())
    }

    /// Resolves the display zone. Defaults to the local zone.
    pub fn zone(&self) -> Result<Zone, ConfigError> {
        match self.timezone.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(text) => text
                .parse()
                .map_err(|e: calends_core::InvalidZone| ConfigError::invalid("timezone", e.to_string())),
            None => Ok(Zone::Local),
        }
    }

    /// Builds the configured calendar sources, resolving relative paths
    /// against `base`.
    pub fn calendar_sources(&self, base: &Path) -> Result<Vec<CalendarSource>, ConfigError> {
        let Some(calendars) = &self.calendars else {
            return Ok(Vec::new());
        };
        calendars
            .entries()
            .into_iter()
            .map(|(text, alias)| {
                let source = Source::parse_relative_to(text, base)
                    .map_err(|e| ConfigError::invalid("calendars", e.message().to_string()))?;
                let calendar = CalendarSource::new(source);
                Ok(match alias {
                    Some(alias) => calendar.with_name(alias),
                    None => calendar,
                })
            })
            .collect()
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig::default()
            .with_ttl(seconds(self.cache_expiration))
            .with_timeout(seconds(self.fetch_timeout))
            .with_max_concurrent(self.max_concurrent_fetches.max(1) as usize)
            .with_conditional(self.conditional_requests)
    }

    pub fn refresh_config(&self) -> RefreshConfig {
        RefreshConfig::new(seconds(self.refresh_interval))
    }

    /// Returns the configured cache directory or the platform default.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }
}

fn non_negative(key: &'static str, value: i64) -> Result<(), ConfigError> {
    if value < 0 {
        return Err(ConfigError::invalid(
            key,
            format!("must be non-negative, got {}", value),
        ));
    }
    Ok(())
}

fn seconds(value: i64) -> Duration {
    Duration::from_secs(value.max(0) as u64)
}
