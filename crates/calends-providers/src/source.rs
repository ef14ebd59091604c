//! Calendar sources: local files and remote URLs.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::error::{FetchError, FetchResult};

/// Where a calendar's content lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    /// An absolute path to an `.ics` file, read on every fetch.
    Local(PathBuf),
    /// An `http(s)` URL, fetched through the cache.
    Remote(Url),
}

impl Source {
    /// Parses a source string, resolving relative paths against the
    /// current directory.
    ///
    /// `webcal://` and `webcals://` map to `http://` and `https://`.
    pub fn parse(text: &str) -> FetchResult<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| FetchError::io("cannot determine current directory").with_source(e))?;
        Self::parse_relative_to(text, &cwd)
    }

    /// Parses a source string, resolving relative paths against `base`.
    pub fn parse_relative_to(text: &str, base: &Path) -> FetchResult<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FetchError::invalid_source("empty source"));
        }

        let lower = text.to_ascii_lowercase();
        let remote = if lower.starts_with("http://") || lower.starts_with("https://") {
            Some(text.to_string())
        } else if lower.starts_with("webcals://") {
            Some(format!("https://{}", &text["webcals://".len()..]))
        } else if lower.starts_with("webcal://") {
            Some(format!("http://{}", &text["webcal://".len()..]))
        } else {
            None
        };

        if let Some(remote) = remote {
            let url = Url::parse(&remote).map_err(|e| {
                FetchError::invalid_source(format!("invalid URL '{}'", text)).with_source(e)
            })?;
            if url.host_str().is_none() {
                return Err(FetchError::invalid_source(format!("URL without host '{}'", text)));
            }
            return Ok(Self::Remote(url));
        }

        if lower.contains("://") {
            return Err(FetchError::invalid_source(format!(
                "unsupported scheme in '{}'",
                text
            )));
        }

        Ok(Self::Local(absolutize(&expand_home(text), base)))
    }

    /// Returns the normalized identity used as cache key and in reports.
    pub fn key(&self) -> String {
        match self {
            Self::Local(path) => path.display().to_string(),
            Self::Remote(url) => url.as_str().to_string(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Returns a display name derived from the source itself.
    ///
    /// File stem for paths; last non-empty path segment (without extension)
    /// or host for URLs.
    pub fn default_name(&self) -> String {
        match self {
            Self::Local(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Self::Remote(url) => url
                .path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
                .map(|segment| {
                    Path::new(segment)
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_else(|| segment.to_string())
                })
                .or_else(|| url.host_str().map(str::to_string))
                .unwrap_or_else(|| url.to_string()),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// A source together with the name shown for its events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalendarSource {
    pub name: String,
    pub source: Source,
}

impl CalendarSource {
    /// Creates a calendar source named after the source itself.
    pub fn new(source: Source) -> Self {
        Self {
            name: source.default_name(),
            source,
        }
    }

    /// Parses `text` into a calendar source with an optional alias.
    pub fn parse(text: &str, alias: Option<&str>) -> FetchResult<Self> {
        let source = Self::new(Source::parse(text)?);
        Ok(match alias.filter(|a| !a.trim().is_empty()) {
            Some(alias) => source.with_name(alias.trim()),
            None => source,
        })
    }

    /// Builder method to set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn key(&self) -> String {
        self.source.key()
    }
}

fn expand_home(text: &str) -> PathBuf {
    if let Some(rest) = text.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(text)
}

/// Makes `path` absolute against `base` and removes `.` and `..` lexically.
fn absolutize(path: &Path, base: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
