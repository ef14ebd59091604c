//! Client error types.

use std::fmt;

use calends_core::TracingError;
use calends_providers::{CacheError, FetchError};
use calends_refresh::RefreshError;

use crate::config::ConfigError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// A calendar source could not be understood.
    Source(String),
    /// No calendar could be loaded.
    Refresh(RefreshError),
    /// Cache store error.
    Cache(CacheError),
    /// Logging setup failed.
    Logging(String),
    /// Terminal handling failed.
    Terminal(std::io::Error),
    /// IO error.
    Io(std::io::Error),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Source(msg) => write!(f, "invalid calendar source: {}", msg),
            Self::Refresh(err) => write!(f, "{}", err),
            Self::Cache(err) => write!(f, "cache error: {}", err),
            Self::Logging(msg) => write!(f, "logging setup failed: {}", msg),
            Self::Terminal(err) => write!(f, "terminal error: {}", err),
            Self::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Refresh(err) => Some(err),
            Self::Cache(err) => Some(err),
            Self::Terminal(err) | Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ConfigError> for ClientError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<RefreshError> for ClientError {
    fn from(err: RefreshError) -> Self {
        Self::Refresh(err)
    }
}

impl From<CacheError> for ClientError {
    fn from(err: CacheError) -> Self {
        Self::Cache(err)
    }
}

impl From<FetchError> for ClientError {
    fn from(err: FetchError) -> Self {
        Self::Source(err.message().to_string())
    }
}

impl From<TracingError> for ClientError {
    fn from(err: TracingError) -> Self {
        Self::Logging(err.to_string())
    }
}
