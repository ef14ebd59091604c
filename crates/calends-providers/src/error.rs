//! Error types for fetching calendar sources.
//!
//! A [`FetchError`] is reported per source; one failing source never fails
//! the others.

use std::fmt;
use thiserror::Error;

/// The category of a fetch error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorCode {
    /// The source text is neither a usable path nor a supported URL.
    InvalidSource,
    /// Local file or cache I/O failed.
    Io,
    /// Connection failed, DNS resolution, TLS, etc.
    Network,
    /// The request or the whole fetch cycle ran out of time.
    Timeout,
    /// The resource does not exist (missing file, HTTP 404).
    NotFound,
    /// The server answered with a client error status (4xx).
    HttpStatus,
    /// The server answered with a server error status (5xx).
    ServerError,
    /// The body could not be decoded as text.
    InvalidResponse,
    /// Unexpected internal state.
    Internal,
}

impl FetchErrorCode {
    /// Returns true if a later cycle may succeed without configuration changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::ServerError)
    }

    /// Returns a short name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidSource => "invalid_source",
            Self::Io => "io_error",
            Self::Network => "network_error",
            Self::Timeout => "timeout",
            Self::NotFound => "not_found",
            Self::HttpStatus => "http_status",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::Internal => "internal_error",
        }
    }
}

impl fmt::Display for FetchErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error that occurred while fetching one calendar source.
#[derive(Debug, Error)]
pub struct FetchError {
    code: FetchErrorCode,
    message: String,
    /// Identity of the failing source, if known.
    source_key: Option<String>,
    /// HTTP status, for status errors.
    status: Option<u16>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl FetchError {
    /// Creates a new fetch error with the given code and message.
    pub fn new(code: FetchErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source_key: None,
            status: None,
            source: None,
        }
    }

    pub fn invalid_source(message: impl Into<String>) -> Self {
        Self::new(FetchErrorCode::InvalidSource, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(FetchErrorCode::Io, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FetchErrorCode::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FetchErrorCode::Timeout, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FetchErrorCode::NotFound, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(FetchErrorCode::InvalidResponse, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FetchErrorCode::Internal, message)
    }

    /// Creates an error from an unexpected HTTP status.
    pub fn http_status(status: u16, reason: impl Into<String>) -> Self {
        let code = match status {
            404 | 410 => FetchErrorCode::NotFound,
            500..=599 => FetchErrorCode::ServerError,
            _ => FetchErrorCode::HttpStatus,
        };
        let mut err = Self::new(code, format!("HTTP {}: {}", status, reason.into()));
        err.status = Some(status);
        err
    }

    /// Sets the source identity for this error.
    pub fn with_source_key(mut self, key: impl Into<String>) -> Self {
        self.source_key = Some(key.into());
        self
    }

    /// Sets the underlying error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> FetchErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_key(&self) -> Option<&str> {
        self.source_key.as_deref()
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns true if this error is transient and may be retried.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref key) = self.source_key {
            write!(f, "[{}] ", key)?;
        }
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => FetchErrorCode::NotFound,
            std::io::ErrorKind::TimedOut => FetchErrorCode::Timeout,
            _ => FetchErrorCode::Io,
        };
        Self::new(code, err.to_string()).with_source(err)
    }
}

/// A specialized Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_retryable() {
        assert!(FetchErrorCode::Network.is_retryable());
        assert!(FetchErrorCode::Timeout.is_retryable());
        assert!(FetchErrorCode::ServerError.is_retryable());
        assert!(!FetchErrorCode::NotFound.is_retryable());
        assert!(!FetchErrorCode::InvalidSource.is_retryable());
    }

    #[test]
    fn http_status_classification() {
        assert_eq!(
            FetchError::http_status(404, "Not Found").code(),
            FetchErrorCode::NotFound
        );
        assert_eq!(
            FetchError::http_status(503, "Service Unavailable").code(),
            FetchErrorCode::ServerError
        );
        let err = FetchError::http_status(403, "Forbidden");
        assert_eq!(err.code(), FetchErrorCode::HttpStatus);
        assert_eq!(err.status(), Some(403));
        assert!(!err.is_retryable());
    }

    #[test]
    fn display_includes_source_key() {
        let err = FetchError::network("connection refused")
            .with_source_key("https://example.com/cal.ics");
        let display = err.to_string();
        assert!(display.contains("[https://example.com/cal.ics]"));
        assert!(display.contains("network_error"));
        assert!(display.contains("connection refused"));
    }

    #[test]
    fn from_io_error() {
        use std::error::Error;

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = FetchError::from(io);
        assert_eq!(err.code(), FetchErrorCode::NotFound);
        assert!(err.source().is_some());
    }
}
