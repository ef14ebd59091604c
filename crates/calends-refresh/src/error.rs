//! Refresh error types.

use calends_providers::FetchError;
use thiserror::Error;

/// Result type for refresh operations.
pub type RefreshResult<T> = Result<T, RefreshError>;

/// Errors that end a refresh cycle without a new week.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// Nothing to fetch.
    #[error("no calendar sources configured")]
    NoSources,

    /// Every source failed.
    #[error("could not load any calendar: {0}")]
    TotalFailure(FetchError),

    /// The controller is no longer running.
    #[error("refresh controller stopped")]
    Stopped,
}

impl RefreshError {
    /// Returns true for the failures that leave nothing to display.
    pub fn is_total_failure(&self) -> bool {
        matches!(self, Self::NoSources | Self::TotalFailure(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_failure_display_includes_cause() {
        let err = RefreshError::TotalFailure(FetchError::network("all 1 sources failed"));
        assert!(err.is_total_failure());
        assert_eq!(
            err.to_string(),
            "could not load any calendar: network_error: all 1 sources failed"
        );
        assert!(!RefreshError::Stopped.is_total_failure());
    }
}
