//! Error taxonomy shared by the transport, the query cache and mutations.
//!
//! Every failure surfaced to a consumer is a [`QueryError`]. Transport errors
//! pass through the cache unchanged so the message a user sees is the one the
//! server (or the transport) produced.

use thiserror::Error;

/// Error type for query and mutation operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The request never reached the server or no response came back.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The server responded with a 4xx/5xx status.
    ///
    /// `message` is already normalized for display.
    #[error("{message}")]
    HttpError { status: u16, message: String },

    /// Client-side validation failed before any request was sent.
    #[error("Validation failed: {0}")]
    ValidationError(String),

    /// The response could not be decoded, or the fetcher itself failed.
    #[error("Fetch failed: {0}")]
    FetchError(String),
}

impl QueryError {
    /// Returns the HTTP status for server rejections.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if retrying the same request could succeed.
    ///
    /// Validation failures and 4xx rejections are deterministic.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::NetworkError(_) => true,
            Self::HttpError { status, .. } => *status >= 500,
            Self::ValidationError(_) | Self::FetchError(_) => false,
        }
    }
}

/// Non-fatal signal that the data being shown is not fresh.
///
/// Produced by [`QueryResult::warning`](crate::query::QueryResult::warning)
/// while cached data is served during a refetch, or after a refetch failed
/// and the last known good data is still displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleDataWarning {
    /// The failure of the most recent refetch, if it failed.
    pub error: Option<QueryError>,
}

impl std::fmt::Display for StaleDataWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error {
            Some(err) => write!(f, "Showing cached data; refresh failed: {err}"),
            None => f.write_str("Showing cached data while refreshing"),
        }
    }
}
