//! Error types for the streaming core, payload ingestion and history fetches.
//!
//! None of these cross the stream client's public boundary as a `Result`:
//! stream failures are reported through the observer, payload and fetch
//! failures become transient notices in the dashboard.

use thiserror::Error;

/// Failures reported by a stream client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// No credential was available when a connection was about to be made.
    #[error("missing authentication credential")]
    MissingCredential,

    /// Open, send or receive failed on the underlying connection.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Consecutive failures used up the retry budget.
    #[error("gave up reconnecting after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// `connect()` was called outside a tokio runtime.
    #[error("no async runtime available to drive the connection")]
    Runtime,
}

/// A received payload that could not be turned into a metric point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// Not valid JSON.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// Valid JSON, but not shaped like a metric point.
    #[error("payload does not match the metric schema: {0}")]
    Schema(String),
}

impl From<serde_json::Error> for PayloadError {
    fn from(err: serde_json::Error) -> Self {
        match err.classify() {
            serde_json::error::Category::Data => PayloadError::Schema(err.to_string()),
            _ => PayloadError::Malformed(err.to_string()),
        }
    }
}

/// Errors from the historical metrics endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("server returned status {0}")]
    Status(u16),

    /// Failed to parse response.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Timeout waiting for response.
    #[error("request timed out")]
    Timeout,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() {
            FetchError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Http(err.to_string())
        }
    }
}
