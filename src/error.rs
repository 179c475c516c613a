//! Error types for the preen core.

use std::time::Duration;
use thiserror::Error;

/// Main error type for the preen library.
#[derive(Debug, Error)]
pub enum Error {
    /// Message text was empty after trimming.
    #[error("message text is empty")]
    EmptyInput,

    /// A new session could not be created in the store.
    #[error("failed to create a conversation session")]
    SessionCreation,

    /// A store write failed mid-operation.
    #[error("failed to persist conversation state")]
    Persistence,

    /// The remote model call returned a non-success status.
    #[error("model request failed: HTTP {status}: {body}")]
    RemoteCall { status: u16, body: String },

    /// The response stream carried an error frame or broke mid-read.
    #[error("model stream error: {0}")]
    Stream(String),

    /// A 2xx response was missing required fields or carried garbage.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A request exceeded its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The video service rejected creation because of its concurrent-session cap.
    #[error("video service is at its concurrent session limit")]
    ConcurrencyLimit,

    /// Another send is already in flight.
    #[error("a chat turn is already in flight")]
    Busy,

    /// Could not reach the remote endpoint at all.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Configuration file error.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON encode/decode error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the preen library.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Map a reqwest transport error, distinguishing deadline expiry so
    /// callers can offer a retry for timeouts specifically.
    pub(crate) fn from_transport(err: reqwest::Error, deadline: Duration) -> Self {
        if err.is_timeout() {
            Error::Timeout(deadline)
        } else {
            Error::Connection(err.to_string())
        }
    }
}
