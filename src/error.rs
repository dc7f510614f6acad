//! Error types for search-batch
//!
//! Two layers of errors live here:
//! - [`ServiceError`] describes a single failed call against the remote search
//!   service. These never abort a batch; the dispatcher turns them into job
//!   state transitions.
//! - [`Error`] is the crate-wide error type used for startup, configuration
//!   and local I/O.

use thiserror::Error;

use crate::types::{SearchId, Status};

/// Result type alias for search-batch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for search-batch
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key or input column that caused the error
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be constructed
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Job not present in the registry
    #[error("job not found: {0}")]
    NotFound(String),

    /// A job with the same title is already registered
    #[error("duplicate job title: {0}")]
    Duplicate(String),

    /// Attempted lifecycle move out of a terminal state or skipping a step
    #[error("job '{title}' cannot move from {from} to {to}")]
    InvalidTransition {
        /// Job title
        title: String,
        /// Current state
        from: Status,
        /// Requested state
        to: Status,
    },
}

impl Error {
    /// Shorthand for a configuration error bound to a specific key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Failure of a single remote search service operation.
///
/// Transport failures and error responses from the service map to the same
/// variant for each operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// The service did not create the search job
    #[error("submission of '{title}' failed: {reason}")]
    SubmissionFailed {
        /// Title of the job that was rejected
        title: String,
        /// Why the submission failed (status code, transport error, bad body)
        reason: String,
    },

    /// Status query failed or returned no matching entry
    #[error("status poll for search {sid} failed: {reason}")]
    PollFailed {
        /// Remote search id that was polled
        sid: SearchId,
        /// Why the poll failed
        reason: String,
    },

    /// Results could not be retrieved
    #[error("result fetch for search {sid} failed: {reason}")]
    FetchFailed {
        /// Remote search id whose results were requested
        sid: SearchId,
        /// Why the fetch failed
        reason: String,
    },
}
