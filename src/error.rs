//! Error taxonomy shared by the explorer client, the ledger store and the engine.
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

/// Everything that can go wrong while syncing transfers.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport failure or non-2xx answer from the explorer.
    #[error("upstream request failed: {message}")]
    Upstream {
        /// HTTP status, when the request got that far.
        status: Option<u16>,
        /// Human readable cause.
        message: String,
    },

    /// Every attempt of a retried operation failed; carries the last failure.
    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetryExhausted {
        /// Label of the retried operation.
        operation: String,
        /// Number of attempts made.
        attempts: u32,
        /// Error returned by the final attempt.
        #[source]
        last: Box<SyncError>,
    },

    /// The explorer answered, but not with the envelope we expect.
    #[error("malformed explorer response: {0}")]
    MalformedResponse(String),

    /// A transfer entry carried a field that does not parse.
    #[error("invalid `{field}` in transfer {hash}: {reason}")]
    InvalidField {
        /// Transaction hash of the offending entry.
        hash: String,
        /// Upstream field name.
        field: &'static str,
        /// Parse failure detail.
        reason: String,
    },

    /// The ledger store rejected a read or write.
    #[error("ledger store error: {0}")]
    Persistence(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    /// Wrap a store-side `anyhow` chain, keeping every context layer in the message.
    pub fn persistence(err: anyhow::Error) -> Self {
        SyncError::Persistence(format!("{err:#}"))
    }

    /// Build an [`SyncError::Upstream`] without a status code.
    pub fn upstream(message: impl Into<String>) -> Self {
        SyncError::Upstream {
            status: None,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Upstream {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
