//! Client error types.

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in client operations.
///
/// Transport failures are not errors at this level: they surface as
/// [`crate::ApiOutcome`] variants. These variants cover responses that
/// could not be turned into a result and invalid local setup.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("fetch failed for {what}: {reason}")]
    FetchFailed { what: String, reason: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("field conflict while flattening: {0}")]
    FieldConflict(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub(crate) fn fetch_failed(what: impl Into<String>, reason: impl Into<String>) -> Self {
        ClientError::FetchFailed {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error came from the service response rather than
    /// from local configuration.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ClientError::FetchFailed { .. }
                | ClientError::Malformed(_)
                | ClientError::FieldConflict(_)
        )
    }
}
