//! services/client/src/error.rs
//!
//! Defines the primary error type for the client service.

use crate::config::ConfigError;
use taskflow_core::domain::{RecordId, ValidationError};
use taskflow_core::ports::PortError;

/// The primary error type for the `client` service.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server could not be reached or no response came back.
    #[error("Could not reach the server: {0}")]
    Network(String),

    /// The server answered with a non-2xx status.
    #[error("Server rejected the request ({status}): {body}")]
    Status { status: u16, body: String },

    /// The server answered 2xx but the body did not have the expected shape.
    #[error("Malformed response: {0}")]
    Decode(String),

    /// The server accepted the request but returned an error payload.
    #[error("Request was not applied: {message}")]
    Rejected { message: String },

    /// A delete affected a number of rows other than exactly one.
    #[error("Delete was not applied ({rows_affected} rows affected)")]
    DeleteNotApplied { rows_affected: u64 },

    /// Client-side validation failed; nothing was sent.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Record {0} is not in the local collection")]
    NotFound(RecordId),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The session was ended (logout or failed refresh) while this request
    /// was waiting on a refresh.
    #[error("The session ended before the request could be retried")]
    SessionEnded,

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// A convenience type alias for `Result<T, ClientError>`.
pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<PortError> for ClientError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Network(msg) => Self::Network(msg),
            PortError::InvalidRequest(msg) | PortError::Unexpected(msg) => Self::Internal(msg),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
