//! Service error types.

use thiserror::Error;

/// Errors from the credential-scoped client cache.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A field the credential's kind requires is missing. Not retried.
    #[error("{credential} is missing required field `{field}`")]
    Configuration {
        credential: String,
        field: &'static str,
    },

    /// The factory failed to build a client. Not cached; the next lookup
    /// tries again.
    #[error("failed to construct client for {credential}: {source}")]
    Construction {
        credential: String,
        #[source]
        source: anyhow::Error,
    },
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by `ExternalServices` operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed caller arguments, rejected before any network attempt.
    #[error("invalid input: {0}")]
    Validation(String),

    #[error(transparent)]
    Client(#[from] ClientError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
