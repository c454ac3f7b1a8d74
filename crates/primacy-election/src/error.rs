//! Election error types.

use std::time::Duration;

use thiserror::Error;

/// Failure reported by a group directory or instance registry.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Errors that can end an election round early.
///
/// These never cross the scheduler boundary; they decide whether a round
/// replaces the cached verdict.
#[derive(Debug, Error)]
pub enum ElectionError {
    #[error("{query} failed: {source}")]
    Transient {
        query: &'static str,
        #[source]
        source: RemoteError,
    },

    #[error("{query} timed out after {after:?}")]
    Timeout { query: &'static str, after: Duration },
}

pub type ElectionResult<T> = Result<T, ElectionError>;
