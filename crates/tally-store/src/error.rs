//! Error types for stores, backends, and the operator.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for persistence operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures surfaced by loads, saves, and database startup.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The selected backend cannot perform the requested operation.
    #[error("unsupported backend configuration: {0}")]
    Unsupported(String),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode metrics: {0}")]
    Encode(String),

    #[error("failed to decode persisted metrics: {0}")]
    Decode(String),

    #[error("database unreachable during {op}: {message}")]
    Connection { op: &'static str, message: String },

    #[error("database error during {op}: {message}")]
    Database { op: &'static str, message: String },

    #[error("database {op} timed out after {millis}ms")]
    Timeout { op: &'static str, millis: u128 },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }

    pub(crate) fn db(op: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |e| match e {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                Self::Connection {
                    op,
                    message: e.to_string(),
                }
            }
            other => Self::Database {
                op,
                message: other.to_string(),
            },
        }
    }

    /// True for connection-level failures worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}
