//! Validation errors for metric values and envelopes.

use thiserror::Error;

use crate::types::MetricKind;

/// Result type alias for validation operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// A metric update or query that cannot be accepted as-is.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("unknown metric type {0:?}, expected \"gauge\" or \"counter\"")]
    UnknownKind(String),

    #[error("invalid {kind} value {value:?}")]
    InvalidValue { kind: MetricKind, value: String },

    #[error("metric name must not be empty")]
    EmptyName,

    #[error("{kind} metric {id:?} is missing the {field:?} field")]
    MissingField {
        id: String,
        kind: MetricKind,
        field: &'static str,
    },

    #[error("{kind} metric {id:?} must not carry the {field:?} field")]
    UnexpectedField {
        id: String,
        kind: MetricKind,
        field: &'static str,
    },
}
