//! Reporter transport errors.

use std::time::Duration;

use thiserror::Error;

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to encode batch: {0}")]
    Encode(#[from] tally_codec::CodecError),

    #[error("connection to {address} failed: {message}")]
    Connect { address: String, message: String },

    #[error("request failed: {0}")]
    Request(String),

    #[error("server answered {status}")]
    Status { status: u16 },

    #[error("no response within {0:?}")]
    Timeout(Duration),
}

impl TransportError {
    /// Whether another attempt in the same cycle may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Encode(_))
    }
}
