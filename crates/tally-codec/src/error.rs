//! Codec error types.

use thiserror::Error;

pub type CodecResult<T> = Result<T, CodecError>;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("gzip error: {0}")]
    Gzip(#[from] std::io::Error),

    #[error("inflated body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed {header} header")]
    MalformedHash { header: &'static str },

    #[error("body signature mismatch")]
    HashMismatch,
}
