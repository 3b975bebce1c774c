//! tally-codec — what happens to a metric batch between the JSON encoder and
//! the socket.
//!
//! ```text
//! agent:  Vec<Metrics> ─json─▶ bytes ─gzip─▶ body ─hmac─▶ HashSHA256 header
//! server: body ─verify─▶ ─gunzip─▶ bytes ─json─▶ Vec<Metrics>
//! ```
//!
//! Each transform is a plain function over byte slices so the agent's HTTP
//! client and the server's middleware share one implementation.

pub mod error;
pub mod gzip;
pub mod hash;
pub mod json;

pub use error::{CodecError, CodecResult};
pub use hash::{HASH_HEADER, Signer};
