//! tally-core — shared vocabulary for the tally metrics pipeline.
//!
//! Defines the two metric value kinds (`Gauge`, `Counter`), the JSON wire
//! envelope (`Metrics`) exchanged between agent and server and written to
//! snapshots, the validated `Update` a server applies, and the linear
//! `Backoff` policy used by every retrying caller.

pub mod backoff;
pub mod envelope;
pub mod error;
pub mod types;

pub use backoff::Backoff;
pub use envelope::{Metrics, Update};
pub use error::{CoreError, CoreResult};
pub use types::{Counter, Gauge, MetricKind, MetricValue};
