//! Metric value kinds.
//!
//! A `Gauge` is a point-in-time reading that is overwritten on every
//! update. A `Counter` is a running total that only grows by deltas. Both
//! render to the canonical text form used by the path-encoded API and the
//! HTML listing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::envelope::Metrics;
use crate::error::{CoreError, CoreResult};

/// Discriminator carried in the `type` field of every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Counter => "counter",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "gauge" => Ok(Self::Gauge),
            "counter" => Ok(Self::Counter),
            other => Err(CoreError::UnknownKind(other.to_string())),
        }
    }
}

/// Point-in-time floating point reading. Last write wins.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gauge(pub f64);

/// Monotonic running total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Counter(pub i64);

impl Counter {
    /// Add a delta to the running total, saturating at the i64 bounds.
    pub fn add(self, delta: Counter) -> Counter {
        Counter(self.0.saturating_add(delta.0))
    }
}

impl fmt::Display for Gauge {
    /// Shortest decimal form with no exponent and no trailing zeros.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Gauge {}
    impl Sealed for super::Counter {}
}

/// The closed set of values a keyed store can hold.
pub trait MetricValue:
    sealed::Sealed + Copy + PartialEq + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    const KIND: MetricKind;

    /// Parse the canonical text form (as found in `/update/{type}/{name}/{value}`).
    fn parse_text(raw: &str) -> CoreResult<Self>;

    /// Wrap this value into a wire envelope.
    fn to_envelope(self, id: &str) -> Metrics;
}

impl MetricValue for Gauge {
    const KIND: MetricKind = MetricKind::Gauge;

    fn parse_text(raw: &str) -> CoreResult<Self> {
        match raw.trim().parse::<f64>() {
            // JSON has no representation for NaN or infinities.
            Ok(v) if v.is_finite() => Ok(Gauge(v)),
            _ => Err(CoreError::InvalidValue {
                kind: Self::KIND,
                value: raw.to_string(),
            }),
        }
    }

    fn to_envelope(self, id: &str) -> Metrics {
        Metrics::gauge(id, self)
    }
}

impl MetricValue for Counter {
    const KIND: MetricKind = MetricKind::Counter;

    fn parse_text(raw: &str) -> CoreResult<Self> {
        raw.trim()
            .parse::<i64>()
            .map(Counter)
            .map_err(|_| CoreError::InvalidValue {
                kind: Self::KIND,
                value: raw.to_string(),
            })
    }

    fn to_envelope(self, id: &str) -> Metrics {
        Metrics::counter(id, self)
    }
}
