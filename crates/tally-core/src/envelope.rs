//! Wire and snapshot envelope.
//!
//! ```json
//! { "id": "Alloc", "type": "gauge", "value": 12.5 }
//! { "id": "PollCount", "type": "counter", "delta": 3 }
//! ```
//!
//! Exactly one of `delta`/`value` is present and it matches `type`. The same
//! shape is used for agent batches, server responses, file snapshots, and
//! database rows.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{Counter, Gauge, MetricKind, MetricValue};

/// One metric as it travels on the wire or sits in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub id: String,
    #[serde(rename = "type")]
    pub mtype: MetricKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl Metrics {
    pub fn gauge(id: impl Into<String>, value: Gauge) -> Self {
        Self {
            id: id.into(),
            mtype: MetricKind::Gauge,
            delta: None,
            value: Some(value.0),
        }
    }

    pub fn counter(id: impl Into<String>, delta: Counter) -> Self {
        Self {
            id: id.into(),
            mtype: MetricKind::Counter,
            delta: Some(delta.0),
            value: None,
        }
    }

    /// Validate the envelope and turn it into a typed update.
    pub fn into_update(self) -> CoreResult<Update> {
        if self.id.is_empty() {
            return Err(CoreError::EmptyName);
        }
        match self.mtype {
            MetricKind::Gauge => {
                if self.delta.is_some() {
                    return Err(self.unexpected("delta"));
                }
                let value = self.value.ok_or_else(|| self.missing("value"))?;
                if !value.is_finite() {
                    return Err(CoreError::InvalidValue {
                        kind: MetricKind::Gauge,
                        value: value.to_string(),
                    });
                }
                Ok(Update::Gauge {
                    name: self.id,
                    value: Gauge(value),
                })
            }
            MetricKind::Counter => {
                if self.value.is_some() {
                    return Err(self.unexpected("value"));
                }
                let delta = self.delta.ok_or_else(|| self.missing("delta"))?;
                Ok(Update::Counter {
                    name: self.id,
                    delta: Counter(delta),
                })
            }
        }
    }

    fn missing(&self, field: &'static str) -> CoreError {
        CoreError::MissingField {
            id: self.id.clone(),
            kind: self.mtype,
            field,
        }
    }

    fn unexpected(&self, field: &'static str) -> CoreError {
        CoreError::UnexpectedField {
            id: self.id.clone(),
            kind: self.mtype,
            field,
        }
    }
}

/// A validated metric update, ready to apply to a store.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Overwrite the gauge.
    Gauge { name: String, value: Gauge },
    /// Add `delta` to the counter's running total.
    Counter { name: String, delta: Counter },
}

impl Update {
    /// Build an update from the path-encoded form `/update/{kind}/{name}/{value}`.
    pub fn from_text(kind: &str, name: &str, value: &str) -> CoreResult<Self> {
        let kind: MetricKind = kind.parse()?;
        if name.is_empty() {
            return Err(CoreError::EmptyName);
        }
        let name = name.to_string();
        match kind {
            MetricKind::Gauge => Ok(Self::Gauge {
                name,
                value: Gauge::parse_text(value)?,
            }),
            MetricKind::Counter => Ok(Self::Counter {
                name,
                delta: Counter::parse_text(value)?,
            }),
        }
    }
}
