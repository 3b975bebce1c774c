//! Reporter — ships the local stores to the server on a fixed interval.
//!
//! A cycle that still fails after the last retry is dropped; the next cycle
//! sends the then-current values. Nothing is buffered across cycles.

use std::sync::Arc;
use std::time::Duration;

use tally_core::{Backoff, Counter, Gauge, Metrics};
use tally_store::KeyedStore;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{TransportError, TransportResult};
use crate::transport::Transport;

pub struct Reporter<T: Transport> {
    transport: T,
    gauges: Arc<KeyedStore<Gauge>>,
    counters: Arc<KeyedStore<Counter>>,
    backoff: Backoff,
}

impl<T: Transport> Reporter<T> {
    pub fn new(
        transport: T,
        gauges: Arc<KeyedStore<Gauge>>,
        counters: Arc<KeyedStore<Counter>>,
        backoff: Backoff,
    ) -> Self {
        Self {
            transport,
            gauges,
            counters,
            backoff,
        }
    }

    /// Current gauges followed by the counters, each ordered by name.
    pub fn batch(&self) -> Vec<Metrics> {
        let gauges = self.gauges.get_all();
        let counters = self.counters.get_all();
        let mut batch = Vec::with_capacity(gauges.len() + counters.len());
        batch.extend(gauges.into_iter().map(|(name, v)| Metrics::gauge(name, v)));
        batch.extend(counters.into_iter().map(|(name, v)| Metrics::counter(name, v)));
        batch
    }

    /// Send one batch, retrying per the backoff policy.
    pub async fn report_once(&self) -> TransportResult<usize> {
        let batch = self.batch();
        if batch.is_empty() {
            debug!("nothing sampled yet, skipping report");
            return Ok(0);
        }
        self.backoff
            .retry(
                "report",
                || self.transport.send(&batch),
                TransportError::is_retryable,
            )
            .await?;
        Ok(batch.len())
    }

    /// Report every `interval` until `shutdown` fires.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), "reporter started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    match self.report_once().await {
                        Ok(sent) => debug!(sent, "report cycle done"),
                        Err(e) => warn!(error = %e, "report dropped after retries"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("reporter shutting down");
                    break;
                }
            }
        }
    }
}
