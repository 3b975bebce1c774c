//! Operator — coordinates the two in-memory stores with the durable backend.
//!
//! One operator exists per server process; the composition root creates it
//! and hands an `Arc<Operator>` to everything that needs it (HTTP handlers,
//! the flush loop, the shutdown path).
//!
//! Lifecycle: open → (restore) → serve updates → flush on interval →
//! final flush on shutdown.

use std::time::Duration;

use tally_core::{Counter, Gauge, MetricKind, MetricValue, Metrics, Update};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info};

use crate::backend::{Backend, BackendConfig};
use crate::db::DbOptions;
use crate::error::{StoreError, StoreResult};
use crate::keyed::KeyedStore;

pub struct Operator {
    gauges: KeyedStore<Gauge>,
    counters: KeyedStore<Counter>,
    backend: Backend,
    /// Held for the duration of a flush so flushes never overlap.
    flush_lock: Mutex<()>,
}

impl Operator {
    /// Create an operator with empty, initialized stores.
    pub fn new(backend: Backend) -> Self {
        let operator = Self {
            gauges: KeyedStore::new(),
            counters: KeyedStore::new(),
            backend,
            flush_lock: Mutex::new(()),
        };
        operator.gauges.init();
        operator.counters.init();
        operator
    }

    /// Open the configured backend and, if `restore` is set and the backend
    /// is durable, load the last snapshot into the stores.
    pub async fn open(
        config: &BackendConfig,
        db_options: DbOptions,
        restore: bool,
    ) -> StoreResult<Self> {
        let backend = Backend::open(config, db_options).await?;
        let operator = Self::new(backend);
        if restore && operator.backend.is_durable() {
            let restored = operator.load_metrics().await?;
            info!(backend = %config, restored, "metrics restored");
        } else {
            info!(backend = %config, restore, "starting with empty metrics");
        }
        Ok(operator)
    }

    pub fn gauges(&self) -> &KeyedStore<Gauge> {
        &self.gauges
    }

    pub fn counters(&self) -> &KeyedStore<Counter> {
        &self.counters
    }

    /// Apply one validated update and return the value now stored.
    ///
    /// Counter updates add the delta under a single write lock, so
    /// concurrent reporters never lose increments.
    pub fn update(&self, update: Update) -> Metrics {
        match update {
            Update::Gauge { name, value } => {
                self.gauges.set(&name, value);
                Metrics::gauge(name, value)
            }
            Update::Counter { name, delta } => {
                let total = self.counters.add(&name, delta);
                Metrics::counter(name, total)
            }
        }
    }

    /// Current value of one metric as an envelope.
    pub fn value(&self, kind: MetricKind, name: &str) -> Option<Metrics> {
        match kind {
            MetricKind::Gauge => self.gauges.get(name).map(|v| v.to_envelope(name)),
            MetricKind::Counter => self.counters.get(name).map(|v| v.to_envelope(name)),
        }
    }

    /// Every metric as an envelope: counters first, then gauges, each sorted
    /// by name.
    pub fn get_all_metrics(&self) -> Vec<Metrics> {
        let counters = self.counters.get_all();
        let gauges = self.gauges.get_all();
        let mut out = Vec::with_capacity(counters.len() + gauges.len());
        out.extend(counters.into_iter().map(|(name, v)| Metrics::counter(name, v)));
        out.extend(gauges.into_iter().map(|(name, v)| Metrics::gauge(name, v)));
        out
    }

    /// Flush the full contents of both stores to the backend.
    pub async fn save_all_metrics(&self) -> StoreResult<()> {
        let _guard = self.flush_lock.lock().await;
        if !self.backend.is_durable() {
            debug!("memory backend, metrics will not be saved");
            return Ok(());
        }
        let metrics = self.get_all_metrics();
        self.backend.save(&metrics).await?;
        debug!(backend = self.backend.kind(), count = metrics.len(), "metrics flushed");
        Ok(())
    }

    /// Replace store contents with the backend's last snapshot. Counter
    /// totals are set, not accumulated. Returns the number of metrics loaded.
    pub async fn load_metrics(&self) -> StoreResult<usize> {
        let snapshot = self.backend.load().await?;
        // Validate everything before touching the stores.
        let updates = snapshot
            .into_iter()
            .map(|m| m.into_update().map_err(|e| StoreError::Decode(e.to_string())))
            .collect::<StoreResult<Vec<_>>>()?;
        let count = updates.len();
        for update in updates {
            match update {
                Update::Gauge { name, value } => self.gauges.set(&name, value),
                Update::Counter { name, delta } => self.counters.set(&name, delta),
            }
        }
        Ok(count)
    }

    /// Database liveness.
    pub async fn ping(&self) -> StoreResult<()> {
        self.backend.ping().await
    }

    /// Flush every `interval` until `shutdown` fires, then flush one last
    /// time. A zero interval disables the periodic flush (updates are then
    /// persisted by the caller) but keeps the final one.
    pub async fn run_flush_loop(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = interval.as_secs(),
            backend = self.backend.kind(),
            "flush loop started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval), if !interval.is_zero() => {
                    if let Err(e) = self.save_all_metrics().await {
                        error!(error = %e, "periodic flush failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("flush loop shutting down");
                    if let Err(e) = self.save_all_metrics().await {
                        error!(error = %e, "final flush failed");
                    }
                    break;
                }
            }
        }
    }
}
