//! Sampler — copies source readings into the local gauge store.

use std::sync::Arc;
use std::time::Duration;

use tally_core::{Counter, Gauge};
use tally_store::KeyedStore;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::source::SampleSource;

/// Counter incremented once per sampling cycle.
pub const POLL_COUNT: &str = "PollCount";

pub struct Sampler<S: SampleSource> {
    source: S,
    gauges: Arc<KeyedStore<Gauge>>,
    counters: Arc<KeyedStore<Counter>>,
}

impl<S: SampleSource> Sampler<S> {
    pub fn new(
        source: S,
        gauges: Arc<KeyedStore<Gauge>>,
        counters: Arc<KeyedStore<Counter>>,
    ) -> Self {
        Self {
            source,
            gauges,
            counters,
        }
    }

    /// One sampling cycle. Returns the number of gauges written.
    pub fn poll_once(&mut self) -> usize {
        let mut written = 0;
        for (name, value) in self.source.sample() {
            // Non-finite readings cannot travel as JSON.
            if !value.is_finite() {
                debug!(%name, value, "skipping non-finite reading");
                continue;
            }
            self.gauges.set(&name, Gauge(value));
            written += 1;
        }
        self.counters.add(POLL_COUNT, Counter(1));
        written
    }

    /// Sample every `interval` until `shutdown` fires.
    pub async fn run(&mut self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), "sampler started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    let written = self.poll_once();
                    debug!(written, "sampled");
                }
                _ = shutdown.changed() => {
                    info!("sampler shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource(Vec<(&'static str, f64)>);

    impl SampleSource for FixedSource {
        fn sample(&mut self) -> Vec<(String, f64)> {
            self.0.iter().map(|(n, v)| (n.to_string(), *v)).collect()
        }
    }

    fn sampler(readings: Vec<(&'static str, f64)>) -> Sampler<FixedSource> {
        Sampler::new(
            FixedSource(readings),
            Arc::new(KeyedStore::new()),
            Arc::new(KeyedStore::new()),
        )
    }

    #[test]
    fn poll_sets_gauges_and_counts_cycles() {
        let mut s = sampler(vec![("Alloc", 12.5), ("RandomValue", 3.0)]);
        for _ in 0..3 {
            assert_eq!(s.poll_once(), 2);
        }
        assert_eq!(s.gauges.get("Alloc"), Some(Gauge(12.5)));
        assert_eq!(s.counters.get(POLL_COUNT), Some(Counter(3)));
    }

    #[test]
    fn non_finite_readings_are_skipped() {
        let mut s = sampler(vec![("Bad", f64::NAN), ("Good", 1.0)]);
        assert_eq!(s.poll_once(), 1);
        assert_eq!(s.gauges.get("Bad"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn run_polls_on_interval_until_shutdown() {
        let mut s = sampler(vec![("Alloc", 1.0)]);
        let counters = s.counters.clone();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { s.run(Duration::from_secs(2), rx).await });

        tokio::time::sleep(Duration::from_millis(6500)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(counters.get(POLL_COUNT), Some(Counter(3)));
    }
}
