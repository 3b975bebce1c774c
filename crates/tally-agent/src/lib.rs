//! tally-agent — the reporting side of the pipeline.
//!
//! Two loops share the agent's local stores:
//!
//! ```text
//!            poll_interval                        report_interval
//! SampleSource ──▶ Sampler ──▶ gauges / PollCount ──▶ Reporter ──▶ Transport ──▶ server
//!                               (KeyedStore)            retry with Backoff
//! ```
//!
//! Neither loop blocks the other; both stop when the shutdown channel flips.

pub mod error;
pub mod reporter;
pub mod sampler;
pub mod source;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use tally_codec::Signer;
use tally_core::{Backoff, Counter, Gauge};
use tally_store::KeyedStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub use error::{TransportError, TransportResult};
pub use reporter::Reporter;
pub use sampler::{POLL_COUNT, Sampler};
pub use source::{RuntimeSource, SampleSource};
pub use transport::{HttpTransport, Transport};

/// Everything the agent needs to run.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Server `host:port`.
    pub address: String,
    pub poll_interval: Duration,
    pub report_interval: Duration,
    /// Shared HMAC key; `None` or empty disables signing.
    pub key: Option<String>,
    pub backoff: Backoff,
    /// Upper bound for one HTTP exchange.
    pub request_timeout: Duration,
}

/// Run the sampler and reporter until `shutdown` fires.
pub async fn run(config: AgentConfig, shutdown: watch::Receiver<bool>) {
    let gauges = Arc::new(KeyedStore::<Gauge>::new());
    let counters = Arc::new(KeyedStore::<Counter>::new());
    gauges.init();
    counters.init();

    let signer = config.key.as_deref().and_then(Signer::new);
    info!(
        address = %config.address,
        poll_secs = config.poll_interval.as_secs(),
        report_secs = config.report_interval.as_secs(),
        signed = signer.is_some(),
        "agent starting"
    );

    let mut sampler = Sampler::new(RuntimeSource::new(), gauges.clone(), counters.clone());
    let transport = HttpTransport::new(config.address.clone(), signer, config.request_timeout);
    let reporter = Reporter::new(transport, gauges, counters, config.backoff);

    let sample_shutdown = shutdown.clone();
    let poll_interval = config.poll_interval;
    let sampler_handle = tokio::spawn(async move {
        sampler.run(poll_interval, sample_shutdown).await;
    });

    let report_interval = config.report_interval;
    let reporter_handle = tokio::spawn(async move {
        reporter.run(report_interval, shutdown).await;
    });

    join_logged("sampler", sampler_handle).await;
    join_logged("reporter", reporter_handle).await;
    info!("agent stopped");
}

/// Await a loop task, logging a panic or cancellation. Returns whether the
/// task finished normally.
async fn join_logged(task: &'static str, handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            error!(task, error = %e, "agent task failed");
            false
        }
    }
}
