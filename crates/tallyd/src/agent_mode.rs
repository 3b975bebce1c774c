//! Agent mode — samples this host and reports to a server.

use std::time::Duration;

use clap::Args;
use tally_agent::AgentConfig;
use tally_core::Backoff;
use tokio::sync::watch;
use tracing::info;

/// Upper bound for one report request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Args)]
pub struct AgentArgs {
    /// Server address to report to.
    #[arg(short = 'a', long, env = "ADDRESS", default_value = "localhost:8080")]
    pub address: String,

    /// Seconds between samples.
    #[arg(short = 'p', long, env = "POLL_INTERVAL", default_value_t = 2,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval: u64,

    /// Seconds between reports.
    #[arg(short = 'r', long, env = "REPORT_INTERVAL", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub report_interval: u64,

    /// Key for signing report bodies.
    #[arg(short = 'k', long, env = "KEY")]
    pub key: Option<String>,

    /// Total send attempts per report cycle.
    #[arg(long, env = "RETRY_ATTEMPTS", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub retry_attempts: u32,
}

pub async fn run_agent(args: AgentArgs) -> anyhow::Result<()> {
    let config = AgentConfig {
        address: args.address,
        poll_interval: Duration::from_secs(args.poll_interval),
        report_interval: Duration::from_secs(args.report_interval),
        key: args.key,
        backoff: Backoff {
            max_attempts: args.retry_attempts,
            ..Backoff::default()
        },
        request_timeout: REQUEST_TIMEOUT,
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let agent_handle = tokio::spawn(tally_agent::run(config, shutdown_rx));

    crate::shutdown_signal().await;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    agent_handle.await?;
    Ok(())
}
