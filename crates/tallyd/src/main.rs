//! tallyd — the tally daemon.
//!
//! One binary, two roles:
//! - `server`: accepts metric updates over HTTP, keeps them in memory and
//!   persists them to a file or a SQL table
//! - `agent`: samples host metrics and reports them to a server
//!
//! # Usage
//!
//! ```text
//! tallyd server -a 0.0.0.0:8080 -i 300 -f /var/lib/tally/metrics.json
//! tallyd agent -a metrics.internal:8080 -p 2 -r 10 -k "$KEY"
//! ```
//!
//! Every flag can also be set through the environment variable named in
//! `--help`.

mod agent_mode;
mod server_mode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tallyd", about = "Tally metrics server and agent")]
struct Cli {
    /// Log directive used when RUST_LOG is unset.
    #[arg(short = 'l', long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Log line format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the metrics server.
    Server(server_mode::ServerArgs),
    /// Run the reporting agent.
    Agent(agent_mode::AgentArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format)?;

    match cli.command {
        Command::Server(args) => server_mode::run_server(args).await,
        Command::Agent(args) => agent_mode::run_agent(args).await,
    }
}

fn init_tracing(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
