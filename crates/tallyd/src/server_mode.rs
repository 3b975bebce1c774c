//! Server mode — the metrics collection endpoint.
//!
//! Startup:
//! 1. Select the backend (database DSN, else file path, else memory)
//! 2. Open the operator, restoring the last snapshot if asked to
//! 3. Start the flush loop and the HTTP server
//! 4. On shutdown, stop accepting requests and drain the in-flight ones,
//!    then let the flush loop write its final snapshot

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use clap::{ArgAction, Args};
use tally_api::{ApiConfig, build_router};
use tally_store::{BackendConfig, DbOptions, Operator};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Debug, Args)]
pub struct ServerArgs {
    /// Address to listen on.
    #[arg(short = 'a', long, env = "ADDRESS", default_value = "localhost:8080")]
    pub address: String,

    /// Seconds between snapshot flushes; 0 flushes after every update.
    #[arg(short = 'i', long, env = "STORE_INTERVAL", default_value_t = 300)]
    pub store_interval: u64,

    /// JSON snapshot file; empty disables file persistence.
    #[arg(short = 'f', long, env = "FILE_STORAGE_PATH", default_value = "/tmp/metrics-db.json")]
    pub file_storage_path: String,

    /// Database URL (`postgres://...` or `sqlite:...`); takes precedence
    /// over the snapshot file.
    #[arg(short = 'd', long, env = "DATABASE_DSN")]
    pub database_dsn: Option<String>,

    /// Load the last snapshot on startup.
    #[arg(short = 'r', long, env = "RESTORE", default_value_t = true, action = ArgAction::Set)]
    pub restore: bool,

    /// Key for HashSHA256 request verification and response signing.
    #[arg(short = 'k', long, env = "KEY")]
    pub key: Option<String>,
}

pub async fn run_server(args: ServerArgs) -> anyhow::Result<()> {
    info!("tally server starting");

    let backend = BackendConfig::select(
        args.database_dsn.as_deref(),
        Some(args.file_storage_path.as_str()),
    );
    let operator = Arc::new(Operator::open(&backend, DbOptions::default(), args.restore).await?);
    info!(%backend, "operator ready");

    let router = build_router(
        operator.clone(),
        ApiConfig {
            hash_key: args.key,
            sync_save: args.store_interval == 0,
        },
    );
    let listener = tokio::net::TcpListener::bind(&args.address).await?;
    info!(address = %args.address, "API server listening");

    serve_then_flush(
        listener,
        router,
        operator,
        Duration::from_secs(args.store_interval),
        async {
            crate::shutdown_signal().await;
            info!("shutdown signal received");
        },
    )
    .await?;

    info!("tally server stopped");
    Ok(())
}

/// Serve until `signal` resolves and in-flight requests have drained, then
/// stop the flush loop. Its final snapshot therefore sees every update.
async fn serve_then_flush(
    listener: TcpListener,
    router: Router,
    operator: Arc<Operator>,
    store_interval: Duration,
    signal: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let flush_handle = tokio::spawn(async move {
        operator.run_flush_loop(store_interval, shutdown_rx).await;
    });

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(signal)
        .await;

    let _ = shutdown_tx.send(true);
    if let Err(e) = flush_handle.await {
        error!(error = %e, "flush loop task failed");
    }
    served?;
    Ok(())
}
