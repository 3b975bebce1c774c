//! tally-api — HTTP surface of the metrics server.
//!
//! Every handler goes through the shared [`Operator`]; the middleware stack
//! wraps the router in transport transforms:
//!
//! ```text
//! request ─▶ log ─▶ hash (verify) ─▶ gzip (inflate) ─▶ handler
//! response ◀─ log ◀─ hash (sign)  ◀─ gzip (deflate) ◀─┘
//! ```
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/update/{type}/{name}/{value}` | Path-encoded update |
//! | POST | `/update` | One JSON envelope |
//! | POST | `/updates` | JSON array of envelopes, all-or-nothing |
//! | GET | `/value/{type}/{name}` | Current value as text |
//! | POST | `/value` | Current value as an envelope |
//! | GET | `/` | HTML listing |
//! | GET | `/json` | Every metric as JSON |
//! | GET | `/ping` | Database liveness |
//!
//! Each path also matches with a trailing slash.

pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::Router;
use axum::routing::{MethodRouter, get, post};
use tally_codec::Signer;
use tally_store::Operator;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub operator: Arc<Operator>,
    /// Flush to the backend after every successful update.
    pub sync_save: bool,
}

/// Router options taken from the server configuration.
#[derive(Debug, Clone, Default)]
pub struct ApiConfig {
    /// Shared HMAC key; `None` or empty disables signing and verification.
    pub hash_key: Option<String>,
    pub sync_save: bool,
}

/// Build the complete router with its middleware stack.
pub fn build_router(operator: Arc<Operator>, config: ApiConfig) -> Router {
    let state = ApiState {
        operator,
        sync_save: config.sync_save,
    };

    let routes = Router::new().route("/", get(handlers::index));
    let routes = [
        ("/update/{kind}/{name}/{value}", post(handlers::update_path)),
        ("/update", post(handlers::update_json)),
        ("/updates", post(handlers::updates_json)),
        ("/value/{kind}/{name}", get(handlers::value_path)),
        ("/value", post(handlers::value_json)),
        ("/json", get(handlers::all_json)),
        ("/ping", get(handlers::ping)),
    ]
    .into_iter()
    .fold(routes, |router, (path, method)| with_trailing_slash(router, path, method));

    let mut router = routes
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::compression));

    if let Some(signer) = config.hash_key.as_deref().and_then(Signer::new) {
        router = router.layer(axum::middleware::from_fn_with_state(signer, middleware::hash));
    }

    router.layer(axum::middleware::from_fn(middleware::log_requests))
}

fn with_trailing_slash(
    router: Router<ApiState>,
    path: &str,
    method: MethodRouter<ApiState>,
) -> Router<ApiState> {
    router
        .route(path, method.clone())
        .route(&format!("{path}/"), method)
}
