//! Route handlers.
//!
//! Handlers read raw bodies and decode them with `tally-codec` so every
//! malformed payload maps to 400, whatever the content type.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use tally_codec::json;
use tally_core::{MetricKind, Metrics, Update};
use tracing::{debug, error, warn};

use crate::ApiState;

fn error_response(msg: &str, status: StatusCode) -> Response {
    (status, msg.to_string()).into_response()
}

impl ApiState {
    /// Apply validated updates, then flush if persistence is synchronous.
    async fn apply(&self, updates: Vec<Update>) -> Vec<Metrics> {
        let stored: Vec<Metrics> = updates
            .into_iter()
            .map(|update| self.operator.update(update))
            .collect();
        if self.sync_save {
            if let Err(e) = self.operator.save_all_metrics().await {
                error!(error = %e, "synchronous flush failed");
            }
        }
        stored
    }
}

// ── Updates ────────────────────────────────────────────────────

/// POST /update/{kind}/{name}/{value}
pub async fn update_path(
    State(state): State<ApiState>,
    Path((kind, name, value)): Path<(String, String, String)>,
) -> Response {
    match Update::from_text(&kind, &name, &value) {
        Ok(update) => {
            state.apply(vec![update]).await;
            (StatusCode::OK, String::new()).into_response()
        }
        Err(e) => {
            debug!(error = %e, %kind, %name, "rejected path update");
            error_response(&e.to_string(), StatusCode::BAD_REQUEST)
        }
    }
}

/// POST /update
pub async fn update_json(State(state): State<ApiState>, body: Bytes) -> Response {
    let update = match json::decode_one(&body)
        .map_err(|e| e.to_string())
        .and_then(|m| m.into_update().map_err(|e| e.to_string()))
    {
        Ok(update) => update,
        Err(msg) => return error_response(&msg, StatusCode::BAD_REQUEST),
    };
    match state.apply(vec![update]).await.pop() {
        Some(stored) => Json(stored).into_response(),
        None => error_response("update produced no value", StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// POST /updates
///
/// Every envelope is validated before any is applied.
pub async fn updates_json(State(state): State<ApiState>, body: Bytes) -> Response {
    let batch = match json::decode_batch(&body) {
        Ok(batch) => batch,
        Err(e) => return error_response(&e.to_string(), StatusCode::BAD_REQUEST),
    };
    let updates = match batch
        .into_iter()
        .map(Metrics::into_update)
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(updates) => updates,
        Err(e) => {
            warn!(error = %e, "rejected update batch");
            return error_response(&e.to_string(), StatusCode::BAD_REQUEST);
        }
    };
    debug!(count = updates.len(), "applying update batch");
    Json(state.apply(updates).await).into_response()
}

// ── Reads ──────────────────────────────────────────────────────

/// GET /value/{kind}/{name}
pub async fn value_path(
    State(state): State<ApiState>,
    Path((kind, name)): Path<(String, String)>,
) -> Response {
    let kind: MetricKind = match kind.parse() {
        Ok(kind) => kind,
        Err(e) => return error_response(&e.to_string(), StatusCode::BAD_REQUEST),
    };
    let text = match kind {
        MetricKind::Gauge => state.operator.gauges().get(&name).map(|v| v.to_string()),
        MetricKind::Counter => state.operator.counters().get(&name).map(|v| v.to_string()),
    };
    match text {
        Some(text) => text.into_response(),
        None => error_response("metric not found", StatusCode::NOT_FOUND),
    }
}

/// POST /value
pub async fn value_json(State(state): State<ApiState>, body: Bytes) -> Response {
    let query = match json::decode_one(&body) {
        Ok(query) => query,
        Err(e) => return error_response(&e.to_string(), StatusCode::BAD_REQUEST),
    };
    match state.operator.value(query.mtype, &query.id) {
        Some(stored) => Json(stored).into_response(),
        None => error_response("metric not found", StatusCode::NOT_FOUND),
    }
}

/// GET /
pub async fn index(State(state): State<ApiState>) -> Html<String> {
    let mut page = String::from("<html><head><title>metrics</title></head><body><pre>\n");
    for m in state.operator.get_all_metrics() {
        let value = match (m.delta, m.value) {
            (Some(delta), _) => delta.to_string(),
            (None, Some(value)) => tally_core::Gauge(value).to_string(),
            (None, None) => continue,
        };
        page.push_str(&escape_html(&m.id));
        page.push_str(": ");
        page.push_str(&value);
        page.push('\n');
    }
    page.push_str("</pre></body></html>\n");
    Html(page)
}

/// GET /json
pub async fn all_json(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.operator.get_all_metrics())
}

/// GET /ping
pub async fn ping(State(state): State<ApiState>) -> Response {
    match state.operator.ping().await {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(e) => {
            warn!(error = %e, "ping failed");
            error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}
