//! Server regression tests.
//!
//! Drive the full router (handlers plus transport middleware) without a
//! socket and check the wire behavior an agent relies on.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use tally_api::{ApiConfig, build_router};
use tally_codec::{Signer, gzip};
use tally_store::{Backend, BackendConfig, DbOptions, FileBackend, Operator};
use tower::ServiceExt;

fn memory_router() -> (Arc<Operator>, Router) {
    let operator = Arc::new(Operator::new(Backend::Memory));
    let router = build_router(operator.clone(), ApiConfig::default());
    (operator, router)
}

fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(resp: Response) -> Vec<u8> {
    to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn body_text(resp: Response) -> String {
    String::from_utf8(body_bytes(resp).await).unwrap()
}

async fn body_json(resp: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

// ── Path-encoded updates ───────────────────────────────────────

#[tokio::test]
async fn gauge_path_update_then_read() {
    let (_, router) = memory_router();

    let resp = router
        .clone()
        .oneshot(post("/update/gauge/Alloc/12.5", Body::empty()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(
        resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );

    let resp = router.oneshot(get("/value/gauge/Alloc")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "12.5");
}

#[tokio::test]
async fn counter_path_updates_accumulate() {
    let (operator, router) = memory_router();
    for delta in ["5", "2"] {
        let resp = router
            .clone()
            .oneshot(post(&format!("/update/counter/Hits/{delta}/"), Body::empty()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = router.oneshot(get("/value/counter/Hits/")).await.unwrap();
    assert_eq!(body_text(resp).await, "7");
    assert_eq!(operator.counters().get("Hits"), Some(tally_core::Counter(7)));
}

#[tokio::test]
async fn malformed_path_updates_are_rejected() {
    let (operator, router) = memory_router();
    for uri in [
        "/update/meter/X/1",
        "/update/gauge/X/abc",
        "/update/counter/X/1.5",
        "/update/gauge/X/NaN",
    ] {
        let resp = router.clone().oneshot(post(uri, Body::empty())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
    assert!(operator.get_all_metrics().is_empty());
}

#[tokio::test]
async fn unknown_metric_is_not_found() {
    let (_, router) = memory_router();
    let resp = router.clone().oneshot(get("/value/counter/Nope")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = router.oneshot(get("/value/meter/Nope")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ── JSON updates ───────────────────────────────────────────────

#[tokio::test]
async fn json_counter_update_returns_running_total() {
    let (_, router) = memory_router();
    let body = r#"{"id":"PollCount","type":"counter","delta":3}"#;

    router.clone().oneshot(post("/update", body)).await.unwrap();
    let resp = router.oneshot(post("/update/", body)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await,
        serde_json::json!({"id": "PollCount", "type": "counter", "delta": 6})
    );
}

#[tokio::test]
async fn json_update_with_mismatched_field_is_rejected() {
    let (_, router) = memory_router();
    let resp = router
        .oneshot(post("/update", r#"{"id":"Alloc","type":"gauge","delta":3}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_update_applies_everything() {
    let (operator, router) = memory_router();
    let body = r#"[
        {"id":"Alloc","type":"gauge","value":1.5},
        {"id":"PollCount","type":"counter","delta":2},
        {"id":"PollCount","type":"counter","delta":3}
    ]"#;

    let resp = router.oneshot(post("/updates/", body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let stored = body_json(resp).await;
    assert_eq!(stored.as_array().unwrap().len(), 3);
    assert_eq!(stored[2]["delta"], 5);
    assert_eq!(operator.counters().get("PollCount"), Some(tally_core::Counter(5)));
}

#[tokio::test]
async fn batch_with_one_invalid_entry_applies_nothing() {
    let (operator, router) = memory_router();
    let body = r#"[
        {"id":"Alloc","type":"gauge","value":1.5},
        {"id":"","type":"counter","delta":2}
    ]"#;

    let resp = router.oneshot(post("/updates", body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(operator.get_all_metrics().is_empty());
}

#[tokio::test]
async fn json_value_query() {
    let (_, router) = memory_router();
    router
        .clone()
        .oneshot(post("/update/gauge/Temp/36.6", Body::empty()))
        .await
        .unwrap();

    let resp = router
        .clone()
        .oneshot(post("/value", r#"{"id":"Temp","type":"gauge"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await,
        serde_json::json!({"id": "Temp", "type": "gauge", "value": 36.6})
    );

    let resp = router
        .oneshot(post("/value/", r#"{"id":"Temp","type":"counter"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ── Listings ───────────────────────────────────────────────────

#[tokio::test]
async fn index_lists_counters_before_gauges() {
    let (_, router) = memory_router();
    router
        .clone()
        .oneshot(post("/update/gauge/Alloc/1.5", Body::empty()))
        .await
        .unwrap();
    router
        .clone()
        .oneshot(post("/update/counter/Hits/3", Body::empty()))
        .await
        .unwrap();

    let resp = router.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let page = body_text(resp).await;
    let hits = page.find("Hits: 3").unwrap();
    let alloc = page.find("Alloc: 1.5").unwrap();
    assert!(hits < alloc);

    let resp = router.oneshot(get("/json")).await.unwrap();
    assert_eq!(
        body_json(resp).await,
        serde_json::json!([
            {"id": "Hits", "type": "counter", "delta": 3},
            {"id": "Alloc", "type": "gauge", "value": 1.5}
        ])
    );
}

// ── gzip ───────────────────────────────────────────────────────

#[tokio::test]
async fn gzip_request_and_response() {
    let (_, router) = memory_router();
    let packed = gzip::compress(br#"[{"id":"Alloc","type":"gauge","value":2.5}]"#).unwrap();
    let req = Request::builder()
        .method("POST")
        .uri("/updates/")
        .header("content-type", "application/json")
        .header("content-encoding", "gzip")
        .header("accept-encoding", "gzip")
        .body(Body::from(packed))
        .unwrap();

    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-encoding"], "gzip");
    let plain = gzip::decompress(&body_bytes(resp).await, 1 << 20).unwrap();
    let stored: serde_json::Value = serde_json::from_slice(&plain).unwrap();
    assert_eq!(stored[0]["value"], 2.5);
}

#[tokio::test]
async fn plain_text_responses_are_not_compressed() {
    let (_, router) = memory_router();
    let req = Request::builder()
        .method("POST")
        .uri("/update/gauge/Alloc/1")
        .header("accept-encoding", "gzip")
        .body(Body::empty())
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert!(resp.headers().get("content-encoding").is_none());
}

#[tokio::test]
async fn undecodable_gzip_body_is_a_bad_request() {
    let (operator, router) = memory_router();
    let req = Request::builder()
        .method("POST")
        .uri("/updates")
        .header("content-encoding", "gzip")
        .body(Body::from("definitely not gzip"))
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(operator.get_all_metrics().is_empty());
}

#[tokio::test]
async fn gzip_body_inflating_past_the_limit_is_refused() {
    let (operator, router) = memory_router();
    // 17 MiB of spaces packs into a few kilobytes.
    let packed = gzip::compress(&vec![b' '; 17 * 1024 * 1024]).unwrap();
    assert!(packed.len() < 64 * 1024);
    let req = Request::builder()
        .method("POST")
        .uri("/updates/")
        .header("content-type", "application/json")
        .header("content-encoding", "gzip")
        .body(Body::from(packed))
        .unwrap();

    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(operator.get_all_metrics().is_empty());
}

// ── HashSHA256 ─────────────────────────────────────────────────

fn signed_router(key: &str) -> (Arc<Operator>, Router) {
    let operator = Arc::new(Operator::new(Backend::Memory));
    let router = build_router(
        operator.clone(),
        ApiConfig {
            hash_key: Some(key.to_string()),
            sync_save: false,
        },
    );
    (operator, router)
}

#[tokio::test]
async fn correctly_signed_request_is_accepted_and_response_signed() {
    let (_, router) = signed_router("secret");
    let signer = Signer::new("secret").unwrap();
    let body = br#"[{"id":"Alloc","type":"gauge","value":1}]"#;
    let req = Request::builder()
        .method("POST")
        .uri("/updates/")
        .header("HashSHA256", signer.sign(body))
        .body(Body::from(body.to_vec()))
        .unwrap();

    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let signature = resp.headers()["hashsha256"].to_str().unwrap().to_string();
    let payload = body_bytes(resp).await;
    signer.verify(&payload, &signature).unwrap();
}

#[tokio::test]
async fn signature_covers_the_compressed_body() {
    let (_, router) = signed_router("secret");
    let signer = Signer::new("secret").unwrap();
    let packed = gzip::compress(br#"[{"id":"Alloc","type":"gauge","value":1}]"#).unwrap();
    let req = Request::builder()
        .method("POST")
        .uri("/updates/")
        .header("content-encoding", "gzip")
        .header("HashSHA256", signer.sign(&packed))
        .body(Body::from(packed))
        .unwrap();

    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn tampered_request_is_rejected() {
    let (operator, router) = signed_router("secret");
    let signature = Signer::new("other").unwrap().sign(b"[]");
    let req = Request::builder()
        .method("POST")
        .uri("/update/gauge/Alloc/1")
        .header("HashSHA256", signature)
        .body(Body::from("[]"))
        .unwrap();

    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(operator.get_all_metrics().is_empty());
}

#[tokio::test]
async fn unsigned_request_passes_when_key_is_set() {
    let (_, router) = signed_router("secret");
    let resp = router
        .oneshot(post("/update/gauge/Alloc/1", Body::empty()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get("hashsha256").is_some());
}

// ── Persistence ────────────────────────────────────────────────

#[tokio::test]
async fn ping_without_database_fails() {
    let (_, router) = memory_router();
    let resp = router.oneshot(get("/ping")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn ping_with_database_succeeds() {
    let config = BackendConfig::Database("sqlite::memory:".into());
    let operator = Arc::new(Operator::open(&config, DbOptions::default(), false).await.unwrap());
    let router = build_router(operator, ApiConfig::default());

    let resp = router.oneshot(get("/ping/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn synchronous_save_writes_after_each_update() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.json");
    let operator = Arc::new(Operator::new(Backend::File(FileBackend::new(&path))));
    let router = build_router(
        operator,
        ApiConfig {
            hash_key: None,
            sync_save: true,
        },
    );

    let resp = router
        .oneshot(post("/update/counter/Hits/4", Body::empty()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        r#"[{"id":"Hits","type":"counter","delta":4}]"#
    );
}

#[tokio::test]
async fn restart_restores_saved_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let config = BackendConfig::File(dir.path().join("metrics.json"));

    let first = Arc::new(Operator::open(&config, DbOptions::default(), true).await.unwrap());
    let router = build_router(first.clone(), ApiConfig::default());
    router
        .clone()
        .oneshot(post("/update/gauge/Temp/36.6", Body::empty()))
        .await
        .unwrap();
    router
        .oneshot(post("/update/counter/Hits/5", Body::empty()))
        .await
        .unwrap();
    first.save_all_metrics().await.unwrap();

    let second = Arc::new(Operator::open(&config, DbOptions::default(), true).await.unwrap());
    let router = build_router(second, ApiConfig::default());
    let resp = router.clone().oneshot(get("/value/gauge/Temp")).await.unwrap();
    assert_eq!(body_text(resp).await, "36.6");
    let resp = router.oneshot(get("/value/counter/Hits")).await.unwrap();
    assert_eq!(body_text(resp).await, "5");
}
