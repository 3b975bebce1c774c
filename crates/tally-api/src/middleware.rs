//! Transport middleware: request logging, gzip, and body signatures.
//!
//! Each layer buffers the body it transforms. Bodies are small metric
//! batches, so streaming is not worth the complexity.

use std::time::Instant;

use axum::body::{Body, HttpBody, to_bytes};
use axum::extract::{Request, State};
use axum::http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, VARY};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tally_codec::{CodecError, Signer, gzip};
use tracing::{debug, info, warn};

/// Largest body any layer will buffer, before or after inflation.
const MAX_BODY: usize = 16 * 1024 * 1024;

/// `HashSHA256`, lower-cased as `HeaderName` requires.
const HASH_HEADER: HeaderName = HeaderName::from_static("hashsha256");

/// Log one line per request once the response is ready.
pub async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let started = Instant::now();

    let resp = next.run(req).await;

    info!(
        %method,
        %uri,
        status = resp.status().as_u16(),
        size = resp.body().size_hint().exact(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request served"
    );
    resp
}

/// Inflate gzip request bodies and deflate eligible responses.
pub async fn compression(req: Request, next: Next) -> Response {
    let wants_gzip = header_str(req.headers(), &ACCEPT_ENCODING).is_some_and(gzip::accepts_gzip);

    let req = if is_gzip_encoded(req.headers()) {
        let (mut parts, body) = req.into_parts();
        let packed = match to_bytes(body, MAX_BODY).await {
            Ok(bytes) => bytes,
            Err(e) => return bad_request(&format!("unreadable body: {e}")),
        };
        let plain = match gzip::decompress(&packed, MAX_BODY) {
            Ok(plain) => plain,
            Err(CodecError::TooLarge { limit }) => {
                warn!(limit, "rejected oversized gzip body");
                return (StatusCode::PAYLOAD_TOO_LARGE, "inflated body too large").into_response();
            }
            Err(e) => {
                debug!(error = %e, "rejected gzip body");
                return bad_request("request body is not valid gzip");
            }
        };
        parts.headers.remove(CONTENT_ENCODING);
        parts.headers.remove(CONTENT_LENGTH);
        Request::from_parts(parts, Body::from(plain))
    } else {
        req
    };

    let resp = next.run(req).await;
    if !wants_gzip || resp.status().as_u16() >= 300 || !is_compressible(resp.headers()) {
        return resp;
    }

    let (mut parts, body) = resp.into_parts();
    let plain = match to_bytes(body, MAX_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => return internal_error(&format!("unreadable response body: {e}")),
    };
    match gzip::compress(&plain) {
        Ok(packed) => {
            parts.headers.insert(CONTENT_ENCODING, HeaderValue::from_static(gzip::GZIP));
            parts.headers.insert(VARY, HeaderValue::from_static("accept-encoding"));
            parts.headers.remove(CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(packed))
        }
        Err(e) => {
            warn!(error = %e, "response compression failed, sending plain body");
            Response::from_parts(parts, Body::from(plain))
        }
    }
}

/// Verify request signatures when present and sign every response.
///
/// Sits outside [`compression`], so signatures cover the bytes on the wire.
pub async fn hash(State(signer): State<Signer>, req: Request, next: Next) -> Response {
    let (parts, body) = req.into_parts();
    let body = match to_bytes(body, MAX_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => return bad_request(&format!("unreadable body: {e}")),
    };

    if let Some(signature) = parts.headers.get(&HASH_HEADER) {
        let verified = signature
            .to_str()
            .map_err(|e| e.to_string())
            .and_then(|sig| signer.verify(&body, sig).map_err(|e| e.to_string()));
        if let Err(e) = verified {
            warn!(error = %e, uri = %parts.uri, "request signature rejected");
            return bad_request("request signature mismatch");
        }
    }

    let resp = next.run(Request::from_parts(parts, Body::from(body))).await;

    let (mut parts, body) = resp.into_parts();
    let body = match to_bytes(body, MAX_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => return internal_error(&format!("unreadable response body: {e}")),
    };
    match HeaderValue::from_str(&signer.sign(&body)) {
        Ok(value) => {
            parts.headers.insert(HASH_HEADER, value);
        }
        Err(e) => warn!(error = %e, "response signature is not a valid header"),
    }
    Response::from_parts(parts, Body::from(body))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn is_gzip_encoded(headers: &HeaderMap) -> bool {
    header_str(headers, &CONTENT_ENCODING)
        .is_some_and(|v| v.trim().eq_ignore_ascii_case(gzip::GZIP))
}

fn is_compressible(headers: &HeaderMap) -> bool {
    header_str(headers, &CONTENT_TYPE)
        .is_some_and(|ct| ct.starts_with("application/json") || ct.starts_with("text/html"))
}

fn bad_request(msg: &str) -> Response {
    (StatusCode::BAD_REQUEST, msg.to_string()).into_response()
}

fn internal_error(msg: &str) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, msg.to_string()).into_response()
}
