//! Batch delivery to the server.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use tally_codec::{HASH_HEADER, Signer, gzip, json};
use tally_core::Metrics;
use tracing::debug;

use crate::error::{TransportError, TransportResult};

/// Delivers one encoded batch. Implementations make a single attempt; the
/// reporter owns retries.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, batch: &[Metrics]) -> TransportResult<()>;
}

/// Batch endpoint, sent in origin form with a `Host` header.
const UPDATES_PATH: &str = "/updates/";

/// POSTs gzip-compressed JSON batches to `http://{address}/updates/`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    address: String,
    signer: Option<Signer>,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(address: impl Into<String>, signer: Option<Signer>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            signer,
            timeout,
        }
    }

    fn request(&self, body: Vec<u8>) -> TransportResult<http::Request<Full<Bytes>>> {
        let mut builder = http::Request::builder()
            .method("POST")
            .uri(UPDATES_PATH)
            .header(http::header::HOST, self.address.as_str())
            .header(http::header::CONTENT_TYPE, json::CONTENT_TYPE)
            .header(http::header::CONTENT_ENCODING, gzip::GZIP)
            .header(http::header::ACCEPT_ENCODING, gzip::GZIP)
            .header(http::header::USER_AGENT, "tally-agent/0.1");
        if let Some(signer) = &self.signer {
            builder = builder.header(HASH_HEADER, signer.sign(&body));
        }
        builder
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| TransportError::Request(e.to_string()))
    }

    async fn exchange(&self, req: http::Request<Full<Bytes>>) -> TransportResult<()> {
        let stream = tokio::net::TcpStream::connect(self.address.as_str())
            .await
            .map_err(|e| TransportError::Connect {
                address: self.address.clone(),
                message: e.to_string(),
            })?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| TransportError::Connect {
                address: self.address.clone(),
                message: e.to_string(),
            })?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::Status {
                status: resp.status().as_u16(),
            })
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, batch: &[Metrics]) -> TransportResult<()> {
        let body = json::encode_compressed(batch)?;
        let bytes = body.len();
        let req = self.request(body)?;
        tokio::time::timeout(self.timeout, self.exchange(req))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))??;
        debug!(count = batch.len(), bytes, "batch delivered");
        Ok(())
    }
}
