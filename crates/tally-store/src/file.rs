//! File snapshot backend.
//!
//! The whole snapshot is a JSON array of envelopes. Every save rewrites the
//! file; every load parses it in full. A missing or empty file is an empty
//! snapshot.

use std::path::PathBuf;

use tally_core::Metrics;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Replace the snapshot with `metrics`, creating parent directories.
    pub async fn save(&self, metrics: &[Metrics]) -> StoreResult<()> {
        let body =
            serde_json::to_vec(metrics).map_err(|e| StoreError::Encode(e.to_string()))?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(StoreError::io(dir))?;
        }
        tokio::fs::write(&self.path, &body)
            .await
            .map_err(StoreError::io(&self.path))?;
        debug!(path = ?self.path, count = metrics.len(), bytes = body.len(), "snapshot written");
        Ok(())
    }

    /// Read the snapshot back.
    pub async fn load(&self) -> StoreResult<Vec<Metrics>> {
        let body = match tokio::fs::read(&self.path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "no snapshot yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(StoreError::io(&self.path)(e)),
        };
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&body).map_err(|e| StoreError::Decode(e.to_string()))
    }
}
