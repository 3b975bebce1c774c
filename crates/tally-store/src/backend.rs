//! Backend selection.
//!
//! The composition root picks one [`BackendConfig`] at startup; [`Backend::open`]
//! turns it into the strategy the operator drives. Adding a backend means
//! adding a variant to both enums.

use std::fmt;
use std::path::PathBuf;

use tally_core::Metrics;

use crate::db::{DbBackend, DbOptions};
use crate::error::{StoreError, StoreResult};
use crate::file::FileBackend;

/// Which durable store, if any, backs the in-memory metrics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BackendConfig {
    /// Pure in-memory operation, nothing survives a restart.
    #[default]
    Memory,
    /// JSON snapshot file.
    File(PathBuf),
    /// SQL table reached through a connection URL.
    Database(String),
}

impl BackendConfig {
    /// Pick a backend the way the server flags do: a database URL wins over a
    /// file path, and neither means memory only.
    pub fn select(database_dsn: Option<&str>, file_path: Option<&str>) -> Self {
        match (
            database_dsn.filter(|s| !s.trim().is_empty()),
            file_path.filter(|s| !s.trim().is_empty()),
        ) {
            (Some(dsn), _) => Self::Database(dsn.to_string()),
            (None, Some(path)) => Self::File(PathBuf::from(path)),
            (None, None) => Self::Memory,
        }
    }
}

impl fmt::Display for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::File(path) => write!(f, "file:{}", path.display()),
            // Never print credentials.
            Self::Database(_) => f.write_str("database"),
        }
    }
}

/// An opened backend.
#[derive(Debug, Clone)]
pub enum Backend {
    Memory,
    File(FileBackend),
    Database(DbBackend),
}

impl Backend {
    /// Open the configured backend. Only the database variant does I/O here.
    pub async fn open(config: &BackendConfig, db_options: DbOptions) -> StoreResult<Self> {
        Ok(match config {
            BackendConfig::Memory => Self::Memory,
            BackendConfig::File(path) => Self::File(FileBackend::new(path)),
            BackendConfig::Database(dsn) => Self::Database(DbBackend::connect(dsn, db_options).await?),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File(_) => "file",
            Self::Database(_) => "database",
        }
    }

    /// True when saved state survives a restart.
    pub fn is_durable(&self) -> bool {
        !matches!(self, Self::Memory)
    }

    /// Persist a full snapshot. A no-op for the memory backend.
    pub async fn save(&self, metrics: &[Metrics]) -> StoreResult<()> {
        match self {
            Self::Memory => Ok(()),
            Self::File(file) => file.save(metrics).await,
            Self::Database(db) => db.save(metrics).await,
        }
    }

    /// Read the last snapshot.
    pub async fn load(&self) -> StoreResult<Vec<Metrics>> {
        match self {
            Self::Memory => Err(StoreError::Unsupported(
                "memory backend has nothing to restore".into(),
            )),
            Self::File(file) => file.load().await,
            Self::Database(db) => db.load().await,
        }
    }

    /// Database liveness.
    pub async fn ping(&self) -> StoreResult<()> {
        match self {
            Self::Database(db) => db.ping().await,
            other => Err(StoreError::Unsupported(format!(
                "{} backend has no database to ping",
                other.kind()
            ))),
        }
    }
}
