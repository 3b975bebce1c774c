//! SQL table backend.
//!
//! Table layout:
//!
//! ```sql
//! metrics(id VARCHAR PRIMARY KEY, mtype VARCHAR NOT NULL, delta BIGINT, mvalue DOUBLE PRECISION)
//! ```
//!
//! Saves run in one transaction that upserts every envelope by `id`; the
//! transaction commits only if every statement succeeds. Connections go
//! through the sqlx `Any` driver, so both `postgres://` and `sqlite:` URLs
//! are accepted.

use std::future::Future;
use std::time::Duration;

use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, Row};
use tally_core::{Backoff, MetricKind, Metrics};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS metrics (
    id VARCHAR PRIMARY KEY,
    mtype VARCHAR NOT NULL,
    delta BIGINT,
    mvalue DOUBLE PRECISION
)";
const SELECT_ID: &str = "SELECT id FROM metrics WHERE id = $1";
const UPDATE: &str = "UPDATE metrics SET mtype = $1, delta = $2, mvalue = $3 WHERE id = $4";
const INSERT: &str = "INSERT INTO metrics (mtype, delta, mvalue, id) VALUES ($1, $2, $3, $4)";
const SELECT_ALL: &str = "SELECT id, mtype, delta, mvalue FROM metrics ORDER BY id";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Tuning knobs for the database backend.
#[derive(Debug, Clone, Copy)]
pub struct DbOptions {
    /// Upper bound for a single query or a whole save transaction.
    pub query_timeout: Duration,
    /// Retry policy for connect and ping.
    pub backoff: Backoff,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(1),
            backoff: Backoff::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DbBackend {
    pool: AnyPool,
    options: DbOptions,
}

impl DbBackend {
    /// Connect (retrying transient failures), then create the table if absent.
    pub async fn connect(dsn: &str, options: DbOptions) -> StoreResult<Self> {
        sqlx::any::install_default_drivers();
        let pool = options
            .backoff
            .retry("database connect", || open_pool(dsn), StoreError::is_transient)
            .await?;
        let backend = Self { pool, options };
        backend
            .bounded("create table", async {
                sqlx::query(CREATE_TABLE)
                    .execute(&backend.pool)
                    .await
                    .map_err(StoreError::db("create table"))
            })
            .await?;
        info!("database backend ready");
        Ok(backend)
    }

    /// Liveness check, retried like connect.
    pub async fn ping(&self) -> StoreResult<()> {
        self.options
            .backoff
            .retry(
                "database ping",
                || {
                    self.bounded("ping", async {
                        sqlx::query("SELECT 1")
                            .execute(&self.pool)
                            .await
                            .map_err(StoreError::db("ping"))
                    })
                },
                StoreError::is_transient,
            )
            .await
            .map(|_| ())
    }

    /// Upsert every envelope in a single transaction.
    pub async fn save(&self, metrics: &[Metrics]) -> StoreResult<()> {
        self.bounded("save", async {
            let mut tx = self.pool.begin().await.map_err(StoreError::db("begin"))?;
            for m in metrics {
                let exists = sqlx::query(SELECT_ID)
                    .bind(m.id.as_str())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(StoreError::db("select"))?
                    .is_some();
                let stmt = if exists { UPDATE } else { INSERT };
                sqlx::query(stmt)
                    .bind(m.mtype.as_str())
                    .bind(m.delta)
                    .bind(m.value)
                    .bind(m.id.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(StoreError::db("upsert"))?;
            }
            // Dropping an uncommitted transaction rolls it back.
            tx.commit().await.map_err(StoreError::db("commit"))?;
            Ok(())
        })
        .await?;
        debug!(count = metrics.len(), "snapshot upserted");
        Ok(())
    }

    /// Read every row back as an envelope.
    pub async fn load(&self) -> StoreResult<Vec<Metrics>> {
        let rows = self
            .bounded("load", async {
                sqlx::query(SELECT_ALL)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(StoreError::db("load"))
            })
            .await?;

        rows.iter()
            .map(|row| {
                let mtype: String = row.try_get("mtype").map_err(StoreError::db("load"))?;
                Ok(Metrics {
                    id: row.try_get("id").map_err(StoreError::db("load"))?,
                    mtype: mtype
                        .parse::<MetricKind>()
                        .map_err(|e| StoreError::Decode(e.to_string()))?,
                    delta: row.try_get("delta").map_err(StoreError::db("load"))?,
                    value: row.try_get("mvalue").map_err(StoreError::db("load"))?,
                })
            })
            .collect()
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        let limit = self.options.query_timeout;
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| StoreError::Timeout {
                op,
                millis: limit.as_millis(),
            })?
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

async fn open_pool(dsn: &str) -> StoreResult<AnyPool> {
    let mut options = AnyPoolOptions::new().acquire_timeout(CONNECT_TIMEOUT);
    if dsn.starts_with("sqlite:") {
        // An in-memory SQLite database lives as long as its one connection.
        options = options
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }
    options.connect(dsn).await.map_err(StoreError::db("connect"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{Counter, Gauge};

    async fn memory_db() -> DbBackend {
        DbBackend::connect("sqlite::memory:", DbOptions::default())
            .await
            .unwrap()
    }

    async fn row_count(db: &DbBackend, id: &str) -> i64 {
        sqlx::query("SELECT COUNT(*) AS n FROM metrics WHERE id = $1")
            .bind(id)
            .fetch_one(db.pool())
            .await
            .unwrap()
            .try_get("n")
            .unwrap()
    }

    #[tokio::test]
    async fn empty_table_loads_empty() {
        let db = memory_db().await;
        assert!(db.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_keeps_one_row_with_latest_value() {
        let db = memory_db().await;
        db.save(&[Metrics::gauge("X", Gauge(1.0))]).await.unwrap();
        db.save(&[Metrics::gauge("X", Gauge(2.5))]).await.unwrap();

        assert_eq!(row_count(&db, "X").await, 1);
        assert_eq!(db.load().await.unwrap(), vec![Metrics::gauge("X", Gauge(2.5))]);
    }

    #[tokio::test]
    async fn save_and_load_both_kinds() {
        let db = memory_db().await;
        let metrics = vec![
            Metrics::counter("Hits", Counter(5)),
            Metrics::gauge("Temp", Gauge(36.6)),
        ];
        db.save(&metrics).await.unwrap();
        assert_eq!(db.load().await.unwrap(), metrics);
    }

    #[tokio::test]
    async fn ping_succeeds_on_live_database() {
        memory_db().await.ping().await.unwrap();
    }

    #[tokio::test]
    async fn bad_persisted_type_is_a_decode_error() {
        let db = memory_db().await;
        sqlx::query("INSERT INTO metrics (mtype, delta, mvalue, id) VALUES ('meter', NULL, 1.0, 'm')")
            .execute(db.pool())
            .await
            .unwrap();
        assert!(matches!(db.load().await, Err(StoreError::Decode(_))));
    }

    #[tokio::test]
    async fn unreachable_database_fails_after_retries() {
        let options = DbOptions {
            query_timeout: Duration::from_secs(1),
            backoff: Backoff::immediate(2),
        };
        // Nothing listens on port 1.
        let err = DbBackend::connect("postgres://nobody@127.0.0.1:1/none", options)
            .await
            .unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err}");
    }
}
