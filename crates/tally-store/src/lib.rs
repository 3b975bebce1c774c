//! tally-store — metric storage and persistence for the tally server.
//!
//! # Architecture
//!
//! ```text
//! Operator
//!   ├── KeyedStore<Gauge>     name → last reading
//!   ├── KeyedStore<Counter>   name → running total
//!   └── Backend               chosen once from BackendConfig
//!         ├── Memory          nothing persisted
//!         ├── File            JSON array, whole-file rewrite
//!         └── Database        `metrics` table, transactional upsert
//! ```
//!
//! Stores are `Send + Sync` and guard their map with a reader/writer lock.
//! The operator is shared as `Arc<Operator>`; flushes are serialized by an
//! internal async mutex.

pub mod backend;
pub mod db;
pub mod error;
pub mod file;
pub mod keyed;
pub mod operator;

pub use backend::{Backend, BackendConfig};
pub use db::{DbBackend, DbOptions};
pub use error::{StoreError, StoreResult};
pub use file::FileBackend;
pub use keyed::KeyedStore;
pub use operator::Operator;
