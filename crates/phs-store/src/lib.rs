//! # phs-store
//! Persistent proven header storage.
//!
//! - [`repository::RocksHeaderRepository`] persists headers and the tip in RocksDB
//! - [`store::ProvenHeaderStore`] recovers against the live chain, batches
//!   new headers in memory, and serves reads from cache, batch, or disk
//! - [`flush::FlushLoop`] persists the batch on a timer and on shutdown

pub mod config;
pub mod flush;
pub mod pending;
pub mod repository;
pub mod stats;
pub mod store;

pub use config::{ConfigError, StoreConfig};
pub use flush::{FlushLoop, FlushSchedule};
pub use repository::RocksHeaderRepository;
pub use stats::{RepositoryStats, StoreStats};
pub use store::{FlushOutcome, ProvenHeaderStore, StoreState};
