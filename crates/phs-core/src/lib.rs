//! # phs-core
//! Types, traits, and the size-bounded cache for the proven header store.

pub mod cache;
pub mod chain_index;
pub mod constants;
pub mod error;
pub mod genesis;
pub mod repository;
pub mod traits;
pub mod types;

pub use cache::SizeBoundedCache;
pub use chain_index::MemoryChainIndex;
pub use error::{RepositoryError, StoreError};
pub use repository::MemoryHeaderRepository;
pub use traits::{ChainIndex, HeaderRepository};
pub use types::{Hash256, HashHeightPair, ProvenBlockHeader};
