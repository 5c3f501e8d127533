//! In-memory [`HeaderRepository`].
//!
//! Suitable for tests and tooling; the production store uses RocksDB
//! (phs-store). Writes can be made to fail on demand to exercise the
//! store's retained-batch behaviour.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::error::RepositoryError;
use crate::traits::{sort_for_insert, HeaderRepository};
use crate::types::{Hash256, HashHeightPair, ProvenBlockHeader};

#[derive(Debug, Default)]
struct Inner {
    headers: BTreeMap<u64, ProvenBlockHeader>,
    hash_index: HashMap<Hash256, u64>,
    tip: Option<HashHeightPair>,
}

/// Header repository held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryHeaderRepository {
    inner: RwLock<Inner>,
    fail_writes: AtomicBool,
}

impl MemoryHeaderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put`/`delete` fail with a storage error
    /// (without side effects) until switched off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Overwrite the tip pointer without touching headers.
    ///
    /// Lets tests model a tip that was persisted without its header.
    pub fn force_tip(&self, tip: HashHeightPair) {
        self.inner.write().tip = Some(tip);
    }

    /// Number of stored headers.
    pub fn len(&self) -> usize {
        self.inner.read().headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().headers.is_empty()
    }

    fn check_writable(&self) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("injected write failure".into()));
        }
        Ok(())
    }
}

impl HeaderRepository for MemoryHeaderRepository {
    fn initialize(&self, default_tip: HashHeightPair) -> Result<HashHeightPair, RepositoryError> {
        let mut inner = self.inner.write();
        if let Some(tip) = inner.tip {
            return Ok(tip);
        }
        self.check_writable()?;
        inner.tip = Some(default_tip);
        Ok(default_tip)
    }

    fn tip(&self) -> Result<Option<HashHeightPair>, RepositoryError> {
        Ok(self.inner.read().tip)
    }

    fn get(&self, height: u64) -> Result<Option<ProvenBlockHeader>, RepositoryError> {
        Ok(self.inner.read().headers.get(&height).cloned())
    }

    fn height_of(&self, hash: &Hash256) -> Result<Option<u64>, RepositoryError> {
        Ok(self.inner.read().hash_index.get(hash).copied())
    }

    fn put(
        &self,
        items: Vec<(u64, ProvenBlockHeader)>,
        new_tip: HashHeightPair,
    ) -> Result<usize, RepositoryError> {
        self.check_writable()?;
        let mut inner = self.inner.write();
        let mut written = 0;
        for (height, header) in sort_for_insert(items) {
            let hash = header.hash();
            if let Some(existing) = inner.headers.get(&height) {
                let existing_hash = existing.hash();
                if existing_hash == hash {
                    continue;
                }
                inner.hash_index.remove(&existing_hash);
            }
            inner.hash_index.insert(hash, height);
            inner.headers.insert(height, header);
            written += 1;
        }
        inner.tip = Some(new_tip);
        Ok(written)
    }

    fn delete(&self, new_tip: HashHeightPair, heights: &[u64]) -> Result<(), RepositoryError> {
        self.check_writable()?;
        let mut inner = self.inner.write();
        for height in heights {
            if let Some(header) = inner.headers.remove(height) {
                inner.hash_index.remove(&header.hash());
            }
        }
        inner.tip = Some(new_tip);
        Ok(())
    }
}
