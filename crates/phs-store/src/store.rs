//! Proven header store orchestration.
//!
//! [`ProvenHeaderStore`] sits between the consensus layer and a
//! [`HeaderRepository`]:
//!
//! - recovery on startup reconciles the durable tip with the live chain,
//!   rolling back headers that were persisted on a branch the node has
//!   since abandoned
//! - new headers go into a pending batch and the cache, and are served from
//!   memory until a flush persists them
//! - reads consult the cache, then the pending batch, then the repository
//!   (reading repository hits through into the cache)
//!
//! All methods take `&self`; the store is shared behind an `Arc` between the
//! consensus caller and the background flush loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use phs_core::cache::SizeBoundedCache;
use phs_core::error::StoreError;
use phs_core::traits::{ChainIndex, HeaderRepository};
use phs_core::types::{HashHeightPair, ProvenBlockHeader};

use crate::config::StoreConfig;
use crate::pending::{validate_sequence, PendingBatch};
use crate::repository::RocksHeaderRepository;
use crate::stats::StoreStats;

/// Lifecycle of a store. Reads and writes require [`Ready`](Self::Ready).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Uninitialized,
    Initializing,
    Ready,
}

/// Result of a single [`ProvenHeaderStore::flush`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    /// Pending entries taken out of the batch.
    pub flushed: usize,
    /// Records the repository actually wrote (identical records are skipped).
    pub written: usize,
    /// Durable tip after the flush, if anything was flushed.
    pub tip: Option<HashHeightPair>,
}

impl FlushOutcome {
    pub fn is_empty(&self) -> bool {
        self.flushed == 0
    }
}

pub struct ProvenHeaderStore {
    chain: Arc<dyn ChainIndex>,
    repository: Arc<dyn HeaderRepository>,
    cache: SizeBoundedCache<u64, ProvenBlockHeader>,
    pending: RwLock<PendingBatch>,
    /// Serializes flushes so batches reach the repository in order.
    flush_lock: Mutex<()>,
    state: RwLock<StoreState>,
    max_single_flush_size: usize,
    flush_count: AtomicU64,
    flushed_headers: AtomicU64,
    last_flush_duration: Mutex<Option<Duration>>,
    flush_nanos: AtomicU64,
    repository_reads: AtomicU64,
    repository_read_nanos: AtomicU64,
}

impl ProvenHeaderStore {
    /// Create an uninitialized store.
    ///
    /// `max_single_flush_size` is clamped to at least 1.
    pub fn new(
        chain: Arc<dyn ChainIndex>,
        repository: Arc<dyn HeaderRepository>,
        max_cache_bytes: usize,
        max_single_flush_size: usize,
    ) -> Self {
        Self {
            chain,
            repository,
            cache: SizeBoundedCache::new(max_cache_bytes),
            pending: RwLock::new(PendingBatch::new()),
            flush_lock: Mutex::new(()),
            state: RwLock::new(StoreState::Uninitialized),
            max_single_flush_size: max_single_flush_size.max(1),
            flush_count: AtomicU64::new(0),
            flushed_headers: AtomicU64::new(0),
            last_flush_duration: Mutex::new(None),
            flush_nanos: AtomicU64::new(0),
            repository_reads: AtomicU64::new(0),
            repository_read_nanos: AtomicU64::new(0),
        }
    }

    pub fn with_config(
        chain: Arc<dyn ChainIndex>,
        repository: Arc<dyn HeaderRepository>,
        config: &StoreConfig,
    ) -> Self {
        Self::new(
            chain,
            repository,
            config.max_cache_bytes,
            config.max_single_flush_size,
        )
    }

    /// Open the RocksDB repository at `config.db_path()` and wrap it.
    pub fn open(chain: Arc<dyn ChainIndex>, config: &StoreConfig) -> Result<Self, StoreError> {
        let repository = RocksHeaderRepository::open(config.db_path())?;
        Ok(Self::with_config(chain, Arc::new(repository), config))
    }

    // ------------------------------------------------------------------
    // Recovery
    // ------------------------------------------------------------------

    /// Reconcile the durable tip with `chain_tip` and mark the store ready.
    ///
    /// Returns the store tip after recovery. On failure the store goes back
    /// to [`StoreState::Uninitialized`] and may be initialized again.
    pub fn initialize(&self, chain_tip: HashHeightPair) -> Result<HashHeightPair, StoreError> {
        {
            let mut state = self.state.write();
            if *state != StoreState::Uninitialized {
                return Err(StoreError::AlreadyInitialized);
            }
            *state = StoreState::Initializing;
        }

        match self.recover(&chain_tip) {
            Ok(tip) => {
                *self.state.write() = StoreState::Ready;
                info!(tip = %tip, chain_tip = %chain_tip, "proven header store initialized");
                Ok(tip)
            }
            Err(e) => {
                *self.state.write() = StoreState::Uninitialized;
                error!(chain_tip = %chain_tip, "proven header store initialization failed: {e}");
                Err(e)
            }
        }
    }

    fn recover(&self, chain_tip: &HashHeightPair) -> Result<HashHeightPair, StoreError> {
        let genesis = self.chain.genesis().ok_or(StoreError::RecoveryFailed)?;
        let repo_tip = self.repository.initialize(genesis)?;

        if self.chain.is_ancestor_or_self(&repo_tip, chain_tip) {
            debug!(tip = %repo_tip, "repository tip is on the active chain");
            return Ok(repo_tip);
        }

        warn!(
            repo_tip = %repo_tip,
            chain_tip = %chain_tip,
            "repository tip is not on the active chain, searching for common point"
        );
        let fork = self.find_common_point(&repo_tip, chain_tip)?;

        let mut stale: Vec<u64> = (fork.height + 1..=repo_tip.height).collect();
        // A fallback to genesis can leave a foreign header at height 0.
        if let Some(header) = self.repository.get(fork.height)? {
            if header.hash() != fork.hash {
                stale.push(fork.height);
            }
        }
        self.repository.delete(fork, &stale)?;

        warn!(
            fork = %fork,
            removed = stale.len(),
            "rolled back proven headers above common point"
        );
        Ok(fork)
    }

    /// Walk persisted headers down from `repo_tip` until one is on the chain
    /// ending at `chain_tip`.
    fn find_common_point(
        &self,
        repo_tip: &HashHeightPair,
        chain_tip: &HashHeightPair,
    ) -> Result<HashHeightPair, StoreError> {
        // A canonical chain tip has every canonical header at or below it as
        // an ancestor, so the walk needs no per-height ancestor search.
        let tip_is_canonical = self.chain.contains(chain_tip);
        let mut height = repo_tip.height;
        loop {
            match self.repository.get(height)? {
                Some(header) => {
                    let candidate = HashHeightPair::new(header.hash(), height);
                    let on_chain = if tip_is_canonical {
                        height <= chain_tip.height && self.chain.contains(&candidate)
                    } else {
                        self.chain.is_ancestor_or_self(&candidate, chain_tip)
                    };
                    if on_chain {
                        return Ok(candidate);
                    }
                }
                None if height == repo_tip.height => {
                    error!(tip = %repo_tip, "repository tip has no stored header");
                    return Err(StoreError::RecoveryFailed);
                }
                None => {}
            }
            if height == 0 {
                break;
            }
            height -= 1;
        }

        match self.chain.genesis() {
            Some(genesis) if self.chain.is_ancestor_or_self(&genesis, chain_tip) => Ok(genesis),
            _ => Err(StoreError::RecoveryFailed),
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Header at `height`.
    pub fn get(&self, height: u64) -> Result<ProvenBlockHeader, StoreError> {
        let tip = self.ready_tip()?;
        if height > tip.height {
            return Err(StoreError::NotYetKnown {
                height,
                tip: tip.height,
            });
        }
        self.lookup(height)
    }

    /// `count` consecutive headers starting at `start`, in ascending order.
    pub fn get_range(&self, start: u64, count: u64) -> Result<Vec<ProvenBlockHeader>, StoreError> {
        let tip = self.ready_tip()?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let last = start.saturating_add(count - 1);
        if last > tip.height {
            return Err(StoreError::NotYetKnown {
                height: start.max(tip.height + 1),
                tip: tip.height,
            });
        }
        (start..=last).map(|height| self.lookup(height)).collect()
    }

    fn lookup(&self, height: u64) -> Result<ProvenBlockHeader, StoreError> {
        if let Some(header) = self.cache.get(&height) {
            return Ok(header);
        }
        if let Some(header) = self.pending.read().get(height) {
            return Ok(header.clone());
        }
        let started = Instant::now();
        let found = self.repository.get(height);
        self.repository_reads.fetch_add(1, Ordering::Relaxed);
        self.repository_read_nanos
            .fetch_add(elapsed_nanos(started.elapsed()), Ordering::Relaxed);
        match found? {
            Some(header) => {
                let size = header.serialized_size();
                self.cache.put(height, header.clone(), size);
                Ok(header)
            }
            None => Err(StoreError::HeaderNotFound(height)),
        }
    }

    /// Store tip: the latest pending header if any, else the durable tip.
    ///
    /// A pending tip below the durable tip (a stale height the next flush
    /// will reject) never hides persisted headers.
    pub fn tip(&self) -> Result<HashHeightPair, StoreError> {
        self.ready_tip()
    }

    fn ready_tip(&self) -> Result<HashHeightPair, StoreError> {
        self.require_ready()?;
        self.current_tip()?.ok_or(StoreError::NotInitialized)
    }

    fn current_tip(&self) -> Result<Option<HashHeightPair>, StoreError> {
        let pending = self.pending.read().tip();
        Ok(store_tip(pending, self.repository.tip()?))
    }

    fn require_ready(&self) -> Result<(), StoreError> {
        if *self.state.read() != StoreState::Ready {
            return Err(StoreError::NotInitialized);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Accept `header` as the new tip.
    ///
    /// The header is cached and queued for the next flush. Ordering is not
    /// checked here; an out-of-sequence batch is rejected at flush time.
    pub fn add_to_pending(
        &self,
        header: ProvenBlockHeader,
        new_tip: HashHeightPair,
    ) -> Result<(), StoreError> {
        self.require_ready()?;

        let size = header.serialized_size();
        self.cache.put(new_tip.height, header.clone(), size);

        let mut pending = self.pending.write();
        pending.push(new_tip, header);
        if pending.len() == self.max_single_flush_size {
            debug!(
                pending = pending.len(),
                "pending batch reached single flush limit"
            );
        }
        Ok(())
    }

    /// Persist up to `max_single_flush_size` pending headers.
    ///
    /// On any error the pending batch is left untouched so the next flush
    /// retries it.
    pub fn flush(&self) -> Result<FlushOutcome, StoreError> {
        self.require_ready()?;
        let _guard = self.flush_lock.lock();

        let items = self.pending.read().snapshot(self.max_single_flush_size);
        let Some((new_tip, _)) = items.last() else {
            return Ok(FlushOutcome::default());
        };
        let new_tip = *new_tip;

        let durable = self.repository.tip()?.ok_or(StoreError::NotInitialized)?;
        if let Err(e) = validate_sequence(&items, &durable) {
            error!(durable_tip = %durable, pending = items.len(), "{e}");
            return Err(e);
        }

        let started = Instant::now();
        let count = items.len();
        let records = items
            .into_iter()
            .map(|(tip, header)| (tip.height, header))
            .collect();
        let written = match self.repository.put(records, new_tip) {
            Ok(written) => written,
            Err(e) => {
                warn!(pending = count, "proven header flush failed, batch retained: {e}");
                return Err(e.into());
            }
        };
        let elapsed = started.elapsed();

        self.pending.write().drain_front(count);
        self.flush_count.fetch_add(1, Ordering::Relaxed);
        self.flushed_headers.fetch_add(count as u64, Ordering::Relaxed);
        self.flush_nanos
            .fetch_add(elapsed_nanos(elapsed), Ordering::Relaxed);
        *self.last_flush_duration.lock() = Some(elapsed);

        info!(
            flushed = count,
            written,
            tip = %new_tip,
            elapsed_ms = elapsed.as_millis() as u64,
            "flushed proven headers"
        );
        Ok(FlushOutcome {
            flushed: count,
            written,
            tip: Some(new_tip),
        })
    }

    // ------------------------------------------------------------------
    // Observability
    // ------------------------------------------------------------------

    pub fn state(&self) -> StoreState {
        *self.state.read()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.read().len()
    }

    /// Tip of the newest pending header, cleared once the batch is flushed.
    pub fn pending_tip(&self) -> Option<HashHeightPair> {
        self.pending.read().tip()
    }

    pub fn cache_count(&self) -> usize {
        self.cache.len()
    }

    pub fn cache_bytes(&self) -> usize {
        self.cache.total_bytes()
    }

    pub fn repository(&self) -> &Arc<dyn HeaderRepository> {
        &self.repository
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let repository_tip = self.repository.tip()?;
        let pending = self.pending.read();
        Ok(StoreStats {
            state: self.state(),
            tip: store_tip(pending.tip(), repository_tip),
            repository_tip,
            pending_count: pending.len(),
            cache_count: self.cache.len(),
            cache_bytes: self.cache.total_bytes(),
            cache_max_bytes: self.cache.max_bytes(),
            flush_count: self.flush_count.load(Ordering::Relaxed),
            flushed_headers: self.flushed_headers.load(Ordering::Relaxed),
            last_flush_duration: *self.last_flush_duration.lock(),
            total_flush_duration: Duration::from_nanos(self.flush_nanos.load(Ordering::Relaxed)),
            repository_reads: self.repository_reads.load(Ordering::Relaxed),
            repository_read_duration: Duration::from_nanos(
                self.repository_read_nanos.load(Ordering::Relaxed),
            ),
        })
    }
}

fn elapsed_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

fn store_tip(
    pending: Option<HashHeightPair>,
    durable: Option<HashHeightPair>,
) -> Option<HashHeightPair> {
    match (pending, durable) {
        (Some(p), Some(d)) if p.height < d.height => Some(d),
        (Some(p), _) => Some(p),
        (None, d) => d,
    }
}
