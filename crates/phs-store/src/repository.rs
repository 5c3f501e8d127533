//! RocksDB-backed proven header repository.
//!
//! Implements [`HeaderRepository`] using three column families: headers by
//! height, a hash-to-height index, and the tip pointer. All mutations use an
//! atomic [`WriteBatch`] so a crash never exposes a partial flush.
//!
//! The tip is read from disk once and then served from memory.

use std::path::Path;

use parking_lot::RwLock;
use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};

use phs_core::error::RepositoryError;
use phs_core::traits::{sort_for_insert, HeaderRepository};
use phs_core::types::{Hash256, HashHeightPair, ProvenBlockHeader};

use crate::stats::RepositoryStats;

// --- Column family names ---

const CF_HEADERS: &str = "headers";
const CF_HASH_INDEX: &str = "hash_index";
const CF_TIP: &str = "tip";

const ALL_CFS: &[&str] = &[CF_HEADERS, CF_HASH_INDEX, CF_TIP];

const TIP_KEY: &[u8] = b"tip";

/// RocksDB-backed proven header repository.
pub struct RocksHeaderRepository {
    db: DB,
    /// Cached tip; `None` until first read or write.
    tip: RwLock<Option<HashHeightPair>>,
}

impl RocksHeaderRepository {
    /// Open or create the database at `path`, creating missing column families.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cf_descriptors)
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        tracing::debug!(path = %path.as_ref().display(), "opened proven header database");

        Ok(Self {
            db,
            tip: RwLock::new(None),
        })
    }

    /// Number of stored headers. Walks the whole column family.
    pub fn header_count(&self) -> Result<u64, RepositoryError> {
        let cf = self.cf_handle(CF_HEADERS)?;
        let mut count = 0u64;
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            item.map_err(|e| RepositoryError::Storage(e.to_string()))?;
            count += 1;
        }
        Ok(count)
    }

    /// Summary of the stored headers and tip. Never writes.
    pub fn stats(&self) -> Result<RepositoryStats, RepositoryError> {
        let tip = self.tip()?;
        let cf = self.cf_handle(CF_HEADERS)?;
        let mut stats = RepositoryStats {
            tip,
            ..RepositoryStats::default()
        };
        let mut stored_up_to_tip = 0u64;
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, _) = item.map_err(|e| RepositoryError::Storage(e.to_string()))?;
            let height = Self::decode_height(&key)?;
            stats.header_count += 1;
            stats.lowest_height.get_or_insert(height);
            stats.highest_height = Some(height);
            if height > 0 && tip.is_some_and(|t| height <= t.height) {
                stored_up_to_tip += 1;
            }
        }
        stats.missing_heights = tip.map_or(0, |t| t.height.saturating_sub(stored_up_to_tip));
        Ok(stats)
    }

    /// Flush memtables to disk.
    pub fn flush_memtables(&self) -> Result<(), RepositoryError> {
        self.db
            .flush()
            .map_err(|e| RepositoryError::Storage(e.to_string()))
    }

    // --- Private helpers ---

    fn cf_handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily, RepositoryError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| RepositoryError::Storage(format!("missing column family: {name}")))
    }

    /// Encode a height as big-endian bytes for ordered iteration.
    fn height_key(height: u64) -> [u8; 8] {
        height.to_be_bytes()
    }

    fn decode_height(bytes: &[u8]) -> Result<u64, RepositoryError> {
        let raw: [u8; 8] = bytes
            .try_into()
            .map_err(|_| RepositoryError::Corrupt(format!("height key of {} bytes", bytes.len())))?;
        Ok(u64::from_be_bytes(raw))
    }

    fn encode<T: bincode::Encode>(value: &T) -> Result<Vec<u8>, RepositoryError> {
        bincode::encode_to_vec(value, bincode::config::standard())
            .map_err(|e| RepositoryError::Codec(e.to_string()))
    }

    fn decode<T: bincode::Decode<()>>(bytes: &[u8]) -> Result<T, RepositoryError> {
        let (value, _): (T, _) = bincode::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| RepositoryError::Codec(e.to_string()))?;
        Ok(value)
    }

    fn read_tip(&self) -> Result<Option<HashHeightPair>, RepositoryError> {
        let cf = self.cf_handle(CF_TIP)?;
        match self
            .db
            .get_cf(&cf, TIP_KEY)
            .map_err(|e| RepositoryError::Storage(e.to_string()))?
        {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write(&self, batch: WriteBatch) -> Result<(), RepositoryError> {
        self.db
            .write(batch)
            .map_err(|e| RepositoryError::Storage(e.to_string()))
    }
}

impl HeaderRepository for RocksHeaderRepository {
    fn initialize(&self, default_tip: HashHeightPair) -> Result<HashHeightPair, RepositoryError> {
        if let Some(tip) = self.tip()? {
            return Ok(tip);
        }

        let cf_tip = self.cf_handle(CF_TIP)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(cf_tip, TIP_KEY, Self::encode(&default_tip)?);
        self.write(batch)?;

        *self.tip.write() = Some(default_tip);
        tracing::info!(tip = %default_tip, "initialized proven header repository");
        Ok(default_tip)
    }

    fn tip(&self) -> Result<Option<HashHeightPair>, RepositoryError> {
        if let Some(tip) = *self.tip.read() {
            return Ok(Some(tip));
        }
        let tip = self.read_tip()?;
        if tip.is_some() {
            *self.tip.write() = tip;
        }
        Ok(tip)
    }

    fn get(&self, height: u64) -> Result<Option<ProvenBlockHeader>, RepositoryError> {
        let cf = self.cf_handle(CF_HEADERS)?;
        match self
            .db
            .get_cf(&cf, Self::height_key(height))
            .map_err(|e| RepositoryError::Storage(e.to_string()))?
        {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn get_range(&self, start: u64, count: u64) -> Result<Vec<ProvenBlockHeader>, RepositoryError> {
        let cf = self.cf_handle(CF_HEADERS)?;
        let key = Self::height_key(start);
        let mut headers = Vec::new();
        let mut expected = start;

        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&key, Direction::Forward));
        for item in iter {
            if headers.len() as u64 >= count {
                break;
            }
            let (key_bytes, value_bytes) =
                item.map_err(|e| RepositoryError::Storage(e.to_string()))?;
            if Self::decode_height(&key_bytes)? != expected {
                break;
            }
            headers.push(Self::decode(&value_bytes)?);
            expected += 1;
        }
        Ok(headers)
    }

    fn height_of(&self, hash: &Hash256) -> Result<Option<u64>, RepositoryError> {
        let cf = self.cf_handle(CF_HASH_INDEX)?;
        match self
            .db
            .get_cf(&cf, hash.as_bytes())
            .map_err(|e| RepositoryError::Storage(e.to_string()))?
        {
            Some(bytes) => Ok(Some(Self::decode_height(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put(
        &self,
        items: Vec<(u64, ProvenBlockHeader)>,
        new_tip: HashHeightPair,
    ) -> Result<usize, RepositoryError> {
        let cf_headers = self.cf_handle(CF_HEADERS)?;
        let cf_hash_index = self.cf_handle(CF_HASH_INDEX)?;
        let cf_tip = self.cf_handle(CF_TIP)?;

        let mut batch = WriteBatch::default();
        let mut written = 0usize;

        for (height, header) in sort_for_insert(items) {
            let hash = header.hash();
            if let Some(existing) = self.get(height)? {
                let existing_hash = existing.hash();
                if existing_hash == hash {
                    continue;
                }
                batch.delete_cf(cf_hash_index, existing_hash.as_bytes());
            }
            batch.put_cf(cf_headers, Self::height_key(height), Self::encode(&header)?);
            batch.put_cf(cf_hash_index, hash.as_bytes(), Self::height_key(height));
            written += 1;
        }
        batch.put_cf(cf_tip, TIP_KEY, Self::encode(&new_tip)?);

        self.write(batch)?;
        *self.tip.write() = Some(new_tip);

        tracing::debug!(written, tip = %new_tip, "wrote proven headers");
        Ok(written)
    }

    fn delete(&self, new_tip: HashHeightPair, heights: &[u64]) -> Result<(), RepositoryError> {
        let cf_headers = self.cf_handle(CF_HEADERS)?;
        let cf_hash_index = self.cf_handle(CF_HASH_INDEX)?;
        let cf_tip = self.cf_handle(CF_TIP)?;

        let mut batch = WriteBatch::default();
        let mut removed = 0usize;
        for &height in heights {
            if let Some(header) = self.get(height)? {
                batch.delete_cf(cf_headers, Self::height_key(height));
                batch.delete_cf(cf_hash_index, header.hash().as_bytes());
                removed += 1;
            }
        }
        batch.put_cf(cf_tip, TIP_KEY, Self::encode(&new_tip)?);

        self.write(batch)?;
        *self.tip.write() = Some(new_tip);

        tracing::debug!(removed, tip = %new_tip, "deleted proven headers");
        Ok(())
    }
}
