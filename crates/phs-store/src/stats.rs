//! Point-in-time store and repository statistics.

use std::fmt;
use std::time::Duration;

use phs_core::types::HashHeightPair;

use crate::store::StoreState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub state: StoreState,
    /// Store tip: pending tip if any, else the durable tip.
    pub tip: Option<HashHeightPair>,
    pub repository_tip: Option<HashHeightPair>,
    pub pending_count: usize,
    pub cache_count: usize,
    pub cache_bytes: usize,
    pub cache_max_bytes: usize,
    /// Flushes that persisted at least one header.
    pub flush_count: u64,
    pub flushed_headers: u64,
    pub last_flush_duration: Option<Duration>,
    /// Time spent in repository writes across all flushes.
    pub total_flush_duration: Duration,
    /// Reads that missed the cache and the pending batch.
    pub repository_reads: u64,
    pub repository_read_duration: Duration,
}

/// Summary of a durable repository, gathered without writing to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryStats {
    pub tip: Option<HashHeightPair>,
    pub header_count: u64,
    pub lowest_height: Option<u64>,
    pub highest_height: Option<u64>,
    /// Heights in `1..=tip` with no stored header.
    pub missing_heights: u64,
}

fn fmt_tip(tip: &Option<HashHeightPair>) -> String {
    match tip {
        Some(t) => t.to_string(),
        None => "-".to_string(),
    }
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "====== ProvenHeaderStore.Stats ======")?;
        writeln!(f, "State:             {:?}", self.state)?;
        writeln!(f, "Tip:               {}", fmt_tip(&self.tip))?;
        writeln!(f, "Repository tip:    {}", fmt_tip(&self.repository_tip))?;
        writeln!(f, "Pending headers:   {}", self.pending_count)?;
        writeln!(
            f,
            "Cache:             {} entries, {} / {} bytes",
            self.cache_count, self.cache_bytes, self.cache_max_bytes
        )?;
        write!(
            f,
            "Flushes:           {} ({} headers)",
            self.flush_count, self.flushed_headers
        )?;
        if let Some(d) = self.last_flush_duration {
            write!(f, ", last took {} ms", d.as_millis())?;
        }
        writeln!(f, ", {} ms total", self.total_flush_duration.as_millis())?;
        write!(
            f,
            "Repository reads:  {} ({} ms total)",
            self.repository_reads,
            self.repository_read_duration.as_millis()
        )
    }
}

impl fmt::Display for RepositoryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "====== ProvenHeaderRepository.Stats ======")?;
        writeln!(f, "Tip:               {}", fmt_tip(&self.tip))?;
        write!(f, "Stored headers:    {}", self.header_count)?;
        if let (Some(low), Some(high)) = (self.lowest_height, self.highest_height) {
            write!(f, " (heights {low}..={high})")?;
        }
        writeln!(f)?;
        write!(f, "Missing below tip: {}", self.missing_heights)
    }
}
