//! Store defaults.

/// Default memory budget of the header cache (100 MiB).
pub const DEFAULT_MAX_CACHE_BYTES: usize = 100 * 1024 * 1024;

/// Default number of pending headers taken by a single flush.
pub const DEFAULT_MAX_SINGLE_FLUSH_SIZE: usize = 5_000;

/// Default period between background flushes, in seconds.
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 60;

/// Default delay before the first background flush, in seconds.
pub const DEFAULT_FLUSH_INITIAL_DELAY_SECS: u64 = 60;

/// Size estimate for a header whose encoded length is unavailable.
pub const ESTIMATED_HEADER_SIZE: usize = 450;
