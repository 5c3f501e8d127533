//! Integration test suite for the proven header store.
//!
//! Exercises recovery against reorganized chains, large pending batches,
//! flush sequencing, and the background flush loop over both the RocksDB
//! and in-memory repositories.

pub mod helpers;
