//! Stats sink: a tree of named counters.
//!
//! Orchestration is single-threaded, so this is a plain `HashMap`-backed tree
//! rather than a `DashMap`-backed one; there is no concurrent writer here to
//! justify the extra synchronization.

use std::collections::HashMap;

/// Root registry of named counter collectors.
#[derive(Debug, Default)]
pub struct StatsRegistry {
    collectors: HashMap<String, LocalStatsCollector>,
}

impl StatsRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (or returns the existing) named collector.
    pub fn create_local_collector(&mut self, name: &str) -> &mut LocalStatsCollector {
        self.collectors.entry(name.to_string()).or_default()
    }

    /// Borrows a collector by name, if it exists.
    pub fn collector(&self, name: &str) -> Option<&LocalStatsCollector> {
        self.collectors.get(name)
    }
}

/// A single named collector: a flat map of counter name to value.
#[derive(Debug, Default, Clone)]
pub struct LocalStatsCollector {
    counters: HashMap<&'static str, u64>,
}

impl LocalStatsCollector {
    /// Adds `delta` to the named counter (creating it at `delta` if absent).
    pub fn add(&mut self, name: &'static str, delta: u64) {
        *self.counters.entry(name).or_insert(0) += delta;
    }

    /// Sets the named counter to an absolute value.
    pub fn set(&mut self, name: &'static str, value: u64) {
        self.counters.insert(name, value);
    }

    /// Reads the current value of a counter, defaulting to zero.
    pub fn get(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }
}

/// Names recognized by the stats sink, per spec §6.
pub mod counters {
    /// Hits served directly from the S3FIFO memory tier.
    pub const MEM_HITS: &str = "memHits";
    /// Hits served from the log tier.
    pub const LOG_HITS: &str = "logHits";
    /// Hits served from the sets tier.
    pub const SET_HITS: &str = "setHits";
    /// Bytes physically written by a tier.
    pub const BYTES_WRITTEN: &str = "bytes_written";
    /// Number of store requests issued to a tier.
    pub const STORES_REQUESTED: &str = "stores_requested";
    /// Bytes requested to be stored by a tier.
    pub const STORES_REQUESTED_BYTES: &str = "stores_requested_bytes";
    /// Aggregate hit counter.
    pub const HITS: &str = "hits";
    /// Aggregate miss counter.
    pub const MISSES: &str = "misses";
    /// Count of evictions.
    pub const NUM_EVICTIONS: &str = "numEvictions";
    /// Count of evictions triggered purely by size pressure.
    pub const SIZE_EVICTIONS: &str = "sizeEvictions";
    /// Current occupied size of a tier.
    pub const CURRENT_SIZE: &str = "current_size";
    /// Configured capacity of the S3FIFO tier.
    pub const S3FIFO_CACHE_CAPACITY: &str = "s3fifoCacheCapacity";
    /// Configured capacity of an LRU-style tier.
    pub const LRU_CACHE_CAPACITY: &str = "lruCacheCapacity";
}
