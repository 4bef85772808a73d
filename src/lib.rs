//! # ZoneCache Simulator
//!
//! A hierarchical flash-aware cache simulator: an S3FIFO DRAM tier, a
//! quotient-indexed (or segment-indexed) flash log tier, and a
//! cuckoo-hashed flash page store, coordinated by [`ZoneCache`].
//!
//! ## Architecture
//!
//! - `candidate`: the universal value types (`Candidate`, `Page`) flowing
//!   through every tier
//! - `config`: the deserialized configuration surface for [`ZoneCache`]
//! - `error`: the fatal-failure taxonomy (`SimError`) and the
//!   `invariant!` macro used for structural assertions
//! - `stats`: the named-counter stats sink
//! - `trace`: trace source iteration and exit reporting
//! - `memcache`: the S3FIFO DRAM tier
//! - `log`: the flash log tier (quotient-indexed by default, segment-indexed
//!   as an alternative), generic over its indexing engine
//! - `sets`: the cuckoo-hashed flash page store
//! - `zonecache`: the coordinator tying the three tiers together
//!
//! Data flows top-down on insert (memory → log → sets) and is probed
//! top-down on lookup, with exactly one cycle: a hit candidate evicted from
//! the sets tier is handed back to the log tier for readmission.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod candidate;
pub mod config;
pub mod error;
pub mod log;
pub mod memcache;
pub mod sets;
pub mod stats;
pub mod trace;
pub mod zonecache;

pub use candidate::{Candidate, Page};
pub use config::{PreLogAdmissionConfig, ZoneCacheConfig};
pub use error::{Result, SimError};
pub use log::{QuotientIndex, QuotientIndexArray, SLog, SegmentIndex, SegmentIndexArray, SegmentLog};
pub use memcache::S3Fifo;
pub use sets::{CuckooHashMap, CuckooSets};
pub use stats::StatsRegistry;
pub use trace::{exit_report, ExitReport, TraceSource};
pub use zonecache::ZoneCache;

/// Crate version, as reported by Cargo.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name, as reported by Cargo.
pub const NAME: &str = env!("CARGO_PKG_NAME");
