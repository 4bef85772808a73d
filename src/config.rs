//! Configuration surface consumed at [`crate::ZoneCache`] construction.
//!
//! Parsing config from a file or environment is out of scope (spec §1); this
//! module only defines the deserialized shape: a `serde`-derived struct with
//! a `Default` impl.

use serde::{Deserialize, Serialize};

/// Top-level configuration for a [`crate::ZoneCache`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneCacheConfig {
    /// Size of the S3FIFO DRAM tier, in megabytes.
    pub memory_size_mb: u64,
    /// Size of the flash-backed log + sets tiers, in megabytes.
    pub flash_size_mb: u64,
    /// Page size used by the Sets tier, in bytes.
    pub set_capacity: u32,
    /// Whether the cache should be treated as already warmed up.
    ///
    /// Per the Open Question resolution in `SPEC_FULL.md` §9, construction
    /// requires this key to be present (`Some(_)`), but its value does not
    /// otherwise change construction behavior: `warmed_up` is always set to
    /// `true` once construction succeeds.
    pub slow_warmup: Option<bool>,
    /// Reserved extension point for a pre-log admission filter. Always
    /// treated as absent by this implementation (second Open Question).
    pub pre_log_admission: Option<PreLogAdmissionConfig>,
}

impl Default for ZoneCacheConfig {
    fn default() -> Self {
        Self {
            memory_size_mb: 64,
            flash_size_mb: 1024,
            set_capacity: 4096,
            slow_warmup: Some(false),
            pre_log_admission: None,
        }
    }
}

/// Reserved configuration for a pre-log admission filter.
///
/// Never constructed by this crate; kept only so a config document that
/// mentions the key deserializes without error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreLogAdmissionConfig {
    /// Fraction of bytes admitted to the log ahead of the Sets tier.
    pub admission_byte_ratio: f64,
}
