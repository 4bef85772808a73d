//! Error types shared across every tier of the simulator.
//!
//! Most of the design's failure taxonomy is already modeled by ordinary
//! return values (`bool` for a miss/refusal, `Vec<Candidate>` for an eviction
//! batch). [`SimError`] exists only for the one kind that is not recoverable:
//! a structural invariant violation, or a construction-time configuration
//! error.

use thiserror::Error;

/// Fatal or construction-time errors.
#[derive(Error, Debug)]
pub enum SimError {
    /// A tier's aggregate byte accounting exceeded its configured capacity.
    #[error("{component}: total size {total} exceeds capacity {capacity}")]
    CapacityExceeded {
        /// Name of the component reporting the violation.
        component: &'static str,
        /// Observed total.
        total: u64,
        /// Configured capacity.
        capacity: u64,
    },

    /// A configuration value required by a component was missing or invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Any other structural invariant violation that should never occur in
    /// a correct program.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SimError>;

/// Panics with a component-tagged message if `cond` is false.
///
/// Used for invariants so fundamental that recovering from them makes no
/// sense (e.g. an impossible cuckoo slot state); see spec §7.
macro_rules! invariant {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            panic!($($arg)+);
        }
    };
}

pub(crate) use invariant;
