//! Trace source and exit-report contracts (spec §6).
//!
//! Parsing a trace and printing a report are both out of scope; only the
//! interfaces are defined here so a caller can plug in their own reader and
//! consume the derived metrics.

use crate::candidate::Candidate;
use crate::stats::{counters, StatsRegistry};

/// An ordered source of object references.
///
/// Blanket-implemented for any `Iterator<Item = Candidate>`, so a caller's
/// own trace reader (out of scope here) composes with the simulator for
/// free.
pub trait TraceSource: Iterator<Item = Candidate> {}

impl<T: Iterator<Item = Candidate>> TraceSource for T {}

/// Derived metrics emitted at the end of a simulation run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitReport {
    /// `1 - (memHits + logHits + setHits) / requests`.
    pub miss_rate: f64,
    /// `bytes_written / stores_requested_bytes`, per tier collector.
    pub write_amp: f64,
}

/// Computes the exit-contract metrics for a named collector (e.g. a single
/// tier's collector, or a combined one the caller assembled).
pub fn exit_report(stats: &StatsRegistry, collector_name: &str) -> ExitReport {
    let Some(c) = stats.collector(collector_name) else {
        return ExitReport { miss_rate: 0.0, write_amp: 0.0 };
    };

    let hits = c.get(counters::MEM_HITS) + c.get(counters::LOG_HITS) + c.get(counters::SET_HITS);
    let requests = hits + c.get(counters::MISSES);
    let miss_rate = if requests == 0 {
        0.0
    } else {
        1.0 - (hits as f64 / requests as f64)
    };

    let requested_bytes = c.get(counters::STORES_REQUESTED_BYTES);
    let write_amp = if requested_bytes == 0 {
        0.0
    } else {
        c.get(counters::BYTES_WRITTEN) as f64 / requested_bytes as f64
    };

    ExitReport { miss_rate, write_amp }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_report_of_empty_collector_is_zero() {
        let mut stats = StatsRegistry::new();
        stats.create_local_collector("tier");
        let report = exit_report(&stats, "tier");
        assert_eq!(report.miss_rate, 0.0);
        assert_eq!(report.write_amp, 0.0);
    }

    #[test]
    fn exit_report_computes_miss_rate_and_write_amp() {
        let mut stats = StatsRegistry::new();
        let c = stats.create_local_collector("tier");
        c.add(counters::MEM_HITS, 3);
        c.add(counters::MISSES, 1);
        c.add(counters::BYTES_WRITTEN, 50);
        c.add(counters::STORES_REQUESTED_BYTES, 100);

        let report = exit_report(&stats, "tier");
        assert!((report.miss_rate - 0.25).abs() < 1e-9);
        assert!((report.write_amp - 0.5).abs() < 1e-9);
    }
}
