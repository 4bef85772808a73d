//! The flash-backed log tier (spec §4.2), generic over its indexing engine
//! so the quotient-index and segment-index designs can be swapped behind an
//! identical contract (spec §4.7).

mod quotient_entry;
mod quotient_index;
mod quotient_index_array;
mod segment_index;
mod segment_index_array;

pub use quotient_index::QuotientIndex;
pub use quotient_index_array::QuotientIndexArray;
pub use segment_index::SegmentIndex;
pub use segment_index_array::SegmentIndexArray;

use crate::candidate::Candidate;
use crate::error::invariant;

/// The contract shared by [`QuotientIndexArray`] and [`SegmentIndexArray`],
/// letting [`Log`] be instantiated over either (spec §4.7).
pub trait LogIndexEngine {
    /// Inserts `item`, returning any candidates evicted to make room.
    fn insert(&mut self, item: Candidate) -> Vec<Candidate>;
    /// Looks up `item.id`.
    fn find(&mut self, item: &Candidate) -> bool;
    /// Attempts to readmit a previously evicted item; `false` if refused.
    fn readmit(&mut self, item: Candidate) -> bool;
    /// Records an id in the engine's ghost directory.
    fn ghost_insert(&mut self, id: u64);
    /// Drains the whole engine, returning every stored candidate.
    fn remove_all(&mut self) -> Vec<Candidate>;
    /// Total slot capacity.
    fn capacity(&self) -> usize;
    /// Total populated slots.
    fn len(&self) -> usize;
}

impl LogIndexEngine for QuotientIndexArray {
    fn insert(&mut self, item: Candidate) -> Vec<Candidate> {
        QuotientIndexArray::insert(self, item)
    }
    fn find(&mut self, item: &Candidate) -> bool {
        QuotientIndexArray::find(self, item)
    }
    fn readmit(&mut self, item: Candidate) -> bool {
        QuotientIndexArray::readmit(self, item)
    }
    fn ghost_insert(&mut self, id: u64) {
        QuotientIndexArray::ghost_insert(self, id)
    }
    fn remove_all(&mut self) -> Vec<Candidate> {
        QuotientIndexArray::remove_all(self)
    }
    fn capacity(&self) -> usize {
        QuotientIndexArray::capacity(self)
    }
    fn len(&self) -> usize {
        QuotientIndexArray::len(self)
    }
}

impl LogIndexEngine for SegmentIndexArray {
    fn insert(&mut self, item: Candidate) -> Vec<Candidate> {
        SegmentIndexArray::insert(self, item)
    }
    fn find(&mut self, item: &Candidate) -> bool {
        SegmentIndexArray::find(self, item)
    }
    fn readmit(&mut self, item: Candidate) -> bool {
        SegmentIndexArray::readmit(self, item)
    }
    fn ghost_insert(&mut self, id: u64) {
        SegmentIndexArray::ghost_insert(self, id)
    }
    fn remove_all(&mut self) -> Vec<Candidate> {
        SegmentIndexArray::remove_all(self)
    }
    fn capacity(&self) -> usize {
        SegmentIndexArray::capacity(self)
    }
    fn len(&self) -> usize {
        SegmentIndexArray::len(self)
    }
}

/// The log tier (spec §4.2), generic over its indexing engine.
pub struct Log<E: LogIndexEngine> {
    index: E,
    total_size: u64,
    total_capacity: u64,
    bytes_written: u64,
    stores_requested_bytes: u64,
}

impl<E: LogIndexEngine> Log<E> {
    /// Wraps `index`, bounding total accounted bytes at `total_capacity`.
    pub fn new(index: E, total_capacity: u64) -> Self {
        Self { index, total_size: 0, total_capacity, bytes_written: 0, stores_requested_bytes: 0 }
    }

    /// Inserts each item in turn, merging all evictions. Maintains
    /// `_total_size` and asserts it never exceeds `_total_capacity`.
    pub fn insert(&mut self, items: Vec<Candidate>) -> Vec<Candidate> {
        let mut all_evicted = Vec::new();
        for item in items {
            let evicted = self.index.insert(item);
            self.bytes_written += u64::from(item.obj_size);
            self.stores_requested_bytes += u64::from(item.obj_size);
            self.total_size += u64::from(item.obj_size);
            for e in &evicted {
                self.total_size = self.total_size.saturating_sub(u64::from(e.obj_size));
            }
            all_evicted.extend(evicted);
        }
        invariant!(
            self.total_size <= self.total_capacity,
            "Log: total_size {} exceeded capacity {}",
            self.total_size,
            self.total_capacity
        );
        all_evicted
    }

    /// Delegates to the index, updating hit counters on success.
    pub fn find(&mut self, item: &Candidate) -> bool {
        self.index.find(item)
    }

    /// Attempts to place each item back into the index, incrementing
    /// `_total_size` only for items that were actually placed.
    pub fn readmit(&mut self, items: Vec<Candidate>) {
        for item in items {
            if self.index.readmit(item) {
                self.total_size += u64::from(item.obj_size);
            }
        }
    }

    /// The sole cycle in the data flow (spec §4.8): an item evicted from the
    /// Sets tier comes back here. Warm items attempt a readmit; cold items
    /// are recorded only in the index's ghost state.
    pub fn insert_from_sets(&mut self, item: Candidate) {
        if item.hit_count > 0 {
            self.readmit(vec![item]);
        } else {
            self.index.ghost_insert(item.id);
        }
    }

    /// `bytes_written / stores_requested_bytes`, or 0 before any bytes have
    /// been requested.
    pub fn calc_write_amp(&self) -> f64 {
        if self.stores_requested_bytes == 0 {
            0.0
        } else {
            self.bytes_written as f64 / self.stores_requested_bytes as f64
        }
    }

    /// Current aggregate occupied bytes.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Borrows the underlying index engine.
    pub fn index(&self) -> &E {
        &self.index
    }

    /// Mutably borrows the underlying index engine.
    pub fn index_mut(&mut self) -> &mut E {
        &mut self.index
    }
}

/// The default log engine: quotient-indexed (spec §4.2/§4.3).
pub type SLog = Log<QuotientIndexArray>;

/// The alternate log engine: segment-indexed (spec §4.7).
pub type SegmentLog = Log<SegmentIndexArray>;

#[cfg(test)]
mod tests {
    use super::*;

    fn slog(max_entries: usize, capacity_bytes: u64) -> SLog {
        Log::new(QuotientIndexArray::new(max_entries), capacity_bytes)
    }

    #[test]
    fn insert_then_find_round_trips() {
        let mut log = slog(32, 1_000_000);
        let evicted = log.insert(vec![Candidate::new(5, 10)]);
        assert!(evicted.is_empty());
        assert!(log.find(&Candidate::new(5, 0)));
    }

    #[test]
    fn insert_from_sets_cold_item_only_ghosts() {
        let mut log = slog(32, 1_000_000);
        log.insert_from_sets(Candidate::new(7, 10));
        assert!(log.index().ghost_contains(7));
        assert!(!log.find(&Candidate::new(7, 0)));
    }

    #[test]
    fn insert_from_sets_warm_item_readmits() {
        let mut log = slog(32, 1_000_000);
        let mut item = Candidate::new(7, 10);
        item.hit_count = 2;
        log.insert_from_sets(item);
        assert!(log.find(&Candidate::new(7, 0)));
    }

    #[test]
    fn write_amp_tracks_bytes_written_over_requested() {
        let mut log = slog(32, 1_000_000);
        log.insert(vec![Candidate::new(1, 10), Candidate::new(2, 20)]);
        assert!((log.calc_write_amp() - 1.0).abs() < 1e-9);
    }
}
