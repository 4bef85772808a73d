//! Routing bank of [`SegmentIndex`] segments (spec §4.7 `SegmentIndexArray`).
//!
//! Grounded on `original_source/simulator/utils/SegmentIndexArray.{h,cpp}`.
//! Routes the same way [`super::quotient_index_array::QuotientIndexArray`]
//! does, so the Log tier can swap log engines behind an identical contract.

use crate::candidate::Candidate;
use crate::log::segment_index::SegmentIndex;

/// Per-segment capacity, matching the quotient sub-index size so the two
/// engines size comparably under the same `log_capacity` budget.
pub const SEGMENT_SIZE: usize = 16;

/// Equal-sized bank of [`SegmentIndex`] segments.
pub struct SegmentIndexArray {
    segments: Vec<SegmentIndex>,
    index_mask: u64,
}

impl SegmentIndexArray {
    /// Builds a routing bank covering `max_num_entries` total slots (rounded
    /// down to a whole number of segments).
    pub fn new(max_num_entries: usize) -> Self {
        let num_segments = (max_num_entries / SEGMENT_SIZE).max(1);
        let segments = (0..num_segments).map(|_| SegmentIndex::new(SEGMENT_SIZE)).collect();
        let index_mask = (num_segments) as u64 - 1;
        Self { segments, index_mask: index_mask.max(0) }
    }

    fn route(&self, id: u64) -> usize {
        if self.segments.len().is_power_of_two() {
            (id & self.index_mask) as usize
        } else {
            (id as usize) % self.segments.len()
        }
    }

    /// Inserts `item` into its routed segment.
    pub fn insert(&mut self, item: Candidate) -> Vec<Candidate> {
        let idx = self.route(item.id);
        self.segments[idx].insert(item)
    }

    /// Looks up `item.id` in its routed segment.
    pub fn find(&mut self, item: &Candidate) -> bool {
        let idx = self.route(item.id);
        self.segments[idx].find(item)
    }

    /// Force-admits `item` into its routed segment.
    pub fn readmit(&mut self, item: Candidate) -> bool {
        let idx = self.route(item.id);
        self.segments[idx].readmit(item);
        true
    }

    /// Records an id in its routed segment's ghost directory.
    pub fn ghost_insert(&mut self, id: u64) {
        let idx = self.route(id);
        self.segments[idx].ghost_insert(id);
    }

    /// Drains every segment.
    pub fn remove_all(&mut self) -> Vec<Candidate> {
        self.segments.iter_mut().flat_map(|s| s.remove_all()).collect()
    }

    /// Total capacity across all segments.
    pub fn capacity(&self) -> usize {
        self.segments.iter().map(|s| s.capacity()).sum()
    }

    /// Total populated slots across all segments.
    pub fn len(&self) -> usize {
        self.segments.iter().map(|s| s.len()).sum()
    }
}
