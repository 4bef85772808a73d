//! Bounded circular-buffer log segment with probabilistic admission
//! (spec §4.7).
//!
//! Grounded on `original_source/simulator/utils/SegmentIndex.{h,cpp}`.

use std::collections::{HashSet, VecDeque};

use rand::Rng;

use crate::candidate::Candidate;

/// Admission probability for a never-seen-before id, mirroring the
/// original's `misc::Rand`-driven ~1% coin flip.
const COLD_ADMISSION_PROBABILITY: f64 = 0.01;

/// A bounded ring buffer of candidates with a sibling ghost FIFO.
pub struct SegmentIndex {
    buffer: Vec<Option<Candidate>>,
    capacity: usize,
    write_cursor: usize,
    count: usize,

    ghost_queue: VecDeque<u64>,
    ghost_ids: HashSet<u64>,
    ghost_capacity: usize,
}

impl SegmentIndex {
    /// Builds a segment holding up to `capacity` candidates.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![None; capacity.max(1)],
            capacity: capacity.max(1),
            write_cursor: 0,
            count: 0,
            ghost_queue: VecDeque::new(),
            ghost_ids: HashSet::new(),
            ghost_capacity: capacity.max(1) * 8,
        }
    }

    /// Populated slot count.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the segment holds no candidates.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Total slot capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether `id` is currently in the ghost directory.
    pub fn ghost_contains(&self, id: u64) -> bool {
        self.ghost_ids.contains(&id)
    }

    fn remove_from_ghost(&mut self, id: u64) -> bool {
        if self.ghost_ids.remove(&id) {
            self.ghost_queue.retain(|&g| g != id);
            true
        } else {
            false
        }
    }

    /// Records an id in the ghost directory.
    pub fn ghost_insert(&mut self, id: u64) {
        if self.ghost_ids.insert(id) {
            self.ghost_queue.push_back(id);
            while self.ghost_queue.len() > self.ghost_capacity {
                if let Some(old) = self.ghost_queue.pop_front() {
                    self.ghost_ids.remove(&old);
                }
            }
        }
    }

    fn place(&mut self, item: Candidate) -> Vec<Candidate> {
        let mut evicted = Vec::new();
        if self.count == self.capacity {
            if let Some(victim) = self.buffer[self.write_cursor].take() {
                if victim.hit_count > 0 {
                    evicted.push(victim);
                } else {
                    self.ghost_insert(victim.id);
                }
            }
        } else {
            self.count += 1;
        }
        self.buffer[self.write_cursor] = Some(item);
        self.write_cursor = (self.write_cursor + 1) % self.capacity;
        evicted
    }

    /// Admits `item` probabilistically (cold) or warmly if it was recently
    /// ghosted. Returns any warm candidate the overwrite evicted.
    pub fn insert(&mut self, mut item: Candidate) -> Vec<Candidate> {
        if self.remove_from_ghost(item.id) {
            item.hit_count = 1;
            self.place(item)
        } else if rand::thread_rng().gen_bool(COLD_ADMISSION_PROBABILITY) {
            item.hit_count = 0;
            self.place(item)
        } else {
            Vec::new()
        }
    }

    /// Force-admits `item` regardless of the probabilistic gate (used for
    /// readmission of already-known-warm items).
    pub fn readmit(&mut self, item: Candidate) -> Vec<Candidate> {
        self.place(item)
    }

    /// Linear-scans for `item.id`, incrementing its hit count on a match.
    pub fn find(&mut self, item: &Candidate) -> bool {
        for slot in self.buffer.iter_mut().flatten() {
            if slot.id == item.id {
                slot.hit_count += 1;
                return true;
            }
        }
        false
    }

    /// Drains the buffer, returning every stored candidate and resetting
    /// cursors.
    pub fn remove_all(&mut self) -> Vec<Candidate> {
        let out: Vec<Candidate> = self.buffer.iter_mut().filter_map(|s| s.take()).collect();
        self.write_cursor = 0;
        self.count = 0;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ghost_readmission_is_warm_and_bypasses_gate() {
        let mut s = SegmentIndex::new(4);
        s.ghost_insert(7);
        let evicted = s.insert(Candidate::new(7, 1));
        assert!(evicted.is_empty());
        assert!(s.find(&Candidate::new(7, 0)));
        assert!(!s.ghost_contains(7));
    }

    #[test]
    fn readmit_always_places_regardless_of_gate() {
        let mut s = SegmentIndex::new(2);
        s.readmit(Candidate::new(1, 1));
        s.readmit(Candidate::new(2, 1));
        assert_eq!(s.len(), 2);
        assert!(s.find(&Candidate::new(1, 0)));
        assert!(s.find(&Candidate::new(2, 0)));
    }

    #[test]
    fn full_buffer_overwrites_oldest_cold_slot() {
        let mut s = SegmentIndex::new(2);
        s.readmit(Candidate::new(1, 1));
        s.readmit(Candidate::new(2, 1));
        // Both are cold (hit_count == 0 via readmit default unless set);
        // overwriting the oldest (id 1) should not emit an eviction.
        let evicted = s.readmit(Candidate::new(3, 1));
        assert!(evicted.is_empty());
        assert!(!s.find(&Candidate::new(1, 0)));
        assert!(s.find(&Candidate::new(3, 0)));
    }

    #[test]
    fn remove_all_drains_and_resets() {
        let mut s = SegmentIndex::new(3);
        s.readmit(Candidate::new(1, 1));
        s.readmit(Candidate::new(2, 1));
        let out = s.remove_all();
        assert_eq!(out.len(), 2);
        assert_eq!(s.len(), 0);
    }
}
