//! S3FIFO DRAM tier with a ghost directory (spec §4.1).
//!
//! Grounded on `original_source/simulator/s3fifo.hpp`. S3FIFO distinguishes
//! "seen once" from "seen again" objects using a byte-budgeted ghost FIFO, so
//! only items with evidence of reuse advance to flash.

use std::collections::{HashMap, VecDeque};

use crate::candidate::Candidate;
use crate::error::invariant;

/// The S3FIFO memory tier.
pub struct S3Fifo {
    queue: VecDeque<u64>,
    tags: HashMap<u64, Candidate>,
    current_size: u64,

    ghost_queue: VecDeque<u64>,
    ghost_tags: HashMap<u64, Candidate>,
    ghost_size: u64,

    max_size: u64,

    hits: u64,
    misses: u64,
}

impl S3Fifo {
    /// Builds an S3FIFO tier with the given byte budget.
    ///
    /// Panics if `max_size == 0`: a cache that can admit nothing is a
    /// construction-time configuration error (spec §4.1, structural
    /// invariant).
    pub fn new(max_size: u64) -> Self {
        invariant!(max_size > 0, "S3Fifo: max_size must be positive");
        Self {
            queue: VecDeque::new(),
            tags: HashMap::new(),
            current_size: 0,
            ghost_queue: VecDeque::new(),
            ghost_tags: HashMap::new(),
            ghost_size: 0,
            max_size,
            hits: 0,
            misses: 0,
        }
    }

    /// Current occupied bytes of the live tier.
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    /// Configured byte budget.
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Number of live, admitted candidates.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether an id is currently admitted.
    pub fn contains(&self, id: u64) -> bool {
        self.tags.contains_key(&id)
    }

    /// Whether an id is currently in the ghost directory.
    pub fn ghost_contains(&self, id: u64) -> bool {
        self.ghost_tags.contains_key(&id)
    }

    /// Recorded hit count.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Recorded miss count.
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Inserts `item`, returning the candidates the caller must propagate to
    /// the next tier.
    pub fn insert(&mut self, item: Candidate) -> Vec<Candidate> {
        let mut evicted = Vec::new();

        if u64::from(item.obj_size) > self.max_size {
            log::trace!("s3fifo: {} oversize ({} > {}), immediate eviction", item.id, item.obj_size, self.max_size);
            evicted.push(item);
            return evicted;
        }

        if let Some(ghost) = self.ghost_tags.remove(&item.id) {
            self.ghost_size -= u64::from(ghost.obj_size);
            // The queue entry for this id is stale and dropped lazily on pop.
            let mut promoted = ghost;
            promoted.hit_count += 1;
            log::trace!("s3fifo: {} promoted from ghost", item.id);
            evicted.push(promoted);
            return evicted;
        }

        while self.current_size + u64::from(item.obj_size) > self.max_size {
            let Some(head_id) = self.queue.pop_front() else { break };
            let Some(head) = self.tags.remove(&head_id) else { continue };
            self.current_size -= u64::from(head.obj_size);

            if head.hit_count > 0 {
                log::trace!("s3fifo: evict warm {}", head.id);
                evicted.push(head);
            } else {
                log::trace!("s3fifo: evict cold {} to ghost", head.id);
                self.ghost_insert(head);
            }
        }

        let mut admitted = item;
        admitted.hit_count = 0;
        self.current_size += u64::from(admitted.obj_size);
        self.queue.push_back(admitted.id);
        self.tags.insert(admitted.id, admitted);

        evicted
    }

    /// Looks up `item.id`, bumping its hit count on a hit.
    pub fn find(&mut self, item: &Candidate) -> bool {
        if let Some(stored) = self.tags.get_mut(&item.id) {
            stored.hit_count += 1;
            self.hits += 1;
            true
        } else {
            self.misses += 1;
            false
        }
    }

    fn ghost_insert(&mut self, item: Candidate) {
        self.ghost_size += u64::from(item.obj_size);
        self.ghost_queue.push_back(item.id);
        self.ghost_tags.insert(item.id, item);

        while self.ghost_size > self.max_size {
            let Some(head_id) = self.ghost_queue.pop_front() else { break };
            if let Some(head) = self.ghost_tags.remove(&head_id) {
                self.ghost_size -= u64::from(head.obj_size);
            }
        }
    }
}
