//! End-to-end scenario transcriptions (spec §8).
//!
//! Scenarios A, C, D, E and F are exercised at the component level, next to
//! the code they cover (`log::quotient_index`, `sets::cuckoo_map`,
//! `memcache::s3fifo`, `sets`). Scenario B has no component-level home of its
//! own: a loadfactor check on a freshly built, half-empty table. It lives
//! here as the one cross-crate integration test, exercised through the
//! public re-exports in `lib.rs` rather than any private path.

use zonecache_sim::CuckooHashMap;

// Scenario B: q = 3 (8 buckets, 4 slots each), 8 inserts routed one per
// bucket. All succeed; the table is a quarter full; every key is findable.
#[test]
fn scenario_b_cuckoo_simple() {
    let map = CuckooHashMap::new(3);
    for i in 0u64..8 {
        let mut page = zonecache_sim::Page::new(64);
        assert!(page.try_push(zonecache_sim::Candidate::new(i, 1)));
        assert!(map.insert(i, i, page).is_none());
    }

    assert_eq!(map.loadfactor(), 0.25);
    for i in 0u64..8 {
        assert!(map.find(i, i), "key {i} should be findable after insert");
    }
}
