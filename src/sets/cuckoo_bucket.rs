//! Spinlock, per-bucket chained timestamp, and bucket slot storage (spec §4.6).
//!
//! Grounded on `original_source/simulator/utils/CuckooHashBucket.h`. The
//! spinlock is a hand-rolled test-and-set lock over `AtomicBool` rather than
//! `parking_lot::Mutex` or `std::sync::Mutex` — both may suspend the OS
//! thread under contention, while spec §5 requires a pure spin/test-and-set
//! discipline for the bounded critical sections `CuckooHashMap` takes. The
//! `AtomicBool` compare-exchange pattern itself is the same one already
//! idiomatic in this retrieval pack (see
//! `other_examples/986bdcdb_kclaka-colander…sieve.rs.rs`).

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::candidate::Page;

/// Number of slots in every bucket.
pub const SLOTS_PER_BUCKET: usize = 4;

/// A test-and-set spinlock guarding a `T`.
///
/// Any panic between acquiring and releasing still releases the lock: the
/// guard's `Drop` impl stores `false` unconditionally (spec §9 "Spinlock
/// discipline").
pub struct SpinLock<T> {
    flag: AtomicBool,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Wraps `data` behind a new, unlocked spinlock.
    pub fn new(data: T) -> Self {
        Self { flag: AtomicBool::new(false), data: UnsafeCell::new(data) }
    }

    /// Spins until the lock is acquired.
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        while self.flag.compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed).is_err() {
            while self.flag.load(Ordering::Relaxed) {
                std::hint::spin_loop();
            }
        }
        SpinLockGuard { lock: self }
    }

    /// Attempts to acquire the lock without spinning.
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        self.flag
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SpinLockGuard { lock: self })
    }
}

/// RAII guard releasing its [`SpinLock`] on drop.
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.flag.store(false, Ordering::Release);
    }
}

/// A chained, monotonically increasing 8-bit per-bucket timestamp.
///
/// Models a lazy bounded MRU stack of up to 256 versions: `next` is the
/// timestamp that will be handed out on the next allocation, `oldest` is the
/// tail boundary advanced by [`Self::remove_timestamp`]. The valid window is
/// the open interval `(oldest, next)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CuckooHashTimestamp {
    next: u8,
    oldest: u8,
}

impl CuckooHashTimestamp {
    /// Whether any version has ever been allocated.
    pub fn is_empty(&self) -> bool {
        self.next == self.oldest
    }

    /// Allocates and returns the next partial, advancing `next`.
    pub fn get_new_timestamp(&mut self) -> u8 {
        let p = self.next;
        self.next = self.next.wrapping_add(1);
        p
    }

    /// The most recently allocated partial, if any version exists.
    pub fn try_read_newest_timestamp(&self) -> Option<u8> {
        if self.is_empty() {
            None
        } else {
            Some(self.next.wrapping_sub(1))
        }
    }

    /// Steps from `p` to the next older partial still within the valid
    /// window, or `None` once the window is exhausted.
    pub fn try_read_next_timestamp(&self, p: u8) -> Option<u8> {
        let window = self.next.wrapping_sub(self.oldest);
        let dist = self.next.wrapping_sub(p);
        if dist < window {
            Some(p.wrapping_sub(1))
        } else {
            None
        }
    }

    /// Advances `oldest` iff `p == oldest` (tail collection). Idempotent
    /// when `p` has already been collected (spec §8 property 5).
    pub fn remove_timestamp(&mut self, p: u8) {
        if p == self.oldest {
            self.oldest = self.oldest.wrapping_add(1);
        }
    }
}

/// One physical slot in a bucket.
#[derive(Debug, Clone, Default)]
pub struct Slot {
    pub occupied: bool,
    pub inplace: bool,
    pub partial: u8,
    pub value: u64,
    pub page: Option<Page>,
}

impl Slot {
    /// `occupied ∧ (this.inplace == inplace) ∧ (this.partial == partial)`
    /// (spec §4.6 `isIdentical`).
    pub fn is_identical(&self, partial: u8, inplace: bool) -> bool {
        self.occupied && self.inplace == inplace && self.partial == partial
    }
}

/// The data guarded by one bucket's [`SpinLock`]: its four slots plus the
/// bucket's own chained timestamp.
#[derive(Debug, Default)]
pub struct BucketData {
    pub slots: [Slot; SLOTS_PER_BUCKET],
    pub timestamp: CuckooHashTimestamp,
}

impl BucketData {
    /// Index of a free slot, if any.
    pub fn free_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| !s.occupied)
    }
}
