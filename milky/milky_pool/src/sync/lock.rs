//! Mutex that records how it is used.
//!
//! Every library operation runs under one of these, so the counters describe
//! how contended the pool is across all worker threads.

use log::trace;
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Point-in-time copy of a [`TrackedMutex`]'s counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LockStats {
    /// Number of times the lock was acquired
    pub acquisitions: u64,

    /// Total time spent waiting for the lock (microseconds)
    pub total_wait_us: u64,

    /// Total time the lock was held (microseconds)
    pub total_hold_us: u64,

    /// Longest single wait (microseconds)
    pub max_wait_us: u64,

    /// Longest single hold (microseconds)
    pub max_hold_us: u64,
}

impl LockStats {
    /// Average wait divided by average hold. Zero when nothing was held.
    pub fn contention_factor(&self) -> f64 {
        if self.acquisitions == 0 || self.total_hold_us == 0 {
            return 0.0;
        }

        self.total_wait_us as f64 / self.total_hold_us as f64
    }
}

#[derive(Debug, Default)]
struct Counters {
    acquisitions: AtomicU64,
    total_wait_us: AtomicU64,
    total_hold_us: AtomicU64,
    max_wait_us: AtomicU64,
    max_hold_us: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> LockStats {
        LockStats {
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            total_wait_us: self.total_wait_us.load(Ordering::Relaxed),
            total_hold_us: self.total_hold_us.load(Ordering::Relaxed),
            max_wait_us: self.max_wait_us.load(Ordering::Relaxed),
            max_hold_us: self.max_hold_us.load(Ordering::Relaxed),
        }
    }
}

/// Whole microseconds in `elapsed`, saturating at `u64::MAX`.
fn micros(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
}

/// Raise `slot` to `value` if it is larger, without losing concurrent updates.
fn record_max(slot: &AtomicU64, value: u64) {
    let mut current = slot.load(Ordering::Relaxed);

    while value > current {
        match slot.compare_exchange(current, value, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => break,
            Err(actual) => current = actual,
        }
    }
}

/// A named mutex with wait/hold statistics
pub struct TrackedMutex<T> {
    mutex: Mutex<T>,
    counters: Counters,
    name: String,
}

/// Guard returned by [`TrackedMutex::lock`]; hold time is recorded on drop
pub struct TrackedMutexGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    acquired_at: Instant,
    counters: &'a Counters,
    name: &'a str,
}

impl<T> TrackedMutex<T> {
    /// Create a new tracked mutex named `name` for diagnostics
    pub fn new(value: T, name: impl Into<String>) -> Self {
        Self {
            mutex: Mutex::new(value),
            counters: Counters::default(),
            name: name.into(),
        }
    }

    /// Block until the lock is acquired
    pub fn lock(&self) -> TrackedMutexGuard<'_, T> {
        let start = Instant::now();
        let guard = self.mutex.lock();
        let wait = start.elapsed();
        let wait_us = micros(wait);

        self.counters.acquisitions.fetch_add(1, Ordering::Relaxed);
        self.counters
            .total_wait_us
            .fetch_add(wait_us, Ordering::Relaxed);
        record_max(&self.counters.max_wait_us, wait_us);

        trace!(
            "Lock acquired: {} (wait time: {:.2}ms)",
            self.name,
            wait.as_secs_f64() * 1000.0
        );

        TrackedMutexGuard {
            guard,
            acquired_at: Instant::now(),
            counters: &self.counters,
            name: &self.name,
        }
    }

    /// Current counters
    pub fn stats(&self) -> LockStats {
        self.counters.snapshot()
    }

    /// Name given at construction
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Drop for TrackedMutexGuard<'_, T> {
    fn drop(&mut self) {
        let held = self.acquired_at.elapsed();
        let held_us = micros(held);

        self.counters
            .total_hold_us
            .fetch_add(held_us, Ordering::Relaxed);
        record_max(&self.counters.max_hold_us, held_us);

        trace!(
            "Lock released: {} (held for: {:.2}ms)",
            self.name,
            held.as_secs_f64() * 1000.0
        );
    }
}

impl<T> std::ops::Deref for TrackedMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T> std::ops::DerefMut for TrackedMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}
