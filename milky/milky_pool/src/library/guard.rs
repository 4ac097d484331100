//! RAII borrow handles.

use log::trace;
use std::ops::Deref;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use super::pool::Library;
use super::slot::Slot;

/// A borrowed slot that goes back to its library when dropped.
///
/// The handle keeps only a weak reference: if the library is gone by the
/// time the guard drops, the slot is simply released.
pub struct SlotGuard<T> {
    slot: Option<Slot<T>>,
    library: Weak<Library<T>>,
    borrowed_at: Instant,
}

impl<T> SlotGuard<T> {
    fn new(slot: Slot<T>, library: &Arc<Library<T>>) -> Self {
        Self {
            slot: Some(slot),
            library: Arc::downgrade(library),
            borrowed_at: Instant::now(),
        }
    }

    /// The borrowed slot
    pub fn slot(&self) -> &Slot<T> {
        // Only `return_now`/`discard`/`drop` take the slot, and all consume the guard.
        match &self.slot {
            Some(slot) => slot,
            None => unreachable!("slot guard used after release"),
        }
    }

    /// Key of the borrowed slot
    pub fn key(&self) -> usize {
        self.slot().key()
    }

    /// Time since the slot was borrowed
    pub fn held_duration(&self) -> Duration {
        self.borrowed_at.elapsed()
    }

    /// Return the slot now instead of at drop
    pub fn return_now(mut self) {
        self.release();
    }

    /// Remove the slot from the library instead of returning it, e.g. when
    /// the value turned out to be permanently unusable
    pub fn discard(mut self) {
        if let Some(slot) = self.slot.take() {
            if let Some(library) = self.library.upgrade() {
                trace!("Discarding slot {}", slot.key());
                library.remove_identical(&slot);
            }
        }
    }

    fn release(&mut self) {
        if let Some(slot) = self.slot.take() {
            if let Some(library) = self.library.upgrade() {
                library.return_slot(&slot);
            }
        }
    }
}

impl<T> Deref for SlotGuard<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.slot().value()
    }
}

impl<T> Drop for SlotGuard<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> Library<T> {
    /// Borrow the lowest-keyed free slot behind a guard that returns it on drop
    pub fn borrow_first(self: &Arc<Self>) -> Option<SlotGuard<T>> {
        self.try_borrow_first().map(|slot| SlotGuard::new(slot, self))
    }

    /// Borrow a random free slot behind a guard that returns it on drop
    pub fn borrow_random(self: &Arc<Self>) -> Option<SlotGuard<T>> {
        self.try_borrow_random().map(|slot| SlotGuard::new(slot, self))
    }
}
