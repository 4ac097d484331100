//! The unit of borrowing.

use std::fmt;
use std::sync::Arc;

/// A keyed entry in a [`Library`](super::Library).
///
/// The value is shared: slots created by growing the library point at the
/// same payload as the slot they were duplicated from.
pub struct Slot<T> {
    key: usize,
    value: Arc<T>,
}

impl<T> Slot<T> {
    pub(crate) fn new(key: usize, value: Arc<T>) -> Self {
        Self { key, value }
    }

    /// Key assigned when the slot was added
    pub fn key(&self) -> usize {
        self.key
    }

    /// Borrow the payload
    pub fn value(&self) -> &T {
        &self.value
    }

    /// The shared handle to the payload
    pub fn shared(&self) -> &Arc<T> {
        &self.value
    }

    /// Whether `other` has the same key and points at the same payload
    pub fn is_same(&self, other: &Slot<T>) -> bool {
        self.key == other.key && Arc::ptr_eq(&self.value, &other.value)
    }
}

// Manual impl: cloning a slot never requires `T: Clone`.
impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            value: Arc::clone(&self.value),
        }
    }
}

impl<T: PartialEq> PartialEq for Slot<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.value == other.value
    }
}

impl<T: Eq> Eq for Slot<T> {}

impl<T: fmt::Debug> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("key", &self.key)
            .field("value", &*self.value)
            .finish()
    }
}
