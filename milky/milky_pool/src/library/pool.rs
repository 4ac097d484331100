//! The library: a pool of keyed slots that workers borrow exclusively.
//!
//! All state (the slot list, the borrowed key set and the random source) sits
//! behind one [`TrackedMutex`], so every operation is linearizable with
//! respect to that lock and `items`/`borrowed` are never observed torn.

use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::Arc;

use super::slot::Slot;
use crate::config::LibraryConfig;
use crate::error::LibraryError;
use crate::sync::{LockStats, TrackedMutex};

/// Counts taken together under the library lock
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LibraryStats {
    /// Number of slots held
    pub total: usize,

    /// Number of slots currently checked out
    pub borrowed: usize,

    /// Number of slots free to borrow
    pub available: usize,
}

struct LibraryState<T> {
    items: Vec<Slot<T>>,
    borrowed: HashSet<usize>,
    next_key: usize,
    rng: StdRng,
}

impl<T> LibraryState<T> {
    fn push(&mut self, value: Arc<T>) {
        let key = self.next_key;
        self.next_key += 1;
        self.items.push(Slot::new(key, value));
    }

    fn is_exhausted(&self) -> bool {
        self.borrowed.len() >= self.items.len()
    }

    fn checkout(&mut self, index: usize) -> Slot<T> {
        let slot = self.items[index].clone();
        self.borrowed.insert(slot.key());
        slot
    }

    fn stats(&self) -> LibraryStats {
        LibraryStats {
            total: self.items.len(),
            borrowed: self.borrowed.len(),
            available: self.items.len().saturating_sub(self.borrowed.len()),
        }
    }
}

/// A shared pool of reusable values (proxies, accounts, work units).
///
/// Workers borrow a slot, use its value, and return it. Keys are handed out
/// sequentially from 0 and are never reused until the next [`replace`].
///
/// [`replace`]: Library::replace
pub struct Library<T> {
    state: TrackedMutex<LibraryState<T>>,
    config: LibraryConfig,
}

impl<T> Default for Library<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Library<T> {
    /// Create an empty library with the default configuration
    pub fn new() -> Self {
        Self::with_config(LibraryConfig::default())
    }

    /// Create an empty library with the given configuration
    pub fn with_config(config: LibraryConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let state = LibraryState {
            items: Vec::new(),
            borrowed: HashSet::new(),
            next_key: 0,
            rng,
        };

        Self {
            state: TrackedMutex::new(state, config.name.clone()),
            config,
        }
    }

    /// Create a library holding `values` keyed from 0 in order
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let library = Self::new();
        library.replace(values);
        library
    }

    /// Configuration this library was built with
    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Append a slot holding `value`
    pub fn add(&self, value: T) {
        self.add_shared(Arc::new(value));
    }

    /// Append a slot holding an already shared value
    pub fn add_shared(&self, value: Arc<T>) {
        let mut state = self.state.lock();
        state.push(value);
        trace!("{}: added slot {}", self.config.name, state.next_key - 1);
    }

    /// Grow to `target` slots by duplicating values in index order.
    ///
    /// The `i`-th new slot copies whatever sits at position `i` of the live
    /// list, so once the pre-call slots are exhausted later copies are taken
    /// from copies made earlier in the same call.
    pub fn fill(&self, target: usize) -> Result<(), LibraryError> {
        let mut state = self.state.lock();
        let before = state.items.len();

        if before == 0 {
            return Err(LibraryError::Empty);
        }

        for index in 0..target.saturating_sub(before) {
            let value = Arc::clone(state.items[index].shared());
            state.push(value);
        }

        debug!(
            "{}: filled from {} to {} slots",
            self.config.name,
            before,
            state.items.len()
        );

        Ok(())
    }

    /// Grow to `target` slots by appending shuffled passes over the slots
    /// present at call start. The last pass is cut short at `target`.
    pub fn randomly_fill(&self, target: usize) -> Result<(), LibraryError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let before = state.items.len();

        if before == 0 {
            return Err(LibraryError::Empty);
        }

        while state.items.len() < target {
            let mut pass: Vec<Arc<T>> = state.items[..before]
                .iter()
                .map(|slot| Arc::clone(slot.shared()))
                .collect();
            pass.shuffle(&mut state.rng);

            let needed = target - state.items.len();
            for value in pass.into_iter().take(needed) {
                state.push(value);
            }
        }

        debug!(
            "{}: randomly filled from {} to {} slots",
            self.config.name,
            before,
            state.items.len()
        );

        Ok(())
    }

    /// Remove the slot matching `slot` by key and value, releasing its key
    /// if it was borrowed. Does nothing when no slot matches.
    pub fn remove(&self, slot: &Slot<T>)
    where
        T: PartialEq,
    {
        self.remove_matching(slot, |stored| stored == slot);
    }

    /// Remove the slot that is `slot` itself (same key, same shared value)
    pub(crate) fn remove_identical(&self, slot: &Slot<T>) {
        self.remove_matching(slot, |stored| stored.is_same(slot));
    }

    fn remove_matching<F>(&self, slot: &Slot<T>, matches: F)
    where
        F: Fn(&Slot<T>) -> bool,
    {
        let mut state = self.state.lock();

        if let Some(index) = state.items.iter().position(|stored| matches(stored)) {
            state.items.remove(index);
            state.borrowed.remove(&slot.key());
            debug!("{}: removed slot {}", self.config.name, slot.key());
        }
    }

    /// Discard every slot and rebuild from `values`, keyed from 0
    pub fn replace<I>(&self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        self.replace_shared(values.into_iter().map(Arc::new));
    }

    /// Same as [`replace`](Library::replace) for already shared values
    pub fn replace_shared<I>(&self, values: I)
    where
        I: IntoIterator<Item = Arc<T>>,
    {
        // Collected before locking so a caller's iterator never runs under the lock.
        let values: Vec<Arc<T>> = values.into_iter().collect();

        let mut state = self.state.lock();
        state.items.clear();
        state.borrowed.clear();
        state.next_key = 0;
        state.items.reserve(values.len());

        for value in values {
            state.push(value);
        }

        debug!(
            "{}: replaced contents with {} slots",
            self.config.name,
            state.items.len()
        );
    }

    /// Borrow the lowest-keyed free slot, or `None` if every slot is out
    pub fn try_borrow_first(&self) -> Option<Slot<T>> {
        let mut state = self.state.lock();

        if state.is_exhausted() {
            trace!("{}: exhausted", self.config.name);
            return None;
        }

        let index = state
            .items
            .iter()
            .position(|slot| !state.borrowed.contains(&slot.key()))?;
        let slot = state.checkout(index);

        trace!("{}: borrowed slot {}", self.config.name, slot.key());
        Some(slot)
    }

    /// Borrow a free slot chosen uniformly at random, or `None` if every
    /// slot is out
    pub fn try_borrow_random(&self) -> Option<Slot<T>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.is_exhausted() {
            trace!("{}: exhausted", self.config.name);
            return None;
        }

        let free: Vec<usize> = state
            .items
            .iter()
            .enumerate()
            .filter(|(_, slot)| !state.borrowed.contains(&slot.key()))
            .map(|(index, _)| index)
            .collect();
        let index = *free.choose(&mut state.rng)?;
        let slot = state.checkout(index);

        trace!("{}: borrowed slot {}", self.config.name, slot.key());
        Some(slot)
    }

    /// Make `slot.key()` available again.
    ///
    /// The key is trusted as given: it is not checked against the slot that
    /// was borrowed. A stale slot from before a [`replace`](Library::replace)
    /// frees whichever new slot now carries that key. Use
    /// [`return_slot_checked`](Library::return_slot_checked) to reject those.
    pub fn return_slot(&self, slot: &Slot<T>) {
        let mut state = self.state.lock();

        if state.borrowed.remove(&slot.key()) {
            trace!("{}: returned slot {}", self.config.name, slot.key());
        }
    }

    /// Return `slot` only if it is a borrowed slot of this library
    pub fn return_slot_checked(&self, slot: &Slot<T>) -> Result<(), LibraryError> {
        let mut state = self.state.lock();
        let key = slot.key();

        if !state.items.iter().any(|stored| stored.is_same(slot)) {
            warn!("{}: rejected return of unknown slot {}", self.config.name, key);
            return Err(LibraryError::UnknownSlot { key });
        }

        if !state.borrowed.remove(&key) {
            warn!("{}: rejected return of idle slot {}", self.config.name, key);
            return Err(LibraryError::NotBorrowed { key });
        }

        trace!("{}: returned slot {}", self.config.name, key);
        Ok(())
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Whether the library holds no slots
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Number of slots currently checked out
    pub fn borrowed_count(&self) -> usize {
        self.state.lock().borrowed.len()
    }

    /// Number of slots free to borrow
    pub fn available_count(&self) -> usize {
        self.state.lock().stats().available
    }

    /// Whether `key` is currently checked out
    pub fn is_borrowed(&self, key: usize) -> bool {
        self.state.lock().borrowed.contains(&key)
    }

    /// Copy of the slot list in insertion order
    pub fn snapshot(&self) -> Vec<Slot<T>> {
        self.state.lock().items.clone()
    }

    /// Slot counts taken atomically
    pub fn stats(&self) -> LibraryStats {
        self.state.lock().stats()
    }

    /// Usage statistics of the library lock
    pub fn lock_stats(&self) -> LockStats {
        self.state.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn values<T: Clone>(library: &Library<T>) -> Vec<T> {
        library
            .snapshot()
            .iter()
            .map(|slot| slot.value().clone())
            .collect()
    }

    fn keys<T>(library: &Library<T>) -> Vec<usize> {
        library.snapshot().iter().map(Slot::key).collect()
    }

    fn seeded<T>(seed: u64) -> Library<T> {
        Library::with_config(LibraryConfig::named("test").with_seed(seed))
    }

    #[test]
    fn test_add_assigns_sequential_keys() {
        let library = Library::new();
        library.add("a");
        library.add("b");
        library.add("c");

        assert_eq!(keys(&library), vec![0, 1, 2]);
        assert_eq!(values(&library), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_fill_empty_library_fails() {
        let library: Library<&str> = Library::new();

        assert_eq!(library.fill(5), Err(LibraryError::Empty));
        assert_eq!(library.randomly_fill(5), Err(LibraryError::Empty));
        assert!(library.is_empty());
    }

    #[test]
    fn test_fill_single_value() {
        let library = Library::new();
        library.add("x");
        library.fill(3).unwrap();

        assert_eq!(values(&library), vec!["x", "x", "x"]);
        assert_eq!(keys(&library), vec![0, 1, 2]);
    }

    #[test]
    fn test_fill_duplicates_in_index_order() {
        let library = Library::from_values(["a", "b", "c"]);
        library.fill(8).unwrap();

        assert_eq!(values(&library), vec!["a", "b", "c", "a", "b", "c", "a", "b"]);
        assert_eq!(keys(&library), (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_fill_below_current_size_is_noop() {
        let library = Library::from_values(["a", "b", "c"]);
        library.fill(2).unwrap();
        library.fill(3).unwrap();

        assert_eq!(library.len(), 3);
    }

    #[test]
    fn test_fill_shares_payloads() {
        let library = Library::from_values([String::from("proxy")]);
        library.fill(4).unwrap();

        let snapshot = library.snapshot();
        assert!(snapshot
            .iter()
            .all(|slot| Arc::ptr_eq(slot.shared(), snapshot[0].shared())));
    }

    #[test]
    fn test_randomly_fill_reaches_target() {
        let library = seeded(1);
        library.replace(["a", "b", "c"]);
        library.randomly_fill(8).unwrap();

        assert_eq!(library.len(), 8);
        assert_eq!(keys(&library), (0..8).collect::<Vec<_>>());

        let all = values(&library);
        assert_eq!(&all[..3], &["a", "b", "c"]);

        // The first full pass is a permutation of the originals.
        let mut first_pass = all[3..6].to_vec();
        first_pass.sort();
        assert_eq!(first_pass, vec!["a", "b", "c"]);

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for value in &all {
            *counts.entry(*value).or_default() += 1;
        }
        assert!(counts.values().all(|&count| count == 2 || count == 3));
    }

    #[test]
    fn test_randomly_fill_below_current_size_is_noop() {
        let library = Library::from_values([1, 2, 3]);
        library.randomly_fill(1).unwrap();

        assert_eq!(values(&library), vec![1, 2, 3]);
    }

    #[test]
    fn test_randomly_fill_is_reproducible_with_seed() {
        let first = seeded(42);
        let second = seeded(42);
        first.replace(0..5);
        second.replace(0..5);

        first.randomly_fill(23).unwrap();
        second.randomly_fill(23).unwrap();

        assert_eq!(values(&first), values(&second));
    }

    #[test]
    fn test_borrow_first_in_key_order() {
        let library = Library::new();
        library.add("a");
        library.add("b");

        let first = library.try_borrow_first().unwrap();
        assert_eq!((first.key(), *first.value()), (0, "a"));

        let second = library.try_borrow_first().unwrap();
        assert_eq!((second.key(), *second.value()), (1, "b"));

        assert!(library.try_borrow_first().is_none());

        library.return_slot(&first);
        let again = library.try_borrow_first().unwrap();
        assert_eq!((again.key(), *again.value()), (0, "a"));
    }

    #[test]
    fn test_borrow_first_strictly_increasing() {
        let library = Library::from_values(0..10);

        let borrowed: Vec<usize> = std::iter::from_fn(|| library.try_borrow_first())
            .map(|slot| slot.key())
            .collect();

        assert_eq!(borrowed, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_borrow_random_hands_out_each_slot_once() {
        let library = seeded(9);
        library.replace(0..20);

        let mut borrowed: Vec<usize> = std::iter::from_fn(|| library.try_borrow_random())
            .map(|slot| slot.key())
            .collect();
        borrowed.sort_unstable();

        assert_eq!(borrowed, (0..20).collect::<Vec<_>>());
        assert_eq!(library.available_count(), 0);
    }

    #[test]
    fn test_exhaustion_leaves_state_unchanged() {
        let library = Library::from_values(["a", "b"]);
        while library.try_borrow_first().is_some() {}

        let before = library.stats();
        assert!(library.try_borrow_first().is_none());
        assert!(library.try_borrow_random().is_none());
        assert_eq!(library.stats(), before);
        assert_eq!(
            before,
            LibraryStats {
                total: 2,
                borrowed: 2,
                available: 0
            }
        );
    }

    #[test]
    fn test_borrow_on_empty_library() {
        let library: Library<u8> = Library::new();

        assert!(library.try_borrow_first().is_none());
        assert!(library.try_borrow_random().is_none());
    }

    #[test]
    fn test_remove_releases_borrowed_key() {
        let library = Library::from_values(["a", "b"]);
        let slot = library.try_borrow_first().unwrap();

        library.remove(&slot);

        assert!(!library.is_borrowed(slot.key()));
        assert_eq!(values(&library), vec!["b"]);

        // A late return of the removed slot is harmless.
        library.return_slot(&slot);
        assert_eq!(library.borrowed_count(), 0);
    }

    #[test]
    fn test_remove_requires_exact_match() {
        let library = Library::from_values(["a", "b"]);
        let held = library.try_borrow_first().unwrap();
        let stranger = Slot::new(0, Arc::new("b"));

        library.remove(&stranger);

        assert_eq!(values(&library), vec!["a", "b"]);
        assert!(library.is_borrowed(held.key()));
        assert_ne!(library.try_borrow_first().unwrap().key(), held.key());
    }

    #[test]
    fn test_keys_stay_unique_after_remove() {
        let library = Library::from_values(["a", "b", "c"]);
        library.remove(&Slot::new(0, Arc::new("a")));
        library.add("d");
        library.fill(6).unwrap();

        let mut all = keys(&library);
        let count = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), count);
        assert_eq!(count, 6);
    }

    #[test]
    fn test_replace_resets_keys_and_borrows() {
        let library = Library::from_values(["a", "b", "c"]);
        library.try_borrow_first().unwrap();
        library.try_borrow_first().unwrap();

        library.replace(["x", "y"]);

        assert_eq!(keys(&library), vec![0, 1]);
        assert_eq!(values(&library), vec!["x", "y"]);
        assert_eq!(library.borrowed_count(), 0);
    }

    #[test]
    fn test_stale_return_frees_new_slot_with_same_key() {
        let library = Library::from_values(["old"]);
        let stale = library.try_borrow_first().unwrap();

        library.replace(["new"]);
        let fresh = library.try_borrow_first().unwrap();
        assert_eq!(fresh.key(), stale.key());

        library.return_slot(&stale);
        assert!(!library.is_borrowed(fresh.key()));
    }

    #[test]
    fn test_checked_return_rejects_stale_and_idle_slots() {
        let library = Library::from_values(["old"]);
        let stale = library.try_borrow_first().unwrap();

        library.replace(["new"]);
        let fresh = library.try_borrow_first().unwrap();

        assert_eq!(
            library.return_slot_checked(&stale),
            Err(LibraryError::UnknownSlot { key: 0 })
        );
        assert!(library.is_borrowed(fresh.key()));

        library.return_slot_checked(&fresh).unwrap();
        assert_eq!(
            library.return_slot_checked(&fresh),
            Err(LibraryError::NotBorrowed { key: 0 })
        );
    }

    #[test]
    fn test_lock_stats_count_operations() {
        let library = Library::with_config(LibraryConfig::named("proxies"));
        library.add(1);
        library.add(2);
        let _ = library.try_borrow_first();

        assert_eq!(library.lock_stats().acquisitions, 3);
        assert_eq!(library.config().name, "proxies");
    }
}
