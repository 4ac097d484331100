//! Synchronization primitives used by the library.
//!
//! The pool keeps all of its state behind a single [`TrackedMutex`], which
//! adds wait and hold statistics on top of `parking_lot`'s mutex.

pub mod lock;

pub use lock::{LockStats, TrackedMutex, TrackedMutexGuard};
