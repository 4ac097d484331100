#![deny(warnings)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Milky Pool
//!
//! A shared pool of reusable items (proxies, accounts, work units) that many
//! worker threads borrow exclusively, use, and return.
//!
//! A small set of values can serve a larger worker count: [`Library::fill`]
//! and [`Library::randomly_fill`] grow the pool by duplicating slots, sharing
//! the payload rather than copying it.
//!
//! ```
//! use milky_pool::Library;
//!
//! let library = Library::new();
//! library.add("socks5://10.0.0.1:1080");
//! library.fill(3).unwrap();
//!
//! let slot = library.try_borrow_first().unwrap();
//! assert_eq!(slot.key(), 0);
//! library.return_slot(&slot);
//! ```

/// Library configuration
pub mod config;

/// Error types
pub mod error;

/// The resource library, its slots and borrow guards
pub mod library;

/// Synchronization primitives
pub mod sync;

pub use config::LibraryConfig;
pub use error::LibraryError;
pub use library::{Library, LibraryStats, Slot, SlotGuard};
pub use sync::LockStats;
