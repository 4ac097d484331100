//! The resource library and its borrow handles.
//!
//! - [`Library`]: keyed slots, growth by duplication, exclusive borrowing
//! - [`Slot`]: a key paired with a shared value
//! - [`SlotGuard`]: a borrow that returns itself on drop

pub mod guard;
pub mod pool;
pub mod slot;

pub use guard::SlotGuard;
pub use pool::{Library, LibraryStats};
pub use slot::Slot;
