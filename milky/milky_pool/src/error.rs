//! Error types for library operations

use thiserror::Error;

/// Error returned by library operations that can fail
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LibraryError {
    /// Growth was requested on a library with no slots to duplicate
    #[error("library contains 0 items")]
    Empty,

    /// A checked return named a slot the library does not hold
    #[error("slot {key} does not belong to this library")]
    UnknownSlot {
        /// Key carried by the rejected slot
        key: usize,
    },

    /// A checked return named a slot that is not checked out
    #[error("slot {key} is not borrowed")]
    NotBorrowed {
        /// Key carried by the rejected slot
        key: usize,
    },
}
