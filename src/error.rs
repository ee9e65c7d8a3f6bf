use thiserror::Error;

/// Errors returned by tree operations.
///
/// Only caller-visible failures are represented here. Violations of the
/// tree's structural invariants are programming errors and panic through
/// `assert!`/`debug_assert!` rather than unwinding through `Err`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The caller passed an argument the operation cannot accept: a zero
    /// order to `Tree::new`, or an empty key to `Tree::seek`.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The requested key is not present. Also returned by `get` and
    /// `delete` on an empty tree, and by `seek` on an empty tree.
    #[error("key not found")]
    NotFound,
}

/// A `Result` specialized to tree [`Error`]s.
pub type Result<T> = core::result::Result<T, Error>;
