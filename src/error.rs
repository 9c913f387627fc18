//! Error types for the storage engine.

use thiserror::Error;

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur while operating the page store, buffer pool, or
/// B-tree engine.
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error from the underlying backing store.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Requested key or page does not exist.
    #[error("not found")]
    NotFound,

    /// No room left to complete the operation (active path exhausted, or
    /// the backing store refused to grow).
    #[error("no space: {0}")]
    NoSpace(String),

    /// A page's on-disk contents failed a structural check.
    #[error("corrupt page: {0}")]
    CorruptPage(String),
}
