//! Error types for the chunk engine.

use telemount_storage::StorageError;
use thiserror::Error;

/// Result type for chunk operations.
pub type ChunkResult<T> = Result<T, ChunkError>;

/// Errors that can occur in chunk engine operations.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// Misaligned, wrong-length, or out-of-bounds chunk access.
    ///
    /// The offending operation did not touch underlying storage.
    #[error("chunk access out of range: offset {offset}, len {len}")]
    OutOfRange {
        /// The requested offset.
        offset: u64,
        /// The requested length.
        len: usize,
    },

    /// A remote fetch failed.
    ///
    /// Chunk authority is left unchanged, so retrying the operation is
    /// legitimate.
    #[error("remote source unavailable: {source}")]
    Remote {
        /// The underlying storage error.
        #[source]
        source: StorageError,
    },

    /// A local store operation failed.
    ///
    /// Chunk authority is left unchanged.
    #[error("local store I/O failed: {source}")]
    Local {
        /// The underlying storage error.
        #[source]
        source: StorageError,
    },

    /// Cancellation was observed.
    #[error("operation cancelled")]
    Cancelled,

    /// Operation not permitted in the current lifecycle state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl ChunkError {
    /// Creates a remote fetch error.
    pub fn remote(source: StorageError) -> Self {
        Self::Remote { source }
    }

    /// Creates a local store error.
    pub fn local(source: StorageError) -> Self {
        Self::Local { source }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}
