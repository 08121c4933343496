//! Error types for the migration orchestrator.

use telemount_chunks::ChunkError;
use telemount_storage::StorageError;
use thiserror::Error;

/// Result type for migration operations.
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Errors that can occur while orchestrating a migration destination.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Chunk engine error.
    #[error("chunk engine error: {0}")]
    Chunks(#[from] ChunkError),

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// No free device slot was available for mounting.
    #[error("no free device slot available")]
    NoFreeDevice,

    /// The user-supplied flush callback failed.
    ///
    /// Finalization is aborted; the engine remains in its
    /// pre-finalization state and may be finalized again.
    #[error("flush failed: {message}")]
    FlushFailed {
        /// Description of the failure.
        message: String,
    },

    /// The resource size is not a multiple of the chunk size.
    #[error("resource size {size} is not a multiple of chunk size {chunk_size}")]
    MisalignedSize {
        /// The resource size in bytes.
        size: u64,
        /// The configured chunk size.
        chunk_size: u64,
    },

    /// Operation not permitted in the current lifecycle state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl MigrationError {
    /// Creates a flush failed error.
    pub fn flush_failed(message: impl Into<String>) -> Self {
        Self::FlushFailed {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}
