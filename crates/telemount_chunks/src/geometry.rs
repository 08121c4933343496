//! Chunk geometry: fixed chunk size and count shared by all layers.

use crate::error::{ChunkError, ChunkResult};

/// The fixed chunk geometry of an address space.
///
/// All offsets handled by the engine are chunk-aligned byte offsets -
/// multiples of the chunk size in `[0, total_size)`. The geometry is
/// decided once at construction and shared by every layer, so bounds
/// and alignment checks are pure index arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkGeometry {
    chunk_size: u64,
    chunk_count: u64,
}

impl ChunkGeometry {
    /// Creates a geometry of `chunk_count` chunks of `chunk_size`
    /// bytes each.
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_size` is zero.
    pub fn new(chunk_size: u64, chunk_count: u64) -> ChunkResult<Self> {
        if chunk_size == 0 {
            return Err(ChunkError::invalid_operation("chunk size must be positive"));
        }

        Ok(Self {
            chunk_size,
            chunk_count,
        })
    }

    /// Returns the chunk size in bytes.
    #[must_use]
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Returns the number of chunks.
    #[must_use]
    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    /// Returns the total size of the address space in bytes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.chunk_size * self.chunk_count
    }

    /// Returns the chunk index containing `offset`.
    #[must_use]
    pub fn index_of(&self, offset: u64) -> u64 {
        offset / self.chunk_size
    }

    /// Iterates over the aligned offsets of all chunks, in address
    /// order.
    pub fn offsets(&self) -> impl Iterator<Item = u64> {
        let chunk_size = self.chunk_size;
        (0..self.chunk_count).map(move |index| index * chunk_size)
    }

    /// Validates that `offset` is a chunk-aligned offset inside the
    /// address space.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::OutOfRange`] otherwise.
    pub fn check_offset(&self, offset: u64) -> ChunkResult<()> {
        if offset % self.chunk_size != 0 || self.index_of(offset) >= self.chunk_count {
            return Err(ChunkError::OutOfRange { offset, len: 0 });
        }
        Ok(())
    }

    /// Validates a whole-chunk access: `len` must equal the chunk size
    /// and `offset` must be a chunk-aligned offset inside the address
    /// space.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::OutOfRange`] otherwise.
    pub fn check_chunk(&self, len: usize, offset: u64) -> ChunkResult<()> {
        if len as u64 != self.chunk_size
            || offset % self.chunk_size != 0
            || self.index_of(offset) >= self.chunk_count
        {
            return Err(ChunkError::OutOfRange { offset, len });
        }
        Ok(())
    }
}
