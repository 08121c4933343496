//! Per-chunk authority arbitration between a remote source and a
//! local store.

use crate::error::{ChunkError, ChunkResult};
use crate::geometry::ChunkGeometry;
use crate::store::{ChunkRead, ChunkReadWrite};
use parking_lot::Mutex;
use std::sync::Arc;
use telemount_storage::ReadStore;

/// Where the authoritative bytes of a chunk currently live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    /// The remote source holds the ground truth; the chunk has not
    /// been promoted yet (or was re-marked during finalization).
    Remote,
    /// The local store holds the ground truth.
    Local,
}

/// Hook invoked once per promotion, with the chunk's aligned offset.
///
/// A hook error is surfaced to the caller of the promoting operation,
/// but the chunk stays `Local` - the local bytes are already valid.
pub type ChunkLocalHook = Box<dyn Fn(u64) -> ChunkResult<()> + Send + Sync>;

/// A store that routes each chunk access to the remote source or the
/// local store according to per-chunk authority.
///
/// Every chunk starts as [`Authority::Remote`]. The first read or
/// write of a chunk fetches it from the remote, lands it in the local
/// store, and flips authority to [`Authority::Local`] - the
/// *promotion*. From then on the chunk is served purely locally, so a
/// late background pull can never clobber a user write.
///
/// # Locking
///
/// Each chunk has its own lock, held for the whole operation including
/// the remote fetch. The same chunk is fully serialized (the remote
/// sees at most one in-flight fetch per chunk); distinct chunks
/// proceed concurrently.
pub struct SyncedStore {
    remote: Arc<dyn ReadStore>,
    local: Arc<dyn ChunkReadWrite>,
    geometry: ChunkGeometry,
    /// Per-chunk authority cells, indexed by chunk index. The lock
    /// doubles as the chunk's operation lock.
    chunks: Vec<Mutex<Authority>>,
    on_chunk_is_local: Option<ChunkLocalHook>,
}

impl SyncedStore {
    /// Creates a synced store over `remote` and `local`.
    ///
    /// `local` must cover the same geometry; in practice it is a
    /// [`crate::ChunkedStore`] over the destination's local image.
    pub fn new(
        remote: Arc<dyn ReadStore>,
        local: Arc<dyn ChunkReadWrite>,
        geometry: ChunkGeometry,
        on_chunk_is_local: Option<ChunkLocalHook>,
    ) -> Self {
        let chunks = (0..geometry.chunk_count())
            .map(|_| Mutex::new(Authority::Remote))
            .collect();

        Self {
            remote,
            local,
            geometry,
            chunks,
            on_chunk_is_local,
        }
    }

    /// Returns the chunk geometry.
    #[must_use]
    pub fn geometry(&self) -> ChunkGeometry {
        self.geometry
    }

    /// Returns the current authority of the chunk at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::OutOfRange`] for an invalid offset.
    pub fn authority(&self, offset: u64) -> ChunkResult<Authority> {
        Ok(*self.cell(offset)?.lock())
    }

    /// Re-marks the chunks at `offsets` as remote.
    ///
    /// The local bytes are not invalidated - they merely become stale
    /// until the next read or pull promotes the chunk again, which is
    /// safe because every access rechecks authority first.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::OutOfRange`] if any offset is misaligned
    /// or out of bounds; offsets preceding the invalid one have
    /// already been re-marked.
    pub fn mark_as_remote(&self, offsets: &[u64]) -> ChunkResult<()> {
        for &offset in offsets {
            *self.cell(offset)?.lock() = Authority::Remote;
        }
        Ok(())
    }

    fn cell(&self, offset: u64) -> ChunkResult<&Mutex<Authority>> {
        self.geometry.check_offset(offset)?;
        Ok(&self.chunks[self.geometry.index_of(offset) as usize])
    }

    fn notify_chunk_is_local(&self, offset: u64) -> ChunkResult<()> {
        match &self.on_chunk_is_local {
            Some(hook) => hook(offset),
            None => Ok(()),
        }
    }
}

impl ChunkRead for SyncedStore {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> ChunkResult<()> {
        self.geometry.check_chunk(buf.len(), offset)?;
        let mut authority = self.chunks[self.geometry.index_of(offset) as usize].lock();

        match *authority {
            Authority::Local => self.local.read_at(buf, offset),
            Authority::Remote => {
                // Fetch into the caller's buffer, land the bytes
                // locally, then promote. Any failure before the
                // promotion leaves authority untouched so the caller
                // may retry.
                self.remote
                    .read_at(buf, offset)
                    .map_err(ChunkError::remote)?;
                self.local.write_at(buf, offset)?;

                *authority = Authority::Local;
                self.notify_chunk_is_local(offset)
            }
        }
    }
}

impl ChunkReadWrite for SyncedStore {
    fn write_at(&self, data: &[u8], offset: u64) -> ChunkResult<()> {
        self.geometry.check_chunk(data.len(), offset)?;
        let mut authority = self.chunks[self.geometry.index_of(offset) as usize].lock();

        // The alignment contract makes every write a whole-chunk
        // overwrite, so a write-promotion needs no seeding fetch from
        // the remote: the local chunk is fully defined by `data`.
        self.local.write_at(data, offset)?;

        match *authority {
            Authority::Local => Ok(()),
            Authority::Remote => {
                *authority = Authority::Local;
                self.notify_chunk_is_local(offset)
            }
        }
    }

    fn sync(&self) -> ChunkResult<()> {
        self.local.sync()
    }

    fn size(&self) -> u64 {
        self.geometry.total_size()
    }
}
