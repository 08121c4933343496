//! Arbitrary-offset access on top of a chunk-aligned store.

use crate::error::ChunkResult;
use crate::geometry::ChunkGeometry;
use crate::store::{ChunkRead, ChunkReadWrite};
use std::sync::Arc;

/// Presents arbitrary `read_at`/`write_at` over a store that only
/// accepts whole-chunk accesses.
///
/// Requests are split at chunk boundaries. A partial head or tail
/// chunk is handled through a scratch buffer: the chunk is read
/// whole, the overlap is copied (and, for writes, the patched chunk
/// is written back whole). Fully covered interior chunks forward
/// directly.
///
/// This layer performs no authority reasoning; it merely translates
/// to chunk-aligned calls on the underlying store, which is where
/// promotion happens. In particular, a partial write first *reads*
/// the chunk through the underlying store, so the untouched bytes of
/// the chunk are initialized from wherever authority says they live.
pub struct ArbitraryStore {
    inner: Arc<dyn ChunkReadWrite>,
    geometry: ChunkGeometry,
}

impl ArbitraryStore {
    /// Creates an adapter over `inner` with the given geometry.
    pub fn new(inner: Arc<dyn ChunkReadWrite>, geometry: ChunkGeometry) -> Self {
        Self { inner, geometry }
    }
}

impl ChunkRead for ArbitraryStore {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> ChunkResult<()> {
        let chunk_size = self.geometry.chunk_size();
        let mut scratch = vec![0u8; chunk_size as usize];

        let mut done = 0;
        while done < buf.len() {
            let position = offset + done as u64;
            let chunk_start = position - position % chunk_size;
            let in_chunk = (position - chunk_start) as usize;
            let take = (chunk_size as usize - in_chunk).min(buf.len() - done);

            if in_chunk == 0 && take == chunk_size as usize {
                self.inner.read_at(&mut buf[done..done + take], chunk_start)?;
            } else {
                self.inner.read_at(&mut scratch, chunk_start)?;
                buf[done..done + take].copy_from_slice(&scratch[in_chunk..in_chunk + take]);
            }

            done += take;
        }

        Ok(())
    }
}

impl ChunkReadWrite for ArbitraryStore {
    fn write_at(&self, data: &[u8], offset: u64) -> ChunkResult<()> {
        let chunk_size = self.geometry.chunk_size();
        let mut scratch = vec![0u8; chunk_size as usize];

        let mut done = 0;
        while done < data.len() {
            let position = offset + done as u64;
            let chunk_start = position - position % chunk_size;
            let in_chunk = (position - chunk_start) as usize;
            let take = (chunk_size as usize - in_chunk).min(data.len() - done);

            if in_chunk == 0 && take == chunk_size as usize {
                self.inner.write_at(&data[done..done + take], chunk_start)?;
            } else {
                // Read-modify-write for the partial head or tail chunk
                self.inner.read_at(&mut scratch, chunk_start)?;
                scratch[in_chunk..in_chunk + take].copy_from_slice(&data[done..done + take]);
                self.inner.write_at(&scratch, chunk_start)?;
            }

            done += take;
        }

        Ok(())
    }

    fn sync(&self) -> ChunkResult<()> {
        self.inner.sync()
    }

    fn size(&self) -> u64 {
        self.geometry.total_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunked::ChunkedStore;
    use crate::error::ChunkError;
    use proptest::prelude::*;
    use telemount_storage::InMemoryBackend;

    fn adapter(chunk_size: u64, chunk_count: u64) -> (ArbitraryStore, Arc<InMemoryBackend>) {
        let geometry = ChunkGeometry::new(chunk_size, chunk_count).unwrap();
        let backend = Arc::new(InMemoryBackend::with_size(geometry.total_size() as usize));
        let chunked = Arc::new(ChunkedStore::new(
            Arc::clone(&backend) as Arc<dyn telemount_storage::ByteStore>,
            geometry,
        ));
        (ArbitraryStore::new(chunked, geometry), backend)
    }

    #[test]
    fn unaligned_write_and_read_back() {
        let (store, _) = adapter(4, 3);

        store.write_at(b"hello", 2).unwrap();

        let mut buf = [0u8; 5];
        store.read_at(&mut buf, 2).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn write_spanning_all_chunks() {
        let (store, backend) = adapter(4, 3);

        store.write_at(b"0123456789ab", 0).unwrap();
        assert_eq!(backend.data(), b"0123456789ab");

        let mut buf = [0u8; 12];
        store.read_at(&mut buf, 0).unwrap();
        assert_eq!(&buf, b"0123456789ab");
    }

    #[test]
    fn partial_write_preserves_neighbors() {
        let (store, backend) = adapter(4, 2);

        store.write_at(b"abcdefgh", 0).unwrap();
        store.write_at(b"XY", 3).unwrap();
        assert_eq!(backend.data(), b"abcXYfgh");
    }

    #[test]
    fn single_byte_access() {
        let (store, _) = adapter(4, 2);

        store.write_at(b"Z", 5).unwrap();

        let mut buf = [0u8; 1];
        store.read_at(&mut buf, 5).unwrap();
        assert_eq!(&buf, b"Z");
    }

    #[test]
    fn empty_access_is_noop() {
        let (store, _) = adapter(4, 2);
        let mut buf = [0u8; 0];
        store.read_at(&mut buf, 3).unwrap();
        store.write_at(&buf, 3).unwrap();
    }

    #[test]
    fn access_beyond_address_space_fails() {
        let (store, _) = adapter(4, 2);

        let mut buf = [0u8; 4];
        assert!(matches!(
            store.read_at(&mut buf, 6),
            Err(ChunkError::OutOfRange { .. })
        ));
        assert!(store.write_at(b"overflow!", 4).is_err());
    }

    /// An in-bounds write: offset plus payload always fit the
    /// 24-byte address space.
    fn arb_write() -> impl Strategy<Value = (u64, Vec<u8>)> {
        (0u64..24).prop_flat_map(|offset| {
            let max_len = 24 - offset as usize;
            (
                Just(offset),
                proptest::collection::vec(any::<u8>(), 1..=max_len),
            )
        })
    }

    proptest! {
        /// The adapter must behave exactly like a flat byte array.
        #[test]
        fn matches_flat_model(writes in proptest::collection::vec(arb_write(), 1..12)) {
            let (store, _) = adapter(4, 6);
            let mut model = vec![0u8; 24];

            for (offset, data) in writes {
                store.write_at(&data, offset).unwrap();
                model[offset as usize..offset as usize + data.len()].copy_from_slice(&data);
            }

            let mut actual = vec![0u8; 24];
            store.read_at(&mut actual, 0).unwrap();
            prop_assert_eq!(actual, model);
        }
    }
}
