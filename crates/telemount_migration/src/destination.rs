//! Migration destination: wires the chunk engine to a device mount.

use crate::config::{Hooks, Options};
use crate::error::{MigrationError, MigrationResult};
use crate::mount::DeviceMount;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use telemount_chunks::{
    ArbitraryStore, CancelToken, ChunkGeometry, ChunkLocalHook, ChunkRead, ChunkReadWrite,
    ChunkedStore, Puller, SyncedStore,
};
use telemount_storage::{ByteStore, ReadStore};
use tracing::{debug, info};

/// Called once at handoff; returns the chunks the source mutated
/// since migration began.
pub type FlushFn = Box<dyn Fn() -> MigrationResult<Vec<u64>> + Send + Sync>;

/// Everything `open` wires up, torn down again by `close`.
#[derive(Default)]
struct Session {
    opened: bool,
    finalized: bool,
    closed: bool,
    synced: Option<Arc<SyncedStore>>,
    puller: Option<Arc<Puller>>,
    adapter: Option<Arc<ArbitraryStore>>,
    device_path: Option<PathBuf>,
    /// Forwards the puller's verdict into the error channel.
    forwarder: Option<JoinHandle<()>>,
}

/// The destination side of a live migration.
///
/// On [`Destination::open`] the destination mounts a device backed
/// initially by the remote seeder and starts serving reads and writes
/// locally right away while background workers pull the remaining
/// chunks. [`Destination::finalize_pull`] asks the source which
/// chunks it dirtied in the meantime, re-marks exactly those as
/// remote, and re-pulls them; after the post-finalization epoch
/// drains the destination is fully autonomous.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use telemount_chunks::CancelToken;
/// use telemount_migration::{Destination, MemoryDeviceMount, Options, Hooks};
/// use telemount_storage::InMemoryBackend;
///
/// let remote = Arc::new(InMemoryBackend::with_data(b"testtest".to_vec()));
/// let local = Arc::new(InMemoryBackend::with_size(8));
/// let mount = Arc::new(MemoryDeviceMount::new());
///
/// let destination = Destination::new(
///     CancelToken::new(),
///     remote,
///     8,
///     Box::new(|| Ok(Vec::new())),
///     local.clone(),
///     mount,
///     Options::new().chunk_size(4).pull_workers(2),
///     Hooks::new(),
/// );
///
/// let device = destination.open().unwrap();
/// assert!(device.to_str().is_some());
///
/// destination.finalize_pull().unwrap();
/// destination.wait().unwrap();
/// destination.close().unwrap();
///
/// assert_eq!(local.data(), b"testtest");
/// ```
pub struct Destination {
    token: CancelToken,
    remote: Arc<dyn ReadStore>,
    size: u64,
    flush: FlushFn,
    local: Arc<dyn ByteStore>,
    mount: Arc<dyn DeviceMount>,
    options: Options,
    /// Consumed at open time.
    hooks: Mutex<Option<Hooks>>,
    session: Mutex<Session>,
    /// Handed to the forwarder at open; dropped by `close` so `wait`
    /// can drain.
    errs_tx: Mutex<Option<Sender<MigrationError>>>,
    errs_rx: Mutex<Receiver<MigrationError>>,
}

impl Destination {
    /// Creates an inert destination.
    ///
    /// `remote` is the seeder's chunk-aligned reader, `size` the total
    /// resource size in bytes, `flush` the handoff callback producing
    /// the dirty set, `local` the destination-owned store that will
    /// back the device, and `mount` the kernel attachment collaborator.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        token: CancelToken,
        remote: Arc<dyn ReadStore>,
        size: u64,
        flush: FlushFn,
        local: Arc<dyn ByteStore>,
        mount: Arc<dyn DeviceMount>,
        options: Options,
        hooks: Hooks,
    ) -> Self {
        let (errs_tx, errs_rx) = mpsc::channel();

        Self {
            token,
            remote,
            size,
            flush,
            local,
            mount,
            options: options.normalized(),
            hooks: Mutex::new(Some(hooks)),
            session: Mutex::new(Session::default()),
            errs_tx: Mutex::new(Some(errs_tx)),
            errs_rx: Mutex::new(errs_rx),
        }
    }

    /// Opens the destination and returns the mounted device path.
    ///
    /// Reads and writes on the device are served immediately; chunks
    /// still remote are fetched on demand while the pull workers
    /// drain the rest in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination was already opened, the
    /// resource size is not chunk-aligned, or the device mount fails.
    pub fn open(&self) -> MigrationResult<PathBuf> {
        let mut session = self.session.lock();
        if session.opened {
            return Err(MigrationError::invalid_operation(
                "destination already open",
            ));
        }

        if self.size % self.options.chunk_size != 0 {
            return Err(MigrationError::MisalignedSize {
                size: self.size,
                chunk_size: self.options.chunk_size,
            });
        }
        let geometry = ChunkGeometry::new(
            self.options.chunk_size,
            self.size / self.options.chunk_size,
        )?;

        let hooks = self.hooks.lock().take().unwrap_or_default();
        let priority = hooks
            .pull_priority
            .unwrap_or_else(|| Box::new(|_offset| 1));
        let hook = promotion_hook(hooks.on_chunk_is_local, self.options.verbose);

        let chunked = Arc::new(ChunkedStore::new(Arc::clone(&self.local), geometry));
        let synced = Arc::new(SyncedStore::new(
            Arc::clone(&self.remote),
            chunked,
            geometry,
            hook,
        ));
        let puller = Arc::new(Puller::new(
            self.token.clone(),
            Arc::clone(&synced) as Arc<dyn ChunkRead>,
            geometry,
            priority,
        ));

        // The forwarder owns the only error sender: once the puller's
        // verdict is in (or the puller is closed), the sender drops
        // and wait() can finish draining.
        let errs_tx = self
            .errs_tx
            .lock()
            .take()
            .ok_or_else(|| MigrationError::invalid_operation("destination already closed"))?;
        let wait_puller = Arc::clone(&puller);
        session.forwarder = Some(thread::spawn(move || {
            if let Err(error) = wait_puller.wait() {
                let _ = errs_tx.send(error.into());
            }
        }));

        if let Err(error) = puller.open(self.options.pull_workers) {
            Self::abort_open(&mut session, &puller);
            return Err(error.into());
        }

        let adapter = Arc::new(ArbitraryStore::new(
            Arc::clone(&synced) as Arc<dyn ChunkReadWrite>,
            geometry,
        ));
        let device_path = match self.mount.open(Arc::clone(&adapter) as Arc<dyn ChunkReadWrite>) {
            Ok(path) => path,
            Err(error) => {
                Self::abort_open(&mut session, &puller);
                return Err(error);
            }
        };

        info!(
            device = %device_path.display(),
            size = self.size,
            chunks = geometry.chunk_count(),
            workers = self.options.pull_workers,
            "migration destination open"
        );

        session.opened = true;
        session.synced = Some(synced);
        session.puller = Some(puller);
        session.adapter = Some(adapter);
        session.device_path = Some(device_path.clone());

        Ok(device_path)
    }

    /// Finalizes the migration handoff.
    ///
    /// Invokes the flush callback to obtain the dirty set, re-marks
    /// those chunks as remote, then re-opens them on the puller - in
    /// that order, so the workers observe remote authority.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination is not open, finalization
    /// already happened, or the flush callback fails (in which case
    /// the engine stays pre-finalization and the call may be retried).
    pub fn finalize_pull(&self) -> MigrationResult<()> {
        let (synced, puller) = {
            let mut session = self.session.lock();
            if session.finalized {
                return Err(MigrationError::invalid_operation("pull already finalized"));
            }

            let wired = match (&session.synced, &session.puller) {
                (Some(synced), Some(puller)) if session.opened && !session.closed => {
                    (Arc::clone(synced), Arc::clone(puller))
                }
                _ => {
                    return Err(MigrationError::invalid_operation("destination not open"));
                }
            };
            session.finalized = true;
            wired
        };

        let dirty = match (self.flush)() {
            Ok(dirty) => dirty,
            Err(error) => {
                // Aborted before anything changed; allow a retry.
                self.session.lock().finalized = false;
                return Err(error);
            }
        };

        info!(dirty = dirty.len(), "finalizing pull");

        synced.mark_as_remote(&dirty)?;
        puller.finalize_pull(&dirty)?;

        Ok(())
    }

    /// Flushes all locally written data down to the local store.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination is not open or the local
    /// sync fails.
    pub fn sync(&self) -> MigrationResult<()> {
        let session = self.session.lock();
        let adapter = session
            .adapter
            .as_ref()
            .ok_or_else(|| MigrationError::invalid_operation("destination not open"))?;

        adapter.sync()?;
        Ok(())
    }

    /// Closes the destination: syncs, unmounts, stops the workers, and
    /// joins all background threads. Best-effort and idempotent -
    /// inner errors are swallowed so resources are always released.
    ///
    /// # Errors
    ///
    /// Currently always succeeds; the signature leaves room for
    /// attachment layers whose teardown can fail.
    pub fn close(&self) -> MigrationResult<()> {
        let mut session = self.session.lock();
        if session.closed {
            return Ok(());
        }

        if let Some(adapter) = &session.adapter {
            let _ = adapter.sync();
        }

        let _ = self.mount.close();

        if let Some(puller) = &session.puller {
            puller.close();
        }

        if let Some(forwarder) = session.forwarder.take() {
            let _ = forwarder.join();
        }

        // Drop the sender if open never handed it out, so wait()
        // observes the channel closing.
        *self.errs_tx.lock() = None;

        session.closed = true;
        debug!("migration destination closed");

        Ok(())
    }

    /// Blocks until the background pull has drained or failed.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by a background task; `Ok` once
    /// all of them have exited cleanly.
    pub fn wait(&self) -> MigrationResult<()> {
        let errs = self.errs_rx.lock();
        match errs.recv() {
            Ok(error) => Err(error),
            // All senders are gone: the background tasks exited
            // cleanly.
            Err(_) => Ok(()),
        }
    }

    /// Returns the mounted device path, if the destination is open.
    #[must_use]
    pub fn device_path(&self) -> Option<PathBuf> {
        self.session.lock().device_path.clone()
    }

    /// Tears down a half-built session when `open` fails partway:
    /// stops the workers so the forwarder unblocks, then joins it.
    fn abort_open(session: &mut Session, puller: &Puller) {
        puller.close();
        if let Some(forwarder) = session.forwarder.take() {
            let _ = forwarder.join();
        }
    }
}

/// Wraps the user's promotion hook with verbose logging when asked.
fn promotion_hook(user: Option<ChunkLocalHook>, verbose: bool) -> Option<ChunkLocalHook> {
    if !verbose {
        return user;
    }

    Some(Box::new(move |offset| {
        debug!(offset, "chunk is local");
        match &user {
            Some(hook) => hook(offset),
            None => Ok(()),
        }
    }))
}
