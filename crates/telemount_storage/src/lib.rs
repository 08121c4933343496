//! # Telemount Storage
//!
//! Byte-store traits and backends for telemount.
//!
//! This crate provides the lowest-level storage abstraction for the
//! migration engine. Stores are **opaque fixed-size byte regions** -
//! they do not interpret the data they hold and know nothing about
//! chunks, authority, or migration.
//!
//! ## Design Principles
//!
//! - Stores are simple random-access regions (read, write, sync)
//! - The region size is fixed at open time; no append, no truncate
//! - Must be `Send + Sync` for concurrent access from puller workers
//!   and user I/O traffic
//! - The engine owns all chunk-level interpretation
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and RAM-backed regions
//! - [`FileBackend`] - For file-backed regions using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use telemount_storage::{ByteStore, InMemoryBackend, ReadStore};
//!
//! let backend = InMemoryBackend::with_size(16);
//! backend.write_at(b"hello", 0).unwrap();
//!
//! let mut buf = [0u8; 5];
//! backend.read_at(&mut buf, 0).unwrap();
//! assert_eq!(&buf, b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use store::{ByteStore, ReadStore};
