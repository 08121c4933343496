//! # Telemount Migration
//!
//! Destination orchestrator for live migration of a byte-addressed
//! resource.
//!
//! This crate wires the chunk engine ([`telemount_chunks`]) to a
//! device mount: the destination host opens a local block device
//! backed initially by a remote seeder, serves reads and writes
//! immediately, pulls the remaining chunks in the background, and
//! finalizes by re-pulling exactly the chunks the source mutated
//! during the handoff window.
//!
//! This crate provides:
//! - [`Destination`] - the `open` / `finalize_pull` / `sync` /
//!   `close` / `wait` session object
//! - [`DeviceMount`] - the kernel attachment collaborator contract,
//!   plus [`MemoryDeviceMount`] for tests
//! - [`Options`] and [`Hooks`] - configuration and user callbacks

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod destination;
mod error;
mod mount;

pub use config::{Hooks, Options};
pub use destination::{Destination, FlushFn};
pub use error::{MigrationError, MigrationResult};
pub use mount::{DeviceMount, MemoryDeviceMount};

// The cancellation token is part of this crate's public constructor
// surface.
pub use telemount_chunks::CancelToken;
