//! # SegDB Storage
//!
//! Append-only byte backends for the SegDB engine log.
//!
//! Backends are **opaque byte stores**: they know nothing about frames,
//! records or segments. The engine owns the log format and only needs to
//! append, read back, sync and cut off a torn tail.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and throwaway engines
//! - [`FileBackend`] - A single append-only file
//!
//! ## Example
//!
//! ```rust
//! use segdb_storage::{InMemoryBackend, StorageBackend};
//!
//! let backend = InMemoryBackend::new();
//! let offset = backend.append(b"frame").unwrap();
//! assert_eq!(backend.read_at(offset, 5).unwrap(), b"frame");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
