//! # SheetVault Storage
//!
//! Byte storage backends underneath the SheetVault record log.
//!
//! Backends are **opaque append-only byte stores**. They know nothing about
//! sheets, preferences or log framing; the record store in `sheetvault_core`
//! owns all interpretation of the bytes.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and ephemeral servers
//! - [`FileBackend`] - Persistent storage in a single log file
//! - [`FaultyBackend`] - Wrapper that injects I/O failures, for testing
//!   how callers react to an unavailable medium
//!
//! ## Example
//!
//! ```rust
//! use sheetvault_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"entry").unwrap();
//! assert_eq!(backend.read_at(offset, 5).unwrap(), b"entry");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod faulty;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use faulty::{FaultInjector, FaultyBackend};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
