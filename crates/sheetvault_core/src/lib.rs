//! # SheetVault Core
//!
//! The record store behind the sheet and preferences services.
//!
//! This crate provides:
//! - [`SheetRecord`] and [`PreferencesRecord`], the stored shapes
//! - An append-only, checksummed record log over any
//!   [`sheetvault_storage::StorageBackend`]
//! - [`RecordStore`], durable keyed storage with per-key atomic
//!   read-modify-write
//!
//! ## Example
//!
//! ```rust
//! use sheetvault_core::{RecordStore, UserId};
//!
//! let store = RecordStore::in_memory().unwrap();
//! let user = UserId::new("user-1");
//!
//! assert_eq!(store.allocate_next_set_id(&user).unwrap(), 0);
//! assert_eq!(store.allocate_next_set_id(&user).unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod locks;
mod log;
mod store;
mod types;

pub use config::StoreConfig;
pub use error::{CoreError, CoreResult};
pub use log::{LogEntry, LogReport, LOG_MAGIC};
pub use store::{CompactionReport, RecordStore, StoreStats};
pub use types::{PreferencesRecord, SheetRecord, UserId};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
