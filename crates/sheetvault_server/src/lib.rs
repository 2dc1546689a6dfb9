//! # SheetVault Server
//!
//! Sheet and preferences sync services.
//!
//! This crate provides:
//! - [`SheetService`]: get, list, put and delete of versioned sheets
//! - [`PreferencesService`]: user preferences and the set id counter
//! - [`StorageServer`]: the entry point owning the store, both services and
//!   the configuration
//!
//! # Architecture
//!
//! The services are stateless. Every sheet mutation runs as one atomic
//! read-modify-write on the record store: the stored version is read, the
//! version reconciler decides, and only an accepted mutation is written.
//!
//! Authentication, HTTP transport and request validation happen upstream.
//! The server receives an already established [`UserId`] with each request.
//!
//! ```rust
//! use sheetvault_server::{ServerConfig, StorageServer, UserId};
//!
//! let server = StorageServer::new(ServerConfig::default()).unwrap();
//! let user = UserId::new("user-1");
//!
//! let allocated = server.handle_allocate_set_id(&user).unwrap();
//! assert_eq!(allocated.set_id, 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod preferences;
mod server;
mod sheets;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use preferences::PreferencesService;
pub use server::StorageServer;
pub use sheets::SheetService;

pub use sheetvault_core::UserId;
