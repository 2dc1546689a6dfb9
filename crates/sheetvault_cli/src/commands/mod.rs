//! CLI command implementations.

pub mod compact;
pub mod inspect;
pub mod verify;

use sheetvault_core::{RecordStore, StoreConfig};
use std::path::Path;

/// Opens an existing store without creating one.
fn open_existing(path: &Path) -> Result<RecordStore, Box<dyn std::error::Error>> {
    let config = StoreConfig::new().create_if_missing(false);
    Ok(RecordStore::open_file(path, config)?)
}
