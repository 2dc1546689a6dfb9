//! Verify command implementation.

use sheetvault_core::LogReport;
use std::path::Path;
use tracing::info;

/// Runs the verify command.
///
/// Opening the store already replays every entry; a second scan then reads
/// the log back from disk and checks it again.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying record log at {:?}", path);
    println!();

    match verify(path) {
        Ok(report) => {
            print_report(&report);
            println!();
            println!("✓ Record log is healthy");
            Ok(())
        }
        Err(e) => {
            println!("✗ Record log verification failed: {e}");
            Err(e)
        }
    }
}

fn verify(path: &Path) -> Result<LogReport, Box<dyn std::error::Error>> {
    let store = super::open_existing(path)?;
    info!("Store opened, rescanning log");
    Ok(store.verify()?)
}

fn print_report(report: &LogReport) {
    println!("Record log:");
    println!("  Entries:            {}", report.entries);
    println!("  Sheet entries:      {}", report.sheet_entries);
    println!("  Preference entries: {}", report.preference_entries);
    println!("  Valid bytes:        {}", report.valid_bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetvault_core::{RecordStore, StoreConfig, UserId};
    use tempfile::tempdir;

    #[test]
    fn healthy_log_verifies() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.log");
        {
            let store = RecordStore::open_file(&path, StoreConfig::default()).unwrap();
            store.allocate_next_set_id(&UserId::new("u1")).unwrap();
            store.allocate_next_set_id(&UserId::new("u2")).unwrap();
        }

        let report = verify(&path).unwrap();
        assert_eq!(report.entries, 2);
        assert_eq!(report.preference_entries, 2);
    }

    #[test]
    fn damaged_log_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.log");
        {
            let store = RecordStore::open_file(&path, StoreConfig::default()).unwrap();
            store.allocate_next_set_id(&UserId::new("u1")).unwrap();
        }
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();

        assert!(verify(&path).is_err());
    }
}
