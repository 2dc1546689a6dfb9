//! Compact command implementation.

use sheetvault_core::{CompactionReport, RecordStore};
use sheetvault_storage::{FileBackend, InMemoryBackend};
use std::path::{Path, PathBuf};
use tracing::info;

/// Runs the compact command.
pub fn run(path: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("Compacting record log at {:?}", path);
    if dry_run {
        println!("(dry run - no changes will be made)");
    }
    println!();

    let store = super::open_existing(path)?;
    let report = if dry_run {
        store.compact_into(&mut InMemoryBackend::new())?
    } else {
        compact_in_place(path, store)?
    };

    print_report(&report);
    if !dry_run {
        println!();
        println!("✓ Compaction complete");
    }

    Ok(())
}

/// Writes a compacted copy next to the log and renames it over the original.
///
/// The store stays open, and so keeps the original locked, until the rename
/// has happened; another process cannot append to the old log in between.
fn compact_in_place(
    path: &Path,
    store: RecordStore,
) -> Result<CompactionReport, Box<dyn std::error::Error>> {
    let temp_path = compaction_path(path);
    if temp_path.exists() {
        std::fs::remove_file(&temp_path)?;
    }

    let report = {
        let mut target = FileBackend::open(&temp_path)?;
        store.compact_into(&mut target)?
    };

    info!("Replacing {:?} with compacted log", path);
    std::fs::rename(&temp_path, path)?;
    sync_parent(path)?;
    drop(store);

    Ok(report)
}

/// Makes the rename durable by syncing the containing directory.
#[cfg(unix)]
fn sync_parent(path: &Path) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> std::io::Result<()> {
    // NTFS journals the rename
    Ok(())
}

fn compaction_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".compact");
    path.with_file_name(name)
}

fn print_report(report: &CompactionReport) {
    println!("Compaction Analysis:");
    println!("  Input entries:  {}", report.entries_before);
    println!("  Output entries: {}", report.entries_after);
    println!();
    println!("  Size before: {} bytes", report.bytes_before);
    println!("  Size after:  {} bytes", report.bytes_after);
    let saved = report.bytes_before.saturating_sub(report.bytes_after);
    println!(
        "  Space saved: {} bytes ({:.1}%)",
        saved,
        if report.bytes_before > 0 {
            (saved as f64 / report.bytes_before as f64) * 100.0
        } else {
            0.0
        }
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetvault_core::{StoreConfig, UserId};
    use tempfile::tempdir;

    fn write_counter(path: &Path, allocations: u32) {
        let store = RecordStore::open_file(path, StoreConfig::default()).unwrap();
        for _ in 0..allocations {
            store.allocate_next_set_id(&UserId::new("u1")).unwrap();
        }
    }

    #[test]
    fn compaction_rewrites_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.log");
        write_counter(&path, 20);
        let before = std::fs::metadata(&path).unwrap().len();

        run(&path, false).unwrap();

        assert!(std::fs::metadata(&path).unwrap().len() < before);
        assert!(!compaction_path(&path).exists());
        let store = RecordStore::open_file(&path, StoreConfig::default()).unwrap();
        assert_eq!(store.stats().unwrap().log_entries, 1);
        assert_eq!(store.allocate_next_set_id(&UserId::new("u1")).unwrap(), 20);
    }

    #[test]
    fn original_stays_locked_until_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.log");
        write_counter(&path, 3);

        let store = super::super::open_existing(&path).unwrap();
        let rival = FileBackend::open(&path);
        assert!(matches!(rival, Err(sheetvault_storage::StorageError::Locked(_))));

        let report = compact_in_place(&path, store).unwrap();
        assert_eq!(report.entries_after, 1);

        // Once replaced and released, the new log opens normally.
        let store = RecordStore::open_file(&path, StoreConfig::default()).unwrap();
        assert_eq!(store.allocate_next_set_id(&UserId::new("u1")).unwrap(), 3);
    }

    #[test]
    fn sync_parent_handles_bare_file_names() {
        assert!(sync_parent(Path::new("store.log")).is_ok());
    }

    #[test]
    fn dry_run_leaves_file_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.log");
        write_counter(&path, 5);
        let before = std::fs::read(&path).unwrap();

        run(&path, true).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn compaction_path_is_a_sibling() {
        let path = Path::new("/data/store.log");
        assert_eq!(compaction_path(path), Path::new("/data/store.log.compact"));
    }
}
