//! Inspect command implementation.

use sheetvault_core::{PreferencesRecord, StoreStats, UserId};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Log file path.
    pub path: String,
    /// Store statistics.
    pub stats: StoreStats,
    /// Records of the requested user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRecords>,
}

/// Records of one user.
#[derive(Debug, Serialize)]
pub struct UserRecords {
    /// User id.
    pub id: String,
    /// Sheets, tombstones included, ordered by key.
    pub sheets: Vec<SheetRow>,
    /// Preferences record, if any.
    pub preferences: Option<PreferencesRecord>,
}

/// One sheet, without payload.
#[derive(Debug, Serialize)]
pub struct SheetRow {
    /// Sheet key.
    pub save_key: String,
    /// Current version.
    pub version: u32,
    /// Version key.
    pub version_key: u32,
    /// Whether the sheet is tombstoned.
    pub deleted: bool,
    /// Sheet name from the summary.
    pub name: String,
    /// Job from the summary.
    pub job: String,
    /// Compressed payload size in bytes.
    pub payload_bytes: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, user: Option<&str>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    info!("Inspecting store at {:?}", path);
    let result = inspect(path, user)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn inspect(path: &Path, user: Option<&str>) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let store = super::open_existing(path)?;

    let user = user.map(|id| {
        let user = UserId::new(id);
        let sheets = store
            .list(&user)
            .into_iter()
            .map(|record| SheetRow {
                version: record.version,
                version_key: record.version_key,
                deleted: record.deleted,
                name: record.summary.name,
                job: record.summary.job,
                payload_bytes: record.payload.len(),
                save_key: record.save_key,
            })
            .collect();

        UserRecords {
            id: id.to_string(),
            sheets,
            preferences: store.get_preferences(&user),
        }
    });

    Ok(InspectResult {
        path: path.display().to_string(),
        stats: store.stats()?,
        user,
    })
}

fn print_text_output(result: &InspectResult) {
    let stats = &result.stats;

    println!("SheetVault Store: {}", result.path);
    println!();
    println!("Log:");
    println!("  Entries:     {}", stats.log_entries);
    println!("  Size:        {} bytes", stats.log_bytes);
    println!();
    println!("Records:");
    println!("  Users:       {}", stats.users);
    println!("  Sheets:      {}", stats.live_sheets);
    println!("  Tombstones:  {}", stats.tombstones);
    println!("  Preferences: {}", stats.preference_records);

    if let Some(user) = &result.user {
        println!();
        println!("User {}:", user.id);
        if user.sheets.is_empty() {
            println!("  (no sheets)");
        }
        for sheet in &user.sheets {
            let state = if sheet.deleted { " [deleted]" } else { "" };
            println!(
                "  {} v{} key={} {} \"{}\" ({} bytes){}",
                sheet.save_key,
                sheet.version,
                sheet.version_key,
                sheet.job,
                sheet.name,
                sheet.payload_bytes,
                state
            );
        }
        match &user.preferences {
            Some(record) => println!("  Next set id: {}", record.next_set_id),
            None => println!("  (no preferences)"),
        }
    }
}
