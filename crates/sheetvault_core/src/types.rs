//! Stored record types.

use serde::{Deserialize, Serialize};
use sheetvault_protocol::{SheetMetadata, SheetSummary, UserPreferences, VersionState};
use std::fmt;

/// Identity of the user owning a namespace of records.
///
/// Established upstream by authentication; the store treats it as opaque.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a user id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One version-tracked sheet.
///
/// A record is never physically removed: deletion sets `deleted`, clears the
/// payload and keeps `version` and `version_key` so stale clients still
/// conflict against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetRecord {
    /// Key of the sheet within the user's namespace.
    pub save_key: String,
    /// Starts at 1 and advances on every accepted mutation.
    pub version: u32,
    /// Issued on creation, never changes afterwards.
    pub version_key: u32,
    /// Display ordering hint.
    pub sort_order: Option<f64>,
    /// Tombstone flag.
    pub deleted: bool,
    /// Denormalized descriptor for list views.
    pub summary: SheetSummary,
    /// Compressed sheet document; empty for a tombstone.
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
}

impl SheetRecord {
    /// Returns the versioning view consumed by the reconciler.
    #[must_use]
    pub fn version_state(&self) -> VersionState {
        VersionState {
            version: self.version,
            version_key: self.version_key,
            deleted: self.deleted,
        }
    }

    /// Returns the record's metadata, without payload.
    #[must_use]
    pub fn metadata(&self) -> SheetMetadata {
        SheetMetadata {
            save_key: self.save_key.clone(),
            version: self.version,
            version_key: self.version_key,
            sort_order: self.sort_order,
            deleted: self.deleted,
            summary: self.summary.clone(),
        }
    }

    /// Turns the record into a tombstone at `version`.
    #[must_use]
    pub fn into_tombstone(mut self, version: u32) -> Self {
        self.version = version;
        self.deleted = true;
        self.payload = Vec::new();
        self
    }
}

/// Per-user preferences and set id counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferencesRecord {
    /// User settings, if ever stored.
    pub preferences: Option<UserPreferences>,
    /// Next set id to hand out; never decreases.
    pub next_set_id: u32,
}
