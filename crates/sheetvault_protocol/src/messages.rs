//! Request and response shapes crossing the transport boundary.
//!
//! Field names serialize in camelCase and absent optionals are omitted, which
//! is what web clients of the sheet API expect.

use crate::reconcile::MutationKind;
use serde::{Deserialize, Serialize};

/// The open-ended JSON document holding a sheet's full data.
pub type SheetData = serde_json::Map<String, serde_json::Value>;

/// Denormalized descriptor kept next to the compressed payload so listing
/// sheets never decompresses them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSummary {
    /// Job abbreviation the sheet is built for.
    pub job: String,
    /// Display name.
    pub name: String,
    /// Whether the sheet covers several jobs.
    pub multi_job: bool,
    /// Character level.
    pub level: u32,
    /// Item level sync override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isync: Option<u32>,
}

/// Metadata of a stored sheet, without its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetMetadata {
    /// Key of the sheet in the user's namespace.
    pub save_key: String,
    /// Current version.
    pub version: u32,
    /// Version key issued at creation.
    pub version_key: u32,
    /// Display ordering hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<f64>,
    /// Whether the sheet is tombstoned.
    pub deleted: bool,
    /// Summary for list views.
    pub summary: SheetSummary,
}

/// Response to a get-sheet request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSheetResponse {
    /// Sheet metadata.
    pub metadata: SheetMetadata,
    /// Full sheet document.
    pub sheet_data: SheetData,
}

/// Response to a list-sheets request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSheetsResponse {
    /// Live sheets, ordered by key.
    pub sheets: Vec<SheetMetadata>,
    /// Keys of tombstoned sheets, so clients can prune their caches.
    pub deleted_sheets: Vec<String>,
}

/// Create or update a sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutSheetRequest {
    /// Version the client last synced, 0 if never.
    pub last_synced_version: u32,
    /// Version the client expects this write to produce.
    pub new_sheet_version: u32,
    /// Version key the client holds, absent for a sheet it created locally.
    #[serde(default, rename = "newSheetVersionKey", skip_serializing_if = "Option::is_none")]
    pub version_key: Option<u32>,
    /// Display ordering hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<f64>,
    /// Full sheet document; absent for a sort-order-only update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_data: Option<SheetData>,
    /// Summary of the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_summary: Option<SheetSummary>,
}

impl PutSheetRequest {
    /// Creates a content write.
    pub fn content(last_synced_version: u32, data: SheetData, summary: SheetSummary) -> Self {
        Self {
            last_synced_version,
            new_sheet_version: last_synced_version.saturating_add(1),
            sheet_data: Some(data),
            sheet_summary: Some(summary),
            ..Self::default()
        }
    }

    /// Creates a sort-order-only update.
    pub fn sort_order(last_synced_version: u32, sort_order: Option<f64>) -> Self {
        Self {
            last_synced_version,
            new_sheet_version: last_synced_version.saturating_add(1),
            sort_order,
            ..Self::default()
        }
    }

    /// Sets the sort order.
    #[must_use]
    pub fn with_sort_order(mut self, sort_order: f64) -> Self {
        self.sort_order = Some(sort_order);
        self
    }

    /// Sets the version key the client holds.
    #[must_use]
    pub fn with_version_key(mut self, version_key: u32) -> Self {
        self.version_key = Some(version_key);
        self
    }

    /// Sets the version the client expects the write to produce.
    #[must_use]
    pub fn with_new_version(mut self, version: u32) -> Self {
        self.new_sheet_version = version;
        self
    }

    /// Derives the mutation kind: a request carrying a document writes
    /// content, anything else only moves the sheet.
    pub fn mutation_kind(&self) -> MutationKind {
        match (&self.sheet_data, self.last_synced_version) {
            (Some(_), 0) => MutationKind::Create,
            (Some(_), _) => MutationKind::UpdateContent,
            (None, _) => MutationKind::UpdateSortOrder,
        }
    }
}

/// Result of a put-sheet request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutSheetResponse {
    /// The write is reflected in the store.
    pub success: bool,
    /// The client's baseline was stale; nothing was written.
    pub conflict: bool,
    /// A sort-order update named a sheet that does not exist.
    #[serde(default)]
    pub not_found: bool,
    /// Version after the request (the current version on conflict).
    pub version: u32,
    /// Version key after the request.
    pub version_key: u32,
    /// Server's record on conflict, so the client can merge knowingly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<SheetMetadata>,
}

impl PutSheetResponse {
    /// Creates a success response.
    pub fn success(version: u32, version_key: u32) -> Self {
        Self {
            success: true,
            version,
            version_key,
            ..Self::default()
        }
    }

    /// Creates a conflict response carrying the server's record, if any.
    pub fn conflict(current: Option<SheetMetadata>) -> Self {
        Self {
            conflict: true,
            version: current.as_ref().map_or(0, |m| m.version),
            version_key: current.as_ref().map_or(0, |m| m.version_key),
            current,
            ..Self::default()
        }
    }

    /// Creates a not-found response.
    pub fn not_found() -> Self {
        Self {
            not_found: true,
            ..Self::default()
        }
    }
}

/// Tombstone a sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSheetRequest {
    /// Version the client last synced.
    pub last_synced_version: u32,
    /// Version the client expects the tombstone to carry.
    pub new_sheet_version: u32,
}

impl DeleteSheetRequest {
    /// Creates a delete request against `last_synced_version`.
    pub fn new(last_synced_version: u32) -> Self {
        Self {
            last_synced_version,
            new_sheet_version: last_synced_version.saturating_add(1),
        }
    }
}

/// Result of a delete-sheet request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSheetResponse {
    /// The sheet is tombstoned.
    pub success: bool,
    /// The client's baseline was stale; nothing was written.
    pub conflict: bool,
    /// The sheet never existed.
    #[serde(default)]
    pub not_found: bool,
    /// Version after the request (the current version on conflict).
    pub version: u32,
    /// Server's record on conflict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<SheetMetadata>,
}

impl DeleteSheetResponse {
    /// Creates a success response.
    pub fn success(version: u32) -> Self {
        Self {
            success: true,
            version,
            ..Self::default()
        }
    }

    /// Creates a conflict response.
    pub fn conflict(current: Option<SheetMetadata>) -> Self {
        Self {
            conflict: true,
            version: current.as_ref().map_or(0, |m| m.version),
            current,
            ..Self::default()
        }
    }

    /// Creates a not-found response.
    pub fn not_found() -> Self {
        Self {
            not_found: true,
            ..Self::default()
        }
    }
}

/// User settings document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    /// Light colour scheme.
    pub light_mode: bool,
    /// UI language override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_override: Option<String>,
}

/// Response to a get-preferences request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPreferencesResponse {
    /// Whether the user has stored preferences.
    pub found: bool,
    /// Stored preferences.
    #[serde(default)]
    pub preferences: Option<UserPreferences>,
    /// Next id to hand out for a new sheet.
    pub next_set_id: u32,
}

impl GetPreferencesResponse {
    /// The response for a user with no preferences record.
    pub fn not_found() -> Self {
        Self::default()
    }
}

/// Store user preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutPreferencesRequest {
    /// Preferences to store.
    #[serde(default)]
    pub preferences: Option<UserPreferences>,
    /// The client's view of the set id counter.
    pub next_set_id: u32,
}

/// Result of a put-preferences request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutPreferencesResponse {
    /// Counter value after the write.
    pub next_set_id: u32,
}

/// Result of allocating a set id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocateSetIdResponse {
    /// The id handed to the client.
    pub set_id: u32,
    /// Counter value after the allocation.
    pub next_set_id: u32,
}

/// One field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorSingle {
    /// Path of the offending value in the request.
    pub path: String,
    /// Field name.
    pub field: String,
    /// Human readable message.
    pub message: String,
}

/// Validation failures reported by the transport layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationErrorResponse {
    /// All failures found in the request.
    pub validation_errors: Vec<ValidationErrorSingle>,
}

impl ValidationErrorResponse {
    /// Creates a response holding a single failure.
    pub fn single(
        path: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            validation_errors: vec![ValidationErrorSingle {
                path: path.into(),
                field: field.into(),
                message: message.into(),
            }],
        }
    }
}

/// A request to the storage server. The user is established upstream.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageRequest {
    /// Fetch one sheet.
    GetSheet {
        /// Sheet key.
        save_key: String,
    },
    /// List all sheets.
    ListSheets,
    /// Create or update a sheet.
    PutSheet {
        /// Sheet key.
        save_key: String,
        /// Request body.
        request: PutSheetRequest,
    },
    /// Tombstone a sheet.
    DeleteSheet {
        /// Sheet key.
        save_key: String,
        /// Request body.
        request: DeleteSheetRequest,
    },
    /// Fetch preferences.
    GetPreferences,
    /// Store preferences.
    PutPreferences(PutPreferencesRequest),
    /// Hand out a new set id.
    AllocateSetId,
}

/// A response from the storage server.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageResponse {
    /// A sheet.
    Sheet(GetSheetResponse),
    /// The requested sheet does not exist or is tombstoned.
    SheetNotFound,
    /// Sheet listing.
    Sheets(GetSheetsResponse),
    /// Put outcome.
    PutSheet(PutSheetResponse),
    /// Delete outcome.
    DeleteSheet(DeleteSheetResponse),
    /// Preferences.
    Preferences(GetPreferencesResponse),
    /// Put-preferences outcome.
    PutPreferences(PutPreferencesResponse),
    /// Allocated set id.
    SetId(AllocateSetIdResponse),
}

impl StorageRequest {
    /// Returns a short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            StorageRequest::GetSheet { .. } => "get_sheet",
            StorageRequest::ListSheets => "list_sheets",
            StorageRequest::PutSheet { .. } => "put_sheet",
            StorageRequest::DeleteSheet { .. } => "delete_sheet",
            StorageRequest::GetPreferences => "get_preferences",
            StorageRequest::PutPreferences(_) => "put_preferences",
            StorageRequest::AllocateSetId => "allocate_set_id",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn summary() -> SheetSummary {
        SheetSummary {
            job: "SGE".into(),
            name: "Savage BiS".into(),
            multi_job: false,
            level: 100,
            isync: None,
        }
    }

    #[test]
    fn put_request_uses_wire_names() {
        let mut data = SheetData::new();
        data.insert("sets".into(), json!([]));
        let request = PutSheetRequest::content(2, data, summary())
            .with_version_key(9)
            .with_sort_order(1.5);

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["lastSyncedVersion"], 2);
        assert_eq!(value["newSheetVersion"], 3);
        assert_eq!(value["newSheetVersionKey"], 9);
        assert_eq!(value["sortOrder"], 1.5);
        assert_eq!(value["sheetSummary"]["multiJob"], false);
        assert!(value["sheetSummary"].get("isync").is_none());
    }

    #[test]
    fn put_request_accepts_minimal_body() {
        let request: PutSheetRequest =
            serde_json::from_value(json!({"lastSyncedVersion": 4, "newSheetVersion": 5, "sortOrder": 2.0}))
                .unwrap();
        assert_eq!(request.mutation_kind(), MutationKind::UpdateSortOrder);
        assert_eq!(request.sort_order, Some(2.0));
        assert!(request.version_key.is_none());
    }

    #[test]
    fn mutation_kind_follows_body() {
        let create = PutSheetRequest::content(0, SheetData::new(), summary());
        assert_eq!(create.mutation_kind(), MutationKind::Create);

        let update = PutSheetRequest::content(3, SheetData::new(), summary());
        assert_eq!(update.mutation_kind(), MutationKind::UpdateContent);

        let reorder = PutSheetRequest::sort_order(3, Some(0.5));
        assert_eq!(reorder.mutation_kind(), MutationKind::UpdateSortOrder);
    }

    #[test]
    fn conflict_response_reports_current_version() {
        let current = SheetMetadata {
            save_key: "abc".into(),
            version: 2,
            version_key: 41,
            sort_order: None,
            deleted: false,
            summary: summary(),
        };
        let response = PutSheetResponse::conflict(Some(current));
        assert!(response.conflict);
        assert!(!response.success);
        assert_eq!(response.version, 2);
        assert_eq!(response.version_key, 41);
    }

    #[test]
    fn missing_preferences_start_at_zero() {
        let response = GetPreferencesResponse::not_found();
        assert!(!response.found);
        assert_eq!(response.next_set_id, 0);

        let value = serde_json::to_value(response).unwrap();
        assert_eq!(value, json!({"found": false, "preferences": null, "nextSetId": 0}));
    }

    #[test]
    fn sheet_list_wire_shape() {
        let response = GetSheetsResponse {
            sheets: vec![],
            deleted_sheets: vec!["old".into()],
        };
        let value = serde_json::to_value(response).unwrap();
        assert_eq!(value, json!({"sheets": [], "deletedSheets": ["old"]}));
    }

    #[test]
    fn validation_error_shape() {
        let response = ValidationErrorResponse::single("sheetSummary.name", "name", "too long");
        let value = serde_json::to_value(response).unwrap();
        assert_eq!(value["validationErrors"][0]["field"], "name");
    }
}
