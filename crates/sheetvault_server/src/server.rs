//! Storage server.

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::preferences::PreferencesService;
use crate::sheets::SheetService;
use sheetvault_core::{RecordStore, UserId};
use sheetvault_protocol::{
    AllocateSetIdResponse, DeleteSheetRequest, DeleteSheetResponse, GetPreferencesResponse,
    GetSheetResponse, GetSheetsResponse, PutPreferencesRequest, PutPreferencesResponse,
    PutSheetRequest, PutSheetResponse, StorageRequest, StorageResponse,
};
use std::path::Path;
use std::sync::Arc;
use tracing::error;

/// The storage server.
///
/// Owns the record store and both services. A transport layer calls the
/// `handle_*` methods, or [`StorageServer::handle_message`], with the user
/// it has already authenticated.
///
/// # Example
///
/// ```
/// use sheetvault_protocol::{PutSheetRequest, SheetData, SheetSummary};
/// use sheetvault_server::{ServerConfig, StorageServer, UserId};
///
/// let server = StorageServer::new(ServerConfig::default()).unwrap();
/// let user = UserId::new("user-1");
///
/// let request = PutSheetRequest::content(0, SheetData::new(), SheetSummary::default());
/// let response = server.handle_put_sheet(&user, "abc", &request).unwrap();
/// assert_eq!(response.version, 1);
/// ```
pub struct StorageServer {
    config: ServerConfig,
    store: Arc<RecordStore>,
    sheets: SheetService,
    preferences: PreferencesService,
}

impl StorageServer {
    /// Creates a server whose records live in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory store cannot be opened.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let store = Arc::new(RecordStore::in_memory()?);
        Ok(Self::with_store(config, store))
    }

    /// Opens a server over the log file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ServerError::StorageUnavailable`] if the log is locked,
    /// missing (with creation disabled) or corrupted.
    pub fn open(path: &Path, config: ServerConfig) -> ServerResult<Self> {
        let store = RecordStore::open_file(path, config.store).map_err(|err| {
            error!(path = %path.display(), error = %err, "failed to open record store");
            err
        })?;
        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Creates a server over an existing store.
    pub fn with_store(config: ServerConfig, store: Arc<RecordStore>) -> Self {
        let compressor = Arc::new(config.compressor());
        let sheets = SheetService::new(Arc::clone(&store), compressor);
        let preferences = PreferencesService::new(Arc::clone(&store));

        Self {
            config,
            store,
            sheets,
            preferences,
        }
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the record store.
    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Handles a get-sheet request.
    pub fn handle_get_sheet(
        &self,
        user: &UserId,
        key: &str,
    ) -> ServerResult<Option<GetSheetResponse>> {
        self.sheets.get_sheet(user, key)
    }

    /// Handles a list-sheets request.
    pub fn handle_list_sheets(&self, user: &UserId) -> GetSheetsResponse {
        self.sheets.list_sheets(user)
    }

    /// Handles a put-sheet request.
    pub fn handle_put_sheet(
        &self,
        user: &UserId,
        key: &str,
        request: &PutSheetRequest,
    ) -> ServerResult<PutSheetResponse> {
        self.sheets.put_sheet(user, key, request)
    }

    /// Handles a delete-sheet request.
    pub fn handle_delete_sheet(
        &self,
        user: &UserId,
        key: &str,
        request: &DeleteSheetRequest,
    ) -> ServerResult<DeleteSheetResponse> {
        self.sheets.delete_sheet(user, key, request)
    }

    /// Handles a get-preferences request.
    pub fn handle_get_preferences(&self, user: &UserId) -> GetPreferencesResponse {
        self.preferences.get_preferences(user)
    }

    /// Handles a put-preferences request.
    pub fn handle_put_preferences(
        &self,
        user: &UserId,
        request: PutPreferencesRequest,
    ) -> ServerResult<PutPreferencesResponse> {
        self.preferences.put_preferences(user, request)
    }

    /// Handles a set id allocation.
    pub fn handle_allocate_set_id(&self, user: &UserId) -> ServerResult<AllocateSetIdResponse> {
        self.preferences.allocate_next_set_id(user)
    }

    /// Handles a storage request (dispatches to the appropriate handler).
    pub fn handle_message(
        &self,
        user: &UserId,
        request: StorageRequest,
    ) -> ServerResult<StorageResponse> {
        let name = request.name();
        let response = match request {
            StorageRequest::GetSheet { save_key } => self
                .handle_get_sheet(user, &save_key)
                .map(|sheet| sheet.map_or(StorageResponse::SheetNotFound, StorageResponse::Sheet)),
            StorageRequest::ListSheets => Ok(StorageResponse::Sheets(self.handle_list_sheets(user))),
            StorageRequest::PutSheet { save_key, request } => self
                .handle_put_sheet(user, &save_key, &request)
                .map(StorageResponse::PutSheet),
            StorageRequest::DeleteSheet { save_key, request } => self
                .handle_delete_sheet(user, &save_key, &request)
                .map(StorageResponse::DeleteSheet),
            StorageRequest::GetPreferences => {
                Ok(StorageResponse::Preferences(self.handle_get_preferences(user)))
            }
            StorageRequest::PutPreferences(request) => self
                .handle_put_preferences(user, request)
                .map(StorageResponse::PutPreferences),
            StorageRequest::AllocateSetId => self
                .handle_allocate_set_id(user)
                .map(StorageResponse::SetId),
        };

        if let Err(err) = &response {
            if err.is_server_error() {
                error!(user = %user, request = name, error = %err, "request failed");
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetvault_protocol::{SheetData, SheetSummary};

    fn user() -> UserId {
        UserId::new("user-1")
    }

    fn put(version: u32) -> PutSheetRequest {
        let mut data = SheetData::new();
        data.insert("revision".into(), serde_json::json!(version));
        PutSheetRequest::content(version, data, SheetSummary::default())
    }

    #[test]
    fn server_lifecycle() {
        let server = StorageServer::new(ServerConfig::default()).unwrap();
        assert!(server.handle_list_sheets(&user()).sheets.is_empty());
        assert_eq!(server.store().stats().unwrap().log_entries, 0);
    }

    #[test]
    fn full_sync_flow() {
        let server = StorageServer::new(ServerConfig::default()).unwrap();

        // 1. Allocate an id for a new sheet
        let set_id = server.handle_allocate_set_id(&user()).unwrap().set_id;
        let key = format!("sheet-{set_id}");

        // 2. Create it
        let created = server.handle_put_sheet(&user(), &key, &put(0)).unwrap();
        assert!(created.success);

        // 3. Update it
        let updated = server.handle_put_sheet(&user(), &key, &put(1)).unwrap();
        assert_eq!(updated.version, 2);

        // 4. Another device with the old baseline conflicts
        let stale = server.handle_put_sheet(&user(), &key, &put(1)).unwrap();
        assert!(stale.conflict);
        assert_eq!(stale.version, 2);

        // 5. Listing shows the sheet at version 2
        let listing = server.handle_list_sheets(&user());
        assert_eq!(listing.sheets.len(), 1);
        assert_eq!(listing.sheets[0].version, 2);
    }

    #[test]
    fn message_dispatch() {
        let server = StorageServer::new(ServerConfig::default()).unwrap();

        let response = server
            .handle_message(&user(), StorageRequest::AllocateSetId)
            .unwrap();
        assert!(matches!(response, StorageResponse::SetId(r) if r.set_id == 0));

        let response = server
            .handle_message(
                &user(),
                StorageRequest::GetSheet {
                    save_key: "missing".into(),
                },
            )
            .unwrap();
        assert_eq!(response, StorageResponse::SheetNotFound);

        let response = server
            .handle_message(
                &user(),
                StorageRequest::PutSheet {
                    save_key: "abc".into(),
                    request: put(0),
                },
            )
            .unwrap();
        assert!(matches!(response, StorageResponse::PutSheet(r) if r.success));

        let response = server
            .handle_message(
                &user(),
                StorageRequest::GetSheet {
                    save_key: "abc".into(),
                },
            )
            .unwrap();
        assert!(matches!(response, StorageResponse::Sheet(s) if s.metadata.version == 1));
    }

    #[test]
    fn shared_store() {
        let store = Arc::new(RecordStore::in_memory().unwrap());
        let server = StorageServer::with_store(ServerConfig::default(), Arc::clone(&store));

        server.handle_put_sheet(&user(), "abc", &put(0)).unwrap();

        // Check the store directly
        assert_eq!(store.get(&user(), "abc").unwrap().version, 1);
    }
}
