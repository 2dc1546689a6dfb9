//! Sheet service.

use crate::error::{ServerError, ServerResult};
use rand::Rng;
use sheetvault_codec::Compressor;
use sheetvault_core::{RecordStore, SheetRecord, UserId};
use sheetvault_protocol::{
    reconcile, Decision, DeleteSheetRequest, DeleteSheetResponse, GetSheetResponse,
    GetSheetsResponse, MutationKind, PutSheetRequest, PutSheetResponse, ReconcileInput, SheetData,
    VersionKeyAssignment,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Orchestrates sheet reads and versioned writes.
///
/// Writes run the version reconciler inside the store's per-key
/// read-modify-write, so the version that was checked is the version that
/// gets replaced.
pub struct SheetService {
    store: Arc<RecordStore>,
    compressor: Arc<dyn Compressor>,
}

impl SheetService {
    /// Creates a service over `store`, compressing payloads with `compressor`.
    pub fn new(store: Arc<RecordStore>, compressor: Arc<dyn Compressor>) -> Self {
        Self { store, compressor }
    }

    /// Returns the sheet under `key`, or `None` if it does not exist or is
    /// tombstoned.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::CorruptPayload`] if the stored payload does not
    /// decode.
    pub fn get_sheet(&self, user: &UserId, key: &str) -> ServerResult<Option<GetSheetResponse>> {
        let Some(record) = self.store.get(user, key).filter(|r| !r.deleted) else {
            debug!(user = %user, key, "sheet not found");
            return Ok(None);
        };

        let sheet_data = self.decode_payload(&record)?;
        debug!(user = %user, key, version = record.version, "sheet read");
        Ok(Some(GetSheetResponse {
            metadata: record.metadata(),
            sheet_data,
        }))
    }

    /// Lists the live sheets of `user` and the keys of tombstoned ones.
    pub fn list_sheets(&self, user: &UserId) -> GetSheetsResponse {
        let mut response = GetSheetsResponse::default();
        for record in self.store.list(user) {
            if record.deleted {
                response.deleted_sheets.push(record.save_key);
            } else {
                response.sheets.push(record.metadata());
            }
        }
        debug!(
            user = %user,
            sheets = response.sheets.len(),
            deleted = response.deleted_sheets.len(),
            "sheets listed"
        );
        response
    }

    /// Creates or updates the sheet under `key`.
    ///
    /// A request carrying sheet data writes content; one without only moves
    /// the sheet to `request.sort_order`. Conflicts and missing sheets are
    /// reported in the response, not as errors.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::StorageUnavailable`] if the write fails, in
    /// which case nothing changed.
    pub fn put_sheet(
        &self,
        user: &UserId,
        key: &str,
        request: &PutSheetRequest,
    ) -> ServerResult<PutSheetResponse> {
        let kind = request.mutation_kind();
        let encoded = match &request.sheet_data {
            Some(data) => Some(encode_sheet_data(data)?),
            None => None,
        };
        // Compressed before taking the key lock.
        let payload = encoded.as_deref().map(|bytes| self.compressor.compress(bytes));

        let response = self.store.update(user, key, |current| {
            let unchanged = current
                .filter(|record| !record.deleted)
                .is_some_and(|record| self.is_unchanged(record, request, encoded.as_deref()));

            let input = ReconcileInput::new(kind, request.last_synced_version)
                .against(current.map(SheetRecord::version_state))
                .claiming_version(request.new_sheet_version)
                .claiming_version_key(request.version_key)
                .unchanged(unchanged);

            let decision = reconcile(&input);
            log_decision(user, key, kind, &decision);

            Ok::<_, ServerError>(match decision {
                Decision::Accept {
                    next_version,
                    version_key,
                } => {
                    let version_key = match version_key {
                        VersionKeyAssignment::Mint => mint_version_key(),
                        VersionKeyAssignment::Keep(version_key) => version_key,
                    };
                    let record = build_record(
                        current,
                        key,
                        request,
                        payload,
                        next_version,
                        version_key,
                    );
                    (
                        Some(record),
                        PutSheetResponse::success(next_version, version_key),
                    )
                }
                Decision::AlreadyApplied { current } => (
                    None,
                    PutSheetResponse::success(current.version, current.version_key),
                ),
                Decision::Conflict { .. } => (
                    None,
                    PutSheetResponse::conflict(current.map(SheetRecord::metadata)),
                ),
                Decision::Missing => (None, PutSheetResponse::not_found()),
            })
        })?;

        Ok(response)
    }

    /// Tombstones the sheet under `key`.
    ///
    /// Deleting an already deleted sheet succeeds without advancing its
    /// version.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::StorageUnavailable`] if the write fails, in
    /// which case nothing changed.
    pub fn delete_sheet(
        &self,
        user: &UserId,
        key: &str,
        request: &DeleteSheetRequest,
    ) -> ServerResult<DeleteSheetResponse> {
        let response = self.store.update(user, key, |current| {
            let input = ReconcileInput::new(MutationKind::Delete, request.last_synced_version)
                .against(current.map(SheetRecord::version_state))
                .claiming_version(request.new_sheet_version);

            let decision = reconcile(&input);
            log_decision(user, key, MutationKind::Delete, &decision);

            Ok::<_, ServerError>(match (decision, current) {
                (Decision::Accept { next_version, .. }, Some(record)) => (
                    Some(record.clone().into_tombstone(next_version)),
                    DeleteSheetResponse::success(next_version),
                ),
                (Decision::AlreadyApplied { current }, _) => {
                    (None, DeleteSheetResponse::success(current.version))
                }
                (Decision::Conflict { .. }, _) => (
                    None,
                    DeleteSheetResponse::conflict(current.map(SheetRecord::metadata)),
                ),
                (Decision::Missing, _) | (Decision::Accept { .. }, None) => {
                    (None, DeleteSheetResponse::not_found())
                }
            })
        })?;

        Ok(response)
    }

    /// Whether writing `request` would leave `record` as it is.
    fn is_unchanged(
        &self,
        record: &SheetRecord,
        request: &PutSheetRequest,
        encoded: Option<&[u8]>,
    ) -> bool {
        let Some(encoded) = encoded else {
            return record.sort_order == request.sort_order;
        };

        if request.sort_order.is_some() && request.sort_order != record.sort_order {
            return false;
        }
        if request
            .sheet_summary
            .as_ref()
            .is_some_and(|summary| *summary != record.summary)
        {
            return false;
        }

        match self.compressor.decompress(&record.payload) {
            Ok(stored) => stored == encoded,
            Err(err) => {
                warn!(
                    key = %record.save_key,
                    error = %err,
                    "stored payload unreadable, treating write as a change"
                );
                false
            }
        }
    }

    fn decode_payload(&self, record: &SheetRecord) -> ServerResult<SheetData> {
        let bytes = self
            .compressor
            .decompress(&record.payload)
            .map_err(|e| ServerError::corrupt_payload(&record.save_key, e))?;
        serde_json::from_slice(&bytes).map_err(|e| ServerError::corrupt_payload(&record.save_key, e))
    }
}

/// Serializes a sheet document. Key order is canonical, so equal documents
/// encode to equal bytes.
fn encode_sheet_data(data: &SheetData) -> ServerResult<Vec<u8>> {
    serde_json::to_vec(data).map_err(|e| ServerError::Internal(e.to_string()))
}

/// Issues a version key for a newly created sheet.
fn mint_version_key() -> u32 {
    rand::thread_rng().gen_range(1..=i32::MAX as u32)
}

/// Builds the record an accepted put writes.
fn build_record(
    current: Option<&SheetRecord>,
    key: &str,
    request: &PutSheetRequest,
    payload: Option<Vec<u8>>,
    version: u32,
    version_key: u32,
) -> SheetRecord {
    match (current, payload) {
        // Content write, possibly reviving a tombstone.
        (current, Some(payload)) => SheetRecord {
            save_key: key.to_string(),
            version,
            version_key,
            sort_order: request
                .sort_order
                .or_else(|| current.and_then(|r| r.sort_order)),
            deleted: false,
            summary: request
                .sheet_summary
                .clone()
                .or_else(|| current.map(|r| r.summary.clone()))
                .unwrap_or_default(),
            payload,
        },
        // Sort order only; the reconciler never accepts one for a missing key.
        (Some(current), None) => SheetRecord {
            version,
            sort_order: request.sort_order,
            ..current.clone()
        },
        (None, None) => SheetRecord {
            save_key: key.to_string(),
            version,
            version_key,
            sort_order: request.sort_order,
            deleted: false,
            summary: request.sheet_summary.clone().unwrap_or_default(),
            payload: Vec::new(),
        },
    }
}

fn log_decision(user: &UserId, key: &str, kind: MutationKind, decision: &Decision) {
    match decision {
        Decision::Accept { next_version, .. } => {
            debug!(user = %user, key, ?kind, version = next_version, "sheet mutation accepted");
        }
        Decision::AlreadyApplied { current } => {
            debug!(user = %user, key, ?kind, version = current.version, "sheet mutation already applied");
        }
        Decision::Conflict {
            current: Some(current),
        } if current.deleted => {
            warn!(user = %user, key, ?kind, version = current.version, "sheet mutation conflicts with tombstone");
        }
        Decision::Conflict { current } => {
            debug!(
                user = %user,
                key,
                ?kind,
                version = current.map_or(0, |c| c.version),
                "sheet mutation conflicts"
            );
        }
        Decision::Missing => {
            debug!(user = %user, key, ?kind, "sheet mutation against missing sheet");
        }
    }
}
