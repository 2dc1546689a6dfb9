//! Preferences service.

use crate::error::{ServerError, ServerResult};
use sheetvault_core::{PreferencesRecord, RecordStore, UserId};
use sheetvault_protocol::{
    AllocateSetIdResponse, GetPreferencesResponse, PutPreferencesRequest, PutPreferencesResponse,
};
use std::sync::Arc;
use tracing::debug;

/// Orchestrates the per-user preferences record and its set id counter.
pub struct PreferencesService {
    store: Arc<RecordStore>,
}

impl PreferencesService {
    /// Creates a service over `store`.
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Returns the stored preferences and counter of `user`.
    ///
    /// A user who never wrote preferences gets `found = false` and a counter
    /// of 0.
    pub fn get_preferences(&self, user: &UserId) -> GetPreferencesResponse {
        match self.store.get_preferences(user) {
            Some(record) => GetPreferencesResponse {
                found: true,
                preferences: record.preferences,
                next_set_id: record.next_set_id,
            },
            None => GetPreferencesResponse::not_found(),
        }
    }

    /// Stores the preferences of `user`.
    ///
    /// The counter becomes the larger of the stored and the client value, so
    /// a client can move it forward but never back.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::StorageUnavailable`] if the write fails.
    pub fn put_preferences(
        &self,
        user: &UserId,
        request: PutPreferencesRequest,
    ) -> ServerResult<PutPreferencesResponse> {
        let next_set_id = self.store.update_preferences(user, |current| {
            let stored = current.map_or(0, |record| record.next_set_id);
            let next_set_id = stored.max(request.next_set_id);
            let record = PreferencesRecord {
                preferences: request.preferences,
                next_set_id,
            };
            Ok::<_, ServerError>((Some(record), next_set_id))
        })?;

        debug!(user = %user, next_set_id, "preferences stored");
        Ok(PutPreferencesResponse { next_set_id })
    }

    /// Hands out the next set id of `user`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::CounterExhausted`] if the counter is at its
    /// maximum, or [`ServerError::StorageUnavailable`] if the write fails.
    pub fn allocate_next_set_id(&self, user: &UserId) -> ServerResult<AllocateSetIdResponse> {
        let set_id = self.store.allocate_next_set_id(user)?;
        let next_set_id = set_id.checked_add(1).ok_or(ServerError::CounterExhausted)?;

        debug!(user = %user, set_id, "set id allocated");
        Ok(AllocateSetIdResponse {
            set_id,
            next_set_id,
        })
    }
}
