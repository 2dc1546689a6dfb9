//! # SheetVault Protocol
//!
//! Sheet sync protocol types and the version reconciler.
//!
//! This crate provides:
//! - The request/response shapes exchanged with the transport layer
//! - [`reconcile`], the conflict-detection decision for a single mutation
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod messages;
mod reconcile;

pub use messages::{
    AllocateSetIdResponse, DeleteSheetRequest, DeleteSheetResponse, GetPreferencesResponse,
    GetSheetResponse, GetSheetsResponse, PutPreferencesRequest, PutPreferencesResponse,
    PutSheetRequest, PutSheetResponse, SheetData, SheetMetadata, SheetSummary, StorageRequest,
    StorageResponse, UserPreferences, ValidationErrorResponse, ValidationErrorSingle,
};
pub use reconcile::{
    reconcile, Decision, MutationKind, ReconcileInput, VersionKeyAssignment, VersionState,
};
