//! Record log framing and replay.
//!
//! Every write appends one framed entry:
//!
//! ```text
//! | magic (4) | body length (4 LE) | crc32 of body (4 LE) | body |
//! ```
//!
//! The body is the CBOR encoding of a [`LogEntry`]. Later entries for the same
//! key supersede earlier ones.
//!
//! # Recovery rules
//!
//! - An entry cut short by the end of the log is a torn tail: a crash
//!   interrupted the append. Scanning stops there and the tail is reported so
//!   the store can truncate it.
//! - Bad magic, a checksum mismatch or an undecodable body are corruption and
//!   fail the scan.

use crate::error::{CoreError, CoreResult};
use crate::types::{PreferencesRecord, SheetRecord, UserId};
use serde::{Deserialize, Serialize};
use sheetvault_codec::compute_crc32;

/// Magic bytes opening every log entry.
pub const LOG_MAGIC: [u8; 4] = *b"SVLG";

/// magic (4) + length (4) + crc32 (4)
pub(crate) const HEADER_SIZE: usize = 12;

/// Largest body accepted on replay. A length field beyond this is treated as
/// corruption rather than a torn tail.
const MAX_ENTRY_SIZE: usize = 256 * 1024 * 1024;

/// One record snapshot in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogEntry {
    /// Latest state of a sheet.
    Sheet {
        /// Owner.
        user: UserId,
        /// Full record.
        record: SheetRecord,
    },
    /// Latest preferences of a user.
    Preferences {
        /// Owner.
        user: UserId,
        /// Full record.
        record: PreferencesRecord,
    },
}

impl LogEntry {
    /// Returns the user owning the entry.
    pub fn user(&self) -> &UserId {
        match self {
            LogEntry::Sheet { user, .. } | LogEntry::Preferences { user, .. } => user,
        }
    }

    /// Encodes the entry as a framed log entry.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Encode`] if CBOR encoding fails or the body does
    /// not fit the length field.
    pub(crate) fn encode(&self) -> CoreResult<Vec<u8>> {
        let mut body = Vec::new();
        ciborium::into_writer(self, &mut body).map_err(|e| CoreError::encode(e.to_string()))?;

        let len = u32::try_from(body.len())
            .ok()
            .filter(|len| (*len as usize) <= MAX_ENTRY_SIZE)
            .ok_or_else(|| CoreError::encode(format!("entry of {} bytes too large", body.len())))?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + body.len());
        frame.extend_from_slice(&LOG_MAGIC);
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&compute_crc32(&body).to_le_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }
}

/// Outcome of scanning a log.
#[derive(Debug, Default)]
pub(crate) struct LogScan {
    /// Decoded entries with their offsets, in log order.
    pub entries: Vec<(u64, LogEntry)>,
    /// Length of the valid prefix.
    pub valid_len: u64,
    /// Bytes after the valid prefix belonging to a torn entry.
    pub torn_bytes: u64,
}

impl LogScan {
    /// Summarizes the scan.
    pub fn report(&self) -> LogReport {
        let sheet_entries = self
            .entries
            .iter()
            .filter(|(_, entry)| matches!(entry, LogEntry::Sheet { .. }))
            .count() as u64;
        LogReport {
            entries: self.entries.len() as u64,
            sheet_entries,
            preference_entries: self.entries.len() as u64 - sheet_entries,
            valid_bytes: self.valid_len,
            torn_bytes: self.torn_bytes,
        }
    }
}

/// Summary of a log scan, as reported by [`crate::RecordStore::verify`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LogReport {
    /// Total entries.
    pub entries: u64,
    /// Sheet snapshots.
    pub sheet_entries: u64,
    /// Preferences snapshots.
    pub preference_entries: u64,
    /// Bytes covered by valid entries.
    pub valid_bytes: u64,
    /// Bytes of a torn entry at the end of the log.
    pub torn_bytes: u64,
}

/// Scans a complete log image.
///
/// # Errors
///
/// Returns a corruption error for bad magic, checksum mismatch or an
/// undecodable body.
pub(crate) fn scan(data: &[u8]) -> CoreResult<LogScan> {
    let mut scan = LogScan::default();
    let mut pos = 0usize;

    while pos < data.len() {
        let offset = pos as u64;
        let Some(header) = data.get(pos..pos + HEADER_SIZE) else {
            break;
        };

        if header[0..4] != LOG_MAGIC {
            return Err(CoreError::corrupt_log(offset, "bad entry magic"));
        }

        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        if len > MAX_ENTRY_SIZE {
            return Err(CoreError::corrupt_log(
                offset,
                format!("entry length {len} exceeds limit"),
            ));
        }
        let expected = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);

        let body_start = pos + HEADER_SIZE;
        let Some(body) = data.get(body_start..body_start + len) else {
            break;
        };

        let actual = compute_crc32(body);
        if actual != expected {
            return Err(CoreError::ChecksumMismatch {
                offset,
                expected,
                actual,
            });
        }

        let entry: LogEntry = ciborium::from_reader(body)
            .map_err(|e| CoreError::corrupt_log(offset, format!("undecodable entry: {e}")))?;

        scan.entries.push((offset, entry));
        pos = body_start + len;
    }

    scan.valid_len = pos as u64;
    scan.torn_bytes = (data.len() - pos) as u64;
    Ok(scan)
}
