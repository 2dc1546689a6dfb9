//! Error types for the record store.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for record store operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the record store.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The durable medium failed; the mutation was not applied.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] sheetvault_storage::StorageError),

    /// The record log holds bytes that are not a valid entry.
    #[error("record log corrupted at offset {offset}: {message}")]
    CorruptLog {
        /// Offset of the offending entry.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// A log entry failed its checksum.
    #[error("checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Offset of the offending entry.
        offset: u64,
        /// Checksum stored in the entry header.
        expected: u32,
        /// Checksum computed over the entry body.
        actual: u32,
    },

    /// A record could not be encoded for the log.
    #[error("failed to encode log entry: {message}")]
    Encode {
        /// Encoder message.
        message: String,
    },

    /// No store exists at the path and creation was disabled.
    #[error("no record store at {0:?}")]
    StoreMissing(PathBuf),

    /// A failed write could not be rolled back, so the log tail is unknown.
    /// The store refuses further writes until reopened.
    #[error("record log is poisoned by a failed rollback; reopen the store")]
    Poisoned,

    /// Compaction was pointed at a backend that already holds data.
    #[error("compaction target is not empty ({size} bytes)")]
    TargetNotEmpty {
        /// Size of the target.
        size: u64,
    },

    /// The user's set id counter cannot advance further.
    #[error("set id counter exhausted")]
    CounterExhausted,
}

impl CoreError {
    /// Creates a log corruption error.
    pub fn corrupt_log(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptLog {
            offset,
            message: message.into(),
        }
    }

    /// Creates an encode error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Returns true if the error means the log on disk cannot be trusted.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            CoreError::CorruptLog { .. } | CoreError::ChecksumMismatch { .. }
        )
    }
}
