//! Error types for the sync services.

use sheetvault_core::CoreError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync services.
///
/// Conflicts and missing sheets are not errors; they are reported in the
/// response bodies.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The request failed validation.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// A stored payload could not be decoded.
    #[error("corrupt payload for sheet {save_key:?}: {message}")]
    CorruptPayload {
        /// Key of the sheet.
        save_key: String,
        /// Decoder message.
        message: String,
    },

    /// The user's set id counter cannot advance further.
    #[error("set id counter exhausted")]
    CounterExhausted,

    /// The record store failed; nothing was written.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(CoreError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for ServerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::CounterExhausted => ServerError::CounterExhausted,
            other => ServerError::StorageUnavailable(other),
        }
    }
}

impl ServerError {
    /// Creates a corrupt payload error.
    pub fn corrupt_payload(save_key: impl Into<String>, message: impl ToString) -> Self {
        Self::CorruptPayload {
            save_key: save_key.into(),
            message: message.to_string(),
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::ValidationFailed(_) | ServerError::CounterExhausted
        )
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(ServerError::ValidationFailed("bad".into()).is_client_error());
        assert!(ServerError::Internal("oops".into()).is_server_error());
        assert!(ServerError::corrupt_payload("abc", "bad magic").is_server_error());
        assert!(ServerError::from(CoreError::Poisoned).is_server_error());
        assert!(ServerError::from(CoreError::CounterExhausted).is_client_error());
        assert!(!ServerError::ValidationFailed("bad".into()).is_server_error());
    }

    #[test]
    fn exhausted_counter_has_its_own_variant() {
        let err = ServerError::from(CoreError::CounterExhausted);
        assert!(matches!(err, ServerError::CounterExhausted));
        assert_eq!(err.to_string(), "set id counter exhausted");

        let err = ServerError::from(CoreError::Poisoned);
        assert!(matches!(err, ServerError::StorageUnavailable(CoreError::Poisoned)));
        assert!(err.to_string().starts_with("storage unavailable"));
    }

    #[test]
    fn error_display() {
        let err = ServerError::corrupt_payload("abc", "checksum mismatch");
        let msg = err.to_string();
        assert!(msg.contains("\"abc\""));
        assert!(msg.contains("checksum mismatch"));
    }
}
