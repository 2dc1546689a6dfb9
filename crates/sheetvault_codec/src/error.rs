//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while decoding a payload frame.
///
/// Every variant means the bytes are not something [`crate::Compressor::compress`]
/// produced; callers treat all of them as a data-integrity failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The frame is shorter than its header.
    #[error("corrupt payload: frame of {len} bytes is shorter than the header")]
    Truncated {
        /// Length of the input.
        len: usize,
    },

    /// The frame does not start with the payload magic.
    #[error("corrupt payload: bad magic {found:02x?}")]
    BadMagic {
        /// The bytes found where the magic belongs.
        found: [u8; 2],
    },

    /// The algorithm byte names no known algorithm.
    #[error("corrupt payload: unknown compression algorithm 0x{0:02x}")]
    UnknownAlgorithm(u8),

    /// The declared decompressed size exceeds the allowed maximum.
    #[error("corrupt payload: declared size {size} exceeds limit {max}")]
    TooLarge {
        /// Declared size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// The compressed body could not be decoded.
    #[error("corrupt payload: {message}")]
    Undecodable {
        /// Description from the decoder.
        message: String,
    },

    /// The decoded bytes do not match the stored checksum.
    #[error("corrupt payload: checksum mismatch, expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the frame.
        expected: u32,
        /// Checksum of the decoded bytes.
        actual: u32,
    },
}

impl CodecError {
    /// Creates an undecodable-body error.
    pub fn undecodable(message: impl Into<String>) -> Self {
        Self::Undecodable {
            message: message.into(),
        }
    }
}
