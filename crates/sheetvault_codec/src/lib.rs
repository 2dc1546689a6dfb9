//! # SheetVault Codec
//!
//! Payload compression for stored sheets.
//!
//! Sheet documents pass through a [`Compressor`] before they are persisted
//! and back through it when they are read. The codec is a two-method
//! capability so the stored format can change without touching the
//! reconciliation logic.
//!
//! ## Frame Format
//!
//! ```text
//! | magic "SV" (2) | algorithm (1) | crc32 of raw bytes (4, LE) | body (N) |
//! ```
//!
//! The algorithm byte is written per payload and [`Compressor::decompress`]
//! dispatches on it, so payloads written under an older configuration stay
//! readable.
//!
//! ## Usage
//!
//! ```
//! use sheetvault_codec::{CompressionAlgo, Compressor, PayloadCompressor};
//!
//! let codec = PayloadCompressor::new(CompressionAlgo::Lz4);
//! let encoded = codec.compress(b"{\"items\":[1,2,3]}");
//! assert_eq!(codec.decompress(&encoded).unwrap(), b"{\"items\":[1,2,3]}");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod checksum;
mod compressor;
mod error;

pub use checksum::compute_crc32;
pub use compressor::{
    CompressionAlgo, Compressor, PayloadCompressor, DEFAULT_MIN_COMPRESS_SIZE, FRAME_HEADER_SIZE,
    MAX_DECOMPRESSED_SIZE,
};
pub use error::{CodecError, CodecResult};
