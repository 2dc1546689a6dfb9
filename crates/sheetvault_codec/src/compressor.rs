//! The payload compressor.

use crate::checksum::compute_crc32;
use crate::error::{CodecError, CodecResult};

/// Magic bytes opening every payload frame.
const MAGIC: [u8; 2] = *b"SV";

/// Size of the frame header: magic (2) + algorithm (1) + crc32 (4).
pub const FRAME_HEADER_SIZE: usize = 7;

/// Inputs shorter than this are stored without compression by default.
pub const DEFAULT_MIN_COMPRESS_SIZE: usize = 128;

/// Upper bound on a decompressed payload.
pub const MAX_DECOMPRESSED_SIZE: usize = 64 * 1024 * 1024;

/// A symmetric byte codec.
///
/// `decompress(compress(x)) == x` holds for every byte sequence. Two
/// compressions of the same input need not be byte-identical, but both must
/// decompress.
pub trait Compressor: Send + Sync {
    /// Encodes `raw` into a self-describing frame.
    fn compress(&self, raw: &[u8]) -> Vec<u8>;

    /// Decodes a frame produced by [`Compressor::compress`].
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] for truncated, foreign or damaged input.
    fn decompress(&self, encoded: &[u8]) -> CodecResult<Vec<u8>>;
}

/// Compression algorithm identifiers, stored as the frame's algorithm byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CompressionAlgo {
    /// Body is the raw input.
    Stored = 0x00,
    /// Body is an LZ4 block prefixed by the raw length (u32 LE).
    #[default]
    Lz4 = 0x01,
}

impl CompressionAlgo {
    /// Parses an algorithm byte.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Self::Stored),
            0x01 => Some(Self::Lz4),
            _ => None,
        }
    }

    /// Parses an algorithm name as used in configuration.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "stored" | "none" => Some(Self::Stored),
            "lz4" => Some(Self::Lz4),
            _ => None,
        }
    }

    /// Returns the configuration name of the algorithm.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Stored => "stored",
            Self::Lz4 => "lz4",
        }
    }
}

/// The default [`Compressor`]: LZ4 with a stored fallback.
///
/// Inputs shorter than `min_compress_size`, inputs larger than
/// [`MAX_DECOMPRESSED_SIZE`], and inputs LZ4 does not shrink are written with
/// [`CompressionAlgo::Stored`].
#[derive(Debug, Clone, Copy)]
pub struct PayloadCompressor {
    algo: CompressionAlgo,
    min_compress_size: usize,
}

impl PayloadCompressor {
    /// Creates a compressor using `algo` for payloads worth compressing.
    #[must_use]
    pub fn new(algo: CompressionAlgo) -> Self {
        Self {
            algo,
            min_compress_size: DEFAULT_MIN_COMPRESS_SIZE,
        }
    }

    /// Sets the minimum input size that is compressed.
    #[must_use]
    pub fn with_min_compress_size(mut self, size: usize) -> Self {
        self.min_compress_size = size;
        self
    }

    /// Returns the configured algorithm.
    #[must_use]
    pub fn algo(&self) -> CompressionAlgo {
        self.algo
    }

    fn frame(algo: CompressionAlgo, raw: &[u8], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(FRAME_HEADER_SIZE + body.len());
        out.extend_from_slice(&MAGIC);
        out.push(algo as u8);
        out.extend_from_slice(&compute_crc32(raw).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    fn lz4_body(raw: &[u8]) -> Option<Vec<u8>> {
        let len = u32::try_from(raw.len()).ok()?;
        let block = lz4_flex::block::compress(raw);
        if block.len() + 4 >= raw.len() {
            return None;
        }
        let mut body = Vec::with_capacity(4 + block.len());
        body.extend_from_slice(&len.to_le_bytes());
        body.extend_from_slice(&block);
        Some(body)
    }

    fn lz4_decode(body: &[u8]) -> CodecResult<Vec<u8>> {
        let Some((size, block)) = body.split_first_chunk::<4>() else {
            return Err(CodecError::undecodable("missing LZ4 size prefix"));
        };
        let size = u32::from_le_bytes(*size) as usize;
        if size > MAX_DECOMPRESSED_SIZE {
            return Err(CodecError::TooLarge {
                size,
                max: MAX_DECOMPRESSED_SIZE,
            });
        }

        let raw = lz4_flex::block::decompress(block, size)
            .map_err(|e| CodecError::undecodable(format!("LZ4: {e}")))?;
        if raw.len() != size {
            return Err(CodecError::undecodable(format!(
                "LZ4 produced {} bytes, frame declared {size}",
                raw.len()
            )));
        }
        Ok(raw)
    }
}

impl Default for PayloadCompressor {
    fn default() -> Self {
        Self::new(CompressionAlgo::default())
    }
}

impl Compressor for PayloadCompressor {
    fn compress(&self, raw: &[u8]) -> Vec<u8> {
        let worth_it = self.algo == CompressionAlgo::Lz4
            && raw.len() >= self.min_compress_size
            && raw.len() <= MAX_DECOMPRESSED_SIZE;

        if worth_it {
            if let Some(body) = Self::lz4_body(raw) {
                return Self::frame(CompressionAlgo::Lz4, raw, &body);
            }
        }
        Self::frame(CompressionAlgo::Stored, raw, raw)
    }

    fn decompress(&self, encoded: &[u8]) -> CodecResult<Vec<u8>> {
        if encoded.len() < FRAME_HEADER_SIZE {
            return Err(CodecError::Truncated { len: encoded.len() });
        }

        let magic = [encoded[0], encoded[1]];
        if magic != MAGIC {
            return Err(CodecError::BadMagic { found: magic });
        }

        let algo = CompressionAlgo::from_byte(encoded[2])
            .ok_or(CodecError::UnknownAlgorithm(encoded[2]))?;
        let expected = u32::from_le_bytes([encoded[3], encoded[4], encoded[5], encoded[6]]);
        let body = &encoded[FRAME_HEADER_SIZE..];

        let raw = match algo {
            CompressionAlgo::Stored => body.to_vec(),
            CompressionAlgo::Lz4 => Self::lz4_decode(body)?,
        };

        let actual = compute_crc32(&raw);
        if actual != expected {
            return Err(CodecError::ChecksumMismatch { expected, actual });
        }
        Ok(raw)
    }
}
