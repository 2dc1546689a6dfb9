//! Server configuration.

use sheetvault_codec::{CompressionAlgo, PayloadCompressor, DEFAULT_MIN_COMPRESS_SIZE};
use sheetvault_core::StoreConfig;

/// Configuration for the storage server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Algorithm used to compress new sheet payloads.
    pub compression: CompressionAlgo,
    /// Payloads shorter than this are stored uncompressed.
    pub min_compress_size: usize,
    /// Record store settings.
    pub store: StoreConfig,
}

impl ServerConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            compression: CompressionAlgo::default(),
            min_compress_size: DEFAULT_MIN_COMPRESS_SIZE,
            store: StoreConfig::default(),
        }
    }

    /// Sets the compression algorithm.
    pub fn with_compression(mut self, algo: CompressionAlgo) -> Self {
        self.compression = algo;
        self
    }

    /// Sets the minimum payload size worth compressing.
    pub fn with_min_compress_size(mut self, size: usize) -> Self {
        self.min_compress_size = size;
        self
    }

    /// Sets the record store configuration.
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Builds the payload compressor described by this configuration.
    pub fn compressor(&self) -> PayloadCompressor {
        PayloadCompressor::new(self.compression).with_min_compress_size(self.min_compress_size)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.compression, CompressionAlgo::Lz4);
        assert_eq!(config.min_compress_size, DEFAULT_MIN_COMPRESS_SIZE);
        assert!(config.store.sync_on_write);
    }

    #[test]
    fn builder_pattern() {
        let config = ServerConfig::new()
            .with_compression(CompressionAlgo::Stored)
            .with_min_compress_size(16)
            .with_store(StoreConfig::new().sync_on_write(false));

        assert_eq!(config.compression, CompressionAlgo::Stored);
        assert_eq!(config.min_compress_size, 16);
        assert!(!config.store.sync_on_write);
        assert_eq!(config.compressor().algo(), CompressionAlgo::Stored);
    }
}
