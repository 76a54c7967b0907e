//! Page compression for the cache store.
//!
//! Each serialized page is compressed independently with zstd so a single
//! page can be fetched and decoded without touching its neighbours.

use bytes::Bytes;
use thiserror::Error;

use crate::config::CacheConfig;

#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("Zstd compression failed: {0}")]
    ZstdError(#[from] std::io::Error),

    #[error("Cached page is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Encodes pages for storage and decodes them on the way back.
#[derive(Debug, Clone)]
pub struct PageCompressor {
    enabled: bool,
    level: i32,
}

impl PageCompressor {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            enabled: config.compress,
            level: config.zstd_level,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Bytes to store for a serialized page.
    pub fn encode(&self, page: &str) -> Result<Bytes, CompressionError> {
        if self.enabled {
            Ok(Bytes::from(self.zstd_compress(page.as_bytes())?))
        } else {
            Ok(Bytes::copy_from_slice(page.as_bytes()))
        }
    }

    /// Serialized page from stored bytes.
    pub fn decode(&self, data: &[u8]) -> Result<String, CompressionError> {
        let raw = if self.enabled {
            self.zstd_decompress(data)?
        } else {
            data.to_vec()
        };
        Ok(String::from_utf8(raw)?)
    }

    /// Compress data with zstd.
    fn zstd_compress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        let compressed = zstd::encode_all(data, self.level)?;
        Ok(compressed)
    }

    /// Decompress zstd data.
    fn zstd_decompress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        let decompressed = zstd::decode_all(data)?;
        Ok(decompressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zstd_shrinks_repetitive_pages() {
        let compressor = PageCompressor::new(&CacheConfig::default());
        let page = format!("[{}]", vec![r#"{"object_id":"abc"}"#; 200].join(","));

        let encoded = compressor.encode(&page).unwrap();
        assert!(encoded.len() < page.len());
        assert_eq!(compressor.decode(&encoded).unwrap(), page);
    }

    #[test]
    fn test_disabled_stores_plain_text() {
        let config = CacheConfig {
            compress: false,
            ..Default::default()
        };
        let compressor = PageCompressor::new(&config);
        let encoded = compressor.encode("[1,2]").unwrap();
        assert_eq!(&encoded[..], b"[1,2]");
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        let compressor = PageCompressor::new(&CacheConfig::default());
        assert!(compressor.decode(b"not zstd").is_err());
    }
}
