//! LZ4 compression envelopes for stored values.
//!
//! Values written with the compression hint are wrapped in a [`CompressedEnvelope`]:
//! - 512MB size limits for decompression bomb protection
//! - 1000x max compression ratio enforcement
//! - xxHash3-64 checksums for corruption detection
//!
//! Envelopes are MessagePack-encoded. Sealed values are compressed as opaque base64
//! text; the envelope never looks inside them.

use serde::{Deserialize, Serialize};
use thiserror::Error;
#[cfg(feature = "compression")]
use xxhash_rust::xxh3::xxh3_64;

/// Error types for envelope operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EnvelopeError {
    #[error("input exceeds maximum size")]
    InputTooLarge,

    #[error("decompression ratio exceeds safety limit")]
    DecompressionBomb,

    #[error("integrity check failed")]
    ChecksumMismatch,

    #[error("decompression failed")]
    DecompressionFailed,

    #[error("size validation failed")]
    SizeValidationFailed,

    #[error("serialization failed: {0}")]
    SerializationFailed(String),

    #[error("deserialization failed: {0}")]
    DeserializationFailed(String),
}

// Security constants - Production-safe limits
pub const MAX_UNCOMPRESSED_SIZE: usize = 512 * 1024 * 1024; // 512MB limit
pub const MAX_COMPRESSED_SIZE: usize = 512 * 1024 * 1024; // 512MB limit
/// Maximum allowed compression ratio (1000:1)
/// Integer-only so the bound cannot be bypassed through float rounding
pub const MAX_COMPRESSION_RATIO: u64 = 1000;

/// Compressed payload with integrity checking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressedEnvelope {
    /// LZ4 block
    pub compressed_data: Vec<u8>,
    /// xxHash3-64 of the original data, big-endian
    pub checksum: [u8; 8],
    /// Original size for validation
    pub original_size: u32,
}

#[cfg(feature = "compression")]
impl CompressedEnvelope {
    /// Compress `data` and checksum the original bytes
    pub fn new(data: &[u8]) -> Result<Self, EnvelopeError> {
        if data.len() > MAX_UNCOMPRESSED_SIZE {
            return Err(EnvelopeError::InputTooLarge);
        }

        let compressed_data = lz4_flex::compress(data);

        if compressed_data.len() > MAX_COMPRESSED_SIZE {
            return Err(EnvelopeError::InputTooLarge);
        }

        Ok(CompressedEnvelope {
            compressed_data,
            checksum: xxh3_64(data).to_be_bytes(),
            original_size: data.len() as u32,
        })
    }

    /// Decompress and validate
    pub fn extract(&self) -> Result<Vec<u8>, EnvelopeError> {
        if self.compressed_data.len() > MAX_COMPRESSED_SIZE {
            return Err(EnvelopeError::InputTooLarge);
        }

        if self.original_size as usize > MAX_UNCOMPRESSED_SIZE {
            return Err(EnvelopeError::InputTooLarge);
        }

        // Empty compressed data claiming a non-empty original is a bomb
        let compressed_size = self.compressed_data.len() as u64;
        if compressed_size == 0 && self.original_size > 0 {
            return Err(EnvelopeError::DecompressionBomb);
        }

        // Overflow counts as a bomb
        let max_allowed_original = MAX_COMPRESSION_RATIO
            .checked_mul(compressed_size)
            .ok_or(EnvelopeError::DecompressionBomb)?;

        if (self.original_size as u64) > max_allowed_original {
            return Err(EnvelopeError::DecompressionBomb);
        }

        let decompressed = lz4_flex::decompress(&self.compressed_data, self.original_size as usize)
            .map_err(|_| EnvelopeError::DecompressionFailed)?;

        // Non-cryptographic checksum, plain comparison is fine
        let computed_checksum = xxh3_64(&decompressed).to_be_bytes();
        if computed_checksum != self.checksum {
            return Err(EnvelopeError::ChecksumMismatch);
        }

        if decompressed.len() != self.original_size as usize {
            return Err(EnvelopeError::SizeValidationFailed);
        }

        Ok(decompressed)
    }

    /// Compress `data` and encode the envelope as MessagePack
    pub fn pack(data: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
        let envelope = Self::new(data)?;
        let bytes = rmp_serde::to_vec(&envelope)
            .map_err(|e| EnvelopeError::SerializationFailed(e.to_string()))?;

        if bytes.len() > MAX_COMPRESSED_SIZE {
            return Err(EnvelopeError::InputTooLarge);
        }

        Ok(bytes)
    }

    /// Decode a MessagePack envelope and extract the original bytes
    pub fn unpack(bytes: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
        if bytes.len() > MAX_COMPRESSED_SIZE {
            return Err(EnvelopeError::InputTooLarge);
        }

        let envelope: CompressedEnvelope = rmp_serde::from_slice(bytes)
            .map_err(|e| EnvelopeError::DeserializationFailed(e.to_string()))?;
        envelope.extract()
    }

    /// Compression ratio for `data` without building an envelope
    pub fn estimate_ratio(data: &[u8]) -> Result<f64, EnvelopeError> {
        if data.len() > MAX_UNCOMPRESSED_SIZE {
            return Err(EnvelopeError::InputTooLarge);
        }

        let compressed = lz4_flex::compress(data);
        Ok(data.len() as f64 / compressed.len() as f64)
    }
}
