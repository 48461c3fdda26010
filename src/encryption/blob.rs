//! Sealed blob wire layout
//!
//! Format: `[iv(32)][ciphertext(N)][tag(32)]`, base64 encoded (standard alphabet, padded)
//! when stored as a cache value. The layout has no version byte; any change to it is a
//! new format.

use base64::{Engine as _, engine::general_purpose::STANDARD};

use super::core::EncryptionError;

/// Initialization vector length in bytes
pub const IV_LEN: usize = 32;

/// Integrity tag length in bytes
pub const TAG_LEN: usize = 32;

/// Fixed per-blob overhead (IV + tag)
pub const BLOB_OVERHEAD: usize = IV_LEN + TAG_LEN;

/// Decoded sealed blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBlob {
    pub iv: [u8; IV_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
}

impl SealedBlob {
    pub fn new(iv: [u8; IV_LEN], ciphertext: Vec<u8>, tag: [u8; TAG_LEN]) -> Self {
        Self {
            iv,
            ciphertext,
            tag,
        }
    }

    /// Bytes covered by the integrity tag: `iv ‖ ciphertext`
    pub fn authenticated_region(&self) -> Vec<u8> {
        authenticated_region(&self.iv, &self.ciphertext)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(BLOB_OVERHEAD + self.ciphertext.len());
        bytes.extend_from_slice(&self.iv);
        bytes.extend_from_slice(&self.ciphertext);
        bytes.extend_from_slice(&self.tag);
        bytes
    }

    /// Split raw bytes into IV, ciphertext and tag
    ///
    /// # Errors
    /// `Corrupt` when fewer than 64 bytes are supplied.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EncryptionError> {
        if bytes.len() < BLOB_OVERHEAD {
            return Err(EncryptionError::Corrupt(format!(
                "sealed blob too short: {} bytes, need at least {}",
                bytes.len(),
                BLOB_OVERHEAD
            )));
        }

        let tag_start = bytes.len() - TAG_LEN;

        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&bytes[..IV_LEN]);

        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&bytes[tag_start..]);

        Ok(Self {
            iv,
            ciphertext: bytes[IV_LEN..tag_start].to_vec(),
            tag,
        })
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// # Errors
    /// `Corrupt` on invalid base64 or a decoded length under 64 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, EncryptionError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| EncryptionError::Corrupt(format!("invalid base64: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Total decoded length
    pub fn len(&self) -> usize {
        BLOB_OVERHEAD + self.ciphertext.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

pub(crate) fn authenticated_region(iv: &[u8], ciphertext: &[u8]) -> Vec<u8> {
    let mut region = Vec::with_capacity(iv.len() + ciphertext.len());
    region.extend_from_slice(iv);
    region.extend_from_slice(ciphertext);
    region
}
