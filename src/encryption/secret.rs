//! Process-wide cache password
//!
//! The password serves two roles in the sealed-blob format: it is the raw AES-256 key
//! (zero-padded to 32 bytes, no per-message derivation) and it is the PBKDF2 password
//! for the integrity tag. Keeping both roles on one secret is required to read data
//! sealed by earlier deployments.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::core::EncryptionError;
use super::key_derivation::key_fingerprint;

/// Cipher key length in bytes (AES-256)
pub const CIPHER_KEY_LEN: usize = 32;

/// Secret shared by every seal and open call of a cipher instance
///
/// `Clone` is intentionally not derived; share it behind the cipher's `Arc` instead.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Password {
    bytes: Vec<u8>,
}

impl Password {
    /// Wrap password bytes
    ///
    /// # Errors
    /// `InvalidParameter` when the password is empty or longer than 32 bytes
    /// (it must fit the AES-256 key without truncation).
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, EncryptionError> {
        let mut bytes = bytes.into();

        if bytes.is_empty() || bytes.len() > CIPHER_KEY_LEN {
            let len = bytes.len();
            bytes.zeroize();
            return Err(EncryptionError::InvalidParameter(format!(
                "password must be 1..={} bytes, got {}",
                CIPHER_KEY_LEN, len
            )));
        }

        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// AES-256 key: password bytes followed by zero padding
    pub(crate) fn cipher_key(&self) -> Zeroizing<[u8; CIPHER_KEY_LEN]> {
        let mut key = Zeroizing::new([0u8; CIPHER_KEY_LEN]);
        key[..self.bytes.len()].copy_from_slice(&self.bytes);
        key
    }

    /// Hex fingerprint for logs
    pub fn fingerprint(&self) -> String {
        key_fingerprint(&self.bytes)
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Password")
            .field("len", &self.bytes.len())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

impl TryFrom<&str> for Password {
    type Error = EncryptionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Password::new(value.as_bytes())
    }
}

impl TryFrom<&[u8]> for Password {
    type Error = EncryptionError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Password::new(value)
    }
}
