//! PBKDF2 key derivation
//!
//! PBKDF2 (RFC 2898 / RFC 8018) with a selectable HMAC pseudorandom function, computed
//! by `ring::pbkdf2` once the parameters are validated. The output length is independent of the hash size: derivation spans
//! as many hash blocks as needed, concatenated and truncated to the requested length.
//!
//! The same function doubles as the integrity-tag function of the sealed blob format
//! (see [`super::core`]), which is why it must stay byte-for-byte compatible with the
//! standard construction.

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use ring::{hmac, pbkdf2};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors that can occur during key derivation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyDerivationError {
    #[error("Invalid key derivation parameter: {0}")]
    InvalidParameter(String),
}

/// Hash functions usable as the HMAC pseudorandom function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// SHA-1, kept only for verifying legacy RFC 6070 data
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    fn hmac_algorithm(self) -> hmac::Algorithm {
        match self {
            HashAlgorithm::Sha1 => hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
            HashAlgorithm::Sha256 => hmac::HMAC_SHA256,
            HashAlgorithm::Sha384 => hmac::HMAC_SHA384,
            HashAlgorithm::Sha512 => hmac::HMAC_SHA512,
        }
    }

    fn pbkdf2_algorithm(self) -> pbkdf2::Algorithm {
        match self {
            HashAlgorithm::Sha1 => pbkdf2::PBKDF2_HMAC_SHA1,
            HashAlgorithm::Sha256 => pbkdf2::PBKDF2_HMAC_SHA256,
            HashAlgorithm::Sha384 => pbkdf2::PBKDF2_HMAC_SHA384,
            HashAlgorithm::Sha512 => pbkdf2::PBKDF2_HMAC_SHA512,
        }
    }

    /// Output size of the hash in bytes
    pub fn output_len(self) -> usize {
        self.hmac_algorithm().digest_algorithm().output_len()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = KeyDerivationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha384" => Ok(HashAlgorithm::Sha384),
            "sha512" => Ok(HashAlgorithm::Sha512),
            _ => Err(KeyDerivationError::InvalidParameter(format!(
                "unsupported hash algorithm '{}'",
                s
            ))),
        }
    }
}

/// Derive `output_len` bytes with PBKDF2-HMAC
///
/// # Arguments
/// * `password` - HMAC key material
/// * `salt` - Salt; for integrity tags this is the `IV ‖ Ciphertext` region
/// * `iterations` - Iteration count, at least 1
/// * `output_len` - Requested output length, at least 1 byte
/// * `hash` - Hash function backing the HMAC
///
/// # Errors
/// `InvalidParameter` for zero iterations, zero output length, or an output length
/// beyond the PBKDF2 maximum of `(2^32 - 1) * hLen`.
pub fn derive(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
    hash: HashAlgorithm,
) -> Result<Vec<u8>, KeyDerivationError> {
    let iterations = NonZeroU32::new(iterations).ok_or_else(|| {
        KeyDerivationError::InvalidParameter("iteration count must be at least 1".into())
    })?;

    if output_len == 0 {
        return Err(KeyDerivationError::InvalidParameter(
            "output length must be at least 1 byte".into(),
        ));
    }

    let block_len = hash.output_len();
    let block_count = output_len.div_ceil(block_len);
    if block_count > u32::MAX as usize {
        return Err(KeyDerivationError::InvalidParameter(format!(
            "output length {} exceeds the PBKDF2 maximum for {}",
            output_len, hash
        )));
    }

    // ring panics past the PBKDF2 maximum, which the check above rules out
    let mut derived = vec![0u8; output_len];
    pbkdf2::derive(hash.pbkdf2_algorithm(), iterations, salt, password, &mut derived);
    Ok(derived)
}

/// Fingerprint of secret material, safe to log
///
/// Returns the first 8 bytes of `SHA-256("memcache_key_fingerprint_v1" ‖ secret)`.
pub fn key_fingerprint(secret: &[u8]) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(b"memcache_key_fingerprint_v1");
    hasher.update(secret);
    let hash = hasher.finalize();
    let mut result = [0u8; 8];
    result.copy_from_slice(&hash[..8]);
    result
}
