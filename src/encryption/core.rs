//! Seal and open cache payloads
//!
//! This module implements the authenticated value format used for encrypted cache
//! entries:
//!
//! 1. A fresh 32-byte IV is drawn from the secure random source.
//! 2. The payload is encrypted with AES-256 in counter mode. The key is the password
//!    zero-padded to 32 bytes; the initial counter block is the first 16 bytes of the IV.
//! 3. The tag is `PBKDF2-HMAC-SHA256(password, iv ‖ ciphertext, 1000 iterations, 32 bytes)`.
//! 4. The result is `base64(iv ‖ ciphertext ‖ tag)`.
//!
//! Opening verifies the tag before any decryption happens. A tag mismatch is reported
//! as [`EncryptionError::AuthenticationFailed`]; tampering and a wrong password are
//! indistinguishable because both the key and the tag hang off the same password.
//!
//! The tag is a 1000-iteration KDF rather than a single HMAC. The blob layout and the
//! tag construction are fixed; changing either makes every stored value unreadable.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use ring::rand::{SecureRandom, SystemRandom};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, warn};
use zeroize::Zeroize;

use super::blob::{IV_LEN, SealedBlob, TAG_LEN, authenticated_region};
use super::key_derivation::{HashAlgorithm, KeyDerivationError, derive};
use super::secret::Password;
use crate::metrics::OperationMetrics;

// CPU feature detection
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
use std::arch::is_x86_feature_detected;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// PBKDF2 iterations for the integrity tag
pub const TAG_ITERATIONS: u32 = 1000;

/// Hash backing the integrity tag
pub const TAG_HASH: HashAlgorithm = HashAlgorithm::Sha256;

/// Bytes of the IV used as the AES-CTR initial counter block
const COUNTER_BLOCK_LEN: usize = 16;

/// Errors that can occur while sealing or opening a value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncryptionError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Corrupt sealed value: {0}")]
    Corrupt(String),

    #[error("Authentication verification failed")]
    AuthenticationFailed,

    #[error("Random number generation failed")]
    RngFailure,

    #[error(transparent)]
    KeyDerivation(#[from] KeyDerivationError),
}

impl EncryptionError {
    /// True for failures that mean "no valid value" rather than a caller mistake
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            EncryptionError::Corrupt(_) | EncryptionError::AuthenticationFailed
        )
    }
}

/// Source of initialization vectors
///
/// Production code uses [`SystemIvSource`]. Implementations must be
/// cryptographically secure and safe to share across threads.
pub trait IvSource: Send + Sync {
    fn fill_iv(&self, iv: &mut [u8; IV_LEN]) -> Result<(), EncryptionError>;
}

/// IV source backed by the operating system CSPRNG
pub struct SystemIvSource {
    rng: SystemRandom,
}

impl SystemIvSource {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for SystemIvSource {
    fn default() -> Self {
        Self::new()
    }
}

impl IvSource for SystemIvSource {
    fn fill_iv(&self, iv: &mut [u8; IV_LEN]) -> Result<(), EncryptionError> {
        self.rng
            .fill(iv)
            .map_err(|_| EncryptionError::RngFailure)
    }
}

/// Seals and opens cache values under one password
pub struct AuthenticatedCipher {
    password: Password,
    iv_source: Box<dyn IvSource>,
    hardware_acceleration_detected: bool,
    /// Last operation metrics (interior mutability for observability)
    last_metrics: Arc<Mutex<OperationMetrics>>,
}

impl AuthenticatedCipher {
    /// Create a cipher that draws IVs from the system CSPRNG
    pub fn new(password: Password) -> Self {
        Self::with_iv_source(password, Box::new(SystemIvSource::new()))
    }

    /// Create a cipher with a custom IV source
    pub fn with_iv_source(password: Password, iv_source: Box<dyn IvSource>) -> Self {
        Self {
            password,
            iv_source,
            hardware_acceleration_detected: Self::detect_hardware_acceleration(),
            last_metrics: Arc::new(Mutex::new(OperationMetrics::new())),
        }
    }

    /// Detect AES instruction support
    ///
    /// Informational only; the `aes` crate selects its backend at runtime.
    fn detect_hardware_acceleration() -> bool {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            is_x86_feature_detected!("aes")
        }

        #[cfg(target_arch = "aarch64")]
        {
            cfg!(target_feature = "aes")
        }

        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
        false
    }

    pub fn hardware_acceleration_enabled(&self) -> bool {
        self.hardware_acceleration_detected
    }

    pub fn password_fingerprint(&self) -> String {
        self.password.fingerprint()
    }

    /// Seal `plaintext` and return the base64 blob
    pub fn seal(&self, plaintext: &[u8]) -> Result<String, EncryptionError> {
        Ok(self.seal_blob(plaintext)?.to_base64())
    }

    /// Seal `plaintext` and return the raw `iv ‖ ciphertext ‖ tag` bytes
    pub fn seal_bytes(&self, plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        Ok(self.seal_blob(plaintext)?.to_bytes())
    }

    /// Seal `plaintext` into a structured blob
    pub fn seal_blob(&self, plaintext: &[u8]) -> Result<SealedBlob, EncryptionError> {
        let start = Instant::now();

        let mut iv = [0u8; IV_LEN];
        self.iv_source.fill_iv(&mut iv)?;

        let mut ciphertext = plaintext.to_vec();
        self.apply_keystream(&iv, &mut ciphertext)?;

        let tag = self.compute_tag(&iv, &ciphertext)?;

        self.record_metrics(start);
        debug!(
            plaintext_len = plaintext.len(),
            password = %self.password.fingerprint(),
            "sealed cache value"
        );

        Ok(SealedBlob::new(iv, ciphertext, tag))
    }

    /// Open a base64 blob
    ///
    /// # Errors
    /// - `Corrupt` for invalid base64 or fewer than 64 decoded bytes
    /// - `AuthenticationFailed` when the tag does not match
    pub fn open(&self, encoded: &str) -> Result<Vec<u8>, EncryptionError> {
        let blob = SealedBlob::from_base64(encoded).inspect_err(|e| {
            warn!(error = %e, "rejected sealed value");
        })?;
        self.open_blob(&blob)
    }

    /// Open raw `iv ‖ ciphertext ‖ tag` bytes
    pub fn open_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        let blob = SealedBlob::from_bytes(bytes).inspect_err(|e| {
            warn!(error = %e, "rejected sealed value");
        })?;
        self.open_blob(&blob)
    }

    /// Verify the tag, then decrypt
    pub fn open_blob(&self, blob: &SealedBlob) -> Result<Vec<u8>, EncryptionError> {
        let start = Instant::now();

        let mut expected = self.compute_tag(&blob.iv, &blob.ciphertext)?;
        let tag_matches: bool = expected.as_slice().ct_eq(blob.tag.as_slice()).into();
        expected.zeroize();

        if !tag_matches {
            warn!(
                ciphertext_len = blob.ciphertext.len(),
                "sealed value failed authentication"
            );
            return Err(EncryptionError::AuthenticationFailed);
        }

        let mut plaintext = blob.ciphertext.clone();
        self.apply_keystream(&blob.iv, &mut plaintext)?;

        self.record_metrics(start);
        debug!(plaintext_len = plaintext.len(), "opened cache value");

        Ok(plaintext)
    }

    /// `PBKDF2(password, iv ‖ ciphertext, 1000, 32, SHA-256)`
    pub fn compute_tag(
        &self,
        iv: &[u8; IV_LEN],
        ciphertext: &[u8],
    ) -> Result<[u8; TAG_LEN], EncryptionError> {
        let region = authenticated_region(iv, ciphertext);
        let mut derived = derive(
            self.password.as_bytes(),
            &region,
            TAG_ITERATIONS,
            TAG_LEN,
            TAG_HASH,
        )?;

        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&derived);
        derived.zeroize();
        Ok(tag)
    }

    /// XOR `buffer` with the AES-256-CTR keystream for `iv`
    fn apply_keystream(&self, iv: &[u8; IV_LEN], buffer: &mut [u8]) -> Result<(), EncryptionError> {
        let key = self.password.cipher_key();
        let mut cipher = Aes256Ctr::new_from_slices(&key[..], &iv[..COUNTER_BLOCK_LEN])
            .map_err(|_| EncryptionError::InvalidParameter("invalid cipher key or IV length".into()))?;
        cipher.apply_keystream(buffer);
        Ok(())
    }

    fn record_metrics(&self, start: Instant) {
        let micros = start.elapsed().as_micros() as u64;
        if let Ok(mut metrics) = self.last_metrics.lock() {
            *metrics =
                OperationMetrics::new().with_encryption(micros, self.hardware_acceleration_detected);
        }
    }

    /// Get metrics from the last seal or open call
    pub fn get_last_metrics(&self) -> OperationMetrics {
        self.last_metrics
            .lock()
            .map(|metrics| metrics.clone())
            .unwrap_or_else(|_| OperationMetrics::new())
    }
}

impl std::fmt::Debug for AuthenticatedCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedCipher")
            .field("password", &self.password)
            .field(
                "hardware_acceleration_detected",
                &self.hardware_acceleration_detected,
            )
            .finish_non_exhaustive()
    }
}
