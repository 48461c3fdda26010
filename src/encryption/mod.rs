//! Authenticated value encryption
//!
//! Seals cache payloads with AES-256-CTR and a PBKDF2-derived integrity tag.
//!
//! # Features
//! - **One fixed scheme.** PBKDF2-HMAC-SHA256 tag (1000 iterations,
//!   32 bytes) over `iv ‖ ciphertext`, AES-256-CTR for confidentiality
//! - Verify-then-decrypt: nothing is decrypted unless the tag matches
//! - Fresh 32-byte IV per seal from the OS CSPRNG
//! - Standalone PBKDF2 with selectable hash for interop and test vectors

pub mod blob;
pub mod core;
pub mod key_derivation;
pub mod secret;

// Re-exports for convenience
pub use blob::{BLOB_OVERHEAD, IV_LEN, SealedBlob, TAG_LEN};
pub use core::{
    AuthenticatedCipher, EncryptionError, IvSource, SystemIvSource, TAG_HASH, TAG_ITERATIONS,
};
pub use key_derivation::{HashAlgorithm, KeyDerivationError, derive, key_fingerprint};
pub use secret::Password;
