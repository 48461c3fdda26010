//! # memcache-manager
//!
//! Typed memcached access with sealed values: JSON serialization, AES-256-CTR
//! encryption with a PBKDF2 integrity tag, and LZ4 compression envelopes.
//!
//! Values pass through a small pipeline on the way in (serialize, then seal) and the
//! reverse on the way out. Compression is a hint the store acts on, so sealed values
//! are compressed as opaque text.
//!
//! ## Features
//!
//! | Feature | Description | Default |
//! |:--------|:------------|:-------:|
//! | `compression` | LZ4 + xxHash3 envelopes via `lz4_flex` and `rmp-serde` | Yes |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use memcache_manager::{
//!     AuthenticatedCipher, CodecOptions, MemcacheManager, MemoryStore, Password,
//! };
//!
//! let password = Password::try_from("test-pass").unwrap();
//! let mc = MemcacheManager::new(MemoryStore::new(), AuthenticatedCipher::new(password));
//! mc.add_server("localhost", 11211).unwrap();
//!
//! // JSON, sealed, compressed
//! let options = CodecOptions::all();
//! mc.add("memcachelover", &vec!["sweet", "data"], None, &options).unwrap();
//!
//! let value: Option<Vec<String>> = mc.get("memcachelover", &options).unwrap();
//! assert_eq!(value.unwrap(), vec!["sweet", "data"]);
//! ```
//!
//! ## Sealing Without a Store
//!
//! ```rust,no_run
//! use memcache_manager::{AuthenticatedCipher, Password};
//!
//! let cipher = AuthenticatedCipher::new(Password::try_from("test-pass").unwrap());
//! let sealed = cipher.seal(b"memcachelover").unwrap();
//! assert_eq!(cipher.open(&sealed).unwrap(), b"memcachelover");
//! ```
//!
//! ## Security Properties
//!
//! - **Verify-then-decrypt**: PBKDF2-HMAC-SHA256 tag (1000 iterations) over `iv ‖ ciphertext`,
//!   compared in constant time before any decryption
//! - **Fresh IVs**: 32 random bytes per seal from the OS CSPRNG
//! - **Decompression bomb guards**: 512MB limits and a 1000:1 ratio cap
//! - **Memory safety**: `zeroize` on drop for the password and derived material
//!
//! A single password keys both the cipher and the tag. The blob layout and tag
//! construction are fixed, so any process sharing the password can open the values.

// Metrics and observability
pub mod metrics;
pub use metrics::OperationMetrics;

pub mod telemetry;

// Sealing
pub mod encryption;
pub use encryption::{
    AuthenticatedCipher, EncryptionError, HashAlgorithm, KeyDerivationError, Password, SealedBlob,
    derive,
};

// Typed values to bytes
pub mod codec;
pub use codec::{CodecError, CodecOptions, EncodedValue, TransformStep, ValueCodec};

// Storage backends
pub mod store;
pub use store::{CacheStore, Expiration, MemoryStore, ServerAddr, ServerStats, StoreError};

pub mod config;
pub use config::{ConfigError, ManagerConfig};

pub mod manager;
pub use manager::{ManagerError, MemcacheManager};

pub mod report;
pub use report::{StatsSummary, render_report};
