//! Value codec: typed values to cache bytes and back
//!
//! Encoding runs an ordered list of [`TransformStep`]s; decoding runs the same list
//! in reverse. With both steps enabled a value becomes `seal(json(value))`, and a read
//! opens the blob before any JSON parsing is attempted, so a tampered value never
//! reaches the deserializer.
//!
//! The compression hint is not a step. It rides along in [`EncodedValue`] and the
//! store decides what to do with it.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::encryption::{AuthenticatedCipher, EncryptionError};
use crate::metrics::OperationMetrics;

/// Error types for codec operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("deserialization failed: {0}")]
    Deserialization(String),

    #[error(transparent)]
    Encryption(#[from] EncryptionError),
}

impl CodecError {
    /// True when the stored bytes could not be authenticated or were malformed
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, CodecError::Encryption(e) if e.is_integrity_failure())
    }
}

/// One stage of the encode pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformStep {
    /// Canonical JSON
    Serialize,
    /// Authenticated encryption to base64 text
    Encrypt,
}

impl TransformStep {
    pub fn name(&self) -> &'static str {
        match self {
            TransformStep::Serialize => "serialize",
            TransformStep::Encrypt => "encrypt",
        }
    }
}

/// Per-call codec switches
///
/// Everything is off by default: values are stored in their native form, in the
/// clear, uncompressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodecOptions {
    pub serialize: bool,
    pub encrypt: bool,
    pub compress_hint: bool,
}

impl CodecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// JSON, sealed, compressed
    pub fn all() -> Self {
        Self {
            serialize: true,
            encrypt: true,
            compress_hint: true,
        }
    }

    pub fn serialize(mut self, enabled: bool) -> Self {
        self.serialize = enabled;
        self
    }

    pub fn encrypt(mut self, enabled: bool) -> Self {
        self.encrypt = enabled;
        self
    }

    pub fn compress(mut self, enabled: bool) -> Self {
        self.compress_hint = enabled;
        self
    }

    /// Enabled steps in encode order
    pub fn steps(&self) -> Vec<TransformStep> {
        let mut steps = Vec::with_capacity(2);
        if self.serialize {
            steps.push(TransformStep::Serialize);
        }
        if self.encrypt {
            steps.push(TransformStep::Encrypt);
        }
        steps
    }
}

/// Encoded bytes plus the compression hint for the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedValue {
    pub bytes: Vec<u8>,
    pub compress: bool,
}

/// In-flight pipeline value
enum Payload {
    Value(Value),
    Bytes(Vec<u8>),
}

impl Payload {
    fn into_bytes(self) -> Vec<u8> {
        match self {
            Payload::Value(value) => coerce_native(&value),
            Payload::Bytes(bytes) => bytes,
        }
    }
}

/// Store-native form of a value that was not explicitly serialized
///
/// Strings are stored verbatim, numbers and booleans as text, null as nothing.
/// Arrays and objects have no native form and fall back to JSON.
fn coerce_native(value: &Value) -> Vec<u8> {
    match value {
        Value::Null => Vec::new(),
        Value::String(s) => s.as_bytes().to_vec(),
        Value::Bool(b) => b.to_string().into_bytes(),
        Value::Number(n) => n.to_string().into_bytes(),
        Value::Array(_) | Value::Object(_) => value.to_string().into_bytes(),
    }
}

/// Read store-native bytes into `T`
///
/// The bytes are offered to `T` as a plain string first, so a `String` target gets
/// exactly what was stored. Targets that reject strings get the bytes parsed as JSON,
/// which is how numbers, booleans and collections come back. Empty bytes are null,
/// mirroring [`coerce_native`].
fn read_native<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        if let Ok(value) = T::deserialize(Value::String(text.to_string())) {
            return Ok(value);
        }
    }
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(bytes)
            .map_err(|e| CodecError::Deserialization(e.to_string()))?
    };
    T::deserialize(value).map_err(|e| CodecError::Deserialization(e.to_string()))
}

/// Applies [`CodecOptions`] to values on their way into and out of the cache
pub struct ValueCodec {
    cipher: Arc<AuthenticatedCipher>,
    last_metrics: Arc<Mutex<OperationMetrics>>,
}

impl ValueCodec {
    pub fn new(cipher: Arc<AuthenticatedCipher>) -> Self {
        Self {
            cipher,
            last_metrics: Arc::new(Mutex::new(OperationMetrics::new())),
        }
    }

    pub fn cipher(&self) -> &AuthenticatedCipher {
        &self.cipher
    }

    /// Run the enabled steps forward
    pub fn encode<T: Serialize + ?Sized>(
        &self,
        value: &T,
        options: &CodecOptions,
    ) -> Result<EncodedValue, CodecError> {
        let mut metrics = OperationMetrics::new();

        let start = Instant::now();
        let value =
            serde_json::to_value(value).map_err(|e| CodecError::Serialization(e.to_string()))?;
        let mut serialization_micros = start.elapsed().as_micros() as u64;

        let mut payload = Payload::Value(value);
        for step in options.steps() {
            payload = match (step, payload) {
                (TransformStep::Serialize, Payload::Value(value)) => {
                    let start = Instant::now();
                    let bytes = serde_json::to_vec(&value)
                        .map_err(|e| CodecError::Serialization(e.to_string()))?;
                    serialization_micros += start.elapsed().as_micros() as u64;
                    Payload::Bytes(bytes)
                }
                (TransformStep::Serialize, bytes @ Payload::Bytes(_)) => bytes,
                (TransformStep::Encrypt, payload) => {
                    let plaintext = payload.into_bytes();
                    let start = Instant::now();
                    let sealed = self.cipher.seal(&plaintext)?;
                    metrics = metrics.with_encryption(
                        start.elapsed().as_micros() as u64,
                        self.cipher.hardware_acceleration_enabled(),
                    );
                    Payload::Bytes(sealed.into_bytes())
                }
            };
        }

        self.record_metrics(metrics.with_serialization(serialization_micros));

        Ok(EncodedValue {
            bytes: payload.into_bytes(),
            compress: options.compress_hint,
        })
    }

    /// Run the enabled steps in reverse
    ///
    /// `bytes` must already be decompressed by the store.
    ///
    /// # Errors
    /// - `Encryption(Corrupt)` or `Encryption(AuthenticationFailed)` when opening fails;
    ///   no deserialization is attempted
    /// - `Deserialization` when the bytes do not form a `T`
    pub fn decode<T: DeserializeOwned>(
        &self,
        bytes: &[u8],
        options: &CodecOptions,
    ) -> Result<T, CodecError> {
        let mut metrics = OperationMetrics::new();
        let mut serialization_micros = 0;

        let mut payload = Payload::Bytes(bytes.to_vec());
        for step in options.steps().into_iter().rev() {
            payload = match (step, payload) {
                (TransformStep::Encrypt, payload) => {
                    let sealed = payload.into_bytes();
                    let text = std::str::from_utf8(&sealed).map_err(|_| {
                        EncryptionError::Corrupt("sealed value is not base64 text".into())
                    })?;
                    let start = Instant::now();
                    let plaintext = self.cipher.open(text)?;
                    metrics = metrics.with_encryption(
                        start.elapsed().as_micros() as u64,
                        self.cipher.hardware_acceleration_enabled(),
                    );
                    Payload::Bytes(plaintext)
                }
                (TransformStep::Serialize, Payload::Bytes(bytes)) => {
                    let start = Instant::now();
                    let value = serde_json::from_slice::<Value>(&bytes)
                        .map_err(|e| CodecError::Deserialization(e.to_string()))?;
                    serialization_micros += start.elapsed().as_micros() as u64;
                    Payload::Value(value)
                }
                (TransformStep::Serialize, value @ Payload::Value(_)) => value,
            };
        }

        let start = Instant::now();
        let result = match payload {
            Payload::Value(value) => {
                T::deserialize(value).map_err(|e| CodecError::Deserialization(e.to_string()))
            }
            Payload::Bytes(bytes) => read_native(&bytes),
        };
        serialization_micros += start.elapsed().as_micros() as u64;

        self.record_metrics(metrics.with_serialization(serialization_micros));
        result
    }

    fn record_metrics(&self, metrics: OperationMetrics) {
        if let Ok(mut last) = self.last_metrics.lock() {
            *last = metrics;
        }
    }

    /// Get metrics from the last encode or decode call
    pub fn get_last_metrics(&self) -> OperationMetrics {
        self.last_metrics
            .lock()
            .map(|metrics| metrics.clone())
            .unwrap_or_else(|_| OperationMetrics::new())
    }
}

impl std::fmt::Debug for ValueCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueCodec")
            .field("cipher", &self.cipher)
            .finish_non_exhaustive()
    }
}
