//! Observability metrics for codec and store operations
//!
//! Tracks timings of serialization, sealing/opening, and compression so callers can
//! export them to whatever metrics system they run.

use serde::{Deserialize, Serialize};

/// Operation metrics for the last codec, cipher or store call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationMetrics {
    /// JSON serialization or parsing time in microseconds (0 if not performed)
    pub serialization_time_micros: u64,

    /// Compression time in microseconds (0 if not performed)
    pub compression_time_micros: u64,

    /// Compression ratio (original_size / compressed_size, >1.0 means compression helped)
    pub compression_ratio: f64,

    /// Seal or open time in microseconds, including the tag derivation (None if not performed)
    pub encryption_time_micros: Option<u64>,

    /// Whether AES instructions were available
    pub hardware_accelerated: bool,
}

impl OperationMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        OperationMetrics {
            serialization_time_micros: 0,
            compression_time_micros: 0,
            compression_ratio: 1.0,
            encryption_time_micros: None,
            hardware_accelerated: false,
        }
    }

    /// Set serialization metrics
    pub fn with_serialization(mut self, time_micros: u64) -> Self {
        self.serialization_time_micros = time_micros;
        self
    }

    /// Set compression metrics
    pub fn with_compression(
        mut self,
        time_micros: u64,
        original_size: usize,
        compressed_size: usize,
    ) -> Self {
        self.compression_time_micros = time_micros;
        if compressed_size > 0 {
            self.compression_ratio = original_size as f64 / compressed_size as f64;
        }
        self
    }

    /// Set encryption metrics
    pub fn with_encryption(mut self, time_micros: u64, hw_accel: bool) -> Self {
        self.encryption_time_micros = Some(time_micros);
        self.hardware_accelerated = hw_accel;
        self
    }

    /// Total operation time in microseconds
    pub fn total_time_micros(&self) -> u64 {
        let mut total = self.serialization_time_micros + self.compression_time_micros;
        if let Some(enc_time) = self.encryption_time_micros {
            total += enc_time;
        }
        total
    }
}

impl Default for OperationMetrics {
    fn default() -> Self {
        Self::new()
    }
}
