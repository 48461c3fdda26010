//! Test fixtures and constants for memcache-manager tests.
//!
//! Passwords, payloads and helpers shared by the cipher, codec, store and manager
//! suites. Not every test binary uses every fixture.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use memcache_manager::encryption::{EncryptionError, IV_LEN, IvSource};
use memcache_manager::{AuthenticatedCipher, MemcacheManager, MemoryStore, Password};

// ============================================================================
// Common Test Data
// ============================================================================

/// Empty data - minimal test case for boundary conditions
pub const EMPTY_DATA: &[u8] = b"";

/// Small data - typical short string for basic validation
pub const SMALL_DATA: &[u8] = b"hello world";

/// Unicode data - validates UTF-8 handling with emoji and international characters
pub const UNICODE_DATA: &[u8] = "Hello 世界 🚀 Rust".as_bytes();

/// The classic example key and its 13-byte payload (77-byte sealed blob)
pub const EXAMPLE_KEY: &str = "memcachelover";

/// Size for large data tests (10MB)
pub const LARGE_DATA_SIZE: usize = 10_000_000;

// ============================================================================
// Passwords
// ============================================================================

/// Primary test password
pub const TEST_PASSWORD: &str = "test-pass";

/// Second password for wrong-password tests
pub const OTHER_PASSWORD: &str = "another-pass";

/// Longest accepted password (32 bytes)
pub const MAX_LENGTH_PASSWORD: &str = "0123456789abcdef0123456789abcdef";

pub fn password(text: &str) -> Password {
    Password::try_from(text).unwrap()
}

pub fn test_cipher() -> AuthenticatedCipher {
    AuthenticatedCipher::new(password(TEST_PASSWORD))
}

/// Cipher whose IVs come from `iv_source`
pub fn cipher_with_iv(text: &str, iv_source: impl IvSource + 'static) -> AuthenticatedCipher {
    AuthenticatedCipher::with_iv_source(password(text), Box::new(iv_source))
}

/// Manager over a one-node in-memory pool at localhost:11211
pub fn test_manager() -> MemcacheManager<MemoryStore> {
    let manager = MemcacheManager::new(MemoryStore::new(), test_cipher());
    manager.add_server("localhost", 11211).unwrap();
    manager
}

// ============================================================================
// IV Sources
// ============================================================================

/// Always returns the same IV
pub struct FixedIv(pub [u8; IV_LEN]);

impl IvSource for FixedIv {
    fn fill_iv(&self, iv: &mut [u8; IV_LEN]) -> Result<(), EncryptionError> {
        iv.copy_from_slice(&self.0);
        Ok(())
    }
}

/// Returns IVs built from an incrementing counter, never repeating
#[derive(Default)]
pub struct CountingIv(AtomicU64);

impl IvSource for CountingIv {
    fn fill_iv(&self, iv: &mut [u8; IV_LEN]) -> Result<(), EncryptionError> {
        let n = self.0.fetch_add(1, Ordering::SeqCst);
        iv.fill(0);
        iv[IV_LEN - 8..].copy_from_slice(&n.to_be_bytes());
        Ok(())
    }
}

/// Simulates an exhausted or broken CSPRNG
pub struct FailingIv;

impl IvSource for FailingIv {
    fn fill_iv(&self, _iv: &mut [u8; IV_LEN]) -> Result<(), EncryptionError> {
        Err(EncryptionError::RngFailure)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Generate deterministic large data for testing (filled with pattern byte)
pub fn generate_large_data(size: usize, pattern: u8) -> Vec<u8> {
    vec![pattern; size]
}

/// Generate random-looking incompressible data (for compression ratio tests)
///
/// Uses a simple PRNG (not cryptographically secure). Deterministic seed ensures
/// reproducibility.
pub fn generate_incompressible_data(size: usize, seed: u64) -> Vec<u8> {
    let mut rng = SimplePcg::new(seed);
    (0..size).map(|_| rng.next_byte()).collect()
}

/// Clock handle for stores built with `MemoryStore::with_clock`
pub fn manual_clock(start: u64) -> (Arc<AtomicU64>, memcache_manager::store::memory::Clock) {
    let now = Arc::new(AtomicU64::new(start));
    let handle = Arc::clone(&now);
    (now, Arc::new(move || handle.load(Ordering::SeqCst)))
}

// Simple PCG random number generator (deterministic, not crypto-secure)
struct SimplePcg {
    state: u64,
}

impl SimplePcg {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_byte(&mut self) -> u8 {
        // PCG algorithm: https://www.pcg-random.org/
        let old_state = self.state;
        self.state = old_state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let xor_shifted = (((old_state >> 18) ^ old_state) >> 27) as u32;
        let rot = (old_state >> 59) as u32;
        (xor_shifted.rotate_right(rot) & 0xff) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_constants() {
        assert_eq!(EMPTY_DATA, b"");
        assert_eq!(SMALL_DATA, b"hello world");
        assert!(UNICODE_DATA.len() > SMALL_DATA.len());
        assert_eq!(MAX_LENGTH_PASSWORD.len(), 32);
        assert_ne!(TEST_PASSWORD, OTHER_PASSWORD);
    }

    #[test]
    fn test_counting_iv_never_repeats() {
        let source = CountingIv::default();
        let mut a = [0u8; IV_LEN];
        let mut b = [0u8; IV_LEN];
        source.fill_iv(&mut a).unwrap();
        source.fill_iv(&mut b).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_generate_incompressible_data() {
        let data1 = generate_incompressible_data(1000, 12345);
        let data2 = generate_incompressible_data(1000, 12345);
        let data3 = generate_incompressible_data(1000, 54321);

        // Same seed produces same data (deterministic)
        assert_eq!(data1, data2);
        assert_ne!(data1, data3);

        let unique_bytes: std::collections::HashSet<u8> = data1.iter().copied().collect();
        assert!(
            unique_bytes.len() > 10,
            "Incompressible data should have variety"
        );
    }
}
