#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use memcache_manager::store::CompressedEnvelope;
use memcache_manager::store::envelope::{
    EnvelopeError, MAX_COMPRESSION_RATIO, MAX_UNCOMPRESSED_SIZE,
};

#[derive(Arbitrary, Debug)]
struct CompressionBombTestCase {
    /// Compressed data size (tiny to create extreme ratios)
    compressed_size: u16,
    /// Original size claim (potentially massive for bomb attacks)
    original_size: u32,
    checksum: [u8; 8],
    /// Fill byte for the LZ4 stream (valid or invalid)
    data_pattern: u8,
    /// Raw bytes fed straight to `unpack`
    raw: Vec<u8>,
}

fuzz_target!(|test_case: CompressionBombTestCase| {
    // Attack scenarios:
    // 1. Decompression bomb: tiny block claiming a huge original
    // 2. Size limit bypass: claims > 512MB output
    // 3. Malformed LZ4 stream
    // 4. Arbitrary MessagePack bytes read back from a store

    let compressed_data = vec![test_case.data_pattern; test_case.compressed_size as usize];
    let envelope = CompressedEnvelope {
        compressed_data: compressed_data.clone(),
        checksum: test_case.checksum,
        original_size: test_case.original_size,
    };

    // Property 1: extraction never panics
    let result = envelope.extract();

    // Property 2: size limit enforced
    if let Ok(decompressed) = &result {
        assert!(decompressed.len() <= MAX_UNCOMPRESSED_SIZE);
        assert_eq!(decompressed.len(), test_case.original_size as usize);
    }
    if test_case.original_size as usize > MAX_UNCOMPRESSED_SIZE {
        assert_eq!(result, Err(EnvelopeError::InputTooLarge));
    }

    // Property 3: ratio limit enforced
    let limit = MAX_COMPRESSION_RATIO * compressed_data.len() as u64;
    if test_case.original_size as u64 > limit {
        assert!(result.is_err(), "ratio limit bypassed");
    }

    // Property 4: unpacking arbitrary bytes never panics
    let _ = CompressedEnvelope::unpack(&test_case.raw);
});
