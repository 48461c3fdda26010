#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use memcache_manager::encryption::SealedBlob;
use memcache_manager::{AuthenticatedCipher, Password};

#[derive(Arbitrary, Debug)]
struct OpenInput {
    text: String,
    bytes: Vec<u8>,
}

fuzz_target!(|input: OpenInput| {
    // Attack: feed attacker-controlled cache entries to the reader
    // Validates: no panics, and nothing opens without a valid tag

    let password = match Password::try_from("fuzz-password") {
        Ok(p) => p,
        Err(_) => return,
    };
    let cipher = AuthenticatedCipher::new(password);

    // Property 1: arbitrary text never opens
    let result = cipher.open(&input.text);
    assert!(result.is_err(), "forged text accepted");
    assert!(result.unwrap_err().is_integrity_failure());

    // Property 2: arbitrary raw blobs never open
    assert!(cipher.open_bytes(&input.bytes).is_err(), "forged blob accepted");

    // Property 3: parsing is lossless for structurally valid blobs
    if let Ok(blob) = SealedBlob::from_bytes(&input.bytes) {
        assert_eq!(blob.to_bytes(), input.bytes);
    }

    // Property 4: genuine seals still open after fuzz inputs
    let sealed = cipher.seal(&input.bytes).expect("seal should succeed");
    assert_eq!(cipher.open(&sealed).expect("open should succeed"), input.bytes);
});
