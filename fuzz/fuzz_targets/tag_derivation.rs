#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use memcache_manager::{HashAlgorithm, derive};

#[derive(Arbitrary, Debug)]
struct DerivationInput {
    password: Vec<u8>,
    salt: Vec<u8>,
    iterations: u8,
    length: u8,
}

fuzz_target!(|input: DerivationInput| {
    // Attack: PBKDF2 with arbitrary passwords, salts and output lengths
    // Validates: no panics, exact output length, determinism, prefix property

    let iterations = u32::from(input.iterations);
    let length = usize::from(input.length);

    match derive(&input.password, &input.salt, iterations, length, HashAlgorithm::Sha256) {
        Ok(dk) => {
            assert!(iterations > 0 && length > 0);
            assert_eq!(dk.len(), length);

            let again = derive(&input.password, &input.salt, iterations, length, HashAlgorithm::Sha256)
                .expect("deterministic derivation should succeed again");
            assert_eq!(dk, again, "derivation must be deterministic");

            if length > 1 {
                let shorter = derive(&input.password, &input.salt, iterations, length - 1, HashAlgorithm::Sha256)
                    .expect("shorter derivation should succeed");
                assert_eq!(&dk[..length - 1], shorter.as_slice());
            }
        }
        Err(_) => assert!(iterations == 0 || length == 0),
    }
});
