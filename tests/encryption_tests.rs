//! Sealing and key derivation integration tests
//!
//! Exercises the public sealing API end to end:
//!
//! - **Key Derivation**: PBKDF2 vectors, determinism, prefix property, parameter errors
//! - **Roundtrip Correctness**: seal → open preserves data of every shape
//! - **Tamper Resistance**: any modification of IV, ciphertext or tag is rejected
//! - **Malformed Input**: bad base64 and undersized blobs are `Corrupt`, not panics
//! - **IV Freshness**: repeated seals of one plaintext never share an IV

mod common;

use common::fixtures::*;
use memcache_manager::encryption::{BLOB_OVERHEAD, IV_LEN, SealedBlob, TAG_LEN};
use memcache_manager::{EncryptionError, HashAlgorithm, KeyDerivationError, Password, derive};

// ============================================================================
// Key Derivation Tests
// ============================================================================

mod key_derivation {
    use super::*;

    #[test]
    fn test_sha256_reference_vector() {
        let dk = derive(b"password", b"salt", 1, 32, HashAlgorithm::Sha256).unwrap();
        assert_eq!(
            hex::encode(dk),
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
        );
    }

    #[test]
    fn test_sha1_reference_vector() {
        // RFC 6070, c = 2
        let dk = derive(b"password", b"salt", 2, 20, HashAlgorithm::Sha1).unwrap();
        assert_eq!(hex::encode(dk), "ea6c014dc72d6f8ccd1ed92ace1d41f0d8de8957");
    }

    #[test]
    fn test_same_inputs_same_output() {
        // Tags are recomputed on read, so derivation must be deterministic
        let a = derive(b"pw", b"iv-and-ciphertext", 1000, 32, HashAlgorithm::Sha256).unwrap();
        let b = derive(b"pw", b"iv-and-ciphertext", 1000, 32, HashAlgorithm::Sha256).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_short_output_is_prefix_of_long() {
        let short = derive(b"pw", b"salt", 10, 16, HashAlgorithm::Sha512).unwrap();
        let long = derive(b"pw", b"salt", 10, 100, HashAlgorithm::Sha512).unwrap();
        assert_eq!(&long[..16], short.as_slice());
    }

    #[test]
    fn test_multi_block_output() {
        // 80 bytes of SHA-256 needs three blocks
        let dk = derive(b"pw", b"salt", 3, 80, HashAlgorithm::Sha256).unwrap();
        assert_eq!(dk.len(), 80);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            derive(b"pw", b"salt", 0, 32, HashAlgorithm::Sha256),
            Err(KeyDerivationError::InvalidParameter(_))
        ));
        assert!(matches!(
            derive(b"pw", b"salt", 1, 0, HashAlgorithm::Sha256),
            Err(KeyDerivationError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_empty_password_and_salt_allowed() {
        assert_eq!(derive(b"", b"", 1, 32, HashAlgorithm::Sha256).unwrap().len(), 32);
    }
}

// ============================================================================
// Password Tests
// ============================================================================

mod passwords {
    use super::*;

    #[test]
    fn test_length_bounds() {
        assert!(Password::try_from("").is_err());
        assert!(Password::try_from("x").is_ok());
        assert!(Password::try_from(MAX_LENGTH_PASSWORD).is_ok());

        let too_long = format!("{}x", MAX_LENGTH_PASSWORD);
        assert!(matches!(
            Password::try_from(too_long.as_str()),
            Err(EncryptionError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_fingerprint_hides_password() {
        let pw = password(TEST_PASSWORD);
        let fingerprint = pw.fingerprint();
        assert_eq!(fingerprint.len(), 16);
        assert!(!fingerprint.contains(TEST_PASSWORD));
        assert_eq!(fingerprint, password(TEST_PASSWORD).fingerprint());
        assert_ne!(fingerprint, password(OTHER_PASSWORD).fingerprint());
    }
}

// ============================================================================
// Roundtrip Tests
// ============================================================================

mod roundtrip {
    use super::*;

    #[test]
    fn test_roundtrip_fixture_payloads() {
        let cipher = test_cipher();
        for payload in [EMPTY_DATA, SMALL_DATA, UNICODE_DATA] {
            let sealed = cipher.seal(payload).unwrap();
            assert_eq!(cipher.open(&sealed).unwrap(), payload);
        }
    }

    #[test]
    fn test_sealed_size() {
        let cipher = test_cipher();
        for len in [0usize, 1, 15, 16, 17, 1000] {
            let sealed = cipher.seal_bytes(&vec![0x5a; len]).unwrap();
            assert_eq!(sealed.len(), BLOB_OVERHEAD + len);
        }
    }

    #[test]
    fn test_example_key_is_77_bytes() {
        let cipher = test_cipher();
        let sealed = cipher.seal(EXAMPLE_KEY.as_bytes()).unwrap();
        let blob = SealedBlob::from_base64(&sealed).unwrap();
        assert_eq!(blob.len(), 77);
        assert_eq!(cipher.open_blob(&blob).unwrap(), EXAMPLE_KEY.as_bytes());
    }

    #[test]
    fn test_full_length_password() {
        let cipher = cipher_with_iv(MAX_LENGTH_PASSWORD, CountingIv::default());
        let sealed = cipher.seal(SMALL_DATA).unwrap();
        assert_eq!(cipher.open(&sealed).unwrap(), SMALL_DATA);
    }

    #[test]
    fn test_open_is_independent_of_iv_source() {
        // WHY: The reader never needs the writer's IV source, only the password
        let writer = cipher_with_iv(TEST_PASSWORD, FixedIv([7u8; IV_LEN]));
        let reader = cipher_with_iv(TEST_PASSWORD, FailingIv);

        let sealed = writer.seal(SMALL_DATA).unwrap();
        assert_eq!(reader.open(&sealed).unwrap(), SMALL_DATA);
    }

    #[test]
    fn test_base64_whitespace_tolerated() {
        let cipher = test_cipher();
        let sealed = format!("  {}\n", cipher.seal(SMALL_DATA).unwrap());
        assert_eq!(cipher.open(&sealed).unwrap(), SMALL_DATA);
    }
}

// ============================================================================
// Tamper Resistance Tests
// ============================================================================

mod tamper {
    use super::*;

    fn flip(sealed: &str, index: usize, mask: u8) -> String {
        let mut raw = SealedBlob::from_base64(sealed).unwrap().to_bytes();
        raw[index] ^= mask;
        SealedBlob::from_bytes(&raw).unwrap().to_base64()
    }

    #[test]
    fn test_every_byte_position_is_covered() {
        // WHY: IV, ciphertext and tag are all inside the authenticated region or the tag
        let cipher = test_cipher();
        let sealed = cipher.seal(EXAMPLE_KEY.as_bytes()).unwrap();
        let len = SealedBlob::from_base64(&sealed).unwrap().len();

        for index in 0..len {
            let tampered = flip(&sealed, index, 0x01);
            assert_eq!(
                cipher.open(&tampered),
                Err(EncryptionError::AuthenticationFailed),
                "flip at byte {} was not detected",
                index
            );
        }
    }

    #[test]
    fn test_incremented_last_tag_byte() {
        let cipher = test_cipher();
        let sealed = cipher.seal(EXAMPLE_KEY.as_bytes()).unwrap();
        let mut raw = SealedBlob::from_base64(&sealed).unwrap().to_bytes();
        let last = raw.len() - 1;
        raw[last] = raw[last].wrapping_add(1);

        let err = cipher.open_bytes(&raw).unwrap_err();
        assert_eq!(err, EncryptionError::AuthenticationFailed);
        assert!(err.is_integrity_failure());
    }

    #[test]
    fn test_truncated_ciphertext_rejected() {
        let cipher = test_cipher();
        let raw = cipher.seal_bytes(SMALL_DATA).unwrap();

        // Drop one ciphertext byte, keeping IV and tag
        let mut truncated = raw[..IV_LEN + SMALL_DATA.len() - 1].to_vec();
        truncated.extend_from_slice(&raw[raw.len() - TAG_LEN..]);
        assert_eq!(
            cipher.open_bytes(&truncated),
            Err(EncryptionError::AuthenticationFailed)
        );
    }

    #[test]
    fn test_swapped_tags_rejected() {
        let cipher = test_cipher();
        let a = SealedBlob::from_base64(&cipher.seal(b"value a").unwrap()).unwrap();
        let b = SealedBlob::from_base64(&cipher.seal(b"value b").unwrap()).unwrap();

        let franken = SealedBlob::new(a.iv, a.ciphertext.clone(), b.tag);
        assert_eq!(
            cipher.open_blob(&franken),
            Err(EncryptionError::AuthenticationFailed)
        );
    }

    #[test]
    fn test_wrong_password_rejected() {
        let sealed = test_cipher().seal(SMALL_DATA).unwrap();
        let other = cipher_with_iv(OTHER_PASSWORD, CountingIv::default());
        assert_eq!(other.open(&sealed), Err(EncryptionError::AuthenticationFailed));
    }
}

// ============================================================================
// Malformed Input Tests
// ============================================================================

mod malformed {
    use super::*;

    #[test]
    fn test_not_base64() {
        let err = test_cipher().open("not base64!!").unwrap_err();
        assert!(matches!(err, EncryptionError::Corrupt(_)));
        assert!(err.is_integrity_failure());
    }

    #[test]
    fn test_ten_zero_bytes() {
        let encoded = SealedBlob::from_bytes(&[0u8; 64]).unwrap().to_base64();
        // 64 bytes is the minimum, anything shorter is corrupt
        assert!(matches!(
            SealedBlob::from_bytes(&[0u8; 10]),
            Err(EncryptionError::Corrupt(_))
        ));
        assert!(matches!(
            test_cipher().open("AAAAAAAAAAAAAA=="),
            Err(EncryptionError::Corrupt(_))
        ));
        // A structurally valid all-zero blob still fails the tag check
        assert_eq!(
            test_cipher().open(&encoded),
            Err(EncryptionError::AuthenticationFailed)
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(
            test_cipher().open(""),
            Err(EncryptionError::Corrupt(_))
        ));
        assert!(matches!(
            test_cipher().open_bytes(&[]),
            Err(EncryptionError::Corrupt(_))
        ));
    }

    #[test]
    fn test_one_byte_short_of_minimum() {
        assert!(matches!(
            test_cipher().open_bytes(&[0u8; BLOB_OVERHEAD - 1]),
            Err(EncryptionError::Corrupt(_))
        ));
    }
}

// ============================================================================
// IV Freshness Tests
// ============================================================================

mod iv_freshness {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_same_plaintext_different_blobs() {
        let cipher = test_cipher();
        let a = SealedBlob::from_base64(&cipher.seal(SMALL_DATA).unwrap()).unwrap();
        let b = SealedBlob::from_base64(&cipher.seal(SMALL_DATA).unwrap()).unwrap();

        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
        assert_ne!(a.tag, b.tag);
    }

    #[test]
    fn test_thousand_seals_unique_ivs() {
        let cipher = test_cipher();
        let ivs: HashSet<[u8; IV_LEN]> = (0..1000)
            .map(|_| {
                SealedBlob::from_bytes(&cipher.seal_bytes(EMPTY_DATA).unwrap())
                    .unwrap()
                    .iv
            })
            .collect();
        assert_eq!(ivs.len(), 1000);
    }

    #[test]
    fn test_rng_failure_surfaces() {
        let cipher = cipher_with_iv(TEST_PASSWORD, FailingIv);
        assert_eq!(cipher.seal(SMALL_DATA), Err(EncryptionError::RngFailure));
    }
}
