#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Property-based tests for AES-256-GCM field encryption.

use coffre_crypto_core::codec::{decrypt_field, encrypt_field, open, seal, KEY_LEN};
use proptest::prelude::*;

/// Fixed key for property tests.
const PROP_KEY: [u8; KEY_LEN] = [0xCC; KEY_LEN];

/// A second key, guaranteed different.
const OTHER_KEY: [u8; KEY_LEN] = [0xDD; KEY_LEN];

proptest! {
    /// Encrypt→decrypt roundtrip always recovers the original string.
    #[test]
    fn encrypt_decrypt_roundtrip(plaintext in ".{0,512}") {
        let blob = encrypt_field(&plaintext, &PROP_KEY)
            .expect("encrypt should succeed");
        let decrypted = decrypt_field(&blob, &PROP_KEY)
            .expect("decrypt should succeed");
        prop_assert_eq!(decrypted, plaintext);
    }

    /// Two encryptions of the same plaintext never collide (fresh nonce).
    #[test]
    fn ciphertexts_are_nondeterministic(plaintext in ".{0,256}") {
        let a = encrypt_field(&plaintext, &PROP_KEY).expect("encrypt should succeed");
        let b = encrypt_field(&plaintext, &PROP_KEY).expect("encrypt should succeed");
        prop_assert_ne!(a, b);
    }

    /// Decrypting with a different key always fails, never partially succeeds.
    #[test]
    fn wrong_key_always_fails(plaintext in ".{1,256}") {
        let blob = encrypt_field(&plaintext, &PROP_KEY).expect("encrypt should succeed");
        prop_assert!(decrypt_field(&blob, &OTHER_KEY).is_err());
    }

    /// Byte-level roundtrip for arbitrary binary payloads.
    #[test]
    fn seal_open_roundtrip(payload in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let blob = seal(&payload, &PROP_KEY).expect("seal should succeed");
        let recovered = open(&blob, &PROP_KEY).expect("open should succeed");
        prop_assert_eq!(recovered, payload);
    }

    /// Garbage input is rejected cleanly, whatever it looks like.
    #[test]
    fn arbitrary_blobs_never_panic(blob in ".{0,128}") {
        let _ = decrypt_field(&blob, &PROP_KEY);
    }
}
