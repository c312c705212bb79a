//! AES-256-GCM authenticated field encryption.
//!
//! This module provides:
//! - [`seal`] / [`open`] — byte-level authenticated encryption with a
//!   fresh random 96-bit nonce per call
//! - [`encrypt_field`] / [`decrypt_field`] — string convenience layer
//!   used for secret fields
//!
//! # Blob format
//!
//! `base64(nonce (12 bytes) || ciphertext || tag (16 bytes))`
//!
//! The nonce travels inside the blob; the authentication tag covers the
//! ciphertext, so any modification — nonce, ciphertext, or tag — makes
//! decryption fail as a whole. Decryption never partially succeeds.

use crate::error::CryptoError;
use data_encoding::BASE64;
use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead;
use zeroize::Zeroize;

/// AES-256-GCM nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// AES-256-GCM authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// AES-256-GCM key length in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Minimum valid decoded blob length: nonce + empty ciphertext + tag.
const MIN_BLOB_LEN: usize = NONCE_LEN + TAG_LEN;

fn aead_key(key: &[u8]) -> Result<aead::LessSafeKey, CryptoError> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::Encryption(format!(
            "invalid key length: {} bytes (expected {KEY_LEN})",
            key.len()
        )));
    }
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, key)
        .map_err(|_| CryptoError::Encryption("failed to create AES-256-GCM key".into()))?;
    Ok(aead::LessSafeKey::new(unbound))
}

/// Encrypt plaintext bytes, returning a base64 blob.
///
/// A fresh 96-bit nonce is drawn from `OsRng` per call, so two calls
/// with identical plaintext and key produce different blobs.
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if the key is not exactly 32 bytes
/// or the underlying encryption fails.
pub fn seal(plaintext: &[u8], key: &[u8]) -> Result<String, CryptoError> {
    let sealing_key = aead_key(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    // Encrypt in place; the tag is appended to the buffer.
    let mut in_out = plaintext.to_vec();
    if sealing_key
        .seal_in_place_append_tag(nonce, aead::Aad::empty(), &mut in_out)
        .is_err()
    {
        in_out.zeroize();
        return Err(CryptoError::Encryption(
            "AES-256-GCM encryption failed".into(),
        ));
    }

    let capacity = NONCE_LEN.saturating_add(in_out.len());
    let mut blob = Vec::with_capacity(capacity);
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&in_out);

    Ok(BASE64.encode(&blob))
}

/// Decrypt a base64 blob produced by [`seal`], returning the plaintext.
///
/// Full-or-nothing: a wrong key, tampered bytes, truncated input, or
/// malformed base64 all yield the opaque [`CryptoError::Decryption`].
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if the key is not exactly 32 bytes.
/// Returns `CryptoError::Decryption` for any authentication failure.
pub fn open(blob: &str, key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let opening_key = aead_key(key)?;

    let bytes = BASE64
        .decode(blob.as_bytes())
        .map_err(|_| CryptoError::Decryption)?;
    if bytes.len() < MIN_BLOB_LEN {
        return Err(CryptoError::Decryption);
    }

    let nonce_bytes: [u8; NONCE_LEN] = bytes[..NONCE_LEN]
        .try_into()
        .map_err(|_| CryptoError::Decryption)?;
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let mut ct_tag = bytes[NONCE_LEN..].to_vec();
    let plaintext = opening_key
        .open_in_place(nonce, aead::Aad::empty(), &mut ct_tag)
        .map_err(|_| CryptoError::Decryption)?
        .to_vec();
    ct_tag.zeroize();

    Ok(plaintext)
}

/// Encrypt a string field (e.g. a secret's password).
///
/// # Errors
///
/// See [`seal`].
pub fn encrypt_field(plaintext: &str, key: &[u8]) -> Result<String, CryptoError> {
    seal(plaintext.as_bytes(), key)
}

/// Decrypt a string field previously produced by [`encrypt_field`].
///
/// # Errors
///
/// Returns [`CryptoError::Decryption`] on authentication failure or if
/// the recovered plaintext is not valid UTF-8.
pub fn decrypt_field(blob: &str, key: &[u8]) -> Result<String, CryptoError> {
    let mut plaintext = open(blob, key)?;
    match String::from_utf8(std::mem::take(&mut plaintext)) {
        Ok(s) => Ok(s),
        Err(e) => {
            let mut bytes = e.into_bytes();
            bytes.zeroize();
            Err(CryptoError::Decryption)
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Fixed test key — 32 bytes of 0xAA.
    const TEST_KEY: [u8; KEY_LEN] = [0xAA; KEY_LEN];

    /// Different key for wrong-key tests.
    const WRONG_KEY: [u8; KEY_LEN] = [0xBB; KEY_LEN];

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let blob = encrypt_field("my secret password 123!", &TEST_KEY)
            .expect("encrypt should succeed");
        let plaintext = decrypt_field(&blob, &TEST_KEY).expect("decrypt should succeed");
        assert_eq!(plaintext, "my secret password 123!");
    }

    #[test]
    fn blob_is_base64_and_longer_than_plaintext() {
        let blob = encrypt_field("abc", &TEST_KEY).expect("encrypt should succeed");
        let decoded = BASE64.decode(blob.as_bytes()).expect("blob should be base64");
        assert_eq!(decoded.len(), NONCE_LEN + 3 + TAG_LEN);
    }

    #[test]
    fn same_plaintext_yields_different_blobs() {
        let a = encrypt_field("same data", &TEST_KEY).expect("encrypt should succeed");
        let b = encrypt_field("same data", &TEST_KEY).expect("encrypt should succeed");
        assert_ne!(a, b, "fresh nonce per call must vary the blob");
    }

    #[test]
    fn decrypt_fails_with_wrong_key() {
        let blob = encrypt_field("test data", &TEST_KEY).expect("encrypt should succeed");
        let result = decrypt_field(&blob, &WRONG_KEY);
        assert!(matches!(result, Err(CryptoError::Decryption)));
    }

    #[test]
    fn decrypt_fails_on_tampered_blob() {
        let blob = encrypt_field("test data", &TEST_KEY).expect("encrypt should succeed");
        let mut bytes = BASE64.decode(blob.as_bytes()).expect("valid base64");
        // Flip a ciphertext byte (past the nonce).
        bytes[NONCE_LEN] ^= 0xFF;
        let tampered = BASE64.encode(&bytes);
        assert!(matches!(
            decrypt_field(&tampered, &TEST_KEY),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn decrypt_fails_on_tampered_nonce() {
        let blob = encrypt_field("test data", &TEST_KEY).expect("encrypt should succeed");
        let mut bytes = BASE64.decode(blob.as_bytes()).expect("valid base64");
        bytes[0] ^= 0xFF;
        let tampered = BASE64.encode(&bytes);
        assert!(matches!(
            decrypt_field(&tampered, &TEST_KEY),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn decrypt_fails_on_malformed_base64() {
        assert!(matches!(
            decrypt_field("not/valid/base64!!!", &TEST_KEY),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn decrypt_fails_on_truncated_blob() {
        let short = BASE64.encode(&[0u8; MIN_BLOB_LEN - 1]);
        assert!(matches!(
            decrypt_field(&short, &TEST_KEY),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn rejects_wrong_key_length() {
        let result = encrypt_field("test", &[0u8; 31]);
        assert!(matches!(result, Err(CryptoError::Encryption(_))));
        let result = encrypt_field("test", &[0u8; 33]);
        assert!(matches!(result, Err(CryptoError::Encryption(_))));
    }

    #[test]
    fn empty_plaintext_roundtrip() {
        let blob = encrypt_field("", &TEST_KEY).expect("encrypt empty should succeed");
        let plaintext = decrypt_field(&blob, &TEST_KEY).expect("decrypt empty should succeed");
        assert!(plaintext.is_empty());
    }

    #[test]
    fn unicode_roundtrip() {
        let original = "密码 пароль 🔐";
        let blob = encrypt_field(original, &TEST_KEY).expect("encrypt should succeed");
        let plaintext = decrypt_field(&blob, &TEST_KEY).expect("decrypt should succeed");
        assert_eq!(plaintext, original);
    }

    #[test]
    fn seal_open_raw_key_material() {
        let inner_key = [0x42u8; 32];
        let blob = seal(&inner_key, &TEST_KEY).expect("seal should succeed");
        let recovered = open(&blob, &TEST_KEY).expect("open should succeed");
        assert_eq!(recovered, inner_key);
    }
}
