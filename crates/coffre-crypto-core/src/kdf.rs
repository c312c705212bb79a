//! Password-based key derivation and deterministic salt construction.
//!
//! This module provides:
//! - [`derive_wrapping_key`] — PBKDF2-HMAC-SHA256 derivation of a 256-bit
//!   wrapping key from a master password + salt
//! - [`salt_from_timestamp`] — deterministic salt from an ISO 8601
//!   creation timestamp
//!
//! # Why the salt is derived, not stored
//!
//! The wrapping key's salt is never persisted as a separate field: it is
//! recomputed from the user record's creation timestamp on every
//! derivation. [`salt_from_timestamp`] must therefore be a pure function —
//! the same timestamp string always yields the same salt.

use crate::error::CryptoError;
use crate::memory::SecretBytes;
use ring::{digest, pbkdf2};
use std::num::NonZeroU32;

/// Output length of the KDF in bytes (256 bits).
pub const WRAPPING_KEY_LEN: usize = 32;

/// PBKDF2 iteration count.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Default salt length in bytes.
pub const DEFAULT_SALT_LEN: usize = 32;

/// Compile-time checked non-zero iteration count for `ring::pbkdf2`.
const ITERATIONS: NonZeroU32 = match NonZeroU32::new(PBKDF2_ITERATIONS) {
    Some(n) => n,
    None => panic!("iteration count must be non-zero"),
};

/// Derive a deterministic salt from an ISO 8601 timestamp string.
///
/// The UTF-8 bytes of the timestamp are hashed with SHA-256; the digest
/// is truncated to `len` bytes, or tiled (repeated) when `len` exceeds
/// the digest size.
///
/// Pure: identical input always yields identical output, and different
/// timestamps yield different salts (up to SHA-256 collisions).
#[must_use]
pub fn salt_from_timestamp(timestamp: &str, len: usize) -> Vec<u8> {
    let hash = digest::digest(&digest::SHA256, timestamp.as_bytes());
    hash.as_ref().iter().copied().cycle().take(len).collect()
}

/// Derive a 256-bit wrapping key from a master password and salt.
///
/// Uses PBKDF2-HMAC-SHA256 with [`PBKDF2_ITERATIONS`] iterations.
/// Deterministic: the same `(password, salt)` pair always yields the
/// same key; a different password or salt yields a different key with
/// overwhelming probability.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if the salt is empty. Password
/// strength validation (minimum length) is enforced by the vault layer,
/// not here.
pub fn derive_wrapping_key(
    password: &[u8],
    salt: &[u8],
) -> Result<SecretBytes<WRAPPING_KEY_LEN>, CryptoError> {
    if salt.is_empty() {
        return Err(CryptoError::KeyDerivation("salt must not be empty".into()));
    }

    let mut output = [0u8; WRAPPING_KEY_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        ITERATIONS,
        salt,
        password,
        &mut output,
    );

    Ok(SecretBytes::new(output))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
