//! Cryptographic error types for `coffre-crypto-core`.

use thiserror::Error;

/// Errors produced by cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key derivation failed (bad salt, PBKDF2 parameter validation).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Symmetric encryption failure (AES-256-GCM).
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Authentication failed — wrong key, corrupted blob, or tampering.
    ///
    /// Deliberately carries no detail: the caller must not be able to
    /// distinguish a wrong key from a truncated or tampered blob.
    #[error("decryption failed")]
    Decryption,

    /// Invalid key material (wrong length, corrupted bytes).
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Secret-sharing split or combine failure.
    #[error("secret sharing error: {0}")]
    Sharing(String),

    /// Word-phrase encoding/decoding failure (unknown word, bad length).
    #[error("word encoding error: {0}")]
    WordEncoding(String),

    /// Secure memory allocation or CSPRNG failure.
    #[error("secure memory error: {0}")]
    SecureMemory(String),
}
