//! Vault error types for `coffre-vault`.

use coffre_crypto_core::CryptoError;
use thiserror::Error;

/// Errors produced by vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Input rejected before any crypto or I/O was attempted.
    #[error("{0}")]
    Validation(String),

    /// Operation requires an unlocked session.
    #[error("vault is locked")]
    KeyLocked,

    /// Cryptographic operation failed (delegated from crypto-core).
    /// Carries the opaque decryption case — wrong key, corrupted
    /// ciphertext, or tampering are indistinguishable by design.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Unlock or recovery material does not reproduce a valid key.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Revision mismatch on write — another writer changed the record
    /// and the automatic retry also conflicted.
    #[error("storage conflict on {0}")]
    StorageConflict(String),

    /// Malformed or insufficient recovery shares.
    #[error("recovery failed: {0}")]
    Recovery(String),

    /// Failure during master-password set or key rotation. The
    /// operation is not atomic; callers may need to retry (see
    /// `secrets::recrypt_all`).
    #[error("encryption initialization failed: {0}")]
    EncryptionInit(String),

    /// Document not found in the store.
    #[error("not found: {0}")]
    NotFound(String),

    /// Document store backend failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<crate::store::StoreError> for VaultError {
    fn from(err: crate::store::StoreError) -> Self {
        use crate::store::StoreError;
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Conflict(id) => Self::StorageConflict(id),
            StoreError::Backend(msg) => Self::Storage(msg),
        }
    }
}
