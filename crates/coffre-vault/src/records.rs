//! Persisted document types and id conventions.
//!
//! Two document families live in the store:
//! - the singleton [`LocalUserRecord`] under [`LOCAL_USER_ID`]
//! - one [`SecretRecord`] per secret under `secret:<uuid>`
//!
//! Field names are camelCase on disk. Ids and revision tokens are held
//! outside the body (see [`crate::store::RawDocument`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::VaultError;
use crate::store::RawDocument;

/// Document id of the singleton local user record.
pub const LOCAL_USER_ID: &str = "local_user";

/// Document id prefix for secret records.
pub const SECRET_PREFIX: &str = "secret:";

// ---------------------------------------------------------------------------
// LocalUserRecord
// ---------------------------------------------------------------------------

/// Singleton per-installation record: creation timestamp (doubles as the
/// KDF salt source), onboarding marker, and the data-encryption key in
/// exactly one of its two storage forms.
///
/// Invariant: after the first write, exactly one of `data_key` /
/// `wrapped_data_key` is present — never both. `data_key` (base64 raw
/// key bytes) only exists before a master password is set;
/// `wrapped_data_key` (AEAD blob) replaces it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalUserRecord {
    /// ISO 8601 creation timestamp. Never changes after first write —
    /// the wrapping-key salt is recomputed from it.
    pub created_at: String,
    /// Whether initial setup has completed (a master password exists).
    #[serde(default)]
    pub onboarded: bool,
    /// Base64 raw data key — present only before a master password exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_key: Option<String>,
    /// AEAD blob of the data key under the password-derived wrapping key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapped_data_key: Option<String>,
    /// Optional master password hint (plaintext by design — shown to
    /// locked-out users).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// AEAD blob of a fixed sentinel under the wrapping key, used to
    /// verify a password without touching the data key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<String>,
}

impl LocalUserRecord {
    /// Fresh record for a new installation.
    #[must_use]
    pub const fn new(created_at: String) -> Self {
        Self {
            created_at,
            onboarded: false,
            data_key: None,
            wrapped_data_key: None,
            hint: None,
            verification: None,
        }
    }

    /// Returns `true` once a master password protects the data key.
    #[must_use]
    pub const fn is_protected(&self) -> bool {
        self.wrapped_data_key.is_some()
    }
}

// ---------------------------------------------------------------------------
// SecretRecord
// ---------------------------------------------------------------------------

/// One stored secret. Only the password field is encrypted; name,
/// username and notes are plaintext in this design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretRecord {
    /// Display name (non-empty).
    pub name: String,
    /// Account username (may be empty).
    pub username: String,
    /// AEAD ciphertext blob of the password.
    pub password: String,
    /// Optional free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// ISO 8601 timestamp of the last update, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Document conversions
// ---------------------------------------------------------------------------

/// Serialize a typed record into a document body.
///
/// # Errors
///
/// Returns [`VaultError::Storage`] if serialization fails (does not
/// happen for well-formed records).
pub fn to_body<T: Serialize>(record: &T) -> Result<Value, VaultError> {
    serde_json::to_value(record).map_err(|e| VaultError::Storage(format!("serialize record: {e}")))
}

/// Deserialize a document body into a typed record.
///
/// # Errors
///
/// Returns [`VaultError::Storage`] if the body does not match the
/// record shape (store corruption or schema drift).
pub fn from_doc<T: for<'de> Deserialize<'de>>(doc: &RawDocument) -> Result<T, VaultError> {
    serde_json::from_value(doc.body.clone())
        .map_err(|e| VaultError::Storage(format!("malformed document {}: {e}", doc.id)))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
