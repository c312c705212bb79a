//! Secret CRUD with transparent password-field encryption.
//!
//! Every operation obtains the data key through the key manager, so the
//! pre-master-password state (unwrapped key) and the protected state
//! (session must be unlocked) behave identically from here. Only the
//! password field is encrypted; name, username and notes are plaintext
//! in this design.

use coffre_crypto_core::codec;
use coffre_crypto_core::memory::SecretBytes;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::VaultError;
use crate::lifecycle::{self, generate_uuid, now_iso8601};
use crate::records::{self, SecretRecord, SECRET_PREFIX};
use crate::session::Session;
use crate::store::{DocumentStore, RawDocument, StoreError};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for creating a secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSecret {
    /// Display name (required, non-empty after trimming).
    pub name: String,
    /// Account username (may be empty — some accounts have none).
    #[serde(default)]
    pub username: String,
    /// Plaintext password (required, non-empty).
    pub password: String,
    /// Optional free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A decrypted secret as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    /// Document id (`secret:<uuid>`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Account username.
    pub username: String,
    /// Decrypted password.
    pub password: String,
    /// Optional notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
    /// Last-update timestamp, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Partial update of a secret. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretPatch {
    /// Replacement display name.
    pub name: Option<String>,
    /// Replacement username.
    pub username: Option<String>,
    /// Replacement plaintext password. Re-encrypted only when it
    /// actually differs from the stored one.
    pub password: Option<String>,
    /// Replacement notes.
    pub notes: Option<String>,
}

/// Aggregate outcome of a bulk recryption pass.
///
/// `recrypt_all` deliberately has a partial-failure contract: a failed
/// record never blocks its siblings, so a non-zero `error_count` means
/// the secret set is in a mixed-key state and the rotation must be
/// retried or treated as fatal by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecryptReport {
    /// Records successfully re-encrypted.
    pub processed_count: usize,
    /// Records that failed (decryption or write-back).
    pub error_count: usize,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_new_secret(secret: &NewSecret) -> Result<(), VaultError> {
    if secret.name.trim().is_empty() || secret.password.is_empty() {
        return Err(VaultError::Validation(
            "Invalid secret data. Name and password are required.".into(),
        ));
    }
    Ok(())
}

fn validate_id(id: &str) -> Result<(), VaultError> {
    if id.trim().is_empty() || !id.starts_with(SECRET_PREFIX) {
        return Err(VaultError::Validation("Invalid secret ID".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Record I/O
// ---------------------------------------------------------------------------

fn load_secret(store: &dyn DocumentStore, id: &str) -> Result<(SecretRecord, String), VaultError> {
    let doc = store
        .get(id)?
        .ok_or_else(|| VaultError::NotFound(id.to_owned()))?;
    let record: SecretRecord = records::from_doc(&doc)?;
    let rev = doc
        .rev
        .ok_or_else(|| VaultError::Storage(format!("document {id} has no revision")))?;
    Ok((record, rev))
}

fn decrypted(id: &str, record: SecretRecord, key: &SecretBytes<32>) -> Result<Secret, VaultError> {
    let password = codec::decrypt_field(&record.password, key.expose())?;
    Ok(Secret {
        id: id.to_owned(),
        name: record.name,
        username: record.username,
        password,
        notes: record.notes,
        created_at: record.created_at,
        updated_at: record.updated_at,
    })
}

// ---------------------------------------------------------------------------
// CRUD operations
// ---------------------------------------------------------------------------

/// Create a secret, encrypting its password field.
///
/// Validation happens before any crypto or I/O.
///
/// # Errors
///
/// - [`VaultError::Validation`] for an empty name or password.
/// - [`VaultError::KeyLocked`] if the data key is wrapped and the
///   session is locked.
pub fn create_secret(
    store: &dyn DocumentStore,
    session: &Session,
    secret: NewSecret,
) -> Result<Secret, VaultError> {
    validate_new_secret(&secret)?;

    let key = lifecycle::get_or_create_data_key(store, session)?;
    let ciphertext = codec::encrypt_field(&secret.password, key.expose())?;

    let id = format!("{SECRET_PREFIX}{}", generate_uuid());
    let record = SecretRecord {
        name: secret.name,
        username: secret.username,
        password: ciphertext,
        notes: secret.notes,
        created_at: now_iso8601(),
        updated_at: None,
    };
    store.put(&RawDocument::new(id.clone(), records::to_body(&record)?))?;

    decrypted(&id, record, &key)
}

/// List all secrets, newest first, decrypting each password.
///
/// Partial-result policy: a record whose password fails to decrypt is
/// logged and skipped rather than aborting the listing.
///
/// # Errors
///
/// - [`VaultError::KeyLocked`] if the session is locked.
/// - Store failures propagate.
pub fn list_secrets(
    store: &dyn DocumentStore,
    session: &Session,
) -> Result<Vec<Secret>, VaultError> {
    let key = lifecycle::get_or_create_data_key(store, session)?;

    let docs = store.query(SECRET_PREFIX)?;
    let mut secrets = Vec::with_capacity(docs.len());
    for doc in docs {
        let record: SecretRecord = match records::from_doc(&doc) {
            Ok(record) => record,
            Err(e) => {
                warn!(doc = %doc.id, error = %e, "skipping malformed secret record");
                continue;
            }
        };
        match decrypted(&doc.id, record, &key) {
            Ok(secret) => secrets.push(secret),
            Err(e) => {
                warn!(doc = %doc.id, error = %e, "skipping undecryptable secret record");
            }
        }
    }

    secrets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(secrets)
}

/// Fetch a single secret by id.
///
/// # Errors
///
/// - [`VaultError::Validation`] for a malformed id.
/// - [`VaultError::NotFound`] if absent.
/// - [`VaultError::KeyLocked`] if the session is locked.
pub fn get_secret(
    store: &dyn DocumentStore,
    session: &Session,
    id: &str,
) -> Result<Secret, VaultError> {
    validate_id(id)?;
    let key = lifecycle::get_or_create_data_key(store, session)?;
    let (record, _) = load_secret(store, id)?;
    decrypted(id, record, &key)
}

/// Apply a partial update, re-encrypting the password only if it
/// changed. A revision conflict is retried once with a fresh read.
///
/// # Errors
///
/// - [`VaultError::Validation`] for a malformed id.
/// - [`VaultError::NotFound`] if absent.
/// - [`VaultError::KeyLocked`] if the session is locked.
/// - [`VaultError::StorageConflict`] if the retry also conflicts.
pub fn update_secret(
    store: &dyn DocumentStore,
    session: &Session,
    id: &str,
    patch: &SecretPatch,
) -> Result<Secret, VaultError> {
    validate_id(id)?;
    let key = lifecycle::get_or_create_data_key(store, session)?;

    let mut retried = false;
    loop {
        let (mut record, rev) = load_secret(store, id)?;

        if let Some(name) = &patch.name {
            record.name.clone_from(name);
        }
        if let Some(username) = &patch.username {
            record.username.clone_from(username);
        }
        if let Some(password) = &patch.password {
            let current = codec::decrypt_field(&record.password, key.expose())?;
            if *password != current {
                record.password = codec::encrypt_field(password, key.expose())?;
            }
        }
        if let Some(notes) = &patch.notes {
            record.notes = Some(notes.clone());
        }
        record.updated_at = Some(now_iso8601());

        let doc = RawDocument {
            id: id.to_owned(),
            rev: Some(rev),
            body: records::to_body(&record)?,
        };
        match store.put(&doc) {
            Ok(_) => return decrypted(id, record, &key),
            Err(StoreError::Conflict(conflicted)) => {
                if retried {
                    return Err(VaultError::StorageConflict(conflicted));
                }
                warn!(doc = %conflicted, "revision conflict on update, retrying once");
                retried = true;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Delete a secret. A revision conflict is retried once.
///
/// # Errors
///
/// - [`VaultError::Validation`] for a malformed id.
/// - [`VaultError::NotFound`] if absent.
/// - [`VaultError::StorageConflict`] if the retry also conflicts.
pub fn delete_secret(store: &dyn DocumentStore, id: &str) -> Result<(), VaultError> {
    validate_id(id)?;

    let mut retried = false;
    loop {
        let (_, rev) = load_secret(store, id)?;
        match store.remove(id, &rev) {
            Ok(()) => return Ok(()),
            Err(StoreError::Conflict(conflicted)) => {
                if retried {
                    return Err(VaultError::StorageConflict(conflicted));
                }
                warn!(doc = %conflicted, "revision conflict on delete, retrying once");
                retried = true;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Bulk recryption
// ---------------------------------------------------------------------------

/// Re-encrypt every secret's password from `old_key` to `new_key`.
///
/// Each record is processed independently: one failure increments the
/// error counter and never blocks the rest. A write-back conflict is
/// retried once with a fresh read before counting as a failure.
/// Rolling back is impossible without the old key, so the report — not
/// an all-or-nothing result — is the contract.
///
/// # Errors
///
/// Only the initial query can fail the whole operation; per-record
/// failures land in [`RecryptReport::error_count`].
pub fn recrypt_all(
    store: &dyn DocumentStore,
    old_key: &SecretBytes<32>,
    new_key: &SecretBytes<32>,
) -> Result<RecryptReport, VaultError> {
    let docs = store.query(SECRET_PREFIX)?;

    let mut report = RecryptReport {
        processed_count: 0,
        error_count: 0,
    };
    for doc in docs {
        match recrypt_one(store, &doc.id, old_key, new_key) {
            Ok(()) => report.processed_count = report.processed_count.saturating_add(1),
            Err(e) => {
                warn!(doc = %doc.id, error = %e, "recryption failed for record");
                report.error_count = report.error_count.saturating_add(1);
            }
        }
    }
    Ok(report)
}

fn recrypt_one(
    store: &dyn DocumentStore,
    id: &str,
    old_key: &SecretBytes<32>,
    new_key: &SecretBytes<32>,
) -> Result<(), VaultError> {
    let mut retried = false;
    loop {
        let (mut record, rev) = load_secret(store, id)?;
        let plaintext = codec::decrypt_field(&record.password, old_key.expose())?;
        record.password = codec::encrypt_field(&plaintext, new_key.expose())?;

        let doc = RawDocument {
            id: id.to_owned(),
            rev: Some(rev),
            body: records::to_body(&record)?,
        };
        match store.put(&doc) {
            Ok(_) => return Ok(()),
            Err(StoreError::Conflict(conflicted)) => {
                if retried {
                    return Err(VaultError::StorageConflict(conflicted));
                }
                retried = true;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
