//! Data-encryption-key lifecycle — the key manager.
//!
//! This module orchestrates the key hierarchy: master password →
//! PBKDF2 derivation (salted by the user record's creation timestamp) →
//! wrapping key → wraps the random 256-bit data key. Two states exist:
//!
//! - **No master password**: the data key sits unwrapped (base64) in the
//!   user record, so secrets can be created before onboarding finishes.
//! - **Protected**: the record holds only the wrapped form; the session
//!   must be unlocked before any secret operation.
//!
//! Setting a master password always rotates the data key — including
//! the first time — and bulk-recrypts every stored secret
//! (`secrets::recrypt_all`) before the new wrapped key is persisted.

use coffre_crypto_core::memory::{SecretBuffer, SecretBytes};
use coffre_crypto_core::{codec, kdf, CryptoError};
use data_encoding::BASE64;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::warn;
use zeroize::Zeroize;

use crate::error::VaultError;
use crate::records::{self, LocalUserRecord, LOCAL_USER_ID};
use crate::secrets;
use crate::session::Session;
use crate::store::{DocumentStore, RawDocument, StoreError};

/// Minimum master password length in characters.
pub const MIN_MASTER_PASSWORD_LEN: usize = 8;

/// Sentinel encrypted under the wrapping key; decrypting it proves a
/// password candidate without touching the data key.
const VERIFICATION_SENTINEL: &str = "coffre/verification/v1";

// ---------------------------------------------------------------------------
// Local user record I/O
// ---------------------------------------------------------------------------

/// Load the singleton user record and its revision, if present.
fn load_local_user(
    store: &dyn DocumentStore,
) -> Result<Option<(LocalUserRecord, Option<String>)>, VaultError> {
    match store.get(LOCAL_USER_ID)? {
        Some(doc) => {
            let record: LocalUserRecord = records::from_doc(&doc)?;
            Ok(Some((record, doc.rev)))
        }
        None => Ok(None),
    }
}

/// Read-modify-write the user record, creating it on first use.
///
/// A revision conflict (another writer changed the record between read
/// and write) is retried once with a fresh read before surfacing as
/// [`VaultError::StorageConflict`]. Returns the record as written.
fn upsert_local_user(
    store: &dyn DocumentStore,
    patch: &dyn Fn(&mut LocalUserRecord),
) -> Result<LocalUserRecord, VaultError> {
    let mut retried = false;
    loop {
        let (mut record, rev) = load_local_user(store)?
            .unwrap_or_else(|| (LocalUserRecord::new(now_iso8601()), None));
        patch(&mut record);
        let doc = RawDocument {
            id: LOCAL_USER_ID.to_owned(),
            rev,
            body: records::to_body(&record)?,
        };
        match store.put(&doc) {
            Ok(_) => return Ok(record),
            Err(StoreError::Conflict(id)) => {
                if retried {
                    return Err(VaultError::StorageConflict(id));
                }
                warn!(doc = %id, "revision conflict on user record, retrying once");
                retried = true;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn decode_data_key(encoded: &str) -> Result<SecretBytes<32>, VaultError> {
    let mut raw = BASE64
        .decode(encoded.as_bytes())
        .map_err(|_| CryptoError::InvalidKeyMaterial("malformed stored key".into()))?;
    let key = SecretBytes::from_slice(&raw)?;
    raw.zeroize();
    Ok(key)
}

// ---------------------------------------------------------------------------
// Key manager operations
// ---------------------------------------------------------------------------

/// Obtain the data-encryption key, creating one on a fresh install.
///
/// Resolution order: session cache → stored unwrapped key → generate.
/// A wrapped key without an unlocked session is the one failure case.
///
/// # Errors
///
/// - [`VaultError::KeyLocked`] if the key is wrapped and the session is
///   locked — the caller must `unlock` first.
/// - [`VaultError::Storage`] / [`VaultError::StorageConflict`] on store
///   failures.
pub fn get_or_create_data_key(
    store: &dyn DocumentStore,
    session: &Session,
) -> Result<SecretBytes<32>, VaultError> {
    if let Ok(key) = session.data_key() {
        return Ok(key);
    }

    if let Some((record, _)) = load_local_user(store)? {
        if record.is_protected() {
            return Err(VaultError::KeyLocked);
        }
        if let Some(encoded) = &record.data_key {
            let key = decode_data_key(encoded)?;
            session.unlock_with(key.duplicate(), None);
            return Ok(key);
        }
    }

    // Fresh install (or an empty record): mint a key and persist it
    // unwrapped so secrets can exist before a master password does.
    let candidate = SecretBytes::<32>::random()?;
    let encoded = BASE64.encode(candidate.expose());
    let record = upsert_local_user(store, &|record| {
        if record.data_key.is_none() && !record.is_protected() {
            record.data_key = Some(encoded.clone());
        }
    })?;

    // A concurrent writer may have won the race; honor whatever the
    // store now holds.
    if record.is_protected() {
        return Err(VaultError::KeyLocked);
    }
    let stored = record
        .data_key
        .as_deref()
        .ok_or_else(|| VaultError::Storage("data key missing after initialization".into()))?;
    let key = decode_data_key(stored)?;
    session.unlock_with(key.duplicate(), None);
    Ok(key)
}

/// Set (or change) the master password.
///
/// Rotation is mandatory on every call, including the first: a fresh
/// data key is generated, every stored secret is recrypted from the old
/// key to the new one, and only then is the new key wrapped and
/// persisted (replacing any unwrapped form). On success the session
/// holds the new key and the password.
///
/// Not atomic: a failure partway leaves the store in a mixed state and
/// surfaces as [`VaultError::EncryptionInit`]; callers should retry.
///
/// # Errors
///
/// - [`VaultError::Validation`] if the password is shorter than
///   [`MIN_MASTER_PASSWORD_LEN`] characters (checked before any I/O).
/// - [`VaultError::KeyLocked`] if a previous password protects the key
///   and the session is locked.
/// - [`VaultError::EncryptionInit`] if recryption or wrapping fails.
pub fn set_master_password(
    store: &dyn DocumentStore,
    session: &Session,
    password: &str,
    hint: Option<&str>,
) -> Result<(), VaultError> {
    if password.chars().count() < MIN_MASTER_PASSWORD_LEN {
        return Err(VaultError::Validation(format!(
            "Password must be at least {MIN_MASTER_PASSWORD_LEN} characters long"
        )));
    }

    let old_key = get_or_create_data_key(store, session)?;
    let new_key = SecretBytes::<32>::random()?;

    let report = secrets::recrypt_all(store, &old_key, &new_key)?;
    if report.error_count > 0 {
        return Err(VaultError::EncryptionInit(format!(
            "rotation failed for {} of {} secrets",
            report.error_count,
            report.processed_count.saturating_add(report.error_count)
        )));
    }

    let (record, _) = load_local_user(store)?
        .ok_or_else(|| VaultError::Storage("user record vanished during rotation".into()))?;
    let salt = kdf::salt_from_timestamp(&record.created_at, kdf::DEFAULT_SALT_LEN);
    let wrapping_key = kdf::derive_wrapping_key(password.as_bytes(), &salt)
        .map_err(|e| VaultError::EncryptionInit(e.to_string()))?;
    let wrapped = codec::seal(new_key.expose(), wrapping_key.expose())
        .map_err(|e| VaultError::EncryptionInit(e.to_string()))?;
    let verification = codec::encrypt_field(VERIFICATION_SENTINEL, wrapping_key.expose())
        .map_err(|e| VaultError::EncryptionInit(e.to_string()))?;

    let hint_owned = hint.map(str::to_owned);
    upsert_local_user(store, &|record| {
        record.wrapped_data_key = Some(wrapped.clone());
        record.data_key = None;
        record.verification = Some(verification.clone());
        record.hint = hint_owned.clone();
        record.onboarded = true;
    })?;

    session.unlock_with(new_key, Some(SecretBuffer::from(password)));
    Ok(())
}

/// Attempt to unlock with a master password candidate.
///
/// Returns `Ok(false)` for a wrong password (AEAD authentication
/// failure) rather than an error — the caller shows a generic invalid
/// message. On success the session is populated and `Ok(true)` returned.
///
/// # Errors
///
/// Returns [`VaultError::NotFound`] if no master password is configured;
/// store and non-authentication crypto failures propagate.
pub fn unlock(
    store: &dyn DocumentStore,
    session: &Session,
    password: &str,
) -> Result<bool, VaultError> {
    let Some((record, _)) = load_local_user(store)? else {
        return Err(VaultError::NotFound(LOCAL_USER_ID.to_owned()));
    };
    let Some(wrapped) = &record.wrapped_data_key else {
        return Err(VaultError::NotFound("no master password is set".into()));
    };

    let salt = kdf::salt_from_timestamp(&record.created_at, kdf::DEFAULT_SALT_LEN);
    let wrapping_key = kdf::derive_wrapping_key(password.as_bytes(), &salt)?;

    match codec::open(wrapped, wrapping_key.expose()) {
        Ok(mut raw) => {
            let key = SecretBytes::from_slice(&raw)?;
            raw.zeroize();
            session.unlock_with(key, Some(SecretBuffer::from(password)));
            Ok(true)
        }
        Err(CryptoError::Decryption) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Lock the session, clearing the cached key and password.
pub fn lock(session: &Session) {
    session.lock();
}

/// Fetch the stored password hint, if any.
///
/// # Errors
///
/// Store failures propagate; a missing record reads as `None`.
pub fn get_hint(store: &dyn DocumentStore) -> Result<Option<String>, VaultError> {
    Ok(load_local_user(store)?.and_then(|(record, _)| record.hint))
}

/// Returns `true` once a master password protects the data key.
///
/// # Errors
///
/// Store failures propagate.
pub fn is_protected(store: &dyn DocumentStore) -> Result<bool, VaultError> {
    Ok(load_local_user(store)?.is_some_and(|(record, _)| record.is_protected()))
}

/// Verify a master password candidate against the stored verification
/// ciphertext without unwrapping the data key (re-auth for sensitive
/// operations).
///
/// # Errors
///
/// - [`VaultError::InvalidCredentials`] if the candidate is wrong.
/// - [`VaultError::NotFound`] if no verification ciphertext exists.
pub fn verify_master_password(
    store: &dyn DocumentStore,
    password: &str,
) -> Result<(), VaultError> {
    let Some((record, _)) = load_local_user(store)? else {
        return Err(VaultError::NotFound(LOCAL_USER_ID.to_owned()));
    };
    let Some(verification) = &record.verification else {
        return Err(VaultError::NotFound("no master password is set".into()));
    };

    let salt = kdf::salt_from_timestamp(&record.created_at, kdf::DEFAULT_SALT_LEN);
    let wrapping_key = kdf::derive_wrapping_key(password.as_bytes(), &salt)?;

    match codec::decrypt_field(verification, wrapping_key.expose()) {
        Ok(sentinel) if sentinel == VERIFICATION_SENTINEL => Ok(()),
        Ok(_) | Err(CryptoError::Decryption) => Err(VaultError::InvalidCredentials),
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// Id and timestamp helpers
// ---------------------------------------------------------------------------

/// Generate a random v4 UUID string.
pub(crate) fn generate_uuid() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);

    // Set version (4) and variant (RFC 4122).
    bytes[6] = (bytes[6] & 0x0F) | 0x40;
    bytes[8] = (bytes[8] & 0x3F) | 0x80;

    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// Return the current UTC time as an ISO 8601 string
/// (`YYYY-MM-DDTHH:MM:SSZ`), without pulling in a date-time crate.
pub(crate) fn now_iso8601() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format_epoch_secs(secs)
}

/// Format epoch seconds as an ISO 8601 UTC timestamp.
///
/// Civil calendar computation adapted from Howard Hinnant's
/// `civil_from_days`; valid for years 1970–9999.
#[allow(clippy::arithmetic_side_effects)] // bounded calendar arithmetic
fn format_epoch_secs(epoch_secs: u64) -> String {
    let days = epoch_secs / 86_400;
    let rem = epoch_secs % 86_400;
    let (hour, minute, second) = (rem / 3600, (rem % 3600) / 60, rem % 60);

    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z % 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + u64::from(month <= 2);

    format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}Z")
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
