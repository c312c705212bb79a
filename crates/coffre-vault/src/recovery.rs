//! Recovery share generation and phrase-based unlock.
//!
//! The material that gets split is the **wrapping key** — the
//! password-derived key protecting the data key — not the data key
//! itself. Both produced shares are required to reconstruct it (a
//! (2,2)-threshold split; there are no spare shares). Each share is
//! rendered as a 24-word phrase the user writes down; nothing about the
//! shares is ever persisted.
//!
//! Recovery bypasses password derivation entirely: the reconstructed
//! bytes are used directly as the wrapping key to unwrap the stored
//! data key, and a successful unwrap populates the session exactly as a
//! password unlock does — minus the master password, which a recovered
//! session never saw.

use coffre_crypto_core::memory::SecretBytes;
use coffre_crypto_core::{codec, kdf, sharing, wordshare, CryptoError};
use zeroize::Zeroize;

use crate::error::VaultError;
use crate::records::{self, LocalUserRecord, LOCAL_USER_ID};
use crate::session::Session;
use crate::store::DocumentStore;

/// Number of shares produced by a split — all of them are required.
pub const SHARE_COUNT: usize = 2;

/// Words per recovery phrase (1 index byte + 32 key bytes at 11 bits
/// per word).
pub const PHRASE_WORDS: usize = 24;

fn load_local_user(store: &dyn DocumentStore) -> Result<LocalUserRecord, VaultError> {
    let doc = store
        .get(LOCAL_USER_ID)?
        .ok_or_else(|| VaultError::NotFound(LOCAL_USER_ID.to_owned()))?;
    records::from_doc(&doc)
}

/// Generate the recovery phrases for the current session.
///
/// Requires an unlocked session that still holds the master password
/// (i.e. opened by setup or password unlock, not by a previous
/// recovery): the wrapping key is re-derived from it and the record's
/// creation timestamp, then split into [`SHARE_COUNT`] word phrases.
///
/// # Errors
///
/// - [`VaultError::KeyLocked`] if the session is locked or holds no
///   master password.
/// - [`VaultError::NotFound`] if no master password is configured.
pub fn generate_shares(
    store: &dyn DocumentStore,
    session: &Session,
) -> Result<Vec<String>, VaultError> {
    let Some(password) = session.master_password()? else {
        return Err(VaultError::KeyLocked);
    };

    let record = load_local_user(store)?;
    if !record.is_protected() {
        return Err(VaultError::NotFound("no master password is set".into()));
    }

    let salt = kdf::salt_from_timestamp(&record.created_at, kdf::DEFAULT_SALT_LEN);
    let wrapping_key = kdf::derive_wrapping_key(password.expose(), &salt)?;

    let shares = sharing::split(wrapping_key.expose(), SHARE_COUNT)?;
    let mut phrases = Vec::with_capacity(shares.len());
    for share in &shares {
        phrases.push(wordshare::encode_share(share)?);
    }
    Ok(phrases)
}

/// Reconstruct wrapping-key material from recovery phrases.
///
/// # Errors
///
/// Returns [`VaultError::Recovery`] if fewer than [`SHARE_COUNT`]
/// phrases are given, any word is not in the dictionary, two phrases
/// carry the same share index, or the recombined material is not a
/// valid 256-bit key.
pub fn reconstruct(phrases: &[String]) -> Result<SecretBytes<32>, VaultError> {
    if phrases.len() < SHARE_COUNT {
        return Err(VaultError::Recovery(format!(
            "{} shares required, got {}",
            SHARE_COUNT,
            phrases.len()
        )));
    }

    let mut shares = Vec::with_capacity(phrases.len());
    for phrase in phrases {
        let share = wordshare::decode_share(phrase)
            .map_err(|e| VaultError::Recovery(e.to_string()))?;
        shares.push(share);
    }

    let mut material =
        sharing::combine(&shares).map_err(|e| VaultError::Recovery(e.to_string()))?;
    let key = SecretBytes::<32>::from_slice(&material)
        .map_err(|_| VaultError::Recovery("reconstructed material is not a valid key".into()));
    material.zeroize();
    key
}

/// Recover access with recovery phrases, bypassing the password.
///
/// The reconstructed bytes are used directly as the wrapping key to
/// unwrap the stored data key. Wrong or mismatched shares surface as
/// `Ok(false)` — indistinguishable from a wrong password by design.
/// Success populates the session (without a master password) and
/// returns `Ok(true)`.
///
/// # Errors
///
/// - [`VaultError::Recovery`] for malformed phrases (see
///   [`reconstruct`]).
/// - [`VaultError::NotFound`] if no master password is configured.
pub fn recover_with_shares(
    store: &dyn DocumentStore,
    session: &Session,
    phrases: &[String],
) -> Result<bool, VaultError> {
    let candidate = reconstruct(phrases)?;

    let record = load_local_user(store)?;
    let Some(wrapped) = &record.wrapped_data_key else {
        return Err(VaultError::NotFound("no master password is set".into()));
    };

    match codec::open(wrapped, candidate.expose()) {
        Ok(mut raw) => {
            let key = SecretBytes::from_slice(&raw)?;
            raw.zeroize();
            session.unlock_with(key, None);
            Ok(true)
        }
        Err(CryptoError::Decryption) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
