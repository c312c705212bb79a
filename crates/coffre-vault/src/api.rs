//! Uniform-result facade for the UI/API layer.
//!
//! Every method returns a [`ServiceResponse`] — the one result shape
//! the upward layer consumes — and none of them panic or propagate
//! errors across the boundary. Error messages are sanitized here:
//! internal detail is logged, never returned, and a wrong password is
//! indistinguishable from wrong recovery phrases.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::VaultError;
use crate::lifecycle;
use crate::recovery;
use crate::secrets::{self, NewSecret, Secret, SecretPatch};
use crate::session::{Session, SessionConfig};
use crate::store::{DocumentStore, MemoryStore, SqliteStore, StoreError};

// ---------------------------------------------------------------------------
// ServiceResponse
// ---------------------------------------------------------------------------

/// Uniform success/failure envelope returned by every facade method.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse<T> {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Payload on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Human-readable failure message (sanitized).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ServiceResponse<T> {
    /// Successful response carrying `data`.
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    /// Failed response carrying a user-facing message.
    #[must_use]
    pub const fn fail(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
        }
    }
}

/// Map a [`VaultError`] to a user-facing message, logging the detail.
///
/// Key material, plaintext, and backend detail never cross this line.
fn sanitize(err: &VaultError) -> String {
    error!(error = %err, "vault operation failed");
    match err {
        VaultError::Validation(msg) => msg.clone(),
        VaultError::KeyLocked => "Vault is locked".into(),
        VaultError::Crypto(_) => "Operation failed".into(),
        VaultError::InvalidCredentials => "Invalid master password".into(),
        VaultError::StorageConflict(_) => "The data changed underneath; please retry".into(),
        VaultError::Recovery(_) => "Invalid recovery words".into(),
        VaultError::EncryptionInit(_) => {
            "Failed to set the master password; please retry".into()
        }
        VaultError::NotFound(_) => "Not found".into(),
        VaultError::Storage(_) => "Storage error".into(),
    }
}

fn respond<T>(result: Result<T, VaultError>) -> ServiceResponse<T> {
    match result {
        Ok(data) => ServiceResponse::ok(data),
        Err(err) => ServiceResponse::fail(sanitize(&err)),
    }
}

// ---------------------------------------------------------------------------
// SecretVault
// ---------------------------------------------------------------------------

/// The vault facade: a document store plus the caller-owned session.
pub struct SecretVault {
    store: Arc<dyn DocumentStore>,
    session: Session,
}

impl std::fmt::Debug for SecretVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretVault({:?})", self.session)
    }
}

impl SecretVault {
    /// Build a vault over an existing store.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, config: SessionConfig) -> Self {
        Self {
            store,
            session: Session::new(config),
        }
    }

    /// Ephemeral vault over an in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), SessionConfig::default())
    }

    /// Vault over a local `SQLite` file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database cannot be opened.
    pub fn open(path: &Path, config: SessionConfig) -> Result<Self, StoreError> {
        Ok(Self::new(Arc::new(SqliteStore::open(path)?), config))
    }

    /// The underlying session (for host-driven lock timers).
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Record qualifying user activity, deferring the idle lock.
    pub fn touch(&self) {
        self.session.touch();
    }

    // --- Secrets -----------------------------------------------------------

    /// Create a secret.
    pub fn create_secret(&self, secret: NewSecret) -> ServiceResponse<Secret> {
        respond(secrets::create_secret(self.store.as_ref(), &self.session, secret))
    }

    /// List all secrets, newest first.
    pub fn list_secrets(&self) -> ServiceResponse<Vec<Secret>> {
        respond(secrets::list_secrets(self.store.as_ref(), &self.session))
    }

    /// Fetch one secret by id.
    pub fn get_secret(&self, id: &str) -> ServiceResponse<Secret> {
        respond(secrets::get_secret(self.store.as_ref(), &self.session, id))
    }

    /// Apply a partial update to a secret.
    pub fn update_secret(&self, id: &str, patch: &SecretPatch) -> ServiceResponse<Secret> {
        respond(secrets::update_secret(
            self.store.as_ref(),
            &self.session,
            id,
            patch,
        ))
    }

    /// Delete a secret.
    pub fn delete_secret(&self, id: &str) -> ServiceResponse<()> {
        respond(secrets::delete_secret(self.store.as_ref(), id))
    }

    // --- Key lifecycle -----------------------------------------------------

    /// Set (or change) the master password, rotating the data key.
    pub fn set_master_password(
        &self,
        password: &str,
        hint: Option<&str>,
    ) -> ServiceResponse<()> {
        respond(lifecycle::set_master_password(
            self.store.as_ref(),
            &self.session,
            password,
            hint,
        ))
    }

    /// Attempt an unlock. A wrong password is a *failed* response with
    /// a generic message, not an error distinct from other bad
    /// credentials.
    pub fn unlock(&self, password: &str) -> ServiceResponse<bool> {
        match lifecycle::unlock(self.store.as_ref(), &self.session, password) {
            Ok(true) => ServiceResponse::ok(true),
            Ok(false) => ServiceResponse::fail("Invalid master password".into()),
            Err(err) => ServiceResponse::fail(sanitize(&err)),
        }
    }

    /// Lock the session, clearing cached key material.
    pub fn lock(&self) -> ServiceResponse<()> {
        lifecycle::lock(&self.session);
        ServiceResponse::ok(())
    }

    /// Fetch the stored password hint.
    pub fn get_hint(&self) -> ServiceResponse<Option<String>> {
        respond(lifecycle::get_hint(self.store.as_ref()))
    }

    // --- Recovery ----------------------------------------------------------

    /// Generate the recovery word phrases for the current session.
    pub fn generate_recovery_phrases(&self) -> ServiceResponse<Vec<String>> {
        respond(recovery::generate_shares(self.store.as_ref(), &self.session))
    }

    /// Attempt recovery with word phrases. Mismatched (but well-formed)
    /// shares fail with the same generic message as malformed ones.
    pub fn recover_with_phrases(&self, phrases: &[String]) -> ServiceResponse<bool> {
        match recovery::recover_with_shares(self.store.as_ref(), &self.session, phrases) {
            Ok(true) => ServiceResponse::ok(true),
            Ok(false) => ServiceResponse::fail("Invalid recovery words".into()),
            Err(err) => ServiceResponse::fail(sanitize(&err)),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
