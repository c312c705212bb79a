//! `coffre-vault` — Vault business logic for COFFRE.
//!
//! Owns the data-encryption-key lifecycle (first-run unwrapped key,
//! wrap-on-password-set, unlock, rotation with bulk recryption), secret
//! CRUD with transparent password-field encryption, word-phrase
//! recovery, and the lock/unlock session state machine. Persistence
//! goes through the narrow [`store::DocumentStore`] contract.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod store;

pub mod records;

pub mod session;

pub mod lifecycle;

pub mod secrets;

pub mod recovery;

pub mod api;

pub use api::{SecretVault, ServiceResponse};
pub use error::VaultError;
pub use lifecycle::{
    get_hint, get_or_create_data_key, is_protected, lock, set_master_password, unlock,
    verify_master_password, MIN_MASTER_PASSWORD_LEN,
};
pub use records::{LocalUserRecord, SecretRecord, LOCAL_USER_ID, SECRET_PREFIX};
pub use recovery::{
    generate_shares, reconstruct, recover_with_shares, PHRASE_WORDS, SHARE_COUNT,
};
pub use secrets::{
    create_secret, delete_secret, get_secret, list_secrets, recrypt_all, update_secret,
    NewSecret, RecryptReport, Secret, SecretPatch,
};
pub use session::{Session, SessionConfig, DEFAULT_IDLE_TIMEOUT};
pub use store::{DocumentStore, MemoryStore, RawDocument, SqliteStore, StoreError};
