#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! End-to-end lifecycle tests — fresh install, password set, rotation,
//! unlock, lock semantics.

use std::sync::Arc;

use coffre_crypto_core::codec;
use coffre_vault::error::VaultError;
use coffre_vault::records::{self, SecretRecord, LOCAL_USER_ID, SECRET_PREFIX};
use coffre_vault::secrets::{self, NewSecret};
use coffre_vault::session::{Session, SessionConfig};
use coffre_vault::store::{DocumentStore, MemoryStore};
use coffre_vault::{lifecycle, LocalUserRecord};

const PASSWORD: &str = "Correct1!";

fn bank_secret() -> NewSecret {
    NewSecret {
        name: "Bank".into(),
        username: "alice".into(),
        password: "p@ss".into(),
        notes: None,
    }
}

fn load_user(store: &dyn DocumentStore) -> LocalUserRecord {
    let doc = store
        .get(LOCAL_USER_ID)
        .expect("get should succeed")
        .expect("record should exist");
    records::from_doc(&doc).expect("well-formed record")
}

/// The full first-run scenario: create a secret before any master
/// password exists, set the password (mandatory rotation), then verify
/// unlock behavior.
#[test]
fn fresh_install_to_protected_vault() {
    let store = MemoryStore::new();
    let session = Session::default();

    // A secret can exist before onboarding completes.
    let created = secrets::create_secret(&store, &session, bank_secret())
        .expect("create should succeed");
    assert_eq!(created.name, "Bank");

    let record = load_user(&store);
    assert!(record.data_key.is_some(), "key starts unwrapped");
    assert!(!record.onboarded);

    lifecycle::set_master_password(&store, &session, PASSWORD, None)
        .expect("set should succeed");

    // Secrets survive the rotation.
    let listed = secrets::list_secrets(&store, &session).expect("list should succeed");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Bank");
    assert_eq!(listed[0].username, "alice");
    assert_eq!(listed[0].password, "p@ss");

    session.lock();
    assert!(!lifecycle::unlock(&store, &session, "WrongPassword").expect("no error"));
    assert!(lifecycle::unlock(&store, &session, PASSWORD).expect("no error"));
}

/// Exactly one of {dataKey, wrappedDataKey} is present at every stage.
#[test]
fn key_storage_forms_are_mutually_exclusive() {
    let store = MemoryStore::new();
    let session = Session::default();

    lifecycle::get_or_create_data_key(&store, &session).expect("mint key");
    let before = load_user(&store);
    assert!(before.data_key.is_some() && before.wrapped_data_key.is_none());

    lifecycle::set_master_password(&store, &session, PASSWORD, None)
        .expect("set should succeed");
    let after = load_user(&store);
    assert!(after.data_key.is_none() && after.wrapped_data_key.is_some());
}

/// Rotation property: after a password set, every pre-existing secret
/// decrypts under the new key and no longer under the old one.
#[test]
fn rotation_reencrypts_under_the_new_key_only() {
    let store = MemoryStore::new();
    let session = Session::default();
    for i in 0..3 {
        let secret = NewSecret {
            name: format!("s{i}"),
            username: "u".into(),
            password: format!("pw{i}"),
            notes: None,
        };
        secrets::create_secret(&store, &session, secret).expect("create should succeed");
    }
    let old_key = session.data_key().expect("unlocked");

    lifecycle::set_master_password(&store, &session, PASSWORD, None)
        .expect("set should succeed");
    let new_key = session.data_key().expect("unlocked");
    assert_ne!(old_key.expose(), new_key.expose());

    for doc in store.query(SECRET_PREFIX).expect("query should succeed") {
        let record: SecretRecord = records::from_doc(&doc).expect("well-formed record");
        assert!(codec::decrypt_field(&record.password, new_key.expose()).is_ok());
        assert!(
            codec::decrypt_field(&record.password, old_key.expose()).is_err(),
            "old key must no longer decrypt"
        );
    }
}

/// Every password set rotates — even back-to-back sets with the same
/// password produce a fresh data key.
#[test]
fn rotation_is_mandatory_on_every_set() {
    let store = MemoryStore::new();
    let session = Session::default();
    lifecycle::set_master_password(&store, &session, PASSWORD, None)
        .expect("set should succeed");
    let first = session.data_key().expect("unlocked");
    lifecycle::set_master_password(&store, &session, PASSWORD, None)
        .expect("set should succeed");
    let second = session.data_key().expect("unlocked");
    assert_ne!(first.expose(), second.expose());
}

/// Lock clears state: subsequent secret operations fail with
/// `KeyLocked` until unlock succeeds again.
#[test]
fn lock_gates_every_secret_operation() {
    let store = MemoryStore::new();
    let session = Session::default();
    let created = secrets::create_secret(&store, &session, bank_secret())
        .expect("create should succeed");
    lifecycle::set_master_password(&store, &session, PASSWORD, None)
        .expect("set should succeed");

    lifecycle::lock(&session);

    assert!(matches!(
        secrets::create_secret(&store, &session, bank_secret()),
        Err(VaultError::KeyLocked)
    ));
    assert!(matches!(
        secrets::list_secrets(&store, &session),
        Err(VaultError::KeyLocked)
    ));
    assert!(matches!(
        secrets::get_secret(&store, &session, &created.id),
        Err(VaultError::KeyLocked)
    ));

    assert!(lifecycle::unlock(&store, &session, PASSWORD).expect("no error"));
    assert_eq!(
        secrets::list_secrets(&store, &session)
            .expect("list should succeed")
            .len(),
        1
    );
}

/// The idle timeout behaves like lock(): the next access finds the
/// session locked and the key gone.
#[test]
fn idle_timeout_locks_the_session() {
    let store = MemoryStore::new();
    let session = Session::new(SessionConfig {
        idle_timeout: std::time::Duration::from_millis(1),
    });
    lifecycle::set_master_password(&store, &session, PASSWORD, None)
        .expect("set should succeed");

    std::thread::sleep(std::time::Duration::from_millis(10));

    assert!(matches!(
        secrets::list_secrets(&store, &session),
        Err(VaultError::KeyLocked)
    ));
    assert!(lifecycle::unlock(&store, &session, PASSWORD).expect("no error"));
}

/// The salt is recomputed from createdAt, so the timestamp must never
/// change across password operations.
#[test]
fn created_at_is_stable_across_password_changes() {
    let store = MemoryStore::new();
    let session = Session::default();
    lifecycle::get_or_create_data_key(&store, &session).expect("mint key");
    let created_at = load_user(&store).created_at;

    lifecycle::set_master_password(&store, &session, PASSWORD, None)
        .expect("set should succeed");
    lifecycle::set_master_password(&store, &session, "Another2!", None)
        .expect("change should succeed");

    assert_eq!(load_user(&store).created_at, created_at);
}

/// The store is shared between concurrent vault instances; the second
/// writer's conflict is absorbed by the automatic retry.
#[test]
fn user_record_conflicts_are_retried() {
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());

    // Writer A initializes the record.
    let session_a = Session::default();
    lifecycle::get_or_create_data_key(store.as_ref(), &session_a).expect("mint key");

    // Writer B holds a stale view but still succeeds thanks to the
    // read-retry on conflict.
    let session_b = Session::default();
    lifecycle::set_master_password(store.as_ref(), &session_b, PASSWORD, Some("hint"))
        .expect("set should succeed");

    assert!(lifecycle::is_protected(store.as_ref()).expect("load should succeed"));
}
