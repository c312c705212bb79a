//! Document store contract and implementations.
//!
//! The crypto core consumes its persistence layer through the narrow
//! [`DocumentStore`] trait: get/put/query/remove over JSON documents
//! with optimistic revision-conflict detection (a stale revision on
//! `put` yields [`StoreError::Conflict`]).
//!
//! Two implementations are provided:
//! - [`SqliteStore`] — production store over a local `SQLite` file
//! - [`MemoryStore`] — in-memory store for tests and ephemeral use
//!
//! Revision tokens have the shape `"<generation>-<suffix>"`; only the
//! store itself creates them.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use rand::rngs::OsRng;
use rand::RngCore;
use rusqlite::{params, Connection};
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced by a document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No document with the requested id.
    #[error("document not found: {0}")]
    NotFound(String),

    /// The supplied revision does not match the stored revision —
    /// another writer changed the document.
    #[error("revision conflict on {0}")]
    Conflict(String),

    /// Backend failure (I/O, corruption, serialization).
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// A raw store document: id, revision token, and JSON body.
///
/// The body never contains the id or revision; those live beside it so
/// typed records can serialize cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    /// Document id (e.g. `"local_user"`, `"secret:<uuid>"`).
    pub id: String,
    /// Revision token. `None` on first write; must match the stored
    /// revision on subsequent writes.
    pub rev: Option<String>,
    /// JSON body.
    pub body: Value,
}

impl RawDocument {
    /// Build a first-write document (no revision yet).
    #[must_use]
    pub const fn new(id: String, body: Value) -> Self {
        Self {
            id,
            rev: None,
            body,
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Narrow CRUD contract the vault requires from its persistence layer.
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by id, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on backend failure.
    fn get(&self, id: &str) -> Result<Option<RawDocument>, StoreError>;

    /// Write a document, returning the new revision token.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the document exists and
    /// `doc.rev` does not match the stored revision (including a `None`
    /// rev against an existing document).
    fn put(&self, doc: &RawDocument) -> Result<String, StoreError>;

    /// Fetch all documents whose id starts with `prefix`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on backend failure.
    fn query(&self, prefix: &str) -> Result<Vec<RawDocument>, StoreError>;

    /// Remove a document. The revision must match the stored one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if absent,
    /// [`StoreError::Conflict`] on revision mismatch.
    fn remove(&self, id: &str, rev: &str) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Revision tokens
// ---------------------------------------------------------------------------

/// Parse the generation number out of a revision token.
fn rev_generation(rev: &str) -> u64 {
    rev.split_once('-')
        .and_then(|(n, _)| n.parse().ok())
        .unwrap_or(0)
}

/// Build the successor revision for a document.
fn next_rev(current: Option<&str>) -> String {
    let generation = current
        .map(rev_generation)
        .unwrap_or(0)
        .saturating_add(1);
    let mut suffix = [0u8; 4];
    OsRng.fill_bytes(&mut suffix);
    format!(
        "{generation}-{:02x}{:02x}{:02x}{:02x}",
        suffix[0], suffix[1], suffix[2], suffix[3]
    )
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory document store with the same revision discipline as the
/// production backend. Used by tests and ephemeral vaults.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, (String, Value)>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (String, Value)>> {
        self.docs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryStore({} docs)", self.lock().len())
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<RawDocument>, StoreError> {
        Ok(self.lock().get(id).map(|(rev, body)| RawDocument {
            id: id.to_owned(),
            rev: Some(rev.clone()),
            body: body.clone(),
        }))
    }

    fn put(&self, doc: &RawDocument) -> Result<String, StoreError> {
        let mut docs = self.lock();
        let current = docs.get(&doc.id).map(|(rev, _)| rev.as_str());
        if current != doc.rev.as_deref() {
            return Err(StoreError::Conflict(doc.id.clone()));
        }
        let rev = next_rev(current);
        docs.insert(doc.id.clone(), (rev.clone(), doc.body.clone()));
        Ok(rev)
    }

    fn query(&self, prefix: &str) -> Result<Vec<RawDocument>, StoreError> {
        let docs = self.lock();
        let mut matches: Vec<RawDocument> = docs
            .iter()
            .filter(|(id, _)| id.starts_with(prefix))
            .map(|(id, (rev, body))| RawDocument {
                id: id.clone(),
                rev: Some(rev.clone()),
                body: body.clone(),
            })
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matches)
    }

    fn remove(&self, id: &str, rev: &str) -> Result<(), StoreError> {
        let mut docs = self.lock();
        match docs.get(id) {
            None => Err(StoreError::NotFound(id.to_owned())),
            Some((current, _)) if current != rev => Err(StoreError::Conflict(id.to_owned())),
            Some(_) => {
                docs.remove(id);
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

/// Forward-only SQL migrations, embedded at compile time.
/// Index 0 → version 1, index 1 → version 2, etc.
const MIGRATIONS: &[&str] = &[include_str!("../migrations/001_documents.sql")];

/// Document store backed by a local `SQLite` file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SqliteStore(***)")
    }
}

impl SqliteStore {
    /// Open (or create) the store database at `path` and run any
    /// pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the database cannot be opened
    /// or a migration fails.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (mainly for tests of the SQL layer).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if setup fails.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Apply embedded migrations beyond the database's `user_version`.
fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    let version: usize =
        conn.query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))? as usize;

    for (i, migration) in MIGRATIONS.iter().enumerate().skip(version) {
        conn.execute_batch(migration)?;
        let new_version = i.saturating_add(1);
        // PRAGMA does not support bound parameters.
        conn.execute_batch(&format!("PRAGMA user_version = {new_version}"))?;
    }
    Ok(())
}

fn row_to_doc(id: String, rev: String, body: &str) -> Result<RawDocument, StoreError> {
    let body: Value = serde_json::from_str(body)
        .map_err(|e| StoreError::Backend(format!("malformed document body: {e}")))?;
    Ok(RawDocument {
        id,
        rev: Some(rev),
        body,
    })
}

impl DocumentStore for SqliteStore {
    fn get(&self, id: &str) -> Result<Option<RawDocument>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT rev, body FROM documents WHERE id = ?1")?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => {
                let rev: String = row.get(0)?;
                let body: String = row.get(1)?;
                Ok(Some(row_to_doc(id.to_owned(), rev, &body)?))
            }
            None => Ok(None),
        }
    }

    fn put(&self, doc: &RawDocument) -> Result<String, StoreError> {
        let mut conn = self.lock();
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let current: Option<String> = tx
            .query_row(
                "SELECT rev FROM documents WHERE id = ?1",
                params![doc.id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(StoreError::from(other)),
            })?;

        if current.as_deref() != doc.rev.as_deref() {
            return Err(StoreError::Conflict(doc.id.clone()));
        }

        let rev = next_rev(current.as_deref());
        let body = serde_json::to_string(&doc.body)
            .map_err(|e| StoreError::Backend(format!("serialize document body: {e}")))?;
        tx.execute(
            "INSERT INTO documents (id, rev, body) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET rev = excluded.rev, body = excluded.body",
            params![doc.id, rev, body],
        )?;
        tx.commit()?;
        Ok(rev)
    }

    fn query(&self, prefix: &str) -> Result<Vec<RawDocument>, StoreError> {
        let conn = self.lock();
        // Prefix range scan: ids are compared lexicographically, and
        // U+FFFF sorts after every character that appears in doc ids.
        let upper = format!("{prefix}\u{ffff}");
        let mut stmt = conn.prepare(
            "SELECT id, rev, body FROM documents WHERE id >= ?1 AND id < ?2 ORDER BY id",
        )?;
        let mut rows = stmt.query(params![prefix, upper])?;
        let mut docs = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let rev: String = row.get(1)?;
            let body: String = row.get(2)?;
            docs.push(row_to_doc(id, rev, &body)?);
        }
        Ok(docs)
    }

    fn remove(&self, id: &str, rev: &str) -> Result<(), StoreError> {
        let mut conn = self.lock();
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let current: Option<String> = tx
            .query_row(
                "SELECT rev FROM documents WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(StoreError::from(other)),
            })?;

        match current {
            None => Err(StoreError::NotFound(id.to_owned())),
            Some(ref stored) if stored != rev => Err(StoreError::Conflict(id.to_owned())),
            Some(_) => {
                tx.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
                tx.commit()?;
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, value: Value) -> RawDocument {
        RawDocument::new(id.to_owned(), value)
    }

    fn exercise_store(store: &dyn DocumentStore) {
        // Missing doc reads as None.
        assert!(store.get("absent").expect("get should succeed").is_none());

        // First write needs no rev.
        let rev1 = store
            .put(&doc("secret:a", json!({"name": "A"})))
            .expect("first put should succeed");
        assert!(rev1.starts_with("1-"));

        // Stale rev (None against existing) conflicts.
        let stale = store.put(&doc("secret:a", json!({"name": "A2"})));
        assert!(matches!(stale, Err(StoreError::Conflict(_))));

        // Fresh rev succeeds and bumps the generation.
        let mut update = doc("secret:a", json!({"name": "A2"}));
        update.rev = Some(rev1);
        let rev2 = store.put(&update).expect("update should succeed");
        assert!(rev2.starts_with("2-"));

        // Prefix query sees only matching ids.
        store
            .put(&doc("secret:b", json!({"name": "B"})))
            .expect("put should succeed");
        store
            .put(&doc("local_user", json!({"createdAt": "t"})))
            .expect("put should succeed");
        let secrets = store.query("secret:").expect("query should succeed");
        assert_eq!(secrets.len(), 2);
        assert!(secrets.iter().all(|d| d.id.starts_with("secret:")));

        // Remove enforces the revision.
        assert!(matches!(
            store.remove("secret:a", "1-deadbeef"),
            Err(StoreError::Conflict(_))
        ));
        store
            .remove("secret:a", &rev2)
            .expect("remove should succeed");
        assert!(store.get("secret:a").expect("get should succeed").is_none());
        assert!(matches!(
            store.remove("secret:a", &rev2),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn memory_store_contract() {
        exercise_store(&MemoryStore::new());
    }

    #[test]
    fn sqlite_store_contract() {
        let store = SqliteStore::open_in_memory().expect("open should succeed");
        exercise_store(&store);
    }

    #[test]
    fn revisions_carry_random_suffixes() {
        let store = MemoryStore::new();
        let rev_a = store
            .put(&doc("a", json!({})))
            .expect("put should succeed");
        let rev_b = store
            .put(&doc("b", json!({})))
            .expect("put should succeed");
        assert_ne!(rev_a, rev_b);
    }

    #[test]
    fn query_returns_sorted_ids() {
        let store = MemoryStore::new();
        for id in ["secret:c", "secret:a", "secret:b"] {
            store
                .put(&doc(id, json!({})))
                .expect("put should succeed");
        }
        let docs = store.query("secret:").expect("query should succeed");
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["secret:a", "secret:b", "secret:c"]);
    }
}
