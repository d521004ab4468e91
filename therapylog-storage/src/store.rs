//! SQLite-backed encrypted collections.
//!
//! Only keys and envelopes are written; the store never sees plaintext and
//! never holds a key beyond the duration of a `load_and_decrypt_all` call.

use crate::codec::{open_client, open_session, StoredItem};
use crate::error::{StorageError, StorageResult};
use crate::schema;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use therapylog_crypto::{Credential, DerivedKey, Envelope, Salt, Verifier};
use therapylog_types::{Client, Session};

/// Persistent store for the client and session collections plus the
/// credential record.
#[derive(Clone)]
pub struct CollectionStore {
    conn: Arc<Mutex<Connection>>,
}

impl CollectionStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        schema::configure(&conn, true)?;
        schema::migrate(&conn)?;
        tracing::debug!(path = %path.display(), "opened record store");
        Ok(Self::from_connection(conn))
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::configure(&conn, false)?;
        schema::migrate(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    // A poisoned mutex means a panic mid-call; SQLite has already rolled back
    // any open transaction, so the connection is still usable.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Credential ───────────────────────────────────────────────

    pub fn load_credential(&self) -> StorageResult<Option<Credential>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT salt, verifier, kdf_iterations FROM credential WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u32>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((salt, verifier, kdf_iterations)) = row else {
            return Ok(None);
        };
        let salt = Salt::from_slice(&salt)
            .map_err(|e| StorageError::InvalidData(format!("stored credential: {e}")))?;
        Ok(Some(Credential {
            salt,
            verifier: Verifier::new(verifier),
            kdf_iterations,
        }))
    }

    pub fn save_credential(&self, credential: &Credential) -> StorageResult<()> {
        write_credential(&self.conn(), credential)
    }

    pub fn has_credential(&self) -> StorageResult<bool> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM credential", [], |row| row.get(0))?;
        Ok(count > 0)
    }

    // ── Clients ──────────────────────────────────────────────────

    /// Inserts or replaces the client stored under `client_id`.
    pub fn put_client(&self, client_id: &str, envelope: &Envelope) -> StorageResult<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO clients (client_id, nonce, ciphertext) VALUES (?1, ?2, ?3)",
            params![client_id, &envelope.nonce[..], &envelope.ciphertext],
        )?;
        Ok(())
    }

    pub fn get_client(&self, client_id: &str) -> StorageResult<Option<StoredItem<String>>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT client_id, nonce, ciphertext FROM clients WHERE client_id = ?1",
                params![client_id],
                raw_row::<String>,
            )
            .optional()?;
        row.map(into_item).transpose()
    }

    /// Returns whether a row was removed.
    pub fn delete_client(&self, client_id: &str) -> StorageResult<bool> {
        let removed = self
            .conn()
            .execute("DELETE FROM clients WHERE client_id = ?1", params![client_id])?;
        Ok(removed > 0)
    }

    pub fn list_clients(&self) -> StorageResult<Vec<StoredItem<String>>> {
        list(
            &self.conn(),
            "SELECT client_id, nonce, ciphertext FROM clients ORDER BY client_id",
        )
    }

    // ── Sessions ─────────────────────────────────────────────────

    /// Stores a session. Without an id the store assigns the next one; with
    /// an id the row is inserted or replaced. Returns the id used.
    pub fn put_session(&self, id: Option<i64>, envelope: &Envelope) -> StorageResult<i64> {
        let conn = self.conn();
        match id {
            Some(id) => {
                conn.execute(
                    "INSERT OR REPLACE INTO sessions (id, nonce, ciphertext) VALUES (?1, ?2, ?3)",
                    params![id, &envelope.nonce[..], &envelope.ciphertext],
                )?;
                Ok(id)
            }
            None => {
                conn.execute(
                    "INSERT INTO sessions (nonce, ciphertext) VALUES (?1, ?2)",
                    params![&envelope.nonce[..], &envelope.ciphertext],
                )?;
                Ok(conn.last_insert_rowid())
            }
        }
    }

    pub fn get_session(&self, id: i64) -> StorageResult<Option<StoredItem<i64>>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT id, nonce, ciphertext FROM sessions WHERE id = ?1",
                params![id],
                raw_row::<i64>,
            )
            .optional()?;
        row.map(into_item).transpose()
    }

    pub fn delete_session(&self, id: i64) -> StorageResult<bool> {
        let removed = self
            .conn()
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    pub fn list_sessions(&self) -> StorageResult<Vec<StoredItem<i64>>> {
        list(
            &self.conn(),
            "SELECT id, nonce, ciphertext FROM sessions ORDER BY id",
        )
    }

    /// Removes a client and the given sessions in one transaction.
    ///
    /// Session ownership lives inside the sealed payload, so the caller
    /// decides which session ids belong to the client.
    pub fn delete_client_cascade(&self, client_id: &str, session_ids: &[i64]) -> StorageResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM clients WHERE client_id = ?1", params![client_id])?;
        {
            let mut stmt = tx.prepare("DELETE FROM sessions WHERE id = ?1")?;
            for id in session_ids {
                stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    // ── Bulk operations ──────────────────────────────────────────

    /// Atomically swaps the contents of both collections (and optionally the
    /// credential). On any error nothing is changed.
    pub fn replace_all(
        &self,
        clients: &[StoredItem<String>],
        sessions: &[StoredItem<i64>],
        credential: Option<&Credential>,
    ) -> StorageResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM clients", [])?;
        tx.execute("DELETE FROM sessions", [])?;
        insert_all(&tx, clients, sessions)?;
        if let Some(credential) = credential {
            write_credential(&tx, credential)?;
        }
        tx.commit()?;
        tracing::info!(
            clients = clients.len(),
            sessions = sessions.len(),
            credential = credential.is_some(),
            "replaced record collections"
        );
        Ok(())
    }

    /// Deletes every record and the credential.
    pub fn clear_all(&self) -> StorageResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM clients", [])?;
        tx.execute("DELETE FROM sessions", [])?;
        tx.execute("DELETE FROM credential", [])?;
        tx.commit()?;
        tracing::info!("cleared all stored data");
        Ok(())
    }

    /// Opens every record in both collections. The first record that fails
    /// aborts the whole load and is named in the error.
    pub fn load_and_decrypt_all(&self, key: &DerivedKey) -> StorageResult<(Vec<Client>, Vec<Session>)> {
        let clients = self
            .list_clients()?
            .iter()
            .map(|item| open_client(key, item))
            .collect::<StorageResult<Vec<_>>>()?;
        let sessions = self
            .list_sessions()?
            .iter()
            .map(|item| open_session(key, item))
            .collect::<StorageResult<Vec<_>>>()?;
        tracing::debug!(
            clients = clients.len(),
            sessions = sessions.len(),
            "decrypted record collections"
        );
        Ok((clients, sessions))
    }

    /// Row counts for `(clients, sessions)`.
    pub fn counts(&self) -> StorageResult<(usize, usize)> {
        let conn = self.conn();
        let clients: i64 = conn.query_row("SELECT COUNT(*) FROM clients", [], |row| row.get(0))?;
        let sessions: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok((clients as usize, sessions as usize))
    }
}

impl std::fmt::Debug for CollectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionStore").finish_non_exhaustive()
    }
}

fn write_credential(conn: &Connection, credential: &Credential) -> StorageResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO credential (id, salt, verifier, kdf_iterations) VALUES (1, ?1, ?2, ?3)",
        params![
            &credential.salt.as_bytes()[..],
            credential.verifier.as_str(),
            credential.kdf_iterations,
        ],
    )?;
    Ok(())
}

fn insert_all(
    tx: &Transaction<'_>,
    clients: &[StoredItem<String>],
    sessions: &[StoredItem<i64>],
) -> StorageResult<()> {
    let mut stmt = tx.prepare("INSERT INTO clients (client_id, nonce, ciphertext) VALUES (?1, ?2, ?3)")?;
    for item in clients {
        stmt.execute(params![item.key, &item.envelope.nonce[..], &item.envelope.ciphertext])?;
    }
    let mut stmt = tx.prepare("INSERT INTO sessions (id, nonce, ciphertext) VALUES (?1, ?2, ?3)")?;
    for item in sessions {
        stmt.execute(params![item.key, &item.envelope.nonce[..], &item.envelope.ciphertext])?;
    }
    Ok(())
}

type RawRow<K> = (K, Vec<u8>, Vec<u8>);

fn raw_row<K: rusqlite::types::FromSql>(row: &Row<'_>) -> rusqlite::Result<RawRow<K>> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn into_item<K: std::fmt::Display>((key, nonce, ciphertext): RawRow<K>) -> StorageResult<StoredItem<K>> {
    let envelope = Envelope::from_parts(&nonce, ciphertext)
        .map_err(|e| StorageError::InvalidData(format!("row {key}: {e}")))?;
    Ok(StoredItem::new(key, envelope))
}

fn list<K>(conn: &Connection, sql: &str) -> StorageResult<Vec<StoredItem<K>>>
where
    K: rusqlite::types::FromSql + std::fmt::Display,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], raw_row::<K>)?;
    let mut items = Vec::new();
    for row in rows {
        items.push(into_item(row?)?);
    }
    Ok(items)
}
