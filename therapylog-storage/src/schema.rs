//! Table layout and connection setup.

use crate::error::{StorageError, StorageResult};
use rusqlite::Connection;

/// Current on-disk schema, tracked in `PRAGMA user_version`.
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA_V1: &str = "
    CREATE TABLE IF NOT EXISTS credential (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        salt BLOB NOT NULL,
        verifier TEXT NOT NULL,
        kdf_iterations INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS clients (
        client_id TEXT PRIMARY KEY NOT NULL,
        nonce BLOB NOT NULL,
        ciphertext BLOB NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        nonce BLOB NOT NULL,
        ciphertext BLOB NOT NULL
    );
";

/// Applies connection pragmas. Journal mode is left alone for in-memory
/// databases, which cannot use WAL.
pub(crate) fn configure(conn: &Connection, on_disk: bool) -> StorageResult<()> {
    // journal_mode and secure_delete echo the new value back as a row.
    if on_disk {
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    }
    conn.pragma_update(None, "synchronous", "FULL")?;
    conn.pragma_update_and_check(None, "secure_delete", "ON", |row| row.get::<_, i64>(0))?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(())
}

/// Creates the tables on a fresh database and refuses databases written by a
/// newer schema.
pub(crate) fn migrate(conn: &Connection) -> StorageResult<()> {
    let version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    match version {
        0 => {
            conn.execute_batch(SCHEMA_V1)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            tracing::debug!(version = SCHEMA_VERSION, "initialized record store schema");
            Ok(())
        }
        SCHEMA_VERSION => {
            conn.execute_batch(SCHEMA_V1)?;
            Ok(())
        }
        newer => Err(StorageError::Migration(format!(
            "database schema version {newer} is newer than supported version {SCHEMA_VERSION}"
        ))),
    }
}
