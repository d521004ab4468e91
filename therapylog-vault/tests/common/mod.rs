//! Shared test helpers for vault tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use therapylog_vault::{Client, Session, Vault, VaultConfig};

pub const PASSWORD: &str = "correcthorse123";

/// An on-disk vault in a temp dir. Keep the `TempDir` alive for the test.
pub async fn disk_vault() -> (Vault, TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.db");
    let vault = Vault::open(VaultConfig::for_tests().with_db_path(&path))
        .await
        .unwrap();
    (vault, dir, path)
}

pub fn memory_vault() -> Vault {
    Vault::open_in_memory(VaultConfig::for_tests()).unwrap()
}

pub fn client(id: &str, name: &str) -> Client {
    Client::new(id, name)
}

pub fn session(client_id: &str, seq: u32) -> Session {
    Session::scheduled(client_id, format!("{client_id}-S{seq:02}"), "2024-01-02")
}

/// Sets up with [`PASSWORD`] and stores one client with two sessions.
pub async fn seed(vault: &Vault) -> (Client, Vec<i64>) {
    vault.setup(PASSWORD).await.unwrap();
    let c = client("20240101-01", "A");
    vault.save_client(&c).await.unwrap();
    let mut ids = Vec::new();
    for seq in 1..=2 {
        ids.push(vault.save_session(&session(&c.client_id, seq)).await.unwrap());
    }
    (c, ids)
}

/// Raw contents of every table, read through a separate connection.
#[derive(Debug, PartialEq, Eq)]
pub struct RawSnapshot {
    pub credential: Vec<(Vec<u8>, String, u32)>,
    pub clients: Vec<(String, Vec<u8>, Vec<u8>)>,
    pub sessions: Vec<(i64, Vec<u8>, Vec<u8>)>,
}

pub fn snapshot(path: &Path) -> RawSnapshot {
    let conn = rusqlite::Connection::open(path).unwrap();
    let credential = conn
        .prepare("SELECT salt, verifier, kdf_iterations FROM credential")
        .unwrap()
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let clients = conn
        .prepare("SELECT client_id, nonce, ciphertext FROM clients ORDER BY client_id")
        .unwrap()
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let sessions = conn
        .prepare("SELECT id, nonce, ciphertext FROM sessions ORDER BY id")
        .unwrap()
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    RawSnapshot {
        credential,
        clients,
        sessions,
    }
}

/// Makes every session insert after the first one fail, so a bulk
/// replacement aborts partway through its transaction.
pub fn fail_second_session_insert(path: &Path) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER fail_bulk_insert BEFORE INSERT ON sessions
         WHEN (SELECT COUNT(*) FROM sessions) >= 1
         BEGIN
             SELECT RAISE(ABORT, 'injected write failure');
         END;",
    )
    .unwrap();
}
