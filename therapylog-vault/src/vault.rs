use crate::config::VaultConfig;
use crate::error::{VaultError, VaultResult};
use crate::idle::{ActivityClock, IdleLock};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use therapylog_crypto::{Credential, DerivedKey, SessionKeyHolder};
use therapylog_storage::{open_client, open_session, seal_client, seal_session, CollectionStore};
use therapylog_types::{Client, Session};
use zeroize::Zeroizing;

/// Where the vault is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultStatus {
    /// No credential stored yet.
    NeedsSetup,
    Locked,
    Unlocked,
}

impl fmt::Display for VaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VaultStatus::NeedsSetup => "needs setup",
            VaultStatus::Locked => "locked",
            VaultStatus::Unlocked => "unlocked",
        })
    }
}

/// A session whose `client_id` matches no stored client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReferentialWarning {
    pub id: i64,
    pub session_id: String,
    pub client_id: String,
}

impl fmt::Display for ReferentialWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "session {} (#{}) references missing client {}",
            self.session_id, self.id, self.client_id
        )
    }
}

/// Every decrypted record, plus any dangling session references.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordSet {
    pub clients: Vec<Client>,
    pub sessions: Vec<Session>,
    pub warnings: Vec<ReferentialWarning>,
}

/// Password-protected record vault.
///
/// Holds the store and the session key slot. Every record operation takes a
/// scoped copy of the active key, so a concurrent lock only affects later
/// calls.
pub struct Vault {
    pub(crate) store: CollectionStore,
    pub(crate) keys: SessionKeyHolder,
    activity: ActivityClock,
    pub(crate) config: VaultConfig,
}

/// Runs blocking store and KDF work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> VaultResult<T>
where
    F: FnOnce() -> VaultResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| VaultError::Storage(format!("background task failed: {e}")))?
}

impl Vault {
    /// Opens (or creates) the vault database named in `config`.
    pub async fn open(config: VaultConfig) -> VaultResult<Self> {
        config.validate()?;
        let path = config.db_path.clone();
        let store = blocking(move || Ok(CollectionStore::open(&path)?)).await?;
        Ok(Self::with_store(store, config))
    }

    /// Opens a vault backed by an in-memory database (for testing).
    pub fn open_in_memory(config: VaultConfig) -> VaultResult<Self> {
        config.validate()?;
        Ok(Self::with_store(CollectionStore::open_in_memory()?, config))
    }

    fn with_store(store: CollectionStore, config: VaultConfig) -> Self {
        Self {
            store,
            keys: SessionKeyHolder::new(),
            activity: ActivityClock::new(),
            config,
        }
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Shared handle to the session key slot.
    pub fn key_holder(&self) -> SessionKeyHolder {
        self.keys.clone()
    }

    pub fn activity(&self) -> ActivityClock {
        self.activity.clone()
    }

    /// Starts the inactivity auto-lock with the configured timeout.
    pub fn spawn_idle_lock(&self) -> IdleLock {
        IdleLock::spawn(self.key_holder(), self.activity(), self.config.idle_timeout())
    }

    // ── Lifecycle ────────────────────────────────────────────────

    pub async fn status(&self) -> VaultResult<VaultStatus> {
        let store = self.store.clone();
        if !blocking(move || Ok(store.has_credential()?)).await? {
            return Ok(VaultStatus::NeedsSetup);
        }
        Ok(if self.keys.is_unlocked() {
            VaultStatus::Unlocked
        } else {
            VaultStatus::Locked
        })
    }

    /// First-time setup. Creates the credential and leaves the vault unlocked.
    pub async fn setup(&self, password: &str) -> VaultResult<Credential> {
        self.check_password_len(password)?;
        let password = Zeroizing::new(password.to_owned());
        let store = self.store.clone();
        let params = self.config.kdf_params();

        let (credential, key) = blocking(move || {
            if store.has_credential()? {
                return Err(VaultError::AlreadyInitialized);
            }
            let (credential, key) = Credential::create(&password, &params)?;
            store.save_credential(&credential)?;
            Ok((credential, key))
        })
        .await?;

        self.keys.set(key);
        self.activity.touch();
        tracing::info!(iterations = credential.kdf_iterations, "vault initialized");
        Ok(credential)
    }

    /// Checks `password` against the stored credential and, on success,
    /// installs the derived key. On failure the vault stays locked.
    pub async fn unlock(&self, password: &str) -> VaultResult<()> {
        let password = Zeroizing::new(password.to_owned());
        let store = self.store.clone();
        let key = blocking(move || {
            let credential = store.load_credential()?.ok_or(VaultError::NotInitialized)?;
            credential
                .unlock(&password)
                .ok_or(VaultError::Authentication)
        })
        .await;

        match key {
            Ok(key) => {
                self.keys.set(key);
                self.activity.touch();
                tracing::info!("vault unlocked");
                Ok(())
            }
            Err(e) => {
                self.keys.clear();
                tracing::warn!("unlock failed: {e}");
                Err(e)
            }
        }
    }

    pub fn lock(&self) {
        self.keys.clear();
        tracing::info!("vault locked");
    }

    pub fn is_unlocked(&self) -> bool {
        self.keys.is_unlocked()
    }

    /// Records user activity for the idle timer.
    pub fn touch(&self) {
        self.activity.touch();
    }

    pub(crate) fn active_key(&self) -> VaultResult<DerivedKey> {
        let key = self.keys.get().ok_or(VaultError::Locked)?;
        self.activity.touch();
        Ok(key)
    }

    pub(crate) fn check_password_len(&self, password: &str) -> VaultResult<()> {
        if password.chars().count() < self.config.min_password_len {
            return Err(VaultError::PasswordTooShort {
                min: self.config.min_password_len,
            });
        }
        Ok(())
    }

    // ── Clients ──────────────────────────────────────────────────

    /// Inserts or replaces a client under its `client_id`.
    pub async fn save_client(&self, client: &Client) -> VaultResult<()> {
        if client.client_id.trim().is_empty() {
            return Err(VaultError::Validation("client_id must not be empty".into()));
        }
        let key = self.active_key()?;
        let store = self.store.clone();
        let client = client.clone();
        blocking(move || {
            let envelope = seal_client(&key, &client)?;
            store.put_client(&client.client_id, &envelope)?;
            Ok(())
        })
        .await
    }

    pub async fn get_client(&self, client_id: &str) -> VaultResult<Option<Client>> {
        let key = self.active_key()?;
        let store = self.store.clone();
        let client_id = client_id.to_owned();
        blocking(move || {
            store
                .get_client(&client_id)?
                .map(|item| open_client(&key, &item))
                .transpose()
                .map_err(Into::into)
        })
        .await
    }

    pub async fn list_clients(&self) -> VaultResult<Vec<Client>> {
        let key = self.active_key()?;
        let store = self.store.clone();
        blocking(move || {
            store
                .list_clients()?
                .iter()
                .map(|item| open_client(&key, item).map_err(Into::into))
                .collect()
        })
        .await
    }

    /// Removes only the client row. Returns whether it existed.
    pub async fn delete_client(&self, client_id: &str) -> VaultResult<bool> {
        self.active_key()?;
        let store = self.store.clone();
        let client_id = client_id.to_owned();
        blocking(move || Ok(store.delete_client(&client_id)?)).await
    }

    /// Removes a client and every session that references it in one
    /// transaction. Returns the number of sessions removed.
    pub async fn delete_client_cascade(&self, client_id: &str) -> VaultResult<usize> {
        let key = self.active_key()?;
        let store = self.store.clone();
        let client_id = client_id.to_owned();
        blocking(move || {
            let mut owned = Vec::new();
            for item in store.list_sessions()? {
                if open_session(&key, &item)?.client_id == client_id {
                    owned.push(item.key);
                }
            }
            store.delete_client_cascade(&client_id, &owned)?;
            tracing::info!(client = %client_id, sessions = owned.len(), "deleted client with sessions");
            Ok(owned.len())
        })
        .await
    }

    // ── Sessions ─────────────────────────────────────────────────

    /// Stores a session. A session without an `id` gets a new one; the id
    /// used is returned either way.
    pub async fn save_session(&self, session: &Session) -> VaultResult<i64> {
        let key = self.active_key()?;
        let store = self.store.clone();
        let session = session.clone();
        blocking(move || {
            let envelope = seal_session(&key, &session)?;
            Ok(store.put_session(session.id, &envelope)?)
        })
        .await
    }

    pub async fn get_session(&self, id: i64) -> VaultResult<Option<Session>> {
        let key = self.active_key()?;
        let store = self.store.clone();
        blocking(move || {
            store
                .get_session(id)?
                .map(|item| open_session(&key, &item))
                .transpose()
                .map_err(Into::into)
        })
        .await
    }

    pub async fn list_sessions(&self) -> VaultResult<Vec<Session>> {
        let key = self.active_key()?;
        let store = self.store.clone();
        blocking(move || {
            store
                .list_sessions()?
                .iter()
                .map(|item| open_session(&key, item).map_err(Into::into))
                .collect()
        })
        .await
    }

    pub async fn delete_session(&self, id: i64) -> VaultResult<bool> {
        self.active_key()?;
        let store = self.store.clone();
        blocking(move || Ok(store.delete_session(id)?)).await
    }

    // ── Whole-store operations ───────────────────────────────────

    /// Decrypts every record. Sessions pointing at unknown clients are
    /// reported, not rejected.
    pub async fn load_all(&self) -> VaultResult<RecordSet> {
        let key = self.active_key()?;
        let store = self.store.clone();
        let (clients, sessions) = blocking(move || Ok(store.load_and_decrypt_all(&key)?)).await?;

        let warnings = dangling_references(&clients, &sessions);
        for warning in &warnings {
            tracing::warn!(
                session = warning.id,
                client = %warning.client_id,
                "session references missing client"
            );
        }
        Ok(RecordSet {
            clients,
            sessions,
            warnings,
        })
    }

    /// Deletes all records and the credential, then locks.
    ///
    /// Only an unlocked vault can be cleared.
    pub async fn clear_all_data(&self) -> VaultResult<()> {
        self.active_key()?;
        let store = self.store.clone();
        blocking(move || Ok(store.clear_all()?)).await?;
        self.keys.clear();
        tracing::info!("all data cleared");
        Ok(())
    }
}

impl fmt::Debug for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vault")
            .field("db_path", &self.config.db_path)
            .field("unlocked", &self.keys.is_unlocked())
            .finish()
    }
}

fn dangling_references(clients: &[Client], sessions: &[Session]) -> Vec<ReferentialWarning> {
    let known: HashSet<&str> = clients.iter().map(|c| c.client_id.as_str()).collect();
    sessions
        .iter()
        .filter(|s| !known.contains(s.client_id.as_str()))
        .map(|s| ReferentialWarning {
            id: s.id.unwrap_or_default(),
            session_id: s.session_id.clone(),
            client_id: s.client_id.clone(),
        })
        .collect()
}
