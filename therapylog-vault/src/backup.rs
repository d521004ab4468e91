//! Encrypted backup bundles.
//!
//! A bundle is a single JSON document holding both collections exactly as
//! stored (keys plus base64 envelopes) and the credential needed to open
//! them. It never contains plaintext records or key material.
//!
//! ```json
//! {
//!   "clients":  [{ "key": "20240101-01", "nonce": "...", "ciphertext": "..." }],
//!   "sessions": [{ "key": 1, "nonce": "...", "ciphertext": "..." }],
//!   "meta": {
//!     "salt": "...", "verifier": "...", "kdf_iterations": 200000,
//!     "format_version": 1, "exported_at": "2024-01-01T00:00:00Z"
//!   }
//! }
//! ```

use crate::error::{VaultError, VaultResult};
use crate::vault::{blocking, Vault};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use therapylog_crypto::{Credential, Salt, Verifier, DEFAULT_ITERATIONS, MAX_ITERATIONS};
use therapylog_storage::{seal_client, seal_session, StoredItem};
use therapylog_types::{Client, Session};
use zeroize::Zeroizing;

/// Bundle layout version written by this build.
pub const FORMAT_VERSION: u32 = 1;

fn default_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleMeta {
    pub salt: Salt,
    pub verifier: Verifier,
    #[serde(default = "default_iterations")]
    pub kdf_iterations: u32,
    pub format_version: u32,
    pub exported_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupBundle {
    pub clients: Vec<StoredItem<String>>,
    pub sessions: Vec<StoredItem<i64>>,
    pub meta: BundleMeta,
}

impl BackupBundle {
    /// The credential embedded in the bundle.
    pub fn credential(&self) -> Credential {
        Credential {
            salt: self.meta.salt.clone(),
            verifier: self.meta.verifier.clone(),
            kdf_iterations: self.meta.kdf_iterations,
        }
    }

    /// Structural checks that need no password.
    pub fn validate(&self) -> VaultResult<()> {
        if self.meta.format_version != FORMAT_VERSION {
            return Err(VaultError::UnsupportedFormatVersion(self.meta.format_version));
        }
        if self.meta.verifier.is_empty() {
            return Err(VaultError::Validation("meta.verifier is empty".into()));
        }
        if self.meta.kdf_iterations == 0 {
            return Err(VaultError::Validation("meta.kdf_iterations is zero".into()));
        }
        if self.meta.kdf_iterations > MAX_ITERATIONS {
            return Err(VaultError::Validation(format!(
                "meta.kdf_iterations {} exceeds {MAX_ITERATIONS}",
                self.meta.kdf_iterations
            )));
        }
        let mut client_keys = HashSet::new();
        for item in &self.clients {
            if item.key.is_empty() {
                return Err(VaultError::Validation("client with empty key".into()));
            }
            if !client_keys.insert(item.key.as_str()) {
                return Err(VaultError::Validation(format!(
                    "duplicate client key {}",
                    item.key
                )));
            }
        }
        let mut session_keys = HashSet::new();
        for item in &self.sessions {
            if !session_keys.insert(item.key) {
                return Err(VaultError::Validation(format!(
                    "duplicate session key {}",
                    item.key
                )));
            }
        }
        Ok(())
    }

    pub fn to_json_pretty(&self) -> VaultResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| VaultError::Storage(format!("failed to serialize bundle: {e}")))
    }

    /// Parses and validates a bundle.
    ///
    /// The format version is checked before the body, so a bundle from a
    /// newer build is reported as such instead of as malformed.
    pub fn from_json_slice(bytes: &[u8]) -> VaultResult<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| VaultError::Validation(format!("bundle is not valid JSON: {e}")))?;
        let Some(root) = value.as_object() else {
            return Err(VaultError::Validation("bundle must be a JSON object".into()));
        };
        let Some(meta) = root.get("meta").and_then(|m| m.as_object()) else {
            return Err(VaultError::Validation("bundle has no meta object".into()));
        };
        match meta.get("format_version").and_then(|v| v.as_u64()) {
            Some(v) if v == u64::from(FORMAT_VERSION) => {}
            Some(v) => {
                return Err(VaultError::UnsupportedFormatVersion(
                    u32::try_from(v).unwrap_or(u32::MAX),
                ));
            }
            None => {
                return Err(VaultError::Validation(
                    "meta.format_version is missing".into(),
                ));
            }
        }
        for field in ["clients", "sessions"] {
            if !root.get(field).is_some_and(|v| v.is_array()) {
                return Err(VaultError::Validation(format!("{field} must be an array")));
            }
        }

        let bundle: Self = serde_json::from_value(value)
            .map_err(|e| VaultError::Validation(format!("malformed bundle: {e}")))?;
        bundle.validate()?;
        Ok(bundle)
    }

    pub async fn write_to(&self, path: impl AsRef<Path>) -> VaultResult<()> {
        let json = self.to_json_pretty()?;
        tokio::fs::write(path.as_ref(), json).await?;
        Ok(())
    }

    pub async fn read_from(path: impl AsRef<Path>) -> VaultResult<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        Self::from_json_slice(&bytes)
    }
}

impl Vault {
    /// Seals the given record set under the active key and packages it with
    /// the stored credential.
    ///
    /// Sessions that have never been stored (no `id`) are skipped.
    pub async fn export_bundle(
        &self,
        clients: &[Client],
        sessions: &[Session],
    ) -> VaultResult<BackupBundle> {
        let key = self.active_key()?;
        let store = self.store.clone();
        let clients = clients.to_vec();
        let sessions = sessions.to_vec();

        blocking(move || {
            let credential = store
                .load_credential()?
                .ok_or(VaultError::NotInitialized)?;

            let mut sealed_clients = Vec::with_capacity(clients.len());
            for client in &clients {
                sealed_clients.push(StoredItem::new(
                    client.client_id.clone(),
                    seal_client(&key, client)?,
                ));
            }
            let mut sealed_sessions = Vec::with_capacity(sessions.len());
            for session in &sessions {
                let Some(id) = session.id else {
                    tracing::warn!(session = %session.session_id, "skipping session without id in export");
                    continue;
                };
                sealed_sessions.push(StoredItem::new(id, seal_session(&key, session)?));
            }

            let bundle = BackupBundle {
                clients: sealed_clients,
                sessions: sealed_sessions,
                meta: BundleMeta {
                    salt: credential.salt,
                    verifier: credential.verifier,
                    kdf_iterations: credential.kdf_iterations,
                    format_version: FORMAT_VERSION,
                    exported_at: Utc::now(),
                },
            };
            tracing::info!(
                clients = bundle.clients.len(),
                sessions = bundle.sessions.len(),
                "exported backup bundle"
            );
            Ok(bundle)
        })
        .await
    }

    /// Exports everything currently stored.
    pub async fn export_all(&self) -> VaultResult<BackupBundle> {
        let records = self.load_all().await?;
        self.export_bundle(&records.clients, &records.sessions).await
    }

    /// Replaces the whole store with the bundle's contents, authenticated
    /// against the bundle's own credential. Works whether this vault is
    /// unlocked, locked or not yet set up; on success it is unlocked with the
    /// bundle's key.
    pub async fn import_bundle(
        &self,
        bundle: &BackupBundle,
        password: &str,
    ) -> VaultResult<Credential> {
        bundle.validate()?;
        let password = Zeroizing::new(password.to_owned());
        let bundle = bundle.clone();
        let store = self.store.clone();

        let (credential, key) = blocking(move || {
            let credential = bundle.credential();
            let key = credential
                .unlock(&password)
                .ok_or(VaultError::Authentication)?;
            store.replace_all(&bundle.clients, &bundle.sessions, Some(&credential))?;
            tracing::info!(
                clients = bundle.clients.len(),
                sessions = bundle.sessions.len(),
                "imported backup bundle"
            );
            Ok((credential, key))
        })
        .await?;

        self.keys.set(key);
        self.touch();
        Ok(credential)
    }
}
