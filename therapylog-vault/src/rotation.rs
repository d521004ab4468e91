//! Password change: re-encrypt every record under a fresh key in one
//! transaction.
//!
//! The new key only reaches the session key holder after the transaction has
//! committed. If anything fails first, the store still holds the old
//! credential and the old envelopes, and the holder still holds the old key.

use crate::error::{VaultError, VaultResult};
use crate::vault::{blocking, Vault};
use std::collections::HashSet;
use therapylog_crypto::{Credential, DerivedKey, KdfParams};
use therapylog_storage::{seal_client, seal_session, CollectionStore, StoredItem};
use therapylog_types::{Client, Session};
use zeroize::Zeroizing;

impl Vault {
    /// Re-encrypts the given record set under `new_password` and swaps it in
    /// atomically, together with the new credential.
    ///
    /// `clients` and `sessions` are the full decrypted record set; anything
    /// not in them is gone after the swap.
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
        clients: &[Client],
        sessions: &[Session],
    ) -> VaultResult<Credential> {
        self.check_password_len(new_password)?;
        let current = Zeroizing::new(current_password.to_owned());
        let new = Zeroizing::new(new_password.to_owned());
        let clients = clients.to_vec();
        let sessions = sessions.to_vec();
        let store = self.store.clone();
        let params = self.config.kdf_params();

        let (credential, key) = blocking(move || {
            authenticate(&store, &current)?;
            reseal_and_replace(&store, &new, &params, &clients, &sessions)
        })
        .await?;

        self.install_rotated_key(key);
        Ok(credential)
    }

    /// Loads the stored records with the current password and re-encrypts
    /// them under `new_password`.
    pub async fn rotate_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> VaultResult<Credential> {
        self.check_password_len(new_password)?;
        let current = Zeroizing::new(current_password.to_owned());
        let new = Zeroizing::new(new_password.to_owned());
        let store = self.store.clone();
        let params = self.config.kdf_params();

        let (credential, key) = blocking(move || {
            let old_key = authenticate(&store, &current)?;
            let (clients, sessions) = store.load_and_decrypt_all(&old_key)?;
            reseal_and_replace(&store, &new, &params, &clients, &sessions)
        })
        .await?;

        self.install_rotated_key(key);
        Ok(credential)
    }

    fn install_rotated_key(&self, key: DerivedKey) {
        self.keys.set(key);
        self.touch();
        tracing::info!("password changed");
    }
}

/// Returns the current key if `password` matches the stored credential.
fn authenticate(store: &CollectionStore, password: &str) -> VaultResult<DerivedKey> {
    let credential = store
        .load_credential()?
        .ok_or(VaultError::NotInitialized)?;
    credential.unlock(password).ok_or(VaultError::Authentication)
}

fn reseal_and_replace(
    store: &CollectionStore,
    new_password: &str,
    params: &KdfParams,
    clients: &[Client],
    sessions: &[Session],
) -> VaultResult<(Credential, DerivedKey)> {
    check_record_set(clients, sessions)?;
    let (credential, key) = Credential::create(new_password, params)?;

    let sealed_clients = clients
        .iter()
        .map(|c| -> VaultResult<_> {
            Ok(StoredItem::new(c.client_id.clone(), seal_client(&key, c)?))
        })
        .collect::<VaultResult<Vec<_>>>()?;
    let sealed_sessions = sessions
        .iter()
        .map(|s| -> VaultResult<_> {
            // check_record_set guarantees every session has an id
            let id = s.id.unwrap_or_default();
            Ok(StoredItem::new(id, seal_session(&key, s)?))
        })
        .collect::<VaultResult<Vec<_>>>()?;

    store.replace_all(&sealed_clients, &sealed_sessions, Some(&credential))?;
    tracing::debug!(
        clients = sealed_clients.len(),
        sessions = sealed_sessions.len(),
        "re-encrypted record set"
    );
    Ok((credential, key))
}

/// Rejects record sets that cannot be written back losslessly.
fn check_record_set(clients: &[Client], sessions: &[Session]) -> VaultResult<()> {
    let mut client_ids = HashSet::new();
    for client in clients {
        if client.client_id.trim().is_empty() {
            return Err(VaultError::Validation("client with empty client_id".into()));
        }
        if !client_ids.insert(client.client_id.as_str()) {
            return Err(VaultError::Validation(format!(
                "duplicate client_id {}",
                client.client_id
            )));
        }
    }
    let mut session_ids = HashSet::new();
    for session in sessions {
        let Some(id) = session.id else {
            return Err(VaultError::Validation(format!(
                "session {} has no id",
                session.session_id
            )));
        };
        if !session_ids.insert(id) {
            return Err(VaultError::Validation(format!("duplicate session id {id}")));
        }
    }
    Ok(())
}
