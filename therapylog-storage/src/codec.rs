//! Sealing typed records into envelopes and opening them again.
//!
//! The plaintext inside every envelope is a JSON [`RecordPayload`]: the record
//! tagged with its kind plus a format version. Opening checks both, so a
//! client envelope copied into the sessions collection is rejected rather
//! than misread.

use crate::error::{Collection, StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use therapylog_crypto::{decrypt_json, encrypt_json, CryptoError, DerivedKey, Envelope};
use therapylog_types::{Client, RecordPayload, Session};

/// One row of a collection: the clear key next to its sealed value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredItem<K> {
    pub key: K,
    #[serde(flatten)]
    pub envelope: Envelope,
}

impl<K> StoredItem<K> {
    pub fn new(key: K, envelope: Envelope) -> Self {
        Self { key, envelope }
    }
}

pub fn seal_client(key: &DerivedKey, client: &Client) -> StorageResult<Envelope> {
    let payload = RecordPayload::from(client.clone());
    Ok(encrypt_json(key, &payload)?)
}

/// The store key is authoritative, so the session's own `id` is not sealed.
pub fn seal_session(key: &DerivedKey, session: &Session) -> StorageResult<Envelope> {
    let payload = RecordPayload::from(Session {
        id: None,
        ..session.clone()
    });
    Ok(encrypt_json(key, &payload)?)
}

pub fn open_client(key: &DerivedKey, item: &StoredItem<String>) -> StorageResult<Client> {
    let payload = open_payload(key, Collection::Clients, &item.key, &item.envelope)?;
    payload
        .into_record()
        .and_then(|record| record.into_client())
        .map_err(|e| invalid(Collection::Clients, &item.key, e))
}

/// Opens a session and stamps it with its store key.
pub fn open_session(key: &DerivedKey, item: &StoredItem<i64>) -> StorageResult<Session> {
    let payload = open_payload(key, Collection::Sessions, &item.key, &item.envelope)?;
    let mut session = payload
        .into_record()
        .and_then(|record| record.into_session())
        .map_err(|e| invalid(Collection::Sessions, &item.key, e))?;
    session.id = Some(item.key);
    Ok(session)
}

fn open_payload(
    key: &DerivedKey,
    collection: Collection,
    record_key: &impl Display,
    envelope: &Envelope,
) -> StorageResult<RecordPayload> {
    decrypt_json(key, envelope).map_err(|e| match e {
        CryptoError::Serialization(e) => invalid(collection, record_key, e),
        _ => StorageError::DecryptionFailed {
            collection,
            key: record_key.to_string(),
        },
    })
}

fn invalid(collection: Collection, key: &impl Display, reason: impl Display) -> StorageError {
    StorageError::InvalidRecord {
        collection,
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
