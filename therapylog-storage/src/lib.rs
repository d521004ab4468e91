//! SQLite storage layer for TherapyLog.
//!
//! Persists two encrypted collections and one plaintext credential record:
//!
//! - `clients`: keyed by the caller-assigned client id
//! - `sessions`: keyed by a store-assigned integer that is never reused
//! - `credential`: the salt, verifier and KDF round count for the password
//!
//! Records only ever reach the database as [`Envelope`](therapylog_crypto::Envelope)s.
//! [`CollectionStore::replace_all`] swaps both collections and the credential
//! in a single transaction, which is what password rotation and backup
//! import build on.

mod codec;
mod error;
mod schema;
mod store;

pub use codec::{open_client, open_session, seal_client, seal_session, StoredItem};
pub use error::{Collection, StorageError, StorageResult};
pub use schema::SCHEMA_VERSION;
pub use store::CollectionStore;
