//! Password-protected record vault for TherapyLog.
//!
//! Ties the encrypted collection store to a session key:
//!
//! - setup / unlock / lock lifecycle with a stored verifier
//! - typed CRUD over clients and sessions, sealed per record
//! - password rotation that re-encrypts everything in one transaction
//! - self-describing backup bundles that import atomically
//! - an inactivity auto-lock
//!
//! All blocking work (key derivation, SQLite) runs on tokio's blocking pool.

mod backup;
mod config;
mod error;
mod idle;
mod rotation;
mod vault;

pub use backup::{BackupBundle, BundleMeta, FORMAT_VERSION};
pub use config::VaultConfig;
pub use error::{VaultError, VaultResult};
pub use idle::{ActivityClock, IdleLock};
pub use vault::{RecordSet, ReferentialWarning, Vault, VaultStatus};

pub use therapylog_crypto::{Credential, SessionKeyHolder};
pub use therapylog_storage::{Collection, StoredItem};
pub use therapylog_types::{Client, Session};
