//! Error types for the storage layer.

use std::fmt;
use therapylog_crypto::CryptoError;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// The two record collections held by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Clients,
    Sessions,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Clients => "clients",
            Collection::Sessions => "sessions",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema version problem.
    #[error("migration error: {0}")]
    Migration(String),

    /// Invalid data.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Sealing a record failed.
    #[error("encryption error: {0}")]
    Crypto(#[from] CryptoError),

    /// A stored envelope did not open under the supplied key.
    #[error("failed to decrypt {collection} record {key}")]
    DecryptionFailed { collection: Collection, key: String },

    /// An envelope opened but its payload is not a valid record for its
    /// collection.
    #[error("invalid {collection} record {key}: {reason}")]
    InvalidRecord {
        collection: Collection,
        key: String,
        reason: String,
    },
}
