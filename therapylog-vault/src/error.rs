use therapylog_crypto::CryptoError;
use therapylog_storage::{Collection, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("vault not initialized")]
    NotInitialized,
    #[error("vault is locked")]
    Locked,
    #[error("vault already initialized")]
    AlreadyInitialized,
    #[error("incorrect password")]
    Authentication,
    #[error("password too short (min {min} characters)")]
    PasswordTooShort { min: usize },
    #[error("failed to decrypt {collection} record {key}")]
    DecryptionFailed { collection: Collection, key: String },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("unsupported backup format version {0}")]
    UnsupportedFormatVersion(u32),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("crypto error: {0}")]
    Crypto(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type VaultResult<T> = Result<T, VaultError>;

impl From<StorageError> for VaultError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::DecryptionFailed { collection, key } => {
                VaultError::DecryptionFailed { collection, key }
            }
            StorageError::InvalidRecord { .. } => VaultError::Validation(e.to_string()),
            StorageError::Io(e) => VaultError::Io(e),
            other => VaultError::Storage(other.to_string()),
        }
    }
}

impl From<CryptoError> for VaultError {
    fn from(e: CryptoError) -> Self {
        VaultError::Crypto(e.to_string())
    }
}
