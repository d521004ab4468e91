//! Vault configuration.

use crate::error::{VaultError, VaultResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use therapylog_crypto::{KdfParams, DEFAULT_ITERATIONS, MAX_ITERATIONS, MIN_ITERATIONS};

/// Configuration for a [`Vault`](crate::Vault).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// SQLite database file.
    pub db_path: PathBuf,

    /// PBKDF2 rounds for newly created credentials. Existing credentials keep
    /// the count they were created with.
    pub kdf_iterations: u32,

    /// Minimum password length accepted by setup and password change.
    pub min_password_len: usize,

    /// Inactivity before the session key is dropped (seconds).
    pub idle_timeout_secs: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("therapylog.db"),
            kdf_iterations: DEFAULT_ITERATIONS,
            min_password_len: 8,
            idle_timeout_secs: 300, // 5 minutes
        }
    }
}

impl VaultConfig {
    /// Loads a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> VaultResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&raw)
            .map_err(|e| VaultError::Validation(format!("config {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = db_path.into();
        self
    }

    pub fn validate(&self) -> VaultResult<()> {
        if self.kdf_iterations == 0 {
            return Err(VaultError::Validation(
                "kdf_iterations must be greater than zero".into(),
            ));
        }
        if self.kdf_iterations > MAX_ITERATIONS {
            return Err(VaultError::Validation(format!(
                "kdf_iterations must not exceed {MAX_ITERATIONS}"
            )));
        }
        if self.min_password_len == 0 {
            return Err(VaultError::Validation(
                "min_password_len must be at least 1".into(),
            ));
        }
        if self.idle_timeout_secs == 0 {
            return Err(VaultError::Validation(
                "idle_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.kdf_iterations < MIN_ITERATIONS {
            tracing::warn!(
                iterations = self.kdf_iterations,
                minimum = MIN_ITERATIONS,
                "kdf_iterations below recommended minimum"
            );
        }
        Ok(())
    }

    pub fn kdf_params(&self) -> KdfParams {
        KdfParams::new(self.kdf_iterations)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Cheap KDF settings for tests.
    #[doc(hidden)]
    pub fn for_tests() -> Self {
        Self {
            kdf_iterations: 1_000,
            ..Self::default()
        }
    }
}
