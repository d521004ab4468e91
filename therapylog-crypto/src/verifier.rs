//! Password verification without touching record data.
//!
//! The verifier is a SHA-256 digest of the raw derived key. Recomputing it
//! from a candidate password and comparing (in constant time) tells us
//! whether the password is right, even when the store holds no records.
//!
//! Anyone holding `(salt, verifier)` can brute-force the password offline at
//! the same cost as attacking a record ciphertext. That is inherent to a
//! local-only store with no escrow.

use crate::encoding;
use crate::error::CryptoResult;
use crate::key::{derive_key, DerivedKey, KdfParams, Salt, DEFAULT_ITERATIONS};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Base64 SHA-256 digest of a derived key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Verifier(String);

impl Verifier {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Verifier").field(&self.0).finish()
    }
}

/// Computes the verifier for a key. One-way: the key cannot be recovered.
pub fn compute_verifier(key: &DerivedKey) -> Verifier {
    let digest = Sha256::digest(key.as_bytes());
    Verifier(encoding::encode(&digest))
}

/// Returns true when `password` re-derives a key matching `expected`.
///
/// Never errors: any failure inside derivation counts as a mismatch.
pub fn verify_password(
    password: &str,
    salt: &Salt,
    params: &KdfParams,
    expected: &Verifier,
) -> bool {
    derive_verified(password, salt, params, expected).is_some()
}

/// Constant-time comparison of byte slices.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn derive_verified(
    password: &str,
    salt: &Salt,
    params: &KdfParams,
    expected: &Verifier,
) -> Option<DerivedKey> {
    let key = match derive_key(password, salt, params) {
        Ok(key) => key,
        Err(e) => {
            tracing::debug!("password verification failed during derivation: {e}");
            return None;
        }
    };
    let candidate = compute_verifier(&key);
    constant_time_eq(candidate.0.as_bytes(), expected.0.as_bytes()).then_some(key)
}

fn default_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

/// The unencrypted record that says which password protects a store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub salt: Salt,
    pub verifier: Verifier,
    #[serde(default = "default_iterations")]
    pub kdf_iterations: u32,
}

impl Credential {
    /// Draws a fresh salt, derives the key and computes its verifier.
    pub fn create(password: &str, params: &KdfParams) -> CryptoResult<(Self, DerivedKey)> {
        let salt = Salt::random();
        let key = derive_key(password, &salt, params)?;
        let credential = Self {
            salt,
            verifier: compute_verifier(&key),
            kdf_iterations: params.iterations,
        };
        Ok((credential, key))
    }

    pub fn kdf_params(&self) -> KdfParams {
        KdfParams::new(self.kdf_iterations)
    }

    /// Derives the key for `password` and returns it only if it matches.
    pub fn unlock(&self, password: &str) -> Option<DerivedKey> {
        derive_verified(password, &self.salt, &self.kdf_params(), &self.verifier)
    }

    pub fn verify(&self, password: &str) -> bool {
        self.unlock(password).is_some()
    }
}
