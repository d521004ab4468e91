//! Encryption layer for TherapyLog.
//!
//! Provides per-record encryption using:
//! - PBKDF2-HMAC-SHA256 for key derivation from passwords
//! - ChaCha20-Poly1305 for authenticated encryption
//! - A SHA-256 verifier for checking passwords without decrypting records
//! - Secure key management with zeroization
//!
//! # Architecture
//!
//! A single key is derived from the user's password and a per-store salt.
//! The key is never stored; it lives in a [`SessionKeyHolder`] between
//! unlock and lock. Each record is sealed into its own [`Envelope`] with a
//! fresh nonce. The [`Credential`] (salt + verifier) is the only persisted
//! artefact of the password.

mod cipher;
mod encoding;
mod error;
mod key;
mod session;
mod verifier;

pub use cipher::{
    decrypt, decrypt_json, encrypt, encrypt_json, Envelope, NONCE_SIZE, TAG_SIZE,
};
pub use error::{CryptoError, CryptoResult};
pub use key::{
    derive_key, generate_random_key, DerivedKey, KdfParams, Salt, DEFAULT_ITERATIONS, KEY_SIZE,
    MAX_ITERATIONS, MIN_ITERATIONS, SALT_SIZE,
};
pub use session::SessionKeyHolder;
pub use verifier::{compute_verifier, constant_time_eq, verify_password, Credential, Verifier};
