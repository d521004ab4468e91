//! Record encryption using ChaCha20-Poly1305.
//!
//! Provides authenticated encryption with associated data (AEAD). Every call
//! to [`encrypt`] draws a fresh random nonce, so encrypting the same record
//! twice never yields the same envelope.

use crate::error::{CryptoError, CryptoResult};
use crate::key::DerivedKey;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Size of nonce in bytes (96 bits for ChaCha20-Poly1305).
pub const NONCE_SIZE: usize = 12;

/// Size of authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// One encrypted record: the nonce plus ciphertext with the tag appended.
///
/// Both fields serialize as base64.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// The nonce used for encryption (unique per encryption).
    #[serde(with = "crate::encoding::nonce")]
    pub nonce: [u8; NONCE_SIZE],
    /// The encrypted ciphertext (includes auth tag).
    #[serde(with = "crate::encoding::bytes")]
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Rebuilds an envelope from raw columns, checking the nonce length.
    pub fn from_parts(nonce: &[u8], ciphertext: Vec<u8>) -> CryptoResult<Self> {
        let nonce: [u8; NONCE_SIZE] =
            nonce.try_into().map_err(|_| CryptoError::InvalidNonceLength {
                expected: NONCE_SIZE,
                actual: nonce.len(),
            })?;
        Ok(Self { nonce, ciphertext })
    }
}

/// Encrypts plaintext using ChaCha20-Poly1305.
pub fn encrypt(key: &DerivedKey, plaintext: &[u8]) -> CryptoResult<Envelope> {
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(Envelope {
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Decrypts an envelope using ChaCha20-Poly1305.
///
/// Fails if `key` is not the key that sealed the envelope or if any byte of
/// the envelope changed.
pub fn decrypt(key: &DerivedKey, envelope: &Envelope) -> CryptoResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());
    let nonce = Nonce::from_slice(&envelope.nonce);

    cipher
        .decrypt(nonce, envelope.ciphertext.as_ref())
        .map_err(|_| {
            CryptoError::Decryption("decryption failed (wrong key or tampered data)".to_string())
        })
}

/// Serializes `value` to JSON and seals it.
pub fn encrypt_json<T: Serialize>(key: &DerivedKey, value: &T) -> CryptoResult<Envelope> {
    let plaintext = zeroize::Zeroizing::new(serde_json::to_vec(value)?);
    encrypt(key, &plaintext)
}

/// Opens an envelope and deserializes the JSON inside.
pub fn decrypt_json<T: DeserializeOwned>(key: &DerivedKey, envelope: &Envelope) -> CryptoResult<T> {
    let plaintext = zeroize::Zeroizing::new(decrypt(key, envelope)?);
    Ok(serde_json::from_slice(&plaintext)?)
}
