//! Base64 helpers shared by the serde impls of binary fields.

use crate::error::{CryptoError, CryptoResult};
use base64::{engine::general_purpose::STANDARD, Engine};

pub(crate) fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub(crate) fn decode(encoded: &str) -> CryptoResult<Vec<u8>> {
    STANDARD
        .decode(encoded)
        .map_err(|e| CryptoError::Encoding(format!("invalid base64: {e}")))
}

/// `#[serde(with = "...")]` adapter for `Vec<u8>` as base64.
pub(crate) mod bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        super::decode(&encoded).map_err(serde::de::Error::custom)
    }
}

/// `#[serde(with = "...")]` adapter for the fixed-size nonce as base64.
pub(crate) mod nonce {
    use crate::cipher::NONCE_SIZE;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &[u8; NONCE_SIZE],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<[u8; NONCE_SIZE], D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = super::decode(&encoded).map_err(serde::de::Error::custom)?;
        let len = bytes.len();
        bytes.try_into().map_err(|_| {
            serde::de::Error::custom(format!(
                "invalid nonce length: expected {NONCE_SIZE}, got {len}"
            ))
        })
    }
}
