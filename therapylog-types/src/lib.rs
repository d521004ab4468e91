//! Core record types for TherapyLog.
//!
//! This crate defines the plaintext shapes that the encrypted store seals
//! into envelopes:
//! - Clients, keyed by a natural `YYYYMMDD-NN` identifier
//! - Sessions, keyed by a store-assigned integer and referencing a client
//! - The tagged, versioned [`RecordPayload`] that is actually serialized
//!   before encryption
//!
//! Nothing in here touches key material or persistence.

mod ids;
mod record;

pub use ids::{next_client_id, next_session_id};
pub use record::{
    Attachment, Client, ClientStatus, Language, Record, RecordKind, RecordPayload, RiskLevel,
    Session, SessionFormat, SessionSetting, SessionStatus, Sex,
};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("expected a {expected} record, found a {found} record")]
    KindMismatch {
        expected: RecordKind,
        found: RecordKind,
    },

    #[error("unsupported record format version {0}")]
    UnsupportedVersion(u32),
}
