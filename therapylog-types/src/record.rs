//! Client and session records plus the versioned payload wrapper.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Preferred language for a client's paperwork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    #[default]
    Zh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Female,
    Male,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    #[default]
    Active,
    Archived,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionFormat {
    #[default]
    Individual,
    Couple,
    Family,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionSetting {
    #[default]
    InPerson,
    Online,
    Phone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

/// A client of the practice.
///
/// `client_id` is the natural key (`YYYYMMDD-NN`) and is the only field
/// the store keeps in the clear.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Client {
    pub client_id: String,
    pub intake_date: String,
    pub name: String,
    pub sex: Sex,
    pub status: ClientStatus,
    pub referral_source: String,
    pub diagnoses: Vec<String>,
    pub tags: Vec<String>,
    pub lang_preference: Language,
    pub notes: String,
}

impl Client {
    /// Creates a client with only its key and name filled in.
    pub fn new(client_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A file attached to a session note, carried inline as base64.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    pub data: String,
}

/// A scheduled or completed session with a client.
///
/// `id` is assigned by the store on first insert. Whatever value sits in an
/// encrypted payload is overwritten with the store key when loaded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub client_id: String,
    pub session_id: String,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub duration_min: u32,
    pub format: SessionFormat,
    pub setting: SessionSetting,
    pub status: SessionStatus,
    pub location: String,
    pub diagnoses: Vec<String>,
    pub tags: Vec<String>,
    pub risk: RiskLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Session {
    /// Creates a scheduled session for `client_id` on `date`.
    pub fn scheduled(
        client_id: impl Into<String>,
        session_id: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            session_id: session_id.into(),
            date: date.into(),
            duration_min: 50,
            ..Self::default()
        }
    }
}

/// Which collection a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Client,
    Session,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => f.write_str("client"),
            Self::Session => f.write_str("session"),
        }
    }
}

/// A record of either kind, tagged so a payload can never be read back as
/// the wrong type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Record {
    Client(Client),
    Session(Session),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Client(_) => RecordKind::Client,
            Self::Session(_) => RecordKind::Session,
        }
    }

    pub fn into_client(self) -> Result<Client> {
        match self {
            Self::Client(c) => Ok(c),
            other => Err(Error::KindMismatch {
                expected: RecordKind::Client,
                found: other.kind(),
            }),
        }
    }

    pub fn into_session(self) -> Result<Session> {
        match self {
            Self::Session(s) => Ok(s),
            other => Err(Error::KindMismatch {
                expected: RecordKind::Session,
                found: other.kind(),
            }),
        }
    }
}

/// The plaintext that gets serialized and sealed into an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayload {
    pub format_version: u32,
    pub record: Record,
}

impl RecordPayload {
    /// Current payload format version.
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(record: Record) -> Self {
        Self {
            format_version: Self::CURRENT_VERSION,
            record,
        }
    }

    /// Unwraps the record, refusing payloads written by a newer format.
    pub fn into_record(self) -> Result<Record> {
        if self.format_version == 0 || self.format_version > Self::CURRENT_VERSION {
            return Err(Error::UnsupportedVersion(self.format_version));
        }
        Ok(self.record)
    }
}

impl From<Client> for RecordPayload {
    fn from(client: Client) -> Self {
        Self::new(Record::Client(client))
    }
}

impl From<Session> for RecordPayload {
    fn from(session: Session) -> Self {
        Self::new(Record::Session(session))
    }
}
