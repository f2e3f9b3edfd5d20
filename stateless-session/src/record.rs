//! The session record carried inside a token.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::Payload;

/// Free-form JSON object attached to a session.
pub type Data = Map<String, Value>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A session, fully reconstructed from (or about to be signed into) a token.
///
/// Records are created through the [SessionManager](crate::SessionManager)
/// and only mutated through its operations.
pub struct SessionRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) subject_id: Option<String>,
    pub(crate) session_data: Data,
    pub(crate) user_data: Data,
    pub(crate) created_at: u64,
    pub(crate) last_access_at: u64,
    pub(crate) last_modified_at: u64,
}

impl SessionRecord {
    /// A fresh anonymous record with every timestamp set to `now`.
    pub(crate) fn new(session_data: Data, now: u64) -> Self {
        Self {
            subject_id: None,
            session_data,
            user_data: Data::new(),
            created_at: now,
            last_access_at: now,
            last_modified_at: now,
        }
    }

    // === Getters ===

    /// Id of the authenticated subject, `None` for anonymous sessions.
    pub fn subject_id(&self) -> Option<&str> {
        self.subject_id.as_deref()
    }

    /// Returns true if no subject is attached to this session.
    pub fn is_anonymous(&self) -> bool {
        self.subject_id.is_none()
    }

    /// Session payload.
    pub fn session_data(&self) -> &Data {
        &self.session_data
    }

    /// User payload, set together with the subject.
    pub fn user_data(&self) -> &Data {
        &self.user_data
    }

    /// Creation time in milliseconds since the unix epoch.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Last time the session was loaded or saved, in milliseconds.
    pub fn last_access_at(&self) -> u64 {
        self.last_access_at
    }

    /// Last time the session was saved, in milliseconds.
    pub fn last_modified_at(&self) -> u64 {
        self.last_modified_at
    }

    /// Value of the timestamp named by `basis`.
    pub fn timestamp(&self, basis: TtlBasis) -> u64 {
        match basis {
            TtlBasis::CreatedAt => self.created_at,
            TtlBasis::LastAccessAt => self.last_access_at,
            TtlBasis::LastModifiedAt => self.last_modified_at,
        }
    }

    // === Setters ===

    /// Mutable access to the session payload.
    ///
    /// Changes are not stamped until [SessionManager::save](crate::SessionManager::save).
    pub fn session_data_mut(&mut self) -> &mut Data {
        &mut self.session_data
    }

    /// Replace the session payload.
    pub fn set_session_data(&mut self, session_data: Data) -> &mut Self {
        self.session_data = session_data;
        self
    }
}

impl From<Payload> for SessionRecord {
    fn from(payload: Payload) -> Self {
        Self {
            subject_id: payload.uid,
            session_data: payload.session_data,
            user_data: payload.user_data,
            created_at: payload.iat,
            last_access_at: payload.luat,
            last_modified_at: payload.lmat,
        }
    }
}

impl From<&SessionRecord> for Payload {
    fn from(record: &SessionRecord) -> Self {
        Self {
            uid: record.subject_id.clone(),
            session_data: record.session_data.clone(),
            user_data: record.user_data.clone(),
            luat: record.last_access_at,
            lmat: record.last_modified_at,
            iat: record.created_at,
        }
    }
}

/// What a user store hands over when a subject logs into a session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionUser {
    /// Subject id.
    pub id: String,
    /// Data copied into the session alongside the id.
    pub user_data: Data,
}

impl SessionUser {
    /// Create a new user with empty user data.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_data: Data::new(),
        }
    }

    /// Set the user data.
    pub fn with_user_data(mut self, user_data: Data) -> Self {
        self.user_data = user_data;
        self
    }
}

/// Record timestamp that session expiry is measured from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TtlBasis {
    /// Absolute lifetime from session creation.
    #[default]
    #[serde(rename = "createdAt", alias = "created", alias = "iat")]
    CreatedAt,
    /// Idle timeout, refreshed on every load and save.
    #[serde(rename = "lastAccessAt", alias = "lastAccess", alias = "luat")]
    LastAccessAt,
    /// Inactivity timeout, refreshed on every save.
    #[serde(
        rename = "lastModifiedAt",
        alias = "lastUpdate",
        alias = "lastModified",
        alias = "lmat"
    )]
    LastModifiedAt,
}

impl TtlBasis {
    /// Field name as it appears in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            TtlBasis::CreatedAt => "createdAt",
            TtlBasis::LastAccessAt => "lastAccessAt",
            TtlBasis::LastModifiedAt => "lastModifiedAt",
        }
    }
}

impl fmt::Display for TtlBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TtlBasis {
    type Err = UnknownTtlBasis;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createdAt" | "created" | "iat" => Ok(TtlBasis::CreatedAt),
            "lastAccessAt" | "lastAccess" | "luat" => Ok(TtlBasis::LastAccessAt),
            "lastModifiedAt" | "lastModified" | "lastUpdate" | "lmat" => {
                Ok(TtlBasis::LastModifiedAt)
            }
            _ => Err(UnknownTtlBasis(s.to_string())),
        }
    }
}

/// Name that doesn't match any [TtlBasis].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown ttl basis field: {0}")]
pub struct UnknownTtlBasis(pub String);
