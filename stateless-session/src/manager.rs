//! Session lifecycle: create, load, touch, save and expire session records.

use std::time::Duration;

use tracing::debug;

use crate::{
    codec::{self, token_fingerprint, Payload},
    config::{ConfigError, SessionConfig},
    error::SessionError,
    record::{Data, SessionRecord, SessionUser, TtlBasis},
    timestamp::now_ms,
};

/// Turns tokens into [SessionRecord]s and back, enforcing the configured expiry.
///
/// Holds nothing but the immutable [SessionConfig], so it is cheap to clone
/// and safe to share between threads.
///
/// Every operation that reads the clock has an `_at` variant taking the
/// current time in milliseconds since the unix epoch.
#[derive(Clone, Debug)]
pub struct SessionManager {
    config: SessionConfig,
}

impl SessionManager {
    /// Create a manager, rejecting configurations that can't sign tokens.
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        if !config.algorithm().is_signed() {
            tracing::warn!("Session tokens are unsigned and can be forged by clients");
        }

        Ok(Self { config })
    }

    /// The configuration this manager was created with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // === Creating sessions ===

    /// Create a new anonymous session.
    pub fn create(&self, session_data: Option<Data>) -> SessionRecord {
        self.create_at(session_data, now_ms())
    }

    /// Create a new anonymous session stamped with `now`.
    pub fn create_at(&self, session_data: Option<Data>, now: u64) -> SessionRecord {
        SessionRecord::new(session_data.unwrap_or_default(), now)
    }

    /// Create a new session, already logged in as `user` if there is one.
    pub fn create_with_user(
        &self,
        session_data: Option<Data>,
        user: Option<&SessionUser>,
    ) -> SessionRecord {
        self.create_with_user_at(session_data, user, now_ms())
    }

    /// Create a new session stamped with `now`, logged in as `user` if there is one.
    pub fn create_with_user_at(
        &self,
        session_data: Option<Data>,
        user: Option<&SessionUser>,
        now: u64,
    ) -> SessionRecord {
        let mut record = self.create_at(session_data, now);
        self.set_user(&mut record, user);
        record
    }

    /// Load a session from a token, touching its last access time.
    ///
    /// Any decoding failure is reported as [SessionError::NotFound], a session
    /// past its time-to-live as [SessionError::Expired].
    pub fn from_token(&self, token: &str) -> Result<SessionRecord, SessionError> {
        self.from_token_at(token, now_ms())
    }

    /// Load a session from a token as of `now`.
    pub fn from_token_at(&self, token: &str, now: u64) -> Result<SessionRecord, SessionError> {
        let payload = codec::decode(token, self.config.algorithm(), self.config.secret())
            .map_err(|error| {
                let fingerprint = token_fingerprint(token);
                debug!(token = %fingerprint, %error, "Rejected session token");
                SessionError::NotFound {
                    token: Some(fingerprint),
                }
            })?;

        let mut record = SessionRecord::from(payload);
        record.last_access_at = now;

        if self.has_expired_at(&record, now) {
            let fingerprint = token_fingerprint(token);
            debug!(
                token = %fingerprint,
                created_at = record.created_at,
                "Session expired"
            );
            return Err(SessionError::Expired {
                token: Some(fingerprint),
            });
        }

        Ok(record)
    }

    /// Sign the record into a token.
    ///
    /// Timestamps are written as they are, call [SessionManager::save] first to
    /// stamp changes.
    pub fn to_token(&self, record: &SessionRecord) -> Result<String, codec::Error> {
        codec::encode(
            &Payload::from(record),
            self.config.algorithm(),
            self.config.secret(),
        )
    }

    // === Mutating sessions ===

    /// Attach `user` to the session, or log the session out with `None`.
    pub fn set_user(&self, record: &mut SessionRecord, user: Option<&SessionUser>) {
        match user {
            Some(user) => {
                record.subject_id = Some(user.id.clone());
                record.user_data = user.user_data.clone();
            }
            None => {
                record.subject_id = None;
                record.user_data = Data::new();
            }
        }
    }

    /// Stamp the session as accessed and modified.
    pub fn save(&self, record: &mut SessionRecord) {
        self.save_at(record, now_ms())
    }

    /// Stamp the session as accessed and modified at `now`.
    ///
    /// Neither timestamp moves backwards if the clock does.
    pub fn save_at(&self, record: &mut SessionRecord, now: u64) {
        let now = now
            .max(record.last_access_at)
            .max(record.last_modified_at);

        record.last_access_at = now;
        record.last_modified_at = now;
    }

    // === Expiry ===

    /// Fail with [SessionError::Expired] if the session has no time left.
    pub fn check_timeout(&self, record: &SessionRecord) -> Result<(), SessionError> {
        self.check_timeout_at(record, now_ms())
    }

    /// Fail with [SessionError::Expired] if the session has no time left at `now`.
    pub fn check_timeout_at(&self, record: &SessionRecord, now: u64) -> Result<(), SessionError> {
        if self.has_expired_at(record, now) {
            return Err(SessionError::Expired { token: None });
        }
        Ok(())
    }

    /// Returns true if the session has no time left.
    pub fn has_expired(&self, record: &SessionRecord) -> bool {
        self.has_expired_at(record, now_ms())
    }

    /// Returns true if the session has no time left at `now`.
    pub fn has_expired_at(&self, record: &SessionRecord, now: u64) -> bool {
        self.ttl_at(record, now) == Some(Duration::ZERO)
    }

    /// Remaining time-to-live, `None` if sessions never expire.
    pub fn ttl(&self, record: &SessionRecord) -> Option<Duration> {
        self.ttl_at(record, now_ms())
    }

    /// Remaining time-to-live at `now`, `None` if sessions never expire.
    pub fn ttl_at(&self, record: &SessionRecord, now: u64) -> Option<Duration> {
        let expiry = self.expiry(record)?;
        Some(Duration::from_millis(expiry.saturating_sub(now)))
    }

    /// Instant the session expires, in milliseconds since the unix epoch.
    ///
    /// `None` if sessions never expire.
    pub fn expiry(&self, record: &SessionRecord) -> Option<u64> {
        let time_to_live = self.config.time_to_live();
        if time_to_live.is_zero() {
            return None;
        }
        let time_to_live = u64::try_from(time_to_live.as_millis()).unwrap_or(u64::MAX);

        Some(self.ttl_reference(record).saturating_add(time_to_live))
    }

    /// The configured basis timestamp, or `createdAt` if it is unset on the record.
    fn ttl_reference(&self, record: &SessionRecord) -> u64 {
        match self.config.ttl_basis() {
            Some(basis) if record.timestamp(basis) != 0 => record.timestamp(basis),
            _ => record.timestamp(TtlBasis::CreatedAt),
        }
    }
}
