//! Errors surfaced by the [SessionManager](crate::SessionManager).

use std::fmt;

/// Why a session token can't be used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnusableReason {
    /// Token could not be parsed or verified.
    NotFound,
    /// Token verified, but the session outlived its time-to-live.
    Expired,
}

impl fmt::Display for UnusableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnusableReason::NotFound => f.write_str("SessionNotFound"),
            UnusableReason::Expired => f.write_str("SessionExpired"),
        }
    }
}

/// A session token that can't be turned into a usable session.
///
/// Both variants mean "there is no session" to most callers, see
/// [SessionError::is_session_missing]. Use [SessionError::is_expired] when the
/// distinction matters.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session with session id {} not found.", DisplayToken(.token))]
    /// The token could not be parsed, or its signature did not verify.
    NotFound {
        /// Fingerprint of the offending token.
        token: Option<String>,
    },
    #[error("Session with session id {} has expired.", DisplayToken(.token))]
    /// The token verified but its remaining time-to-live is zero.
    Expired {
        /// Fingerprint of the offending token.
        token: Option<String>,
    },
}

impl SessionError {
    /// Why the session is unusable.
    pub fn reason(&self) -> UnusableReason {
        match self {
            SessionError::NotFound { .. } => UnusableReason::NotFound,
            SessionError::Expired { .. } => UnusableReason::Expired,
        }
    }

    /// Fingerprint of the token this error is about, if known.
    pub fn token(&self) -> Option<&str> {
        match self {
            SessionError::NotFound { token } | SessionError::Expired { token } => token.as_deref(),
        }
    }

    /// True for every [SessionError]: an expired session is a missing session too.
    pub fn is_session_missing(&self) -> bool {
        matches!(
            self.reason(),
            UnusableReason::NotFound | UnusableReason::Expired
        )
    }

    /// True only if the token was valid but the session expired.
    pub fn is_expired(&self) -> bool {
        self.reason() == UnusableReason::Expired
    }
}

struct DisplayToken<'a>(&'a Option<String>);

impl fmt::Display for DisplayToken<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(token) => f.write_str(token),
            None => f.write_str("unknown"),
        }
    }
}
