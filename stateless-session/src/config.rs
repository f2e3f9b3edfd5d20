//! Session configuration.
//!
//! [SessionConfig] is what the [SessionManager](crate::SessionManager) consumes.
//! It is either built in code, or read from a TOML file through [ConfigToml].

use serde::{Deserialize, Serialize};
use std::{fmt::Debug, str::FromStr, time::Duration};

use crate::{
    algorithm::{SigningAlgorithm, SigningSecret},
    record::TtlBasis,
};

/// Environment variable that overrides `session.jwt_secret`.
pub const SECRET_ENV_VAR: &str = "STATELESS_SESSION_JWT_SECRET";

/// Signing and expiry settings, constant for the lifetime of a process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    algorithm: SigningAlgorithm,
    secret: Option<SigningSecret>,
    time_to_live: Duration,
    ttl_basis: Option<TtlBasis>,
}

impl SessionConfig {
    /// Create a config that never expires sessions.
    pub fn new(algorithm: SigningAlgorithm, secret: Option<SigningSecret>) -> Self {
        Self {
            algorithm,
            secret,
            time_to_live: Duration::ZERO,
            ttl_basis: None,
        }
    }

    /// Unsigned tokens. Only use this if tokens never leave a trusted boundary.
    pub fn unsigned() -> Self {
        Self::new(SigningAlgorithm::None, None)
    }

    /// Set the session time-to-live. [Duration::ZERO] disables expiry.
    pub fn with_time_to_live(mut self, time_to_live: Duration) -> Self {
        self.time_to_live = time_to_live;
        self
    }

    /// Set the record timestamp expiry is measured from.
    pub fn with_ttl_basis(mut self, ttl_basis: Option<TtlBasis>) -> Self {
        self.ttl_basis = ttl_basis;
        self
    }

    // === Getters ===

    /// Signing algorithm.
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// Signing secret, always `None` for unsigned tokens.
    pub fn secret(&self) -> Option<&SigningSecret> {
        if self.algorithm.is_signed() {
            self.secret.as_ref()
        } else {
            None
        }
    }

    /// Session time-to-live. Zero means sessions never expire.
    pub fn time_to_live(&self) -> Duration {
        self.time_to_live
    }

    /// Configured expiry reference, if any.
    pub fn ttl_basis(&self) -> Option<TtlBasis> {
        self.ttl_basis
    }

    /// Check the settings are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.algorithm.is_signed() && self.secret.as_ref().is_none_or(|s| s.is_empty()) {
            return Err(ConfigError::MissingSecret(self.algorithm));
        }
        if !self.algorithm.is_signed() && self.secret.is_some() {
            tracing::warn!("jwt_secret is ignored because jwt_algorithm is \"none\"");
        }
        Ok(())
    }
}

/// The configuration can't be used to sign tokens.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A signed algorithm without a secret.
    #[error("jwt_algorithm {0} requires a non-empty jwt_secret")]
    MissingSecret(SigningAlgorithm),
}

/// Session settings as they appear in the config file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
struct SessionToml {
    #[serde(default)]
    jwt_algorithm: SigningAlgorithm,

    #[serde(default)]
    jwt_secret: Option<String>,

    /// Milliseconds, 0 disables expiry.
    #[serde(default)]
    time_to_live: u64,

    #[serde(default)]
    ttl_basis: Option<TtlBasis>,
}

/// Log filter settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LoggingToml {
    /// Default log level.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Extra `target=level` directives.
    #[serde(default)]
    pub module_levels: Vec<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Failure to load a session config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigReadError {
    /// The file could not be read.
    #[error("Config file not found. {0}")]
    ConfigFileNotFound(#[from] std::io::Error),
    /// The file is not valid TOML, or has unknown algorithm or ttl basis names.
    #[error("Config file is not valid. {0}")]
    ConfigFileNotValid(#[from] toml::de::Error),
}

/// The config file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ConfigToml {
    #[serde(default)]
    session: SessionToml,

    /// Logging, left to the embedding application when missing.
    #[serde(default)]
    pub logging: Option<LoggingToml>,
}

impl ConfigToml {
    /// Read and parse a TOML config file.
    ///
    /// Only the file format is checked here, [ConfigToml::session_config]
    /// validates the signing settings.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigReadError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ConfigToml = ConfigToml::try_from(&contents)?;
        Ok(config)
    }

    /// Returns the default config including comments as a string.
    pub fn default_string() -> &'static str {
        DEFAULT_CONFIG
    }

    /// Build the [SessionConfig], applying the [SECRET_ENV_VAR] override.
    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        let session = &self.session;

        let secret = match std::env::var(SECRET_ENV_VAR) {
            Ok(secret) if !secret.is_empty() => Some(secret),
            _ => session.jwt_secret.clone(),
        };

        let config = SessionConfig::new(session.jwt_algorithm, secret.map(SigningSecret::from))
            .with_time_to_live(Duration::from_millis(session.time_to_live))
            .with_ttl_basis(session.ttl_basis);
        config.validate()?;

        Ok(config)
    }
}

impl FromStr for ConfigToml {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: ConfigToml = toml::from_str(s)?;
        Ok(config)
    }
}

impl TryFrom<&str> for ConfigToml {
    type Error = toml::de::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let config: ConfigToml = toml::from_str(value)?;
        Ok(config)
    }
}

impl TryFrom<&String> for ConfigToml {
    type Error = toml::de::Error;

    fn try_from(value: &String) -> Result<Self, Self::Error> {
        let config: ConfigToml = toml::from_str(value)?;
        Ok(config)
    }
}

/// Default config file, with comments.
pub const DEFAULT_CONFIG: &str = r#"
[session]
# Algorithm used to sign tokens: "HS256", "HS384", "HS512" or "none".
#
# "none" issues unsigned tokens that anyone can forge. Only use it
# when tokens never leave a trusted boundary.
jwt_algorithm = "HS512"

# Shared secret used to sign and verify tokens.
# Can be overridden with the STATELESS_SESSION_JWT_SECRET environment variable.
jwt_secret = "change-me"

# Session lifetime in milliseconds. 0 disables expiry.
time_to_live = 0

# Timestamp the lifetime is measured from:
# "createdAt", "lastAccessAt" or "lastModifiedAt".
# Falls back to "createdAt" if the timestamp is missing on a session.
ttl_basis = "createdAt"

[logging]
level = "info"
module_levels = ["stateless_session=info"]
"#;
