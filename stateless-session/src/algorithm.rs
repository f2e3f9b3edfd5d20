//! Signing algorithms and the shared signing secret.

use std::{fmt, str::FromStr};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Algorithm used to sign session tokens.
///
/// Only symmetric algorithms are supported, since the same secret both
/// signs and verifies. [SigningAlgorithm::None] produces unsigned tokens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    /// Unsigned tokens with an empty signature segment.
    None,
    /// HMAC using SHA-256.
    HS256,
    /// HMAC using SHA-384.
    HS384,
    /// HMAC using SHA-512.
    #[default]
    HS512,
}

impl SigningAlgorithm {
    /// The JOSE `alg` header value.
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningAlgorithm::None => "none",
            SigningAlgorithm::HS256 => "HS256",
            SigningAlgorithm::HS384 => "HS384",
            SigningAlgorithm::HS512 => "HS512",
        }
    }

    /// Returns true if tokens are signed with this algorithm.
    pub fn is_signed(&self) -> bool {
        !matches!(self, SigningAlgorithm::None)
    }

    /// The matching `jsonwebtoken` algorithm, `None` for unsigned tokens.
    pub(crate) fn jwt_algorithm(&self) -> Option<Algorithm> {
        match self {
            SigningAlgorithm::None => None,
            SigningAlgorithm::HS256 => Some(Algorithm::HS256),
            SigningAlgorithm::HS384 => Some(Algorithm::HS384),
            SigningAlgorithm::HS512 => Some(Algorithm::HS512),
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = UnsupportedAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("none") {
            return Ok(SigningAlgorithm::None);
        }
        match s {
            "HS256" | "hs256" => Ok(SigningAlgorithm::HS256),
            "HS384" | "hs384" => Ok(SigningAlgorithm::HS384),
            "HS512" | "hs512" => Ok(SigningAlgorithm::HS512),
            _ => Err(UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl Serialize for SigningAlgorithm {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SigningAlgorithm {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Algorithm name that is not one of the [SigningAlgorithm]s.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unsupported signing algorithm: {0}")]
pub struct UnsupportedAlgorithm(pub String);

/// Shared HMAC secret used to sign and verify session tokens.
///
/// The secret never shows up in [Debug] output.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    /// Create a secret from raw bytes.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    /// Returns true if the secret has no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(&self.0)
    }

    pub(crate) fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(&self.0)
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningSecret(..)")
    }
}

impl From<&str> for SigningSecret {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

impl From<String> for SigningSecret {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

impl From<Vec<u8>> for SigningSecret {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}
