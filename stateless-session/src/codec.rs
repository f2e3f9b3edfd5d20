//! Sign and verify session payloads as compact JWTs.
//!
//! The payload is a flat JSON object with fixed short field names, so tokens
//! stay interoperable with tokens already handed out to clients:
//!
//! | field         | meaning                          |
//! |---------------|----------------------------------|
//! | `uid`         | subject id, omitted if anonymous |
//! | `sessionData` | session payload                  |
//! | `userData`    | user payload                     |
//! | `luat`        | last access, epoch ms            |
//! | `lmat`        | last modification, epoch ms      |
//! | `iat`         | creation, epoch ms               |
//!
//! HMAC tokens are handled by `jsonwebtoken`. Unsigned (`none`) tokens are
//! assembled here since `jsonwebtoken` refuses to produce or accept them.

use std::collections::HashSet;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{errors::ErrorKind, Header, Validation};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::algorithm::{SigningAlgorithm, SigningSecret};

/// Wire representation of a session record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Subject id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Session payload.
    #[serde(rename = "sessionData", default, deserialize_with = "object_or_null")]
    pub session_data: Map<String, Value>,
    /// User payload.
    #[serde(rename = "userData", default, deserialize_with = "object_or_null")]
    pub user_data: Map<String, Value>,
    /// Last access timestamp in milliseconds.
    #[serde(default)]
    pub luat: u64,
    /// Last modification timestamp in milliseconds.
    #[serde(default)]
    pub lmat: u64,
    /// Creation timestamp in milliseconds.
    pub iat: u64,
}

fn object_or_null<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Only the part of the JOSE header we care about.
#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

#[derive(Serialize)]
struct UnsignedHeader {
    alg: &'static str,
    typ: &'static str,
}

/// Sign `payload` into a compact token.
///
/// `secret` is ignored for [SigningAlgorithm::None], and required otherwise.
pub fn encode(
    payload: &Payload,
    algorithm: SigningAlgorithm,
    secret: Option<&SigningSecret>,
) -> Result<String, Error> {
    let Some(alg) = algorithm.jwt_algorithm() else {
        return encode_unsigned(payload);
    };

    let secret = signing_secret(secret)?;

    let header = Header::new(alg);
    Ok(jsonwebtoken::encode(
        &header,
        payload,
        &secret.encoding_key(),
    )?)
}

/// Verify `token` and parse its payload.
///
/// The token header must name the configured `algorithm`. A signed token is
/// rejected when `algorithm` is [SigningAlgorithm::None].
pub fn decode(
    token: &str,
    algorithm: SigningAlgorithm,
    secret: Option<&SigningSecret>,
) -> Result<Payload, Error> {
    let segments = split(token)?;

    let header: RawHeader = serde_json::from_slice(&base64_segment(segments[0])?)?;
    if header.alg != algorithm.as_str() {
        return Err(match header.alg.parse::<SigningAlgorithm>() {
            Ok(_) => Error::AlgorithmMismatch {
                expected: algorithm,
                found: header.alg,
            },
            Err(_) => Error::UnsupportedAlgorithm(header.alg),
        });
    }

    let Some(alg) = algorithm.jwt_algorithm() else {
        if !segments[2].is_empty() {
            return Err(Error::Malformed(
                "Unsigned token carries a signature".to_string(),
            ));
        }
        return Ok(serde_json::from_slice(&base64_segment(segments[1])?)?);
    };

    let secret = signing_secret(secret)?;

    let mut validation = Validation::new(alg);
    // Expiry is enforced on the session record, not through registered claims.
    validation.required_spec_claims = HashSet::new();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    let data = jsonwebtoken::decode::<Payload>(token, &secret.decoding_key(), &validation)?;

    Ok(data.claims)
}

/// Short identifier of a token, safe to put in logs and error messages.
///
/// First 16 hex characters of the BLAKE3 hash of the token.
pub fn token_fingerprint(token: &str) -> String {
    let hash = blake3::hash(token.as_bytes());
    hash.to_hex().as_str()[..16].to_string()
}

fn encode_unsigned(payload: &Payload) -> Result<String, Error> {
    let header = UnsignedHeader {
        alg: SigningAlgorithm::None.as_str(),
        typ: "JWT",
    };

    let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload)?);

    Ok(format!("{header}.{payload}."))
}

fn signing_secret(secret: Option<&SigningSecret>) -> Result<&SigningSecret, Error> {
    match secret {
        Some(secret) if !secret.is_empty() => Ok(secret),
        _ => Err(Error::MissingSecret),
    }
}

fn split(token: &str) -> Result<[&str; 3], Error> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None) => Ok([header, payload, signature]),
        _ => Err(Error::Malformed(
            "Expected three dot separated segments".to_string(),
        )),
    }
}

fn base64_segment(segment: &str) -> Result<Vec<u8>, Error> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| Error::Malformed(format!("Invalid base64 segment: {e}")))
}

#[derive(thiserror::Error, Debug)]
/// Error signing or verifying a session token.
pub enum Error {
    #[error("Malformed token: {0}")]
    /// Token structure could not be parsed.
    Malformed(String),
    #[error("Invalid signature")]
    /// Signature did not verify against the configured secret.
    InvalidSignature,
    #[error("Unsupported algorithm: {0}")]
    /// Token header names an algorithm that is not supported at all.
    UnsupportedAlgorithm(String),
    #[error("Algorithm mismatch: expected {expected}, found {found}")]
    /// Token was signed with a supported algorithm other than the configured one.
    AlgorithmMismatch {
        /// Configured algorithm.
        expected: SigningAlgorithm,
        /// Algorithm named in the token header.
        found: String,
    },
    #[error("A signing secret is required for signed tokens")]
    /// No secret was supplied for an HMAC algorithm.
    MissingSecret,
    #[error(transparent)]
    /// Header or payload is not the expected JSON.
    Json(#[from] serde_json::Error),
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        match value.kind() {
            ErrorKind::InvalidSignature => Error::InvalidSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                Error::UnsupportedAlgorithm(value.to_string())
            }
            _ => Error::Malformed(value.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload() -> Payload {
        Payload {
            uid: Some("users/alice".to_string()),
            session_data: json!({ "note": "hi" }).as_object().unwrap().clone(),
            user_data: json!({ "name": "Alice" }).as_object().unwrap().clone(),
            luat: 1_700_000_000_500,
            lmat: 1_700_000_000_250,
            iat: 1_700_000_000_000,
        }
    }

    fn secret() -> SigningSecret {
        SigningSecret::from("a fixed test secret")
    }

    #[test]
    fn sign_verify() {
        for algorithm in [
            SigningAlgorithm::HS256,
            SigningAlgorithm::HS384,
            SigningAlgorithm::HS512,
        ] {
            let token = encode(&payload(), algorithm, Some(&secret())).unwrap();
            let decoded = decode(&token, algorithm, Some(&secret())).unwrap();

            assert_eq!(decoded, payload());
        }
    }

    #[test]
    fn encode_is_deterministic() {
        let a = encode(&payload(), SigningAlgorithm::HS256, Some(&secret())).unwrap();
        let b = encode(&payload(), SigningAlgorithm::HS256, Some(&secret())).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn wire_field_names() {
        let token = encode(&payload(), SigningAlgorithm::HS256, Some(&secret())).unwrap();
        let segment = token.split('.').nth(1).unwrap();
        let json: Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segment).unwrap()).unwrap();

        assert_eq!(
            json,
            json!({
                "uid": "users/alice",
                "sessionData": { "note": "hi" },
                "userData": { "name": "Alice" },
                "luat": 1_700_000_000_500u64,
                "lmat": 1_700_000_000_250u64,
                "iat": 1_700_000_000_000u64,
            })
        );
    }

    #[test]
    fn anonymous_uid_is_omitted() {
        let payload = Payload {
            uid: None,
            ..payload()
        };
        let serialized = serde_json::to_value(&payload).unwrap();

        assert!(serialized.get("uid").is_none());
    }

    #[test]
    fn null_fields_deserialize_to_defaults() {
        let payload: Payload = serde_json::from_value(json!({
            "uid": null,
            "sessionData": null,
            "iat": 42,
        }))
        .unwrap();

        assert_eq!(payload.uid, None);
        assert!(payload.session_data.is_empty());
        assert!(payload.user_data.is_empty());
        assert_eq!(payload.luat, 0);
        assert_eq!(payload.lmat, 0);
        assert_eq!(payload.iat, 42);
    }

    #[test]
    fn tampered_signature() {
        let token = encode(&payload(), SigningAlgorithm::HS256, Some(&secret())).unwrap();

        let signature_start = token.rfind('.').unwrap() + 1;
        let mut bytes = token.into_bytes();
        bytes[signature_start] = if bytes[signature_start] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        let result = decode(&tampered, SigningAlgorithm::HS256, Some(&secret()));

        assert!(matches!(result, Err(Error::InvalidSignature)));
    }

    #[test]
    fn wrong_secret() {
        let token = encode(&payload(), SigningAlgorithm::HS256, Some(&secret())).unwrap();

        let result = decode(
            &token,
            SigningAlgorithm::HS256,
            Some(&SigningSecret::from("another secret")),
        );

        assert!(matches!(result, Err(Error::InvalidSignature)));
    }

    #[test]
    fn missing_secret() {
        let result = encode(&payload(), SigningAlgorithm::HS512, None);
        assert!(matches!(result, Err(Error::MissingSecret)));

        let result = encode(&payload(), SigningAlgorithm::HS512, Some(&SigningSecret::from("")));
        assert!(matches!(result, Err(Error::MissingSecret)));
    }

    #[test]
    fn unsigned_roundtrip() {
        let token = encode(&payload(), SigningAlgorithm::None, None).unwrap();

        assert!(token.ends_with('.'));
        assert_eq!(token.split('.').count(), 3);

        // The secret is ignored for unsigned tokens.
        let decoded = decode(&token, SigningAlgorithm::None, Some(&secret())).unwrap();
        assert_eq!(decoded, payload());
    }

    #[test]
    fn unsigned_token_rejected_when_signing_is_configured() {
        let token = encode(&payload(), SigningAlgorithm::None, None).unwrap();

        let result = decode(&token, SigningAlgorithm::HS256, Some(&secret()));

        assert!(matches!(
            result,
            Err(Error::AlgorithmMismatch { expected: SigningAlgorithm::HS256, ref found }) if found == "none"
        ));
    }

    #[test]
    fn signed_token_rejected_when_unsigned_is_configured() {
        let token = encode(&payload(), SigningAlgorithm::HS256, Some(&secret())).unwrap();

        let result = decode(&token, SigningAlgorithm::None, None);

        assert!(matches!(result, Err(Error::AlgorithmMismatch { .. })));
    }

    #[test]
    fn unsigned_token_with_signature() {
        let token = encode(&payload(), SigningAlgorithm::None, None).unwrap();
        let token = format!("{token}c2lnbmF0dXJl");

        let result = decode(&token, SigningAlgorithm::None, None);

        assert!(matches!(result, Err(Error::Malformed(_))));
    }

    #[test]
    fn unsupported_algorithm() {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(r#"{"iat":1}"#);
        let token = format!("{header}.{body}.c2lnbmF0dXJl");

        let result = decode(&token, SigningAlgorithm::HS256, Some(&secret()));

        assert!(matches!(result, Err(Error::UnsupportedAlgorithm(ref alg)) if alg == "RS256"));
    }

    #[test]
    fn malformed() {
        for token in ["", "abc", "a.b", "a.b.c.d", "!!!.???.sig"] {
            let result = decode(token, SigningAlgorithm::HS256, Some(&secret()));
            assert!(result.is_err(), "{token:?} should not decode");
        }
    }

    #[test]
    fn fingerprint() {
        let fingerprint = token_fingerprint("some.token.value");

        assert_eq!(fingerprint.len(), 16);
        assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fingerprint, token_fingerprint("some.token.value"));
        assert_ne!(fingerprint, token_fingerprint("other.token.value"));
    }
}
