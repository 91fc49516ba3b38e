//! JWT (JSON Web Token) verification
//!
//! Supports HS256, HS384, HS512 signing algorithms. Keys come from a
//! [`KeySet`] and are selected by the token's `kid` header when present.

use crate::jwks::{HmacKey, KeySet};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::hmac;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// JWT Algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    HS256,
    HS384,
    HS512,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::HS256 => "HS256",
            Algorithm::HS384 => "HS384",
            Algorithm::HS512 => "HS512",
        }
    }

    fn from_name(s: &str) -> Option<Self> {
        match s {
            "HS256" => Some(Algorithm::HS256),
            "HS384" => Some(Algorithm::HS384),
            "HS512" => Some(Algorithm::HS512),
            _ => None,
        }
    }

    fn hmac(&self) -> hmac::Algorithm {
        match self {
            Algorithm::HS256 => hmac::HMAC_SHA256,
            Algorithm::HS384 => hmac::HMAC_SHA384,
            Algorithm::HS512 => hmac::HMAC_SHA512,
        }
    }
}

/// JOSE header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

/// JWT Claims
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Expiration time (Unix timestamp)
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub exp: Option<u64>,
    /// Not before (Unix timestamp)
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub nbf: Option<u64>,
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub iat: Option<u64>,
    /// Everything else, roles included
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sub(mut self, sub: impl Into<String>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    pub fn exp(mut self, exp: u64) -> Self {
        self.exp = Some(exp);
        self
    }

    pub fn exp_in(mut self, seconds: u64) -> Self {
        self.exp = Some(now_secs() + seconds);
        self
    }

    pub fn nbf(mut self, nbf: u64) -> Self {
        self.nbf = Some(nbf);
        self
    }

    pub fn iat_now(mut self) -> Self {
        self.iat = Some(now_secs());
        self
    }

    pub fn claim(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    /// Roles carried in `claim`
    ///
    /// A string claim is one role; an array contributes each of its string
    /// elements.
    pub fn roles(&self, claim: &str) -> Vec<String> {
        match self.custom.get(claim) {
            Some(Value::String(role)) => vec![role.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// JWT Error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JwtError {
    #[error("Invalid token format")]
    InvalidFormat,
    #[error("Unsupported algorithm")]
    UnsupportedAlgorithm,
    #[error("No key matches the token")]
    UnknownKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid claims")]
    InvalidClaims,
    #[error("Token expired")]
    Expired,
    #[error("Token not yet valid")]
    NotYetValid,
}

/// Token verifier over a fixed key set
#[derive(Debug, Clone)]
pub struct Verifier {
    keys: KeySet,
    /// Seconds of leeway for exp/nbf
    leeway: u64,
}

impl Verifier {
    pub fn new(keys: KeySet) -> Self {
        Self { keys, leeway: 0 }
    }

    pub fn leeway(mut self, seconds: u64) -> Self {
        self.leeway = seconds;
        self
    }

    /// Decode and verify a compact JWS
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        self.verify_at(token, now_secs())
    }

    /// Verify as if the current time were `now`
    pub fn verify_at(&self, token: &str, now: u64) -> Result<Claims, JwtError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(JwtError::InvalidFormat);
        };

        let header: Header = decode_json(header_b64).ok_or(JwtError::InvalidFormat)?;
        let alg = Algorithm::from_name(&header.alg).ok_or(JwtError::UnsupportedAlgorithm)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| JwtError::InvalidFormat)?;

        let message = &token[..header_b64.len() + 1 + claims_b64.len()];
        let mut candidates = self.keys.candidates(header.kid.as_deref()).peekable();
        if candidates.peek().is_none() {
            return Err(JwtError::UnknownKey);
        }
        let verified = candidates.any(|key| {
            let key = hmac::Key::new(alg.hmac(), &key.secret);
            hmac::verify(&key, message.as_bytes(), &signature).is_ok()
        });
        if !verified {
            return Err(JwtError::InvalidSignature);
        }

        let claims: Claims = decode_json(claims_b64).ok_or(JwtError::InvalidClaims)?;

        if let Some(exp) = claims.exp {
            if now > exp.saturating_add(self.leeway) {
                return Err(JwtError::Expired);
            }
        }
        if let Some(nbf) = claims.nbf {
            if now.saturating_add(self.leeway) < nbf {
                return Err(JwtError::NotYetValid);
            }
        }

        Ok(claims)
    }
}

/// Encode and sign claims
pub fn sign(claims: &Claims, alg: Algorithm, key: &HmacKey) -> Result<String, JwtError> {
    let header = Header {
        alg: alg.as_str().to_string(),
        typ: Some("JWT".to_string()),
        kid: key.kid.clone(),
    };
    let header_json = serde_json::to_vec(&header).map_err(|_| JwtError::InvalidFormat)?;
    let claims_json = serde_json::to_vec(claims).map_err(|_| JwtError::InvalidClaims)?;

    let message = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(claims_json)
    );
    let tag = hmac::sign(&hmac::Key::new(alg.hmac(), &key.secret), message.as_bytes());
    Ok(format!("{}.{}", message, URL_SAFE_NO_PAD.encode(tag.as_ref())))
}

/// NumericDate in whole or fractional seconds, truncated to whole seconds
fn numeric_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let Some(number) = Option::<serde_json::Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    number
        .as_u64()
        .or_else(|| {
            number
                .as_f64()
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(|secs| secs as u64)
        })
        .map(Some)
        .ok_or_else(|| de::Error::custom(format!("invalid NumericDate: {number}")))
}

fn decode_json<T: serde::de::DeserializeOwned>(segment: &str) -> Option<T> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(kid: &str, secret: &[u8]) -> HmacKey {
        HmacKey {
            kid: Some(kid.to_string()),
            secret: secret.to_vec(),
        }
    }

    fn verifier() -> Verifier {
        Verifier::new(KeySet::new(vec![
            key("0001", b"fantasticjwt"),
            key("0002", b"another secret"),
        ]))
    }

    #[test]
    fn test_jwt_sign_verify() {
        let claims = Claims::new()
            .sub("user123")
            .claim("roles", "guest")
            .exp_in(3600)
            .iat_now();

        for alg in [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512] {
            let token = sign(&claims, alg, &key("0001", b"fantasticjwt")).unwrap();
            let decoded = verifier().verify(&token).unwrap();
            assert_eq!(decoded.sub.as_deref(), Some("user123"));
            assert_eq!(decoded.roles("roles"), vec!["guest".to_string()]);
        }
    }

    #[test]
    fn test_jwt_kid_selects_key() {
        let claims = Claims::new().sub("user");
        // Signed with 0001's secret but claiming kid 0002
        let token = sign(&claims, Algorithm::HS256, &key("0002", b"fantasticjwt")).unwrap();
        assert_eq!(verifier().verify(&token), Err(JwtError::InvalidSignature));

        let token = sign(&claims, Algorithm::HS256, &key("0009", b"fantasticjwt")).unwrap();
        assert_eq!(verifier().verify(&token), Err(JwtError::UnknownKey));
    }

    #[test]
    fn test_jwt_without_kid_tries_every_key() {
        let claims = Claims::new().sub("user");
        let anonymous = HmacKey {
            kid: None,
            secret: b"another secret".to_vec(),
        };
        let token = sign(&claims, Algorithm::HS256, &anonymous).unwrap();
        assert!(verifier().verify(&token).is_ok());
    }

    #[test]
    fn test_jwt_invalid_signature() {
        let claims = Claims::new().sub("user");
        let token = sign(&claims, Algorithm::HS256, &key("0001", b"wrong")).unwrap();
        assert_eq!(verifier().verify(&token), Err(JwtError::InvalidSignature));
    }

    #[test]
    fn test_jwt_tampered_claims() {
        let token = sign(&Claims::new().sub("user"), Algorithm::HS256, &key("0001", b"fantasticjwt")).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(br#"{"sub":"admin"}"#);
        let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);
        assert_eq!(verifier().verify(&tampered), Err(JwtError::InvalidSignature));
    }

    #[test]
    fn test_jwt_malformed() {
        let v = verifier();
        assert_eq!(v.verify(""), Err(JwtError::InvalidFormat));
        assert_eq!(v.verify("a.b"), Err(JwtError::InvalidFormat));
        assert_eq!(v.verify("a.b.c.d"), Err(JwtError::InvalidFormat));
        assert_eq!(v.verify("!!.b.c"), Err(JwtError::InvalidFormat));

        let none_header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let token = format!("{none_header}.e30.");
        assert_eq!(v.verify(&token), Err(JwtError::UnsupportedAlgorithm));
    }

    #[test]
    fn test_jwt_expiry_with_leeway() {
        let k = key("0001", b"fantasticjwt");
        let token = sign(&Claims::new().exp(1_000), Algorithm::HS256, &k).unwrap();

        assert!(verifier().verify_at(&token, 1_000).is_ok());
        assert_eq!(verifier().verify_at(&token, 1_001), Err(JwtError::Expired));
        assert!(verifier().leeway(30).verify_at(&token, 1_030).is_ok());
    }

    #[test]
    fn test_jwt_fractional_dates() {
        let k = key("0001", b"fantasticjwt");
        let claims = Claims::new()
            .claim("exp", 1_700_000_000.75)
            .claim("nbf", 1.6e9)
            .claim("iat", 1.6e9);
        let token = sign(&claims, Algorithm::HS256, &k).unwrap();

        let verified = verifier().verify_at(&token, 1_650_000_000).unwrap();
        assert_eq!(verified.exp, Some(1_700_000_000));
        assert_eq!(verified.nbf, Some(1_600_000_000));
        assert_eq!(verified.iat, Some(1_600_000_000));
        assert!(verified.custom.is_empty());
        assert_eq!(
            verifier().verify_at(&token, 1_700_000_001),
            Err(JwtError::Expired)
        );
    }

    #[test]
    fn test_jwt_negative_date_is_invalid() {
        let k = key("0001", b"fantasticjwt");
        let token = sign(&Claims::new().claim("exp", -5), Algorithm::HS256, &k).unwrap();
        assert_eq!(verifier().verify_at(&token, 0), Err(JwtError::InvalidClaims));
    }

    #[test]
    fn test_jwt_not_before() {
        let k = key("0001", b"fantasticjwt");
        let token = sign(&Claims::new().nbf(2_000), Algorithm::HS256, &k).unwrap();

        assert_eq!(verifier().verify_at(&token, 1_999), Err(JwtError::NotYetValid));
        assert!(verifier().verify_at(&token, 2_000).is_ok());
        assert!(verifier().leeway(5).verify_at(&token, 1_995).is_ok());
    }

    #[test]
    fn test_roles_claim_shapes() {
        let claims = Claims::new()
            .claim("roles", json!(["guest", 7, "admin"]))
            .claim("group", "ops")
            .claim("level", 3);
        assert_eq!(claims.roles("roles"), vec!["guest", "admin"]);
        assert_eq!(claims.roles("group"), vec!["ops"]);
        assert!(claims.roles("level").is_empty());
        assert!(claims.roles("missing").is_empty());
    }
}
