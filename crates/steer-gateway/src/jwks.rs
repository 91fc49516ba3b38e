//! JSON Web Key Sets
//!
//! Only symmetric `oct` keys are usable; everything else in the set is
//! skipped with a warning.

use crate::error::{GatewayError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub k: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// A decoded HMAC secret
#[derive(Clone)]
pub struct HmacKey {
    pub kid: Option<String>,
    pub secret: Vec<u8>,
}

impl std::fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacKey")
            .field("kid", &self.kid)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Verification keys, in JWKS order
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: Vec<HmacKey>,
}

impl KeySet {
    pub fn new(keys: Vec<HmacKey>) -> Self {
        Self { keys }
    }

    /// Keep the `oct` keys of a JWKS, decoding their secrets
    pub fn from_jwks(jwks: &Jwks) -> Result<Self> {
        let mut keys = Vec::new();
        for jwk in &jwks.keys {
            if jwk.kty != "oct" {
                tracing::warn!(kid = ?jwk.kid, kty = %jwk.kty, "skipping non-HMAC key");
                continue;
            }
            let Some(k) = jwk.k.as_deref() else {
                tracing::warn!(kid = ?jwk.kid, "skipping oct key without \"k\"");
                continue;
            };
            match decode_secret(k) {
                Some(secret) => keys.push(HmacKey {
                    kid: jwk.kid.clone(),
                    secret,
                }),
                None => tracing::warn!(kid = ?jwk.kid, "skipping key with invalid base64url secret"),
            }
        }

        if keys.is_empty() {
            return Err(GatewayError::NoKeys);
        }
        Ok(Self { keys })
    }

    /// Candidate keys for a token
    ///
    /// With a `kid` only keys carrying that id qualify; without one every
    /// key is tried.
    pub fn candidates<'a>(&'a self, kid: Option<&'a str>) -> impl Iterator<Item = &'a HmacKey> + 'a {
        self.keys
            .iter()
            .filter(move |key| kid.is_none() || key.kid.as_deref() == kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// base64url, tolerating trailing padding
fn decode_secret(k: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(k.trim_end_matches('=')).ok()
}
