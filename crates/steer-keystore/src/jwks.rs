//! JSON Web Key Set served at `/jwks.json`

use serde::{Deserialize, Serialize};

/// A single JSON Web Key
///
/// Only symmetric (`oct`) keys are served, so `k` carries the base64url
/// secret. Field order matches what clients have always received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub k: String,
    pub kty: String,
    pub kid: String,
}

/// A JSON Web Key Set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// The fixed HMAC key set
pub fn static_jwks() -> Jwks {
    Jwks {
        keys: vec![Jwk {
            k: "ZmFudGFzdGljand0".to_string(),
            kty: "oct".to_string(),
            kid: "0001".to_string(),
        }],
    }
}
