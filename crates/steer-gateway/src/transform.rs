//! JSON payload rewriting
//!
//! ```json
//! {"set": [{"<key>": <value>}], "del": ["<key>"]}
//! ```
//!
//! `set` entries are applied in order, then `del`. Only top-level keys of
//! an object payload are touched; any other payload is left unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonTransform {
    #[serde(default)]
    pub set: Vec<Map<String, Value>>,
    #[serde(default)]
    pub del: Vec<String>,
}

impl JsonTransform {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.del.is_empty()
    }

    pub fn apply(&self, payload: &mut Value) {
        let Value::Object(object) = payload else {
            tracing::debug!("payload is not an object, transform skipped");
            return;
        };

        for entry in &self.set {
            for (key, value) in entry {
                tracing::debug!(key = %key, "set");
                object.insert(key.clone(), value.clone());
            }
        }
        for key in &self.del {
            tracing::debug!(key = %key, "del");
            object.shift_remove(key);
        }
    }

    /// Apply to a raw JSON body, returning the re-serialized body
    pub fn apply_bytes(&self, body: &[u8]) -> serde_json::Result<Vec<u8>> {
        let mut payload: Value = serde_json::from_slice(body)?;
        self.apply(&mut payload);
        serde_json::to_vec(&payload)
    }
}
