//! Steering rules loaded from the rules file
//!
//! A rule is an arbitrary JSON object keyed by its `uri` field. The set is
//! read once at startup and never changes; handlers share it behind an
//! `Arc`.

use crate::error::{KeystoreError, Result};
use serde_json::Value;
use std::path::Path;

/// Name of the field rules are looked up by
pub const URI_FIELD: &str = "uri";

/// Immutable, ordered list of rules
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<Value>,
}

impl RuleSet {
    /// Build from already-parsed rules, keeping their order
    pub fn new(rules: Vec<Value>) -> Self {
        let skipped = rules.iter().filter(|r| rule_uri(r).is_none()).count();
        if skipped > 0 {
            tracing::warn!(
                skipped,
                "rules without a string \"uri\" field are kept but can never match"
            );
        }
        Self { rules }
    }

    /// Read and parse a rules file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|source| KeystoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let set = Self::from_slice(&raw)?;
        tracing::info!(path = %path.display(), rules = set.len(), "loaded rules");
        Ok(set)
    }

    /// Parse a JSON array of rules
    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        match serde_json::from_slice(raw)? {
            Value::Array(rules) => Ok(Self::new(rules)),
            other => Err(KeystoreError::NotAnArray(json_kind(&other))),
        }
    }

    /// First rule whose `uri` equals `uri` exactly
    ///
    /// Comparison is case-sensitive with no normalization. When several
    /// rules share a uri the earliest one in the file wins.
    pub fn find(&self, uri: &str) -> Option<&Value> {
        self.rules.iter().find(|rule| rule_uri(rule) == Some(uri))
    }

    /// All rules, in file order
    pub fn all(&self) -> &[Value] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn rule_uri(rule: &Value) -> Option<&str> {
    rule.get(URI_FIELD).and_then(Value::as_str)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
