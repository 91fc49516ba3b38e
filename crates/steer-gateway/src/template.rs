//! Payload template validation
//!
//! A template is an example payload: every key it has must exist in the
//! payload with a value of the same kind. Kinds follow JavaScript's
//! `typeof`, so objects, arrays and `null` are all "object" and integers
//! and floats are both "number". Object and array template values are
//! checked recursively, arrays by index.

use serde_json::Value;

/// Why a payload does not fit its template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateMismatch {
    /// Path to the offending field (e.g. `address.zip`, `tags.0`)
    pub path: String,
    pub message: String,
}

impl TemplateMismatch {
    fn new(path: String, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for TemplateMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Object,
    String,
    Number,
    Boolean,
}

impl Kind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null | Value::Array(_) | Value::Object(_) => Kind::Object,
            Value::String(_) => Kind::String,
            Value::Number(_) => Kind::Number,
            Value::Bool(_) => Kind::Boolean,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Kind::Object => "object",
            Kind::String => "string",
            Kind::Number => "number",
            Kind::Boolean => "boolean",
        }
    }
}

/// Check `payload` against `template`
pub fn check(payload: &Value, template: &Value) -> Result<(), TemplateMismatch> {
    check_at(payload, template, "")
}

fn check_at(payload: &Value, template: &Value, path: &str) -> Result<(), TemplateMismatch> {
    for (key, expected) in entries(template) {
        let field = join(path, &key);

        let Some(actual) = lookup(payload, &key) else {
            return Err(TemplateMismatch::new(field, "missing"));
        };

        let (want, got) = (Kind::of(expected), Kind::of(actual));
        if want != got {
            return Err(TemplateMismatch::new(
                field,
                format!("expected {}, got {}", want.name(), got.name()),
            ));
        }

        if want == Kind::Object {
            check_at(actual, expected, &field)?;
        }
    }
    Ok(())
}

/// Keys of an object, or indices of an array; nothing for anything else
fn entries(template: &Value) -> Vec<(String, &Value)> {
    match template {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Vec::new(),
    }
}

fn lookup<'a>(payload: &'a Value, key: &str) -> Option<&'a Value> {
    match payload {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_matching_payload() {
        let template = json!({"name": "", "age": 0, "active": false});
        let payload = json!({"name": "bob", "age": 31.5, "active": true, "extra": [1]});
        assert_eq!(check(&payload, &template), Ok(()));
    }

    #[test]
    fn test_missing_key() {
        let template = json!({"name": "", "age": 0});
        let err = check(&json!({"name": "bob"}), &template).unwrap_err();
        assert_eq!(err.path, "age");
        assert_eq!(err.message, "missing");
    }

    #[test]
    fn test_wrong_kind() {
        let err = check(&json!({"age": "31"}), &json!({"age": 0})).unwrap_err();
        assert_eq!(err.to_string(), "age: expected number, got string");
    }

    #[test]
    fn test_nested_objects() {
        let template = json!({"address": {"zip": "", "geo": {"lat": 0}}});

        let ok = json!({"address": {"zip": "00100", "geo": {"lat": 41.9, "lon": 12.5}}});
        assert!(check(&ok, &template).is_ok());

        let bad = json!({"address": {"zip": "00100", "geo": {"lat": "north"}}});
        assert_eq!(check(&bad, &template).unwrap_err().path, "address.geo.lat");
    }

    #[test]
    fn test_object_array_and_null_share_a_kind() {
        let template = json!({"data": {}});
        assert!(check(&json!({"data": [1, 2]}), &template).is_ok());
        assert!(check(&json!({"data": null}), &template).is_ok());
        assert!(check(&json!({"data": "x"}), &template).is_err());

        // null template values only check the kind
        assert!(check(&json!({"data": {"a": 1}}), &json!({"data": null})).is_ok());
    }

    #[test]
    fn test_arrays_checked_by_index() {
        let template = json!({"tags": ["", 0]});
        assert!(check(&json!({"tags": ["a", 1, true]}), &template).is_ok());

        let err = check(&json!({"tags": ["a"]}), &template).unwrap_err();
        assert_eq!(err.path, "tags.1");

        let err = check(&json!({"tags": [1, 1]}), &template).unwrap_err();
        assert_eq!(err.path, "tags.0");
    }

    #[test]
    fn test_non_object_payload() {
        let template = json!({"name": ""});
        assert!(check(&json!("bob"), &template).is_err());
        assert!(check(&json!(null), &template).is_err());
        assert!(check(&json!(42), &json!({})).is_ok());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Kind::of(&json!(null)).name(), "object");
        assert_eq!(Kind::of(&json!([])).name(), "object");
        assert_eq!(Kind::of(&json!(1.5)).name(), "number");
        assert_eq!(Kind::of(&json!(true)).name(), "boolean");
    }
}
