//! Gateway view of a steering rule
//!
//! Rules are opaque JSON objects served by the keystore. The fields the
//! gateway acts on are picked out leniently: anything missing or of the
//! wrong shape is treated as absent rather than rejected.

use crate::transform::JsonTransform;
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SteeringRule {
    pub enabled: bool,
    /// `operation.url`
    pub upstream_url: Option<String>,
    /// `matchRules.method`
    pub method: Option<String>,
    /// `matchRules.roles`
    pub roles: Vec<String>,
    pub template: Option<Value>,
    /// `json.to_server`
    pub to_server: Option<JsonTransform>,
    /// `json.to_client`
    pub to_client: Option<JsonTransform>,
}

impl SteeringRule {
    pub fn from_value(rule: &Value) -> Self {
        Self {
            enabled: !is_disabled(rule.get("enabled")),
            upstream_url: rule
                .pointer("/operation/url")
                .and_then(Value::as_str)
                .map(str::to_string),
            method: rule
                .pointer("/matchRules/method")
                .and_then(Value::as_str)
                .map(str::to_string),
            roles: parse_roles(rule.pointer("/matchRules/roles")),
            template: rule.get("template").cloned(),
            to_server: transform(rule, "/json/to_server"),
            to_client: transform(rule, "/json/to_client"),
        }
    }

    /// Case-insensitive match against `matchRules.method`
    pub fn allows_method(&self, method: &str) -> bool {
        self.method
            .as_deref()
            .is_some_and(|m| m.trim().eq_ignore_ascii_case(method))
    }

    /// True if any of `roles` is listed in `matchRules.roles`
    pub fn allows_any_role(&self, roles: &[String]) -> bool {
        roles.iter().any(|role| self.roles.iter().any(|r| r == role))
    }
}

/// Only the string `"false"` and boolean `false` disable a rule
fn is_disabled(enabled: Option<&Value>) -> bool {
    matches!(enabled, Some(Value::Bool(false))) || matches!(enabled, Some(Value::String(s)) if s == "false")
}

/// Array of strings, or a comma-separated string
fn parse_roles(roles: Option<&Value>) -> Vec<String> {
    match roles {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(list)) => list
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn transform(rule: &Value, pointer: &str) -> Option<JsonTransform> {
    let raw = rule.pointer(pointer)?;
    match serde_json::from_value::<JsonTransform>(raw.clone()) {
        Ok(transform) if transform.is_empty() => None,
        Ok(transform) => Some(transform),
        Err(e) => {
            tracing::warn!(
                uri = ?rule.get("uri"),
                transform = pointer,
                error = %e,
                "ignoring malformed JSON transform"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_rule() -> Value {
        json!({
            "uri": "api/v1/echo",
            "enabled": "true",
            "operation": {"url": "https://apiserver:5000/echo_data"},
            "matchRules": {"method": "POST", "roles": ["guest", "devops"]},
            "template": {"name": "", "age": 0},
            "json": {
                "to_server": {"set": [{"steered": true}], "del": ["age"]},
                "to_client": {"del": ["hostname"]}
            }
        })
    }

    #[test]
    fn test_parse_full_rule() {
        let rule = SteeringRule::from_value(&echo_rule());
        assert!(rule.enabled);
        assert_eq!(rule.upstream_url.as_deref(), Some("https://apiserver:5000/echo_data"));
        assert_eq!(rule.roles, vec!["guest", "devops"]);
        assert_eq!(rule.template, Some(json!({"name": "", "age": 0})));
        assert_eq!(rule.to_server.as_ref().unwrap().del, vec!["age"]);
        assert!(rule.to_client.is_some());
    }

    #[test]
    fn test_enabled_values() {
        for (enabled, expected) in [
            (json!("false"), false),
            (json!(false), false),
            (json!("true"), true),
            (json!(true), true),
            (json!("False"), true),
            (json!(0), true),
            (Value::Null, true),
        ] {
            let rule = SteeringRule::from_value(&json!({"uri": "x", "enabled": enabled}));
            assert_eq!(rule.enabled, expected, "enabled = {enabled}");
        }
        assert!(SteeringRule::from_value(&json!({"uri": "x"})).enabled);
    }

    #[test]
    fn test_method_match() {
        let rule = SteeringRule::from_value(&echo_rule());
        assert!(rule.allows_method("POST"));
        assert!(rule.allows_method("post"));
        assert!(!rule.allows_method("GET"));
        assert!(!SteeringRule::default().allows_method("GET"));
    }

    #[test]
    fn test_role_match() {
        let rule = SteeringRule::from_value(&echo_rule());
        assert!(rule.allows_any_role(&["guest".into()]));
        assert!(rule.allows_any_role(&["nobody".into(), "devops".into()]));
        assert!(!rule.allows_any_role(&["Guest".into()]));
        assert!(!rule.allows_any_role(&[]));
    }

    #[test]
    fn test_roles_as_comma_separated_string() {
        let rule = SteeringRule::from_value(&json!({
            "matchRules": {"method": "GET", "roles": "guest, admin,,"}
        }));
        assert_eq!(rule.roles, vec!["guest", "admin"]);
    }

    #[test]
    fn test_malformed_fields_are_absent() {
        let rule = SteeringRule::from_value(&json!({
            "uri": 3,
            "operation": "https://nowhere",
            "matchRules": {"method": ["GET"], "roles": 5},
            "json": {"to_server": {"set": "oops"}}
        }));
        assert_eq!(rule.upstream_url, None);
        assert_eq!(rule.method, None);
        assert!(rule.roles.is_empty());
        assert_eq!(rule.to_server, None);
    }

    #[test]
    fn test_empty_transform_is_absent() {
        let rule = SteeringRule::from_value(&json!({
            "json": {"to_server": {}, "to_client": {"set": [], "del": []}}
        }));
        assert_eq!(rule.to_server, None);
        assert_eq!(rule.to_client, None);
    }
}
