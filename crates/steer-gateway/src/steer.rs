//! The steering pipeline
//!
//! Every request, whatever its method or path, goes through:
//! authenticate → look up rule → enabled → authorize → payload → proxy → response.

use crate::client::{has_dot_segment, SteerClient, UpstreamResponse};
use crate::jwt::{Claims, Verifier};
use crate::rule::SteeringRule;
use crate::template;
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use steer_core::{handler, AccessLog, Request, Response, ServerState, StatusCode};

pub struct Gateway {
    verifier: Verifier,
    client: SteerClient,
    roles_claim: String,
}

impl Gateway {
    pub fn new(verifier: Verifier, client: SteerClient, roles_claim: impl Into<String>) -> Self {
        Self {
            verifier,
            client,
            roles_claim: roles_claim.into(),
        }
    }

    pub async fn steer(&self, req: Request) -> Response {
        let request_id = req.request_id.as_deref();

        let claims = match self.authenticate(&req) {
            Ok(claims) => claims,
            Err(res) => return res,
        };

        let key = req.path.trim_start_matches('/');
        if key.is_empty() {
            return not_found();
        }
        if has_dot_segment(key) {
            tracing::info!(key, "dot segment in path");
            return not_found();
        }
        let rule = match self.client.fetch_rule(key, request_id).await {
            Ok(Some(rule)) => SteeringRule::from_value(&rule),
            Ok(None) => {
                tracing::info!(key, "no steering rule");
                return not_found();
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "keystore unavailable");
                return bad_gateway();
            }
        };

        if !rule.enabled {
            tracing::info!(key, "rule is disabled");
            return not_found();
        }

        let roles = claims.roles(&self.roles_claim);
        tracing::debug!(
            method = %req.method,
            required_method = ?rule.method,
            roles = ?roles,
            required_roles = ?rule.roles,
            "checking authorization"
        );
        if !rule.allows_method(req.method.as_str()) || !rule.allows_any_role(&roles) {
            tracing::info!(key, method = %req.method, roles = ?roles, "authorization failed");
            return Response::json_error(StatusCode::FORBIDDEN, "Forbidden");
        }

        let body = match prepare_request_body(&rule, &req.body) {
            Ok(body) => body,
            Err(res) => return res,
        };

        let Some(upstream) = rule.upstream_url.as_deref() else {
            tracing::warn!(key, "rule has no operation.url");
            return bad_gateway();
        };
        let target = match &req.query {
            Some(query) => format!("{upstream}?{query}"),
            None => upstream.to_string(),
        };

        tracing::info!(key, method = %req.method, upstream = %target, "steering request");
        match self
            .client
            .forward(req.method, &target, body, &req.headers, request_id)
            .await
        {
            Ok(reply) => client_response(&rule, reply),
            Err(e) => {
                tracing::warn!(upstream = %target, error = %e, "upstream unavailable");
                bad_gateway()
            }
        }
    }

    fn authenticate(&self, req: &Request) -> Result<Claims, Response> {
        let Some(token) = req.bearer_token() else {
            tracing::debug!("missing bearer token");
            return Err(unauthorized("Missing bearer token"));
        };

        self.verifier.verify(token).map_err(|e| {
            tracing::info!(error = %e, "token rejected");
            unauthorized(&e.to_string())
        })
    }
}

/// Validate and rewrite the client payload
///
/// An empty body passes through untouched.
pub fn prepare_request_body(rule: &SteeringRule, body: &Bytes) -> Result<Bytes, Response> {
    if body.is_empty() {
        return Ok(Bytes::new());
    }

    let mut payload: Value = serde_json::from_slice(body).map_err(|e| {
        tracing::info!(error = %e, "request body is not JSON");
        Response::json_error(StatusCode::BAD_REQUEST, "Invalid JSON payload")
    })?;

    if let Some(template) = &rule.template {
        if let Err(mismatch) = template::check(&payload, template) {
            tracing::info!(%mismatch, "payload does not match template");
            return Err(Response::json_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                &format!("Payload does not match template: {mismatch}"),
            ));
        }
    }

    let Some(transform) = &rule.to_server else {
        return Ok(body.clone());
    };
    transform.apply(&mut payload);
    serde_json::to_vec(&payload).map(Bytes::from).map_err(|e| {
        tracing::error!(error = %e, "failed to serialize rewritten payload");
        Response::internal_error("Internal Server Error")
    })
}

/// Turn an upstream reply into the client response
pub fn client_response(rule: &SteeringRule, reply: UpstreamResponse) -> Response {
    let body = match &rule.to_client {
        Some(transform) if !reply.body.is_empty() => match transform.apply_bytes(&reply.body) {
            Ok(rewritten) => Bytes::from(rewritten),
            Err(e) => {
                tracing::warn!(error = %e, "upstream body is not JSON, passing through");
                reply.body
            }
        },
        _ => reply.body,
    };

    tracing::debug!(status = reply.status, bytes = body.len(), "upstream replied");
    let mut res = Response::new(StatusCode::from(reply.status));
    res.headers.extend(reply.headers);
    res.body = body;
    res
}

/// Route table that steers every request
pub fn build_state(gateway: Arc<Gateway>) -> ServerState {
    let mut state = ServerState::new();
    state.add_middleware(AccessLog::default());
    state.set_fallback(handler(move |req| {
        let gateway = Arc::clone(&gateway);
        async move { gateway.steer(req).await }
    }));
    state
}

fn unauthorized(message: &str) -> Response {
    let mut res = Response::json_error(StatusCode::UNAUTHORIZED, message);
    res.set_header("www-authenticate", "Bearer");
    res
}

fn not_found() -> Response {
    Response::json_error(StatusCode::NOT_FOUND, "Not found")
}

fn bad_gateway() -> Response {
    Response::json_error(StatusCode::BAD_GATEWAY, "Bad gateway")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::build_http_client;
    use crate::jwks::{HmacKey, KeySet};
    use crate::jwt::{sign, Algorithm};
    use serde_json::json;
    use std::time::Duration;
    use steer_core::{Method, RequestBuilder};

    fn key() -> HmacKey {
        HmacKey {
            kid: Some("0001".into()),
            secret: b"fantasticjwt".to_vec(),
        }
    }

    fn gateway(backend: &str) -> Gateway {
        let http = build_http_client(Duration::from_millis(500), false).unwrap();
        Gateway::new(
            Verifier::new(KeySet::new(vec![key()])),
            SteerClient::new(http, backend),
            "roles",
        )
    }

    fn rule(raw: Value) -> SteeringRule {
        SteeringRule::from_value(&raw)
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let res = gateway("http://127.0.0.1:9")
            .steer(RequestBuilder::new(Method::Get, "/api/v1/info").build())
            .await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.header("www-authenticate"), Some("Bearer"));
    }

    #[tokio::test]
    async fn test_bad_token_is_unauthorized() {
        let wrong = HmacKey {
            kid: Some("0001".into()),
            secret: b"not the secret".to_vec(),
        };
        let token = sign(&Claims::new().claim("roles", "guest"), Algorithm::HS256, &wrong).unwrap();
        let req = RequestBuilder::new(Method::Get, "/api/v1/info")
            .header("authorization", format!("Bearer {token}"))
            .build();
        let res = gateway("http://127.0.0.1:9").steer(req).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.body_json().unwrap()["error"], "Invalid signature");
    }

    #[tokio::test]
    async fn test_unreachable_keystore_is_bad_gateway() {
        let token = sign(&Claims::new().claim("roles", "guest"), Algorithm::HS256, &key()).unwrap();
        let req = RequestBuilder::new(Method::Get, "/api/v1/info")
            .header("authorization", format!("Bearer {token}"))
            .build();
        let res = gateway("http://127.0.0.1:9").steer(req).await;
        assert_eq!(res.status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_root_path_is_not_found() {
        let token = sign(&Claims::new(), Algorithm::HS256, &key()).unwrap();
        let req = RequestBuilder::new(Method::Get, "/")
            .header("authorization", format!("Bearer {token}"))
            .build();
        let res = gateway("http://127.0.0.1:9").steer(req).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dot_segments_are_not_found() {
        let token = sign(&Claims::new().claim("roles", "guest"), Algorithm::HS256, &key()).unwrap();
        // The keystore is unreachable, so a 404 means it was never asked
        for path in ["/x/../../backend/fetchkey/api/v1/echo", "/api/%2E%2E/v1/echo"] {
            let req = RequestBuilder::new(Method::Get, path)
                .header("authorization", format!("Bearer {token}"))
                .build();
            let res = gateway("http://127.0.0.1:9").steer(req).await;
            assert_eq!(res.status, StatusCode::NOT_FOUND, "{path}");
        }
    }

    #[test]
    fn test_prepare_body_empty_passes_through() {
        let r = rule(json!({"template": {"name": ""}}));
        assert!(prepare_request_body(&r, &Bytes::new()).unwrap().is_empty());
    }

    #[test]
    fn test_prepare_body_rejects_non_json() {
        let res = prepare_request_body(&rule(json!({})), &Bytes::from_static(b"var=1")).unwrap_err();
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_prepare_body_template_mismatch() {
        let r = rule(json!({"template": {"name": "", "age": 0}}));
        let res = prepare_request_body(&r, &Bytes::from_static(br#"{"name":"bob","age":"x"}"#))
            .unwrap_err();
        assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            res.body_json().unwrap()["error"],
            "Payload does not match template: age: expected number, got string"
        );
    }

    #[test]
    fn test_prepare_body_without_transform_is_verbatim() {
        let raw = Bytes::from_static(b"{ \"name\" : \"bob\" }");
        let out = prepare_request_body(&rule(json!({"template": {"name": ""}})), &raw).unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn test_prepare_body_applies_to_server() {
        let r = rule(json!({"json": {"to_server": {"set": [{"via": "gw"}], "del": ["secret"]}}}));
        let out = prepare_request_body(&r, &Bytes::from_static(br#"{"a":1,"secret":"x"}"#)).unwrap();
        assert_eq!(&out[..], br#"{"a":1,"via":"gw"}"#);
    }

    #[test]
    fn test_client_response_copies_status_and_headers() {
        let reply = UpstreamResponse {
            status: 201,
            headers: vec![
                ("content-type".into(), "application/json".into()),
                ("x-upstream".into(), "1".into()),
            ],
            body: Bytes::from_static(br#"{"id":7,"hostname":"api"}"#),
        };
        let r = rule(json!({"json": {"to_client": {"del": ["hostname"]}}}));
        let res = client_response(&r, reply);
        assert_eq!(res.status, StatusCode::CREATED);
        assert_eq!(res.header("x-upstream"), Some("1"));
        assert_eq!(res.body_string().unwrap(), r#"{"id":7}"#);
    }

    #[test]
    fn test_client_response_non_json_passes_through() {
        let reply = UpstreamResponse {
            status: 500,
            headers: vec![],
            body: Bytes::from_static(b"<html>oops</html>"),
        };
        let r = rule(json!({"json": {"to_client": {"del": ["x"]}}}));
        let res = client_response(&r, reply);
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body_string().unwrap(), "<html>oops</html>");
    }
}
