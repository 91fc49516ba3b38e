//! Info and echo routes

use crate::host::{hostname, timestamp};
use serde::Serialize;
use serde_json::Value;
use steer_core::{AccessLog, Method, Request, Response, Result, ServerState, StatusCode};

/// Body of `GET /get_data`
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub timestamp: String,
    pub hostname: String,
}

/// Body of `POST /echo_data`
#[derive(Debug, Serialize)]
pub struct EchoResponse {
    pub payload: Value,
    pub hostname: String,
    pub timestamp: String,
}

pub fn get_data() -> Response {
    let info = InfoResponse {
        timestamp: timestamp(),
        hostname: hostname(),
    };
    Response::json_value(StatusCode::OK, &info)
}

pub fn echo_data(req: &Request) -> Response {
    let echo = EchoResponse {
        payload: echo_payload(req),
        hostname: hostname(),
        timestamp: timestamp(),
    };
    Response::json_value(StatusCode::OK, &echo)
}

/// Parse the request body as JSON regardless of content-type
///
/// Anything that does not parse, and a literal `null`, become `""`.
pub fn echo_payload(req: &Request) -> Value {
    match req.json::<Value>() {
        Ok(Value::Null) => Value::String(String::new()),
        Ok(value) => value,
        Err(e) => {
            if !req.body.is_empty() {
                tracing::debug!(error = %e, "echo body is not JSON");
            }
            Value::String(String::new())
        }
    }
}

pub fn build_state() -> Result<ServerState> {
    let mut state = ServerState::new();
    state.add_middleware(AccessLog::default());

    state.route(Method::Get, "/get_data", |_req| async { get_data() })?;
    state.route(Method::Post, "/echo_data", |req| async move { echo_data(&req) })?;

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use steer_core::RequestBuilder;

    fn payload_of(body: &'static [u8]) -> Value {
        echo_payload(&RequestBuilder::new(Method::Post, "/echo_data").body(body).build())
    }

    #[test]
    fn test_echo_payload() {
        assert_eq!(payload_of(br#"{"var":123}"#), json!({"var": 123}));
        assert_eq!(payload_of(b"[1,2]"), json!([1, 2]));
        assert_eq!(payload_of(b"42"), json!(42));
        assert_eq!(payload_of(b"\"text\""), json!("text"));
        assert_eq!(payload_of(b"false"), json!(false));
    }

    #[test]
    fn test_echo_payload_empty_or_invalid() {
        assert_eq!(payload_of(b""), json!(""));
        assert_eq!(payload_of(b"null"), json!(""));
        assert_eq!(payload_of(b"var=123"), json!(""));
        assert_eq!(payload_of(b"{\"var\":"), json!(""));
    }

    #[test]
    fn test_echo_preserves_field_order() {
        let res = echo_data(
            &RequestBuilder::new(Method::Post, "/echo_data")
                .body(r#"{"z":1,"a":{"y":2,"b":3}}"#)
                .build(),
        );
        let body = res.body_string().unwrap();
        assert!(body.starts_with(r#"{"payload":{"z":1,"a":{"y":2,"b":3}},"hostname":"#));
    }

    #[tokio::test]
    async fn test_routes() {
        let state = build_state().unwrap();

        let res = state
            .handle(RequestBuilder::new(Method::Get, "/get_data").build())
            .await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.content_type(), Some("application/json"));
        let body = res.body_json().unwrap();
        assert_eq!(body["hostname"], json!(hostname()));
        assert!(body["timestamp"].is_string());
        assert_eq!(body.as_object().unwrap().len(), 2);

        let res = state
            .handle(
                RequestBuilder::new(Method::Post, "/echo_data")
                    .header("content-type", "text/plain")
                    .body(r#"{"var":123}"#)
                    .build(),
            )
            .await;
        assert_eq!(res.body_json().unwrap()["payload"], json!({"var": 123}));
    }

    #[tokio::test]
    async fn test_wrong_method_and_unknown_path() {
        let state = build_state().unwrap();

        let res = state
            .handle(RequestBuilder::new(Method::Get, "/echo_data").build())
            .await;
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.header("allow"), Some("POST"));

        let res = state
            .handle(RequestBuilder::new(Method::Get, "/nope").build())
            .await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }
}
