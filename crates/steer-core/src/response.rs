//! HTTP Response types

use serde::Serialize;
use smallvec::SmallVec;

/// HTTP Status Code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode(pub u16);

impl StatusCode {
    // 2xx Success
    pub const OK: StatusCode = StatusCode(200);
    pub const CREATED: StatusCode = StatusCode(201);

    // 4xx Client Errors
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const UNAUTHORIZED: StatusCode = StatusCode(401);
    pub const FORBIDDEN: StatusCode = StatusCode(403);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const METHOD_NOT_ALLOWED: StatusCode = StatusCode(405);
    pub const PAYLOAD_TOO_LARGE: StatusCode = StatusCode(413);
    pub const UNPROCESSABLE_ENTITY: StatusCode = StatusCode(422);

    // 5xx Server Errors
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);
    pub const BAD_GATEWAY: StatusCode = StatusCode(502);

    /// Get the numeric code
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Get the reason phrase
    pub fn reason_phrase(&self) -> &'static str {
        match self.0 {
            200 => "OK",
            201 => "Created",
            204 => "No Content",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            413 => "Payload Too Large",
            422 => "Unprocessable Entity",
            500 => "Internal Server Error",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            _ => "Unknown",
        }
    }

    /// Check if this is a success status (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }

    /// Check if this is a client error status (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.0)
    }

    /// Check if this is a server error status (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.0)
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode(code)
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.0, self.reason_phrase())
    }
}

/// HTTP Response
#[derive(Debug, Clone)]
pub struct Response {
    /// Status code
    pub status: StatusCode,
    /// Response headers
    pub headers: SmallVec<[(String, String); 8]>,
    /// Response body
    pub body: bytes::Bytes,
}

impl Response {
    /// Create a new response
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: SmallVec::new(),
            body: bytes::Bytes::new(),
        }
    }

    /// Create a 200 OK response
    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// Serialize `value` into a JSON response with the given status
    ///
    /// Serialization failures turn into a 500.
    pub fn json_value<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => ResponseBuilder::new(status)
                .header("content-type", "application/json")
                .body(body)
                .build(),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize response body");
                Self::internal_error("Internal Server Error")
            }
        }
    }

    /// JSON error envelope: `{"error": message}`
    pub fn json_error(status: StatusCode, message: &str) -> Self {
        Self::json_value(status, &serde_json::json!({ "error": message }))
    }

    /// Create a text response
    pub fn text(body: impl Into<bytes::Bytes>) -> Self {
        ResponseBuilder::new(StatusCode::OK)
            .header("content-type", "text/plain; charset=utf-8")
            .body(body)
            .build()
    }

    /// Plain-text response with the status reason as body
    pub fn status_text(status: StatusCode) -> Self {
        ResponseBuilder::new(status)
            .header("content-type", "text/plain; charset=utf-8")
            .body(status.reason_phrase())
            .build()
    }

    /// Create a 404 Not Found response
    pub fn not_found() -> Self {
        Self::status_text(StatusCode::NOT_FOUND)
    }

    /// Create a 405 response listing the allowed methods
    pub fn method_not_allowed(allowed: &[String]) -> Self {
        let mut res = Self::status_text(StatusCode::METHOD_NOT_ALLOWED);
        res.headers.push(("allow".to_string(), allowed.join(", ")));
        res
    }

    /// Create a 400 Bad Request response
    pub fn bad_request(message: &str) -> Self {
        ResponseBuilder::new(StatusCode::BAD_REQUEST)
            .header("content-type", "text/plain; charset=utf-8")
            .body(message.to_string())
            .build()
    }

    /// Create a 500 Internal Server Error response
    pub fn internal_error(message: &str) -> Self {
        ResponseBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
            .header("content-type", "text/plain; charset=utf-8")
            .body(message.to_string())
            .build()
    }

    /// Get a header value
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set a header, replacing any existing value
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    /// Get content-type header
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Get body as string (if UTF-8)
    pub fn body_string(&self) -> Option<String> {
        std::str::from_utf8(&self.body).ok().map(|s| s.to_string())
    }

    /// Parse the body as JSON
    pub fn body_json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}

/// Builder for constructing responses
pub struct ResponseBuilder {
    response: Response,
}

impl ResponseBuilder {
    /// Create a new builder
    pub fn new(status: StatusCode) -> Self {
        Self {
            response: Response::new(status),
        }
    }

    /// Set status code
    pub fn status(mut self, status: StatusCode) -> Self {
        self.response.status = status;
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.response.headers.push((name.into(), value.into()));
        self
    }

    /// Set body
    pub fn body(mut self, body: impl Into<bytes::Bytes>) -> Self {
        self.response.body = body.into();
        self
    }

    /// Build the response
    pub fn build(self) -> Response {
        self.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_code() {
        assert!(StatusCode::OK.is_success());
        assert!(StatusCode::NOT_FOUND.is_client_error());
        assert!(StatusCode::BAD_GATEWAY.is_server_error());
        assert_eq!(StatusCode::UNPROCESSABLE_ENTITY.to_string(), "422 Unprocessable Entity");
    }

    #[test]
    fn test_json_value() {
        let res = Response::json_value(StatusCode::OK, &json!({"rules": []}));
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.content_type(), Some("application/json"));
        assert_eq!(res.body_string().unwrap(), r#"{"rules":[]}"#);
    }

    #[test]
    fn test_json_error() {
        let res = Response::json_error(StatusCode::NOT_FOUND, "Not found");
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(res.body_json().unwrap(), json!({"error": "Not found"}));
    }

    #[test]
    fn test_method_not_allowed() {
        let res = Response::method_not_allowed(&["GET".to_string(), "HEAD".to_string()]);
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.header("Allow"), Some("GET, HEAD"));
    }

    #[test]
    fn test_set_header_replaces() {
        let mut res = ResponseBuilder::new(StatusCode::OK)
            .header("X-Request-ID", "a")
            .build();
        res.set_header("x-request-id", "b");
        assert_eq!(res.headers.len(), 1);
        assert_eq!(res.header("x-request-id"), Some("b"));
    }
}
