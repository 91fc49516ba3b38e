//! Outbound HTTP: rule lookups against the keystore and proxied upstream calls

use crate::error::{GatewayError, Result};
use crate::jwks::Jwks;
use bytes::Bytes;
use serde_json::Value;
use std::time::Duration;
use steer_core::{percent_decode_path, Method};

/// Connection-scoped headers, never passed on in either direction
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Client request headers that go to the upstream
///
/// `host` and `content-length` describe the client's request, not ours;
/// the request ID is set separately.
pub fn forwarded_request_headers(
    headers: &[(String, String)],
) -> impl Iterator<Item = (&str, &str)> {
    headers
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .filter(|(name, _)| {
            !is_hop_by_hop(name)
                && !["host", "content-length", "x-request-id"]
                    .iter()
                    .any(|h| h.eq_ignore_ascii_case(name))
        })
}

/// True if any segment of `key` is `.` or `..`, escaped or not
///
/// URL resolution would collapse those before the keystore sees them.
pub fn has_dot_segment(key: &str) -> bool {
    key.split('/')
        .any(|segment| matches!(percent_decode_path(segment).as_str(), "." | ".."))
}

/// Build the shared connection-pooling client
///
/// Upstreams commonly run with self-signed certificates, so verification
/// is opt-in.
pub fn build_http_client(timeout: Duration, verify_tls: bool) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(!verify_tls)
        .build()
        .map_err(GatewayError::Client)
}

/// Fetch the key set once at startup
pub async fn fetch_jwks(http: &reqwest::Client, url: &str) -> Result<Jwks> {
    let fetch = async {
        http.get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Jwks>()
            .await
    };
    fetch.await.map_err(|source| GatewayError::JwksFetch {
        url: url.to_string(),
        source,
    })
}

/// Response from an upstream service
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct SteerClient {
    http: reqwest::Client,
    backend_url: String,
}

impl SteerClient {
    pub fn new(http: reqwest::Client, backend_url: impl Into<String>) -> Self {
        let backend_url = backend_url.into().trim_end_matches('/').to_string();
        Self { http, backend_url }
    }

    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    pub fn fetchkey_url(&self, key: &str) -> String {
        format!("{}/backend/fetchkey/{}", self.backend_url, key)
    }

    /// Look up the rule for `key`
    ///
    /// `Ok(None)` when the keystore answers anything but 200 or the body
    /// carries no `rule`; `Err` when the keystore cannot be reached or
    /// returns a body that is not JSON.
    pub async fn fetch_rule(
        &self,
        key: &str,
        request_id: Option<&str>,
    ) -> std::result::Result<Option<Value>, reqwest::Error> {
        let mut request = self.http.get(self.fetchkey_url(key));
        if let Some(id) = request_id {
            request = request.header("x-request-id", id);
        }

        let response = request.send().await?;
        if response.status() != reqwest::StatusCode::OK {
            tracing::debug!(key, status = response.status().as_u16(), "keystore has no rule");
            return Ok(None);
        }

        let mut body: Value = response.json().await?;
        Ok(body.get_mut("rule").map(Value::take))
    }

    /// Send a request to an upstream service
    ///
    /// `headers` are the client's request headers; see
    /// [`forwarded_request_headers`] for what is dropped.
    pub async fn forward(
        &self,
        method: Method,
        url: &str,
        body: Bytes,
        headers: &[(String, String)],
        request_id: Option<&str>,
    ) -> std::result::Result<UpstreamResponse, reqwest::Error> {
        let mut request = self.http.request(to_reqwest_method(method), url);
        for (name, value) in forwarded_request_headers(headers) {
            request = request.header(name, value);
        }
        if let Some(id) = request_id {
            request = request.header("x-request-id", id);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| {
                *name != reqwest::header::CONTENT_LENGTH && !is_hop_by_hop(name.as_str())
            })
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Patch => reqwest::Method::PATCH,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
        Method::Connect => reqwest::Method::CONNECT,
        Method::Trace => reqwest::Method::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetchkey_url() {
        let http = build_http_client(Duration::from_secs(1), false).unwrap();
        let client = SteerClient::new(http, "http://backend:5000/");
        assert_eq!(client.backend_url(), "http://backend:5000");
        assert_eq!(
            client.fetchkey_url("api/v1/echo"),
            "http://backend:5000/backend/fetchkey/api/v1/echo"
        );
    }

    #[test]
    fn test_forwarded_request_headers() {
        let headers: Vec<(String, String)> = [
            ("host", "gateway:8080"),
            ("accept", "application/json"),
            ("authorization", "Bearer abc"),
            ("Connection", "keep-alive"),
            ("content-length", "12"),
            ("content-type", "application/json"),
            ("transfer-encoding", "chunked"),
            ("x-request-id", "abc123"),
            ("x-custom", "1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let forwarded: Vec<_> = forwarded_request_headers(&headers).collect();
        assert_eq!(
            forwarded,
            vec![
                ("accept", "application/json"),
                ("authorization", "Bearer abc"),
                ("content-type", "application/json"),
                ("x-custom", "1"),
            ]
        );
    }

    #[test]
    fn test_has_dot_segment() {
        assert!(has_dot_segment("x/../../backend/fetchkey/api"));
        assert!(has_dot_segment("api/./v1"));
        assert!(has_dot_segment("api/%2e%2E/v1"));
        assert!(has_dot_segment(".."));
        assert!(!has_dot_segment("api/v1.2/echo"));
        assert!(!has_dot_segment("api/.hidden/..."));
        assert!(!has_dot_segment("api/v1/"));
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(to_reqwest_method(Method::Patch), reqwest::Method::PATCH);
        assert_eq!(to_reqwest_method(Method::Get).as_str(), Method::Get.as_str());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_an_error() {
        let http = build_http_client(Duration::from_millis(500), false).unwrap();
        // Port 9 (discard) is closed on test hosts
        let client = SteerClient::new(http, "http://127.0.0.1:9");
        assert!(client.fetch_rule("x", None).await.is_err());
    }
}
