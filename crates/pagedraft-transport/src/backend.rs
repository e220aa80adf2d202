//! Raw HTTP backend
//!
//! [`HttpBackend`] performs one request and reports the status as-is; it
//! knows nothing about credentials or retries. [`ReqwestBackend`] is the
//! production implementation.

use crate::config::TransportConfig;
use async_trait::async_trait;
use pagedraft_core::{ConfigError, TransportError};
use serde_json::Value;
use std::fmt::Debug;

/// HTTP verb used by the page API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMethod {
    /// Read
    Get,
    /// Full replacement of a section
    Put,
}

/// Outgoing request, path relative to the API origin
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Verb
    pub method: ApiMethod,
    /// Absolute path
    pub path: String,
    /// Extra headers
    pub headers: Vec<(String, String)>,
    /// JSON body
    pub body: Option<Value>,
}

impl ApiRequest {
    /// GET `path`
    #[inline]
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: ApiMethod::Get,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// PUT `body` to `path`
    #[inline]
    #[must_use]
    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: ApiMethod::Put,
            path: path.into(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    /// With header, replacing an existing one of the same name
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Header value by case-insensitive name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response with a decoded body
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status
    pub status: u16,
    /// JSON body; `Null` when empty, a string when not JSON
    pub body: Value,
}

impl ApiResponse {
    /// Create a response
    #[inline]
    #[must_use]
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Check for a 2xx status
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One HTTP round trip
#[async_trait]
pub trait HttpBackend: Send + Sync + Debug {
    /// Perform `request`
    ///
    /// # Errors
    /// `TransportError::Network` when no response was received. Non-success
    /// statuses are returned as responses, not errors.
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// `reqwest` backend with a cookie jar for the session cookie
#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    client: reqwest::Client,
    base_url: reqwest::Url,
    bearer_token: Option<String>,
}

impl ReqwestBackend {
    /// Build a client from configuration
    ///
    /// # Errors
    /// `ConfigError::InvalidValue` for a bad base URL or client settings.
    pub fn new(config: &TransportConfig) -> Result<Self, ConfigError> {
        let base_url =
            reqwest::Url::parse(&config.base_url).map_err(|err| ConfigError::InvalidValue {
                field: "base_url",
                reason: err.to_string(),
            })?;
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout())
            .build()
            .map_err(|err| ConfigError::InvalidValue {
                field: "timeout_secs",
                reason: err.to_string(),
            })?;
        Ok(Self {
            client,
            base_url,
            bearer_token: config.bearer_token.clone(),
        })
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self
            .base_url
            .join(&request.path)
            .map_err(|err| TransportError::Network(format!("bad path {}: {err}", request.path)))?;
        let method = match request.method {
            ApiMethod::Get => reqwest::Method::GET,
            ApiMethod::Put => reqwest::Method::PUT,
        };

        let mut builder = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header("X-Requested-With", "XMLHttpRequest");
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(encode_body(body)?);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;

        Ok(ApiResponse::new(status, decode_body(&bytes)))
    }
}

fn encode_body(body: &Value) -> Result<Vec<u8>, TransportError> {
    Ok(serde_json::to_vec(body)?)
}

fn decode_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn with_header_replaces_case_insensitively() {
        let request = ApiRequest::get("/x")
            .with_header("X-XSRF-TOKEN", "a")
            .with_header("x-xsrf-token", "b");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("X-Xsrf-Token"), Some("b"));
    }

    #[test]
    fn decode_body_variants() {
        assert_eq!(decode_body(b""), Value::Null);
        assert_eq!(decode_body(b"  \n"), Value::Null);
        assert_eq!(decode_body(br#"{"ok":true}"#), json!({"ok": true}));
        assert_eq!(decode_body(b"Page Expired"), json!("Page Expired"));
    }

    #[test]
    fn encode_body_is_compact_json() {
        let bytes = encode_body(&json!({"blocks": [1, 2]})).unwrap();
        assert_eq!(bytes, br#"{"blocks":[1,2]}"#.to_vec());
    }

    #[test]
    fn backend_rejects_bad_base_url() {
        let config = TransportConfig::new("::");
        assert!(ReqwestBackend::new(&config).is_err());
    }

    #[test]
    fn response_success_range() {
        assert!(ApiResponse::new(204, Value::Null).is_success());
        assert!(!ApiResponse::new(419, Value::Null).is_success());
    }
}
