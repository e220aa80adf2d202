//! Credential-aware section transport
//!
//! Every request carries the current anti-forgery token. A response with the
//! configured stale status triggers exactly one credential refresh and one
//! retry of the same request; a second stale response is terminal.
//! Non-stale failures are classified and returned without retrying.

use crate::backend::{ApiRequest, ApiResponse, HttpBackend, ReqwestBackend};
use crate::config::TransportConfig;
use crate::credentials::CredentialCache;
use async_trait::async_trait;
use pagedraft_core::{ConfigError, DocumentId, Section, SectionTransport, TransportError};
use serde_json::Value;
use std::sync::Arc;

/// Status used by the API for field-level validation failures
pub const VALIDATION_STATUS: u16 = 422;

/// [`SectionTransport`] over an [`HttpBackend`] with refresh-and-retry-once
#[derive(Debug, Clone)]
pub struct ResilientTransport {
    config: Arc<TransportConfig>,
    backend: Arc<dyn HttpBackend>,
    credentials: Arc<CredentialCache>,
}

impl ResilientTransport {
    /// Create a transport over `backend`
    #[must_use]
    pub fn new(config: TransportConfig, backend: Arc<dyn HttpBackend>) -> Self {
        let credentials = CredentialCache::new(config.credentials.clone());
        Self {
            config: Arc::new(config),
            backend,
            credentials: Arc::new(credentials),
        }
    }

    /// Create a transport talking to `config.base_url` over HTTP
    ///
    /// # Errors
    /// `ConfigError::InvalidValue` if the configuration fails validation.
    pub fn connect(config: TransportConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let backend = ReqwestBackend::new(&config)?;
        tracing::info!("Page API transport configured for {}", config.base_url);
        Ok(Self::new(config, Arc::new(backend)))
    }

    /// Start from a known anti-forgery token instead of fetching one
    #[must_use]
    pub fn with_token(self, token: impl Into<String>) -> Self {
        let credentials = CredentialCache::new(self.config.credentials.clone()).with_token(token);
        Self {
            credentials: Arc::new(credentials),
            ..self
        }
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Shared credential cache
    #[inline]
    #[must_use]
    pub fn credentials(&self) -> &CredentialCache {
        &self.credentials
    }

    /// Number of credential refresh round trips so far
    #[inline]
    #[must_use]
    pub fn refresh_count(&self) -> usize {
        self.credentials.refresh_count()
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let backend = self.backend.as_ref();
        let credential = self.credentials.current(backend).await?;
        let first = backend
            .execute(
                request
                    .clone()
                    .with_header(self.config.token_header.as_str(), credential.token),
            )
            .await?;
        if first.status != self.config.stale_status {
            return Ok(first);
        }

        tracing::warn!(
            "Stale credential on {} (generation {}), refreshing",
            request.path,
            credential.generation
        );
        let refreshed = self
            .credentials
            .refresh(credential.generation, backend)
            .await?;
        let retry = backend
            .execute(request.with_header(self.config.token_header.as_str(), refreshed.token))
            .await?;
        if retry.status == self.config.stale_status {
            tracing::warn!("Credential still stale after refresh");
            return Err(TransportError::StaleCredential);
        }
        Ok(retry)
    }

    fn unwrap_envelope(&self, body: Value) -> Value {
        match (&self.config.response_envelope, body) {
            (Some(key), Value::Object(mut fields)) if fields.contains_key(key) => {
                fields.remove(key).unwrap_or(Value::Null)
            }
            (_, body) => body,
        }
    }
}

#[async_trait]
impl SectionTransport for ResilientTransport {
    async fn persist(
        &self,
        document: &DocumentId,
        section: Section,
        payload: &Value,
    ) -> Result<(), TransportError> {
        let path = self.config.endpoints.path(section, document);
        tracing::debug!("PUT {path}");
        let response = self.send(ApiRequest::put(path, payload.clone())).await?;
        classify(response).map(|_| ())
    }

    async fn load(&self, document: &DocumentId, section: Section) -> Result<Value, TransportError> {
        let path = self.config.endpoints.path(section, document);
        tracing::debug!("GET {path}");
        let response = self.send(ApiRequest::get(path)).await?;
        classify(response).map(|body| self.unwrap_envelope(body))
    }
}

/// Map a non-stale response onto the transport error taxonomy
fn classify(response: ApiResponse) -> Result<Value, TransportError> {
    if response.is_success() {
        return Ok(response.body);
    }
    let ApiResponse { status, body } = response;
    if status == VALIDATION_STATUS {
        let errors = match body {
            Value::Object(mut fields) if fields.contains_key("errors") => {
                fields.remove("errors").unwrap_or(Value::Null)
            }
            other => other,
        };
        return Err(TransportError::Validation { status, errors });
    }
    let message = match &body {
        Value::Object(fields) => fields
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        Value::String(text) => Some(text.clone()),
        _ => None,
    }
    .unwrap_or_else(|| format!("request failed with status {status}"));
    Err(TransportError::Rejected { status, message })
}
