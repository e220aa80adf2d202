//! Transport configuration
//!
//! Endpoint templates and credential settings for the page API.

use pagedraft_core::config::DOCUMENT_PLACEHOLDER;
use pagedraft_core::{ConfigError, DocumentId, Section};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Status the server uses for an expired anti-forgery/session token
pub const STALE_CREDENTIAL_STATUS: u16 = 419;

/// Per-section persistence endpoints; `{document}` is substituted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionEndpoints {
    /// Content blocks
    pub content_blocks: String,
    /// Social links
    pub social_links: String,
    /// Design
    pub design: String,
    /// Settings
    pub settings: String,
}

impl SectionEndpoints {
    /// Resolve the path for `section` of `document`
    #[must_use]
    pub fn path(&self, section: Section, document: &DocumentId) -> String {
        let template = match section {
            Section::ContentBlocks => &self.content_blocks,
            Section::SocialLinks => &self.social_links,
            Section::Design => &self.design,
            Section::Settings => &self.settings,
        };
        template.replace(DOCUMENT_PLACEHOLDER, document.as_str())
    }

    fn templates(&self) -> [(&'static str, &String); 4] {
        [
            ("endpoints.content_blocks", &self.content_blocks),
            ("endpoints.social_links", &self.social_links),
            ("endpoints.design", &self.design),
            ("endpoints.settings", &self.settings),
        ]
    }
}

impl Default for SectionEndpoints {
    fn default() -> Self {
        Self {
            content_blocks: "/api/pages/{document}/blocks".to_string(),
            social_links: "/api/pages/{document}/socials".to_string(),
            design: "/api/pages/{document}/design".to_string(),
            settings: "/api/pages/{document}/settings".to_string(),
        }
    }
}

/// Credential refresh endpoint pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialEndpoints {
    /// Establishes a fresh session cookie
    pub session_path: String,
    /// Returns `{"token": "..."}` for the anti-forgery header
    pub token_path: String,
}

impl Default for CredentialEndpoints {
    fn default() -> Self {
        Self {
            session_path: "/sanctum/csrf-cookie".to_string(),
            token_path: "/api/csrf-token".to_string(),
        }
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Origin of the page API, without a path
    ///
    /// Endpoints are absolute paths and replace any path on the base URL.
    pub base_url: String,
    /// Per-section endpoints
    pub endpoints: SectionEndpoints,
    /// Credential refresh endpoints
    pub credentials: CredentialEndpoints,
    /// Header carrying the anti-forgery token
    pub token_header: String,
    /// Optional bearer token for API clients
    pub bearer_token: Option<String>,
    /// Status signalling a stale credential
    pub stale_status: u16,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Key wrapping loaded payloads (`{"data": ...}`), if the API uses one
    pub response_envelope: Option<String>,
}

impl TransportConfig {
    /// Create configuration for `base_url` with default endpoints
    #[inline]
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// With bearer token
    #[inline]
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// With endpoints
    #[inline]
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: SectionEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Request timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check invariants
    ///
    /// # Errors
    /// `ConfigError::InvalidValue` for a malformed base URL or one with a
    /// path, a relative endpoint, an empty token header, or a success status
    /// used as the stale status.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = reqwest::Url::parse(&self.base_url).map_err(|err| ConfigError::InvalidValue {
            field: "base_url",
            reason: err.to_string(),
        })?;
        if base.path() != "/" {
            return Err(ConfigError::InvalidValue {
                field: "base_url",
                reason: format!("'{}' must be an origin without a path", self.base_url),
            });
        }
        for (field, template) in self.endpoints.templates() {
            if !template.starts_with('/') {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("'{template}' must start with '/'"),
                });
            }
        }
        if self.token_header.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "token_header",
                reason: "must not be empty".to_string(),
            });
        }
        if (200..300).contains(&self.stale_status) {
            return Err(ConfigError::InvalidValue {
                field: "stale_status",
                reason: format!("{} is a success status", self.stale_status),
            });
        }
        Ok(())
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            endpoints: SectionEndpoints::default(),
            credentials: CredentialEndpoints::default(),
            token_header: "X-XSRF-TOKEN".to_string(),
            bearer_token: None,
            stale_status: STALE_CREDENTIAL_STATUS,
            timeout_secs: 30,
            response_envelope: None,
        }
    }
}
