//! Error types for the editing session
//!
//! Provides error handling for:
//! - Per-section persistence failures (transport)
//! - Failed flushes with partial success
//! - Configuration and preference storage

use crate::types::Section;
use serde_json::Value;

/// Failure of a single persistence or load call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// Credential still stale after the single refresh-and-retry
    #[error("credentials expired and could not be refreshed")]
    StaleCredential,

    /// Server rejected the payload as invalid
    #[error("payload rejected with status {status}: {errors}")]
    Validation {
        /// HTTP status
        status: u16,
        /// Field errors as reported by the server
        errors: Value,
    },

    /// Any other non-success status
    #[error("request rejected with status {status}: {message}")]
    Rejected {
        /// HTTP status
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// Connection or I/O failure
    #[error("network failure: {0}")]
    Network(String),

    /// The credential refresh round trip itself failed
    #[error("credential refresh failed: {0}")]
    CredentialRefresh(String),

    /// Payload could not be encoded or a response could not be decoded
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl TransportError {
    /// Check if this is the terminal stale-credential failure
    #[inline]
    #[must_use]
    pub fn is_stale_credential(&self) -> bool {
        matches!(self, Self::StaleCredential)
    }

    /// Check if a later attempt may succeed without changing the payload
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::StaleCredential | Self::CredentialRefresh(_)
        ) || matches!(self, Self::Rejected { status, .. } if *status >= 500)
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Main session error type
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// At least one section failed to persist during a flush
    #[error("save failed for {}", describe_failures(.failed))]
    SaveFailed {
        /// Sections persisted by the same flush
        saved: Vec<Section>,
        /// Sections that stayed dirty, with the reason
        failed: Vec<(Section, TransportError)>,
    },

    /// Loading a document from the server failed for some sections
    #[error("load failed for {}", describe_failures(.failed))]
    LoadFailed {
        /// Sections that could not be seeded
        failed: Vec<(Section, TransportError)>,
    },

    /// No document has been selected for the session
    #[error("no document selected")]
    NoDocument,

    /// Preference storage failed
    #[error("preference error: {0}")]
    Preference(#[from] PreferenceError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The flush task ended without reporting an outcome
    #[error("flush task aborted: {0}")]
    FlushAborted(String),
}

impl SessionError {
    /// Sections that are still dirty because of this error
    #[must_use]
    pub fn failed_sections(&self) -> Vec<Section> {
        match self {
            Self::SaveFailed { failed, .. } | Self::LoadFailed { failed } => {
                failed.iter().map(|(section, _)| *section).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Check if any failure was the terminal stale-credential kind
    #[inline]
    #[must_use]
    pub fn is_stale_credential(&self) -> bool {
        match self {
            Self::SaveFailed { failed, .. } | Self::LoadFailed { failed } => {
                failed.iter().any(|(_, err)| err.is_stale_credential())
            }
            _ => false,
        }
    }
}

fn describe_failures(failed: &[(Section, TransportError)]) -> String {
    failed
        .iter()
        .map(|(section, err)| format!("{section} ({err})"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// Config path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML was malformed
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Preference storage errors
#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    /// Backing file could not be read or written
    #[error("preference storage I/O: {0}")]
    Io(#[from] std::io::Error),

    /// Stored preferences were not valid JSON
    #[error("preference storage corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_display() {
        let err = TransportError::Rejected {
            status: 403,
            message: "forbidden".to_string(),
        };
        assert!(err.to_string().contains("403"));
    }

    #[test]
    fn transport_error_is_retryable() {
        assert!(TransportError::Network("reset".to_string()).is_retryable());
        assert!(TransportError::Rejected {
            status: 503,
            message: String::new()
        }
        .is_retryable());
        assert!(!TransportError::Validation {
            status: 422,
            errors: Value::Null
        }
        .is_retryable());
        assert!(!TransportError::Rejected {
            status: 404,
            message: String::new()
        }
        .is_retryable());
    }

    #[test]
    fn save_failed_lists_sections() {
        let err = SessionError::SaveFailed {
            saved: vec![Section::Design],
            failed: vec![(Section::Settings, TransportError::StaleCredential)],
        };
        assert_eq!(err.failed_sections(), vec![Section::Settings]);
        assert!(err.is_stale_credential());
        assert!(err.to_string().contains("settings"));
    }

    #[test]
    fn json_errors_become_serialization_failures() {
        let err: TransportError = serde_json::from_str::<Value>("{").unwrap_err().into();
        assert!(matches!(err, TransportError::Serialization(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn no_document_has_no_failed_sections() {
        assert!(SessionError::NoDocument.failed_sections().is_empty());
        assert!(!SessionError::NoDocument.is_stale_credential());
    }
}
