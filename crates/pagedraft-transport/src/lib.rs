//! pagedraft Transport - HTTP persistence for editing sessions
//!
//! Implements [`pagedraft_core::SectionTransport`] against the page API:
//! - One endpoint per section, `{document}` substituted from configuration
//! - Anti-forgery token attached to every request
//! - A stale-credential status refreshes the token once and retries once
//! - Concurrent stale failures share a single refresh

#![warn(unreachable_pub)]

pub mod backend;
pub mod config;
pub mod credentials;
pub mod resilient;

pub use backend::{ApiMethod, ApiRequest, ApiResponse, HttpBackend, ReqwestBackend};
pub use config::{CredentialEndpoints, SectionEndpoints, TransportConfig, STALE_CREDENTIAL_STATUS};
pub use credentials::{Credential, CredentialCache};
pub use resilient::{ResilientTransport, VALIDATION_STATUS};
