//! Persistence port
//!
//! The session talks to the server only through [`SectionTransport`]. The
//! production implementation (credential refresh, anti-forgery headers) lives
//! in `pagedraft-transport`; tests plug in scripted doubles.

use crate::error::TransportError;
use crate::types::{DocumentId, Section};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;

/// Per-section load and persist calls
#[async_trait]
pub trait SectionTransport: Send + Sync + Debug {
    /// Persist the full payload of one section
    ///
    /// # Errors
    /// Any terminal failure after the transport's own retry policy.
    async fn persist(
        &self,
        document: &DocumentId,
        section: Section,
        payload: &Value,
    ) -> Result<(), TransportError>;

    /// Fetch the persisted payload of one section
    ///
    /// # Errors
    /// Any terminal failure after the transport's own retry policy.
    async fn load(&self, document: &DocumentId, section: Section) -> Result<Value, TransportError>;
}
