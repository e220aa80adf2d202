//! Anti-forgery credential cache
//!
//! Holds the current token together with a generation number. A caller that
//! hits a stale-credential response asks for a refresh quoting the generation
//! it used; if another caller already refreshed past that generation, the
//! newer token is returned without another round trip. Refreshes are
//! serialized, so simultaneous stale failures coalesce into one.

use crate::backend::{ApiRequest, HttpBackend};
use crate::config::CredentialEndpoints;
use pagedraft_core::TransportError;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Token plus the generation it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Bumped on every successful refresh
    pub generation: u64,
    /// Header value
    pub token: String,
}

/// Shared, lazily acquired anti-forgery token
#[derive(Debug)]
pub struct CredentialCache {
    endpoints: CredentialEndpoints,
    current: RwLock<Option<Credential>>,
    refresh_lock: tokio::sync::Mutex<()>,
    refreshes: AtomicUsize,
}

impl CredentialCache {
    /// Create an empty cache
    #[inline]
    #[must_use]
    pub fn new(endpoints: CredentialEndpoints) -> Self {
        Self {
            endpoints,
            current: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
            refreshes: AtomicUsize::new(0),
        }
    }

    /// Start from a known token
    #[inline]
    #[must_use]
    pub fn with_token(self, token: impl Into<String>) -> Self {
        *self.current.write() = Some(Credential {
            generation: 0,
            token: token.into(),
        });
        self
    }

    /// Number of refresh round trips performed
    #[inline]
    #[must_use]
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Current token, acquiring one if none is cached yet
    ///
    /// # Errors
    /// `TransportError::CredentialRefresh` if acquisition fails.
    pub async fn current(&self, backend: &dyn HttpBackend) -> Result<Credential, TransportError> {
        let cached = self.current.read().clone();
        if let Some(credential) = cached {
            return Ok(credential);
        }
        self.refresh_after(None, backend).await
    }

    /// Replace the token used at `stale_generation`
    ///
    /// # Errors
    /// `TransportError::CredentialRefresh` if the round trip fails.
    pub async fn refresh(
        &self,
        stale_generation: u64,
        backend: &dyn HttpBackend,
    ) -> Result<Credential, TransportError> {
        self.refresh_after(Some(stale_generation), backend).await
    }

    async fn refresh_after(
        &self,
        stale_generation: Option<u64>,
        backend: &dyn HttpBackend,
    ) -> Result<Credential, TransportError> {
        let _guard = self.refresh_lock.lock().await;

        let cached = self.current.read().clone();
        if let Some(credential) = cached {
            let superseded = stale_generation.map_or(true, |stale| credential.generation > stale);
            if superseded {
                tracing::debug!("Credential already refreshed to generation {}", credential.generation);
                return Ok(credential);
            }
        }

        tracing::info!("Refreshing anti-forgery credential");
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let token = self.fetch_token(backend).await?;

        let mut current = self.current.write();
        let generation = current.as_ref().map_or(0, |c| c.generation + 1);
        let credential = Credential { generation, token };
        *current = Some(credential.clone());
        Ok(credential)
    }

    async fn fetch_token(&self, backend: &dyn HttpBackend) -> Result<String, TransportError> {
        let session = backend
            .execute(ApiRequest::get(self.endpoints.session_path.as_str()))
            .await
            .map_err(|err| TransportError::CredentialRefresh(err.to_string()))?;
        if !session.is_success() {
            return Err(TransportError::CredentialRefresh(format!(
                "session endpoint returned {}",
                session.status
            )));
        }

        let response = backend
            .execute(ApiRequest::get(self.endpoints.token_path.as_str()))
            .await
            .map_err(|err| TransportError::CredentialRefresh(err.to_string()))?;
        if !response.is_success() {
            return Err(TransportError::CredentialRefresh(format!(
                "token endpoint returned {}",
                response.status
            )));
        }

        extract_token(&response.body).ok_or_else(|| {
            TransportError::CredentialRefresh("token endpoint returned no token".to_string())
        })
    }
}

fn extract_token(body: &Value) -> Option<String> {
    match body {
        Value::String(token) if !token.is_empty() => Some(token.clone()),
        Value::Object(fields) => ["token", "csrf_token"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(Value::as_str))
            .filter(|token| !token.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_token_shapes() {
        assert_eq!(extract_token(&json!({"token": "t1"})), Some("t1".to_string()));
        assert_eq!(extract_token(&json!({"csrf_token": "t2"})), Some("t2".to_string()));
        assert_eq!(extract_token(&json!("t3")), Some("t3".to_string()));
        assert_eq!(extract_token(&json!({"token": ""})), None);
        assert_eq!(extract_token(&Value::Null), None);
    }

    #[test]
    fn with_token_starts_at_generation_zero() {
        let cache = CredentialCache::new(CredentialEndpoints::default()).with_token("seed");
        let current = cache.current.read().clone();
        assert_eq!(
            current,
            Some(Credential {
                generation: 0,
                token: "seed".to_string()
            })
        );
        assert_eq!(cache.refresh_count(), 0);
    }
}
