//! Session configuration
//!
//! Tunables for the batch persister, the autosave preference slot and the
//! editing scope used by the navigation guard.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default debounce window between the last edit and the flush
pub const DEFAULT_DEBOUNCE_MS: u64 = 1500;

/// Default key of the autosave preference
pub const DEFAULT_PREFERENCE_KEY: &str = "pagedraft.autosave";

/// Placeholder replaced by the document identity in scope prefixes
pub const DOCUMENT_PLACEHOLDER: &str = "{document}";

/// Editing session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Debounce window in milliseconds
    pub autosave_debounce_ms: u64,
    /// Autosave state when no preference has been stored yet
    pub autosave_default: bool,
    /// Key of the autosave preference in the preference store
    pub preference_key: String,
    /// Path prefixes that count as "inside" the editor
    pub editing_scope: Vec<String>,
}

impl SessionConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With debounce window
    #[inline]
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.autosave_debounce_ms = u64::try_from(debounce.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With autosave default
    #[inline]
    #[must_use]
    pub fn with_autosave_default(mut self, enabled: bool) -> Self {
        self.autosave_default = enabled;
        self
    }

    /// With editing scope prefixes
    #[inline]
    #[must_use]
    pub fn with_editing_scope(mut self, prefixes: Vec<String>) -> Self {
        self.editing_scope = prefixes;
        self
    }

    /// Debounce window as a duration
    #[inline]
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    /// Check invariants
    ///
    /// # Errors
    /// `ConfigError::InvalidValue` for an empty preference key or a scope
    /// prefix that is not an absolute path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.preference_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "preference_key",
                reason: "must not be empty".to_string(),
            });
        }
        if let Some(prefix) = self.editing_scope.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::InvalidValue {
                field: "editing_scope",
                reason: format!("prefix '{prefix}' must start with '/'"),
            });
        }
        Ok(())
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// Parse or validation failure.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// I/O, parse or validation failure.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            autosave_debounce_ms: DEFAULT_DEBOUNCE_MS,
            autosave_default: true,
            preference_key: DEFAULT_PREFERENCE_KEY.to_string(),
            editing_scope: vec![format!("/dashboard/pages/{DOCUMENT_PLACEHOLDER}")],
        }
    }
}
