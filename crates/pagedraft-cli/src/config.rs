//! Combined configuration file for the command-line client

use pagedraft_core::{ConfigError, SessionConfig};
use pagedraft_transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// `[session]` and `[transport]` tables of `pagedraft.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct PagedraftConfig {
    pub(crate) session: SessionConfig,
    pub(crate) transport: TransportConfig,
}

impl PagedraftConfig {
    pub(crate) fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.session.validate()?;
        config.transport.validate()?;
        Ok(config)
    }

    /// Load `path`, or defaults when no path is given
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}
