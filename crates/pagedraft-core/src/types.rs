//! Core types for the editing session
//!
//! Defines the fundamental vocabulary of the engine:
//! - Document identity
//! - The fixed set of persisted sections
//! - Save status reported to the UI

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque identifier of the page being edited
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Create a document identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Independently persisted resource group of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Section {
    /// Ordered list of content blocks (links, embeds, contact buttons)
    ContentBlocks,
    /// Social profile links shown under the header
    SocialLinks,
    /// Visual theme
    Design,
    /// Account and page settings
    Settings,
}

impl Section {
    /// Every section, in flush order
    pub const ALL: [Section; 4] = [
        Section::ContentBlocks,
        Section::SocialLinks,
        Section::Design,
        Section::Settings,
    ];

    /// Stable wire name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::ContentBlocks => "content-blocks",
            Section::SocialLinks => "social-links",
            Section::Design => "design",
            Section::Settings => "settings",
        }
    }

    /// Whether an external proposer may overlay this section
    #[inline]
    #[must_use]
    pub fn is_overlayable(&self) -> bool {
        matches!(self, Section::ContentBlocks | Section::Design)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| format!("unknown section: {s}"))
    }
}

/// Outcome of the most recent persistence attempt, for UI feedback
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SaveStatus {
    /// Nothing saved yet in this session
    #[default]
    Idle,
    /// A flush is in flight
    Saving,
    /// Last flush succeeded
    Saved {
        /// Completion time
        at: DateTime<Utc>,
    },
    /// Last flush had at least one failed section
    Failed {
        /// Human readable summary
        message: String,
        /// Completion time
        at: DateTime<Utc>,
    },
}

impl SaveStatus {
    /// Check if a flush is in flight
    #[inline]
    #[must_use]
    pub fn is_saving(&self) -> bool {
        matches!(self, SaveStatus::Saving)
    }

    /// Check if the last flush failed
    #[inline]
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, SaveStatus::Failed { .. })
    }
}
