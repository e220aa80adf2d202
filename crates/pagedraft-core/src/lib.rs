//! pagedraft Core - draft synchronization for the page editor
//!
//! The engine behind one editing session:
//! - Tracks baseline and draft values of four independently persisted sections
//! - Flushes dirty sections after a debounce window, or on demand
//! - Guards navigation away from the editor while changes are unsaved
//! - Layers externally proposed edits as a preview that can be applied or discarded
//!
//! # Example
//!
//! ```rust,ignore
//! use pagedraft_core::{EditorSession, MemoryPreferenceStore, Section, SessionConfig};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example(transport: Arc<dyn pagedraft_core::SectionTransport>) -> Result<(), Box<dyn std::error::Error>> {
//! let session = EditorSession::new(
//!     SessionConfig::new(),
//!     transport,
//!     Arc::new(MemoryPreferenceStore::new()),
//! );
//!
//! session.load_document("page-42").await?;
//! session.observe(Section::Design, json!({"background": "red"}));
//! assert!(session.is_dirty(Section::Design));
//!
//! session.save_now().await?;
//! assert!(!session.has_any_changes());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

// Core modules
pub mod config;
pub mod error;
pub mod navigation;
pub mod overlay;
pub mod persister;
pub mod preferences;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use config::SessionConfig;
pub use error::{ConfigError, PreferenceError, SessionError, TransportError};
pub use navigation::{EditingScope, GuardState, NavigationDecision, NavigationGuard};
pub use overlay::{
    BlockMatcher, BlockSpec, DesignPatch, MergedView, OverlayChanges, OverlayState,
    OverlaySummary, PreviewOverlay,
};
pub use persister::{DebounceTimer, FlushReport};
pub use preferences::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore};
pub use session::EditorSession;
pub use store::{AckOutcome, Observation, PendingSave, SectionStore};
pub use transport::SectionTransport;
pub use types::{DocumentId, SaveStatus, Section};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving an editing session
    pub use crate::{
        BlockMatcher, DocumentId, EditorSession, NavigationDecision, SaveStatus, Section,
        SectionTransport, SessionConfig, SessionError, TransportError,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
