//! Navigation guard
//!
//! Intercepts in-app navigation while unsaved changes exist. Movement inside
//! the editing scope (switching tabs of the same page) always proceeds;
//! leaving the scope with unsaved work is held until the user confirms or
//! cancels.
//!
//! ```text
//! Idle --(dirty && outside scope)--> AwaitingConfirmation
//! AwaitingConfirmation --confirm--> Idle   (state discarded, navigation released)
//! AwaitingConfirmation --cancel---> Idle   (navigation dropped)
//! ```

use crate::config::DOCUMENT_PLACEHOLDER;
use crate::types::DocumentId;

/// Path prefixes that count as "inside" the editor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditingScope {
    prefixes: Vec<String>,
}

impl EditingScope {
    /// Create a scope from path prefixes; `{document}` is substituted at match time
    #[inline]
    #[must_use]
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }

    /// Check if `location` stays inside the editor of `document`
    ///
    /// Query strings and fragments are ignored. A prefix matches the exact
    /// path or any path below it.
    #[must_use]
    pub fn contains(&self, location: &str, document: Option<&DocumentId>) -> bool {
        let path = location
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('/');

        self.prefixes.iter().any(|prefix| {
            let prefix = if prefix.contains(DOCUMENT_PLACEHOLDER) {
                match document {
                    Some(doc) => prefix.replace(DOCUMENT_PLACEHOLDER, doc.as_str()),
                    None => return false,
                }
            } else {
                prefix.clone()
            };
            let prefix = prefix.trim_end_matches('/');
            path == prefix
                || path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

/// Guard state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GuardState {
    /// No navigation held
    #[default]
    Idle,
    /// Navigation held until the user decides
    AwaitingConfirmation {
        /// Held destination
        target: String,
    },
}

/// Verdict on an attempted navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDecision {
    /// Let the router continue
    Proceed,
    /// Veto; the target is held pending confirmation
    Held,
}

impl NavigationDecision {
    /// Check if the router may continue
    #[inline]
    #[must_use]
    pub fn proceeds(&self) -> bool {
        matches!(self, Self::Proceed)
    }
}

/// Unsaved-changes navigation guard
#[derive(Debug, Clone, Default)]
pub struct NavigationGuard {
    scope: EditingScope,
    state: GuardState,
}

impl NavigationGuard {
    /// Create an idle guard
    #[inline]
    #[must_use]
    pub fn new(scope: EditingScope) -> Self {
        Self {
            scope,
            state: GuardState::Idle,
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> &GuardState {
        &self.state
    }

    /// Held destination, if any
    #[inline]
    #[must_use]
    pub fn pending_target(&self) -> Option<&str> {
        match &self.state {
            GuardState::AwaitingConfirmation { target } => Some(target),
            GuardState::Idle => None,
        }
    }

    /// Router "before navigation" hook
    ///
    /// A second attempt while already awaiting confirmation replaces the
    /// held target.
    pub fn intercept(
        &mut self,
        target: &str,
        document: Option<&DocumentId>,
        has_unsaved_changes: bool,
    ) -> NavigationDecision {
        if !has_unsaved_changes || self.scope.contains(target, document) {
            return NavigationDecision::Proceed;
        }
        tracing::debug!("Holding navigation to {} until confirmed", target);
        self.state = GuardState::AwaitingConfirmation {
            target: target.to_string(),
        };
        NavigationDecision::Held
    }

    /// Release the held navigation
    ///
    /// Returns the destination the caller should now navigate to.
    pub fn confirm(&mut self) -> Option<String> {
        match std::mem::take(&mut self.state) {
            GuardState::AwaitingConfirmation { target } => Some(target),
            GuardState::Idle => None,
        }
    }

    /// Drop the held navigation
    pub fn cancel(&mut self) -> Option<String> {
        self.confirm()
    }

    /// Platform "before unload" hook; independent of the state machine
    #[inline]
    #[must_use]
    pub fn should_warn_before_unload(has_unsaved_changes: bool) -> bool {
        has_unsaved_changes
    }
}
