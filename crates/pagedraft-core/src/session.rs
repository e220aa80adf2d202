//! Editing session
//!
//! One [`EditorSession`] owns all draft state for the page being edited:
//! - Baseline/draft store with dirty tracking
//! - Debounced batch persistence with compare-and-swap acknowledgement
//! - Unsaved-changes navigation guard
//! - Preview overlay for externally proposed edits
//!
//! The handle is cheap to clone; every clone drives the same session. State
//! is mutated synchronously under a short lock that is never held across an
//! await point.

use crate::config::SessionConfig;
use crate::error::{SessionError, TransportError};
use crate::navigation::{EditingScope, NavigationDecision, NavigationGuard};
use crate::overlay::{
    BlockMatcher, BlockSpec, DesignPatch, MergedView, OverlayState, OverlaySummary,
    PreviewOverlay,
};
use crate::persister::{persist_all, DebounceTimer, FlushReport};
use crate::preferences::PreferenceStore;
use crate::store::{AckOutcome, Observation, SectionStore};
use crate::transport::SectionTransport;
use crate::types::{DocumentId, SaveStatus, Section};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::watch;

/// Mutable session state guarded by one lock
#[derive(Debug)]
struct SessionState {
    store: SectionStore,
    overlay: PreviewOverlay,
    guard: NavigationGuard,
    autosave: bool,
    in_flight: usize,
    last_saved_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct SessionInner {
    config: SessionConfig,
    transport: Arc<dyn SectionTransport>,
    preferences: Arc<dyn PreferenceStore>,
    state: Mutex<SessionState>,
    timer: Mutex<DebounceTimer>,
    status: watch::Sender<SaveStatus>,
}

/// Draft synchronization engine for one editing session
#[derive(Debug, Clone)]
pub struct EditorSession {
    inner: Arc<SessionInner>,
}

impl EditorSession {
    /// Create a session
    ///
    /// The autosave flag is read from `preferences`; a missing or unreadable
    /// preference falls back to `config.autosave_default`.
    #[must_use]
    pub fn new(
        config: SessionConfig,
        transport: Arc<dyn SectionTransport>,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Self {
        let autosave = match preferences.get_bool(&config.preference_key) {
            Ok(stored) => stored.unwrap_or(config.autosave_default),
            Err(err) => {
                tracing::warn!("Cannot read autosave preference, using default: {}", err);
                config.autosave_default
            }
        };
        let (status, _) = watch::channel(SaveStatus::Idle);

        Self {
            inner: Arc::new(SessionInner {
                state: Mutex::new(SessionState {
                    store: SectionStore::new(),
                    overlay: PreviewOverlay::new(),
                    guard: NavigationGuard::new(EditingScope::new(config.editing_scope.clone())),
                    autosave,
                    in_flight: 0,
                    last_saved_at: None,
                }),
                timer: Mutex::new(DebounceTimer::new(config.debounce())),
                config,
                transport,
                preferences,
                status,
            }),
        }
    }

    /// Create a session after validating `config`
    ///
    /// # Errors
    /// `SessionError::Config` when the configuration is invalid.
    pub fn try_new(
        config: SessionConfig,
        transport: Arc<dyn SectionTransport>,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self::new(config, transport, preferences))
    }

    /// Session configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    // ------------------------------------------------------------------
    // Document identity
    // ------------------------------------------------------------------

    /// Document currently edited
    #[must_use]
    pub fn document(&self) -> Option<DocumentId> {
        self.inner.state.lock().store.document().cloned()
    }

    /// Switch to `id`, clearing all state if it differs from the current one
    ///
    /// Returns `true` when a reset happened.
    pub fn set_document(&self, id: impl Into<DocumentId>) -> bool {
        let id = id.into();
        let changed = {
            let mut state = self.inner.state.lock();
            let changed = state.store.set_document(id.clone());
            if changed {
                state.overlay.clear();
            }
            changed
        };
        if changed {
            self.inner.timer.lock().cancel();
            tracing::info!("Editing document {}", id);
        }
        changed
    }

    /// Reset to `id` and seed every section from the server
    ///
    /// Sections load concurrently. Sections that fail stay unobserved and are
    /// reported; the rest are seeded as baselines.
    ///
    /// # Errors
    /// `SessionError::LoadFailed` listing the sections that could not load.
    pub async fn load_document(&self, id: impl Into<DocumentId>) -> Result<(), SessionError> {
        let id = id.into();
        let epoch = {
            let mut state = self.inner.state.lock();
            state.store.reset();
            state.store.set_document(id.clone());
            state.overlay.clear();
            state.store.epoch()
        };
        self.inner.timer.lock().cancel();
        tracing::info!("Loading document {}", id);

        let transport = self.inner.transport.as_ref();
        let loads = Section::ALL.into_iter().map(|section| {
            let id = &id;
            async move { (section, transport.load(id, section).await) }
        });
        let results = futures::future::join_all(loads).await;

        let mut failed = Vec::new();
        {
            let mut state = self.inner.state.lock();
            if state.store.epoch() != epoch {
                tracing::debug!("Document {} replaced while loading; dropping result", id);
                return Ok(());
            }
            for (section, result) in results {
                match result {
                    Ok(value) => {
                        state.store.observe(section, value);
                    }
                    Err(err) => {
                        tracing::warn!("Failed to load {} of {}: {}", section, id, err);
                        failed.push((section, err));
                    }
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(SessionError::LoadFailed { failed })
        }
    }

    // ------------------------------------------------------------------
    // Draft store & dirty tracking
    // ------------------------------------------------------------------

    /// Record a freshly computed value for `section`
    ///
    /// The first value after a reset becomes the baseline. Later values
    /// update the draft and, with autosave on, restart the debounce timer.
    pub fn observe(&self, section: Section, value: Value) -> Observation {
        let (outcome, any_dirty, autosave) = {
            let mut state = self.inner.state.lock();
            let outcome = state.store.observe(section, value);
            (outcome, state.store.has_any_changes(), state.autosave)
        };
        tracing::debug!("Observed {}: {:?}", section, outcome);
        if outcome.is_change() {
            self.on_draft_changed(any_dirty, autosave);
        }
        outcome
    }

    /// Check if `section` has unsaved changes
    #[must_use]
    pub fn is_dirty(&self, section: Section) -> bool {
        self.inner.state.lock().store.is_dirty(section)
    }

    /// Check if any section has unsaved changes
    #[must_use]
    pub fn has_any_changes(&self) -> bool {
        self.inner.state.lock().store.has_any_changes()
    }

    /// Sections with unsaved changes
    #[must_use]
    pub fn dirty_sections(&self) -> Vec<Section> {
        self.inner.state.lock().store.dirty_sections()
    }

    /// Draft value of `section`, falling back to its baseline
    #[must_use]
    pub fn draft(&self, section: Section) -> Option<Value> {
        self.inner.state.lock().store.current(section).cloned()
    }

    /// Last persisted value of `section`
    #[must_use]
    pub fn baseline(&self, section: Section) -> Option<Value> {
        self.inner.state.lock().store.baseline(section).cloned()
    }

    /// Throw away the draft of `section`
    ///
    /// Returns `true` if the section had unsaved changes.
    pub fn revert(&self, section: Section) -> bool {
        let (reverted, any_dirty) = {
            let mut state = self.inner.state.lock();
            let reverted = state.store.revert(section);
            (reverted, state.store.has_any_changes())
        };
        if !any_dirty {
            self.inner.timer.lock().cancel();
        }
        reverted
    }

    /// Throw away every draft; baselines are kept
    pub fn revert_all(&self) {
        {
            let mut state = self.inner.state.lock();
            for section in Section::ALL {
                state.store.revert(section);
            }
        }
        self.inner.timer.lock().cancel();
    }

    // ------------------------------------------------------------------
    // Batch persister
    // ------------------------------------------------------------------

    /// Check if edits are flushed automatically
    #[must_use]
    pub fn autosave_enabled(&self) -> bool {
        self.inner.state.lock().autosave
    }

    /// Turn autosave on or off and remember the choice
    ///
    /// Turning it off cancels a pending flush; turning it on with unsaved
    /// changes arms the timer.
    ///
    /// # Errors
    /// The preference could not be written. The in-memory flag is updated
    /// regardless.
    pub fn set_autosave(&self, enabled: bool) -> Result<(), SessionError> {
        let any_dirty = {
            let mut state = self.inner.state.lock();
            state.autosave = enabled;
            state.store.has_any_changes()
        };
        if enabled && any_dirty {
            self.schedule_flush();
        } else if !enabled {
            self.inner.timer.lock().cancel();
        }
        tracing::info!("Autosave {}", if enabled { "enabled" } else { "disabled" });
        self.inner
            .preferences
            .set_bool(&self.inner.config.preference_key, enabled)?;
        Ok(())
    }

    /// Check if a debounced flush is pending
    #[must_use]
    pub fn flush_scheduled(&self) -> bool {
        self.inner.timer.lock().is_armed()
    }

    /// Flush every dirty section now, bypassing the timer
    ///
    /// The flush runs as its own task. Dropping the returned future stops
    /// waiting for the outcome but the flush still completes and publishes
    /// its status.
    ///
    /// # Errors
    /// `SessionError::SaveFailed` if any section failed; those sections stay
    /// dirty. `SessionError::NoDocument` if there are changes but no document.
    pub async fn save_now(&self) -> Result<FlushReport, SessionError> {
        self.inner.timer.lock().cancel();
        let session = self.clone();
        match tokio::spawn(async move { session.flush().await }).await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => Err(SessionError::FlushAborted(err.to_string())),
        }
    }

    /// Latest save status
    #[must_use]
    pub fn save_status(&self) -> SaveStatus {
        self.inner.status.borrow().clone()
    }

    /// Watch save status changes
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status.subscribe()
    }

    /// Completion time of the last flush that saved anything
    #[must_use]
    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().last_saved_at
    }

    async fn flush(&self) -> Result<FlushReport, SessionError> {
        let (document, pending) = {
            let mut state = self.inner.state.lock();
            let pending = state.store.pending_saves();
            if pending.is_empty() {
                return Ok(FlushReport::default());
            }
            let Some(document) = state.store.document().cloned() else {
                return Err(SessionError::NoDocument);
            };
            state.in_flight += 1;
            (document, pending)
        };

        self.inner.status.send_replace(SaveStatus::Saving);
        tracing::info!("Flushing {} section(s) of {}", pending.len(), document);

        let results = persist_all(self.inner.transport.as_ref(), &document, pending).await;

        let (report, status) = {
            let mut state = self.inner.state.lock();
            state.in_flight -= 1;

            let mut report = FlushReport::default();
            for (save, result) in results {
                match result {
                    Ok(()) => match state.store.acknowledge(&save) {
                        AckOutcome::Clean | AckOutcome::Stale => report.saved.push(save.section),
                        AckOutcome::StillDirty => {
                            report.saved.push(save.section);
                            report.still_dirty.push(save.section);
                        }
                        AckOutcome::Discarded => report.discarded.push(save.section),
                    },
                    Err(err) => {
                        tracing::warn!("Failed to save {} of {}: {}", save.section, document, err);
                        report.failed.push((save.section, err));
                    }
                }
            }

            let now = Utc::now();
            if !report.saved.is_empty() {
                state.last_saved_at = Some(now);
            }
            let status = if state.in_flight > 0 {
                SaveStatus::Saving
            } else if !report.failed.is_empty() {
                SaveStatus::Failed {
                    message: describe(&report.failed),
                    at: now,
                }
            } else if report.saved.is_empty() {
                SaveStatus::Idle
            } else {
                SaveStatus::Saved { at: now }
            };
            (report, status)
        };

        self.inner.status.send_replace(status);
        if !report.still_dirty.is_empty() && self.autosave_enabled() && !self.flush_scheduled() {
            self.schedule_flush();
        }
        tracing::info!(
            "Flush of {} finished: {} saved, {} failed",
            document,
            report.saved.len(),
            report.failed.len()
        );
        report.into_result()
    }

    fn on_draft_changed(&self, any_dirty: bool, autosave: bool) {
        if !any_dirty {
            self.inner.timer.lock().cancel();
        } else if autosave {
            self.schedule_flush();
        }
    }

    fn schedule_flush(&self) {
        let weak = Arc::downgrade(&self.inner);
        let armed = self.inner.timer.lock().arm(async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let session = EditorSession { inner };
            if let Err(err) = session.flush().await {
                tracing::warn!("Autosave failed: {}", err);
            }
        });
        if armed {
            tracing::debug!("Autosave armed");
        }
    }

    // ------------------------------------------------------------------
    // Navigation guard
    // ------------------------------------------------------------------

    /// Router "before navigation" hook
    pub fn attempt_navigation(&self, target: &str) -> NavigationDecision {
        let mut state = self.inner.state.lock();
        let has_changes = state.store.has_any_changes();
        let SessionState { store, guard, .. } = &mut *state;
        guard.intercept(target, store.document(), has_changes)
    }

    /// Held navigation target, if any
    #[must_use]
    pub fn pending_navigation(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .guard
            .pending_target()
            .map(str::to_string)
    }

    /// Leave without saving
    ///
    /// Discards every draft, baseline and overlay (in-flight responses are
    /// dropped) and returns the held target the caller should navigate to.
    /// Does nothing when no navigation is held.
    pub fn confirm_navigation(&self) -> Option<String> {
        let target = {
            let mut state = self.inner.state.lock();
            let target = state.guard.confirm()?;
            state.store.reset();
            state.overlay.clear();
            target
        };
        self.inner.timer.lock().cancel();
        tracing::info!("Leaving editor for {} without saving", target);
        Some(target)
    }

    /// Stay in the editor; state is untouched
    pub fn cancel_navigation(&self) -> Option<String> {
        self.inner.state.lock().guard.cancel()
    }

    /// Platform "before unload" hook
    #[must_use]
    pub fn should_warn_before_unload(&self) -> bool {
        NavigationGuard::should_warn_before_unload(self.has_any_changes())
    }

    // ------------------------------------------------------------------
    // Preview overlay
    // ------------------------------------------------------------------

    /// Propose a new block; returns its generated identifier
    pub fn propose_add_block(&self, spec: BlockSpec) -> String {
        let mut state = self.inner.state.lock();
        let SessionState { store, overlay, .. } = &mut *state;
        let id = overlay.propose_add_block(spec, store.current(Section::ContentBlocks));
        tracing::debug!("Previewing new block {}", id);
        id
    }

    /// Propose removing every block matching `matcher`; returns the count
    pub fn propose_remove_block(&self, matcher: &BlockMatcher) -> usize {
        let mut state = self.inner.state.lock();
        let SessionState { store, overlay, .. } = &mut *state;
        overlay.propose_remove_block(matcher, store.current(Section::ContentBlocks))
    }

    /// Propose design field changes
    pub fn propose_design_patch(&self, patch: DesignPatch) {
        self.inner.state.lock().overlay.propose_design_patch(patch);
    }

    /// What the editor should render: drafts with the overlay on top
    #[must_use]
    pub fn merged_view(&self) -> MergedView {
        let state = self.inner.state.lock();
        state.overlay.merged_view(
            state.store.current(Section::ContentBlocks),
            state.store.current(Section::Design),
        )
    }

    /// Check if a proposal is pending
    #[must_use]
    pub fn has_pending_overlay(&self) -> bool {
        self.inner.state.lock().overlay.has_pending()
    }

    /// Overlay lifecycle state
    #[must_use]
    pub fn overlay_state(&self) -> OverlayState {
        self.inner.state.lock().overlay.state()
    }

    /// Counts of pending proposals
    #[must_use]
    pub fn overlay_summary(&self) -> OverlaySummary {
        let state = self.inner.state.lock();
        state
            .overlay
            .summary(state.store.current(Section::ContentBlocks))
    }

    /// Fold the overlay into the drafts
    ///
    /// The affected sections become dirty and follow the normal persistence
    /// path. Returns `false` when nothing was pending.
    pub fn apply_overlay(&self) -> bool {
        let (any_dirty, changed, autosave) = {
            let mut state = self.inner.state.lock();
            let changes = state.overlay.take();
            if changes.is_empty() {
                return false;
            }
            let mut changed = false;

            if let Some(blocks) = changes.blocks {
                seed_if_unobserved(&mut state.store, Section::ContentBlocks, Value::Array(Vec::new()));
                changed |= state
                    .store
                    .observe(Section::ContentBlocks, Value::Array(blocks))
                    .is_change();
            }
            if let Some(patch) = changes.design_patch {
                seed_if_unobserved(&mut state.store, Section::Design, Value::Object(Map::new()));
                let mut design = match state.store.current(Section::Design) {
                    Some(Value::Object(fields)) => fields.clone(),
                    _ => Map::new(),
                };
                design.extend(patch);
                changed |= state
                    .store
                    .observe(Section::Design, Value::Object(design))
                    .is_change();
            }
            (state.store.has_any_changes(), changed, state.autosave)
        };

        tracing::info!("Applied preview overlay");
        if changed {
            self.on_draft_changed(any_dirty, autosave);
        }
        true
    }

    /// Drop the overlay; drafts and baselines are untouched
    pub fn discard_overlay(&self) {
        self.inner.state.lock().overlay.clear();
        tracing::debug!("Discarded preview overlay");
    }
}

fn seed_if_unobserved(store: &mut SectionStore, section: Section, empty: Value) {
    if !store.is_observed(section) {
        store.observe(section, empty);
    }
}

fn describe(failed: &[(Section, TransportError)]) -> String {
    failed
        .iter()
        .map(|(section, err)| format!("{section}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}
