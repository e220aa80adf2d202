//! Baseline/draft store and dirty tracker
//!
//! Holds, per section, the last persisted snapshot (baseline) and the live
//! editable value (draft). Dirtiness is derived, never stored: a section is
//! dirty when its draft differs structurally from its baseline.
//!
//! Every draft change bumps a per-section revision. Persistence captures the
//! revision it sent and hands it back on success, which lets the store advance
//! the baseline without clobbering an edit made while the request was in
//! flight.

use crate::types::{DocumentId, Section};
use serde_json::Value;
use std::collections::BTreeMap;

/// Per-section bookkeeping
#[derive(Debug, Clone)]
struct SectionSlot {
    baseline: Value,
    draft: Option<Value>,
    /// Bumped on every draft change
    revision: u64,
    /// Highest revision the server acknowledged
    acked_revision: u64,
}

impl SectionSlot {
    fn seeded(baseline: Value) -> Self {
        Self {
            baseline,
            draft: None,
            revision: 0,
            acked_revision: 0,
        }
    }

    fn current(&self) -> &Value {
        self.draft.as_ref().unwrap_or(&self.baseline)
    }

    fn is_dirty(&self) -> bool {
        self.draft
            .as_ref()
            .is_some_and(|draft| *draft != self.baseline)
    }
}

/// Result of observing a fresh section value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First observation since reset; became the baseline
    Seeded,
    /// Value identical to the current draft
    Unchanged,
    /// Draft changed
    Changed {
        /// Whether the section is now dirty
        dirty: bool,
        /// Whether the section's dirty flag flipped
        dirty_set_changed: bool,
    },
}

impl Observation {
    /// Check if the draft moved
    #[inline]
    #[must_use]
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }
}

/// Draft value captured for one persistence call
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSave {
    /// Section being persisted
    pub section: Section,
    /// Exact payload sent
    pub payload: Value,
    /// Draft revision at capture time
    pub revision: u64,
    /// Store epoch at capture time
    pub epoch: u64,
}

/// Effect of acknowledging a successful save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Baseline advanced and the section is clean
    Clean,
    /// Baseline advanced but the draft moved on since capture
    StillDirty,
    /// A newer acknowledgement was already applied
    Stale,
    /// The store was reset after capture
    Discarded,
}

/// Baseline and draft values for every section of one document
#[derive(Debug, Clone, Default)]
pub struct SectionStore {
    document: Option<DocumentId>,
    slots: BTreeMap<Section, SectionSlot>,
    epoch: u64,
}

impl SectionStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Document currently tracked
    #[inline]
    #[must_use]
    pub fn document(&self) -> Option<&DocumentId> {
        self.document.as_ref()
    }

    /// Reset generation; bumped by every reset
    #[inline]
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Switch the tracked document
    ///
    /// Returns `true` when the identity changed and all state was cleared.
    pub fn set_document(&mut self, id: DocumentId) -> bool {
        if self.document.as_ref() == Some(&id) {
            return false;
        }
        self.reset();
        self.document = Some(id);
        true
    }

    /// Drop every baseline and draft, and forget the document
    pub fn reset(&mut self) {
        self.document = None;
        self.slots.clear();
        self.epoch += 1;
    }

    /// Record a freshly computed section value
    pub fn observe(&mut self, section: Section, value: Value) -> Observation {
        let Some(slot) = self.slots.get_mut(&section) else {
            self.slots.insert(section, SectionSlot::seeded(value));
            return Observation::Seeded;
        };

        if *slot.current() == value {
            return Observation::Unchanged;
        }

        let was_dirty = slot.is_dirty();
        slot.draft = Some(value);
        slot.revision += 1;
        let dirty = slot.is_dirty();

        Observation::Changed {
            dirty,
            dirty_set_changed: dirty != was_dirty,
        }
    }

    /// Check if a section differs from its baseline
    #[inline]
    #[must_use]
    pub fn is_dirty(&self, section: Section) -> bool {
        self.slots.get(&section).is_some_and(SectionSlot::is_dirty)
    }

    /// Check if any section differs from its baseline
    #[inline]
    #[must_use]
    pub fn has_any_changes(&self) -> bool {
        self.slots.values().any(SectionSlot::is_dirty)
    }

    /// Dirty sections in flush order
    #[must_use]
    pub fn dirty_sections(&self) -> Vec<Section> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.is_dirty())
            .map(|(section, _)| *section)
            .collect()
    }

    /// Check if the section has been observed since the last reset
    #[inline]
    #[must_use]
    pub fn is_observed(&self, section: Section) -> bool {
        self.slots.contains_key(&section)
    }

    /// Draft value, falling back to the baseline
    #[inline]
    #[must_use]
    pub fn current(&self, section: Section) -> Option<&Value> {
        self.slots.get(&section).map(SectionSlot::current)
    }

    /// Last persisted value
    #[inline]
    #[must_use]
    pub fn baseline(&self, section: Section) -> Option<&Value> {
        self.slots.get(&section).map(|slot| &slot.baseline)
    }

    /// Capture every dirty section for a flush
    #[must_use]
    pub fn pending_saves(&self) -> Vec<PendingSave> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.is_dirty())
            .filter_map(|(section, slot)| {
                slot.draft.as_ref().map(|draft| PendingSave {
                    section: *section,
                    payload: draft.clone(),
                    revision: slot.revision,
                    epoch: self.epoch,
                })
            })
            .collect()
    }

    /// Apply a successful save of `pending`
    ///
    /// The baseline becomes the payload that was sent. The section only ends
    /// up clean if its draft was not edited after capture.
    pub fn acknowledge(&mut self, pending: &PendingSave) -> AckOutcome {
        if pending.epoch != self.epoch {
            return AckOutcome::Discarded;
        }
        let Some(slot) = self.slots.get_mut(&pending.section) else {
            return AckOutcome::Discarded;
        };
        if pending.revision <= slot.acked_revision {
            return AckOutcome::Stale;
        }

        slot.acked_revision = pending.revision;
        if slot.revision == pending.revision {
            slot.draft = None;
        } else if slot.draft.is_none() {
            // Reverted after capture: keep showing the old baseline
            slot.draft = Some(slot.baseline.clone());
        }
        slot.baseline = pending.payload.clone();

        if slot.is_dirty() {
            AckOutcome::StillDirty
        } else {
            AckOutcome::Clean
        }
    }

    /// Drop the draft of one section back to its baseline
    ///
    /// Returns `true` if the section was dirty.
    pub fn revert(&mut self, section: Section) -> bool {
        let Some(slot) = self.slots.get_mut(&section) else {
            return false;
        };
        let was_dirty = slot.is_dirty();
        if slot.draft.take().is_some() {
            slot.revision += 1;
        }
        was_dirty
    }
}
