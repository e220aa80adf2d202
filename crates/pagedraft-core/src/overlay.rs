//! Preview overlay
//!
//! A non-persisted layer of proposed changes on top of the content-blocks and
//! design drafts. The proposer (an assistant, a template picker) only ever
//! writes here; the editor renders [`MergedView`] and the user either applies
//! the overlay, which folds it into the drafts, or discards it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Field carrying a block's identifier
pub const BLOCK_ID_FIELD: &str = "id";

/// Field matched by [`BlockMatcher::Title`]
pub const BLOCK_TITLE_FIELD: &str = "title";

/// Field matched by [`BlockMatcher::Url`]
pub const BLOCK_URL_FIELD: &str = "url";

/// Fields of a proposed block
pub type BlockSpec = Map<String, Value>;

/// Partial design document, merged field by field
pub type DesignPatch = Map<String, Value>;

/// Criterion selecting blocks to remove
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum BlockMatcher {
    /// Title, compared case-insensitively
    Title(String),
    /// Exact identifier
    Id(String),
    /// Exact URL
    Url(String),
}

impl BlockMatcher {
    /// Check a block against the criterion
    #[must_use]
    pub fn matches(&self, block: &Value) -> bool {
        match self {
            BlockMatcher::Title(title) => string_field(block, BLOCK_TITLE_FIELD)
                .is_some_and(|t| t.to_lowercase() == title.to_lowercase()),
            BlockMatcher::Id(id) => match block.get(BLOCK_ID_FIELD) {
                Some(Value::String(s)) => s == id,
                Some(Value::Number(n)) => n.to_string() == *id,
                _ => false,
            },
            BlockMatcher::Url(url) => string_field(block, BLOCK_URL_FIELD) == Some(url.as_str()),
        }
    }
}

fn string_field<'a>(block: &'a Value, field: &str) -> Option<&'a str> {
    block.get(field).and_then(Value::as_str)
}

/// Lifecycle of the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    /// No pending proposal
    Idle,
    /// At least one proposal pending
    Previewing,
}

/// What the editor renders while previewing
#[derive(Debug, Clone, PartialEq)]
pub struct MergedView {
    /// Content-blocks value (overlay list if diverged, else the draft)
    pub blocks: Value,
    /// Design value with the patch applied
    pub design: Value,
}

impl MergedView {
    /// Blocks as a slice; empty when the value is not a list
    #[inline]
    #[must_use]
    pub fn block_list(&self) -> &[Value] {
        self.blocks.as_array().map(Vec::as_slice).unwrap_or_default()
    }
}

/// Changes handed over when the overlay is applied
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayChanges {
    /// Replacement block list, if the overlay diverged
    pub blocks: Option<Vec<Value>>,
    /// Design fields to merge, if any
    pub design_patch: Option<DesignPatch>,
}

impl OverlayChanges {
    /// Check if there is anything to fold in
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_none() && self.design_patch.is_none()
    }
}

/// Counts for an "N changes pending" badge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverlaySummary {
    /// Blocks present in the overlay but not in the draft
    pub added_blocks: usize,
    /// Blocks present in the draft but not in the overlay
    pub removed_blocks: usize,
    /// Design fields the patch touches
    pub patched_fields: Vec<String>,
}

/// Proposed, unpersisted changes to blocks and design
#[derive(Debug, Clone, Default)]
pub struct PreviewOverlay {
    blocks: Option<Vec<Value>>,
    design_patch: DesignPatch,
}

impl PreviewOverlay {
    /// Create an idle overlay
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle state
    #[inline]
    #[must_use]
    pub fn state(&self) -> OverlayState {
        if self.has_pending() {
            OverlayState::Previewing
        } else {
            OverlayState::Idle
        }
    }

    /// Check if blocks diverged or the design patch is non-empty
    #[inline]
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.blocks.is_some() || !self.design_patch.is_empty()
    }

    /// Prepend a proposed block with a freshly generated identifier
    ///
    /// Returns the identifier assigned to the block.
    pub fn propose_add_block(&mut self, spec: BlockSpec, draft_blocks: Option<&Value>) -> String {
        let id = format!("preview-{}", Uuid::new_v4());
        let mut block = spec;
        block.insert(BLOCK_ID_FIELD.to_string(), Value::String(id.clone()));
        self.fork_blocks(draft_blocks).insert(0, Value::Object(block));
        id
    }

    /// Remove every block matching `matcher` from the overlay list
    ///
    /// Returns the number of blocks removed. The overlay diverges from the
    /// draft even when nothing matched.
    pub fn propose_remove_block(
        &mut self,
        matcher: &BlockMatcher,
        draft_blocks: Option<&Value>,
    ) -> usize {
        let blocks = self.fork_blocks(draft_blocks);
        let before = blocks.len();
        blocks.retain(|block| !matcher.matches(block));
        before - blocks.len()
    }

    /// Merge design fields into the patch; later proposals win per field
    pub fn propose_design_patch(&mut self, patch: DesignPatch) {
        self.design_patch.extend(patch);
    }

    /// Draft merged with the overlay
    #[must_use]
    pub fn merged_view(&self, draft_blocks: Option<&Value>, draft_design: Option<&Value>) -> MergedView {
        let blocks = match &self.blocks {
            Some(blocks) => Value::Array(blocks.clone()),
            None => draft_blocks.cloned().unwrap_or(Value::Null),
        };
        MergedView {
            blocks,
            design: self.patched_design(draft_design),
        }
    }

    /// Design draft with the patch applied, or the draft as-is when the
    /// patch is empty
    #[must_use]
    pub fn patched_design(&self, draft_design: Option<&Value>) -> Value {
        if self.design_patch.is_empty() {
            return draft_design.cloned().unwrap_or(Value::Null);
        }
        let mut design = match draft_design {
            Some(Value::Object(fields)) => fields.clone(),
            _ => Map::new(),
        };
        design.extend(self.design_patch.clone());
        Value::Object(design)
    }

    /// Summarize pending changes against the draft
    #[must_use]
    pub fn summary(&self, draft_blocks: Option<&Value>) -> OverlaySummary {
        let draft: &[Value] = draft_blocks
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let (added_blocks, removed_blocks) = match &self.blocks {
            Some(overlay) => (
                overlay.iter().filter(|b| !draft.contains(b)).count(),
                draft.iter().filter(|b| !overlay.contains(b)).count(),
            ),
            None => (0, 0),
        };
        OverlaySummary {
            added_blocks,
            removed_blocks,
            patched_fields: self.design_patch.keys().cloned().collect(),
        }
    }

    /// Hand over pending changes and return to idle
    pub fn take(&mut self) -> OverlayChanges {
        let blocks = self.blocks.take();
        let patch = std::mem::take(&mut self.design_patch);
        OverlayChanges {
            blocks,
            design_patch: (!patch.is_empty()).then_some(patch),
        }
    }

    /// Drop pending changes
    #[inline]
    pub fn clear(&mut self) {
        self.blocks = None;
        self.design_patch.clear();
    }

    fn fork_blocks(&mut self, draft_blocks: Option<&Value>) -> &mut Vec<Value> {
        self.blocks.get_or_insert_with(|| {
            draft_blocks
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(value: Value) -> BlockSpec {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test specs are objects"),
        }
    }

    #[test]
    fn add_block_prepends_with_generated_id() {
        let draft = json!([{"id": 1, "title": "Blog"}]);
        let mut overlay = PreviewOverlay::new();

        let id = overlay.propose_add_block(spec(json!({"title": "Instagram"})), Some(&draft));
        let view = overlay.merged_view(Some(&draft), None);

        assert_eq!(view.block_list().len(), 2);
        assert_eq!(view.block_list()[0]["title"], "Instagram");
        assert_eq!(view.block_list()[0]["id"], Value::String(id));
        assert_eq!(overlay.state(), OverlayState::Previewing);
    }

    #[test]
    fn generated_ids_are_unique() {
        let mut overlay = PreviewOverlay::new();
        let a = overlay.propose_add_block(BlockSpec::new(), None);
        let b = overlay.propose_add_block(BlockSpec::new(), None);
        assert_ne!(a, b);
    }

    #[test]
    fn remove_matches_title_case_insensitively() {
        let draft = json!([
            {"id": 1, "title": "YouTube"},
            {"id": 2, "title": "Blog"},
            {"id": 3, "title": "youtube"}
        ]);
        let mut overlay = PreviewOverlay::new();

        let removed =
            overlay.propose_remove_block(&BlockMatcher::Title("YOUTUBE".into()), Some(&draft));

        assert_eq!(removed, 2);
        let view = overlay.merged_view(Some(&draft), None);
        assert_eq!(view.blocks, json!([{"id": 2, "title": "Blog"}]));
    }

    #[test]
    fn remove_without_match_still_diverges() {
        let draft = json!([{"id": 1, "title": "Blog"}]);
        let mut overlay = PreviewOverlay::new();

        assert_eq!(
            overlay.propose_remove_block(&BlockMatcher::Id("9".into()), Some(&draft)),
            0
        );
        assert!(overlay.has_pending());
    }

    #[test]
    fn id_matcher_accepts_numeric_ids() {
        assert!(BlockMatcher::Id("7".into()).matches(&json!({"id": 7})));
        assert!(!BlockMatcher::Url("https://a".into()).matches(&json!({"id": 7})));
    }

    #[test]
    fn design_patch_is_last_write_wins() {
        let draft = json!({"background": "white", "font": "Inter"});
        let mut overlay = PreviewOverlay::new();

        overlay.propose_design_patch(spec(json!({"background": "black"})));
        overlay.propose_design_patch(spec(json!({"background": "navy", "button": "pill"})));

        let view = overlay.merged_view(None, Some(&draft));
        assert_eq!(
            view.design,
            json!({"background": "navy", "font": "Inter", "button": "pill"})
        );
    }

    #[test]
    fn clear_restores_draft_view() {
        let blocks = json!([{"id": 1}]);
        let design = json!({"background": "white"});
        let mut overlay = PreviewOverlay::new();
        overlay.propose_add_block(BlockSpec::new(), Some(&blocks));
        overlay.propose_design_patch(spec(json!({"background": "red"})));

        overlay.clear();

        assert_eq!(overlay.state(), OverlayState::Idle);
        let view = overlay.merged_view(Some(&blocks), Some(&design));
        assert_eq!(view.blocks, blocks);
        assert_eq!(view.design, design);
    }

    #[test]
    fn take_hands_over_and_resets() {
        let mut overlay = PreviewOverlay::new();
        overlay.propose_design_patch(spec(json!({"font": "Lora"})));

        let changes = overlay.take();
        assert!(changes.blocks.is_none());
        assert_eq!(changes.design_patch, Some(spec(json!({"font": "Lora"}))));
        assert!(!overlay.has_pending());
        assert!(overlay.take().is_empty());
    }

    #[test]
    fn summary_counts_changes() {
        let draft = json!([{"id": 1, "title": "Blog"}, {"id": 2, "title": "Shop"}]);
        let mut overlay = PreviewOverlay::new();
        overlay.propose_add_block(spec(json!({"title": "Instagram"})), Some(&draft));
        overlay.propose_remove_block(&BlockMatcher::Title("shop".into()), Some(&draft));
        overlay.propose_design_patch(spec(json!({"font": "Lora"})));

        let summary = overlay.summary(Some(&draft));
        assert_eq!(summary.added_blocks, 1);
        assert_eq!(summary.removed_blocks, 1);
        assert_eq!(summary.patched_fields, vec!["font".to_string()]);
    }
}
