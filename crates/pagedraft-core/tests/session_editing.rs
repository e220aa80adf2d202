//! Functional tests for the navigation guard and the preview overlay, driven
//! through an editing session.
//!
//! Guarantees exercised here:
//! - Leaving the editor with unsaved changes is held until confirmed.
//! - Moving within the editor is never held.
//! - Confirming discards every draft; cancelling keeps them.
//! - Proposals are visible in the merged view but never dirty a section
//!   until applied, and discarding leaves drafts untouched.

use pagedraft_core::{
    BlockMatcher, BlockSpec, DesignPatch, NavigationDecision, OverlayState, SaveStatus, Section,
    SessionConfig,
};
use pagedraft_test_utils::{
    block, sample_blocks, sample_design, sample_page, session_with, ScriptedTransport, DOCUMENT,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

async fn loaded_session() -> (pagedraft_core::EditorSession, Arc<ScriptedTransport>) {
    let transport = Arc::new(ScriptedTransport::new().with_page(sample_page()));
    let session = session_with(SessionConfig::new().with_autosave_default(false), &transport);
    session.load_document(DOCUMENT).await.unwrap();
    (session, transport)
}

fn spec(fields: Value) -> BlockSpec {
    match fields {
        Value::Object(map) => map,
        other => panic!("block spec must be an object, got {other}"),
    }
}

fn patch(fields: Value) -> DesignPatch {
    spec(fields)
}

// ----------------------------------------------------------------------
// Navigation guard
// ----------------------------------------------------------------------

#[tokio::test]
async fn clean_session_navigates_freely() {
    let (session, _transport) = loaded_session().await;

    assert_eq!(session.attempt_navigation("/dashboard/analytics"), NavigationDecision::Proceed);
    assert!(!session.should_warn_before_unload());
    assert_eq!(session.pending_navigation(), None);
}

#[tokio::test]
async fn navigation_within_editor_is_not_held() {
    let (session, _transport) = loaded_session().await;
    session.observe(Section::Settings, json!({ "title": "Draft" }));

    let decision = session.attempt_navigation("/dashboard/pages/page-1/design?tab=colours");

    assert!(decision.proceeds());
    assert!(session.has_any_changes());
}

/// Leaving with unsaved changes is held; cancelling keeps the drafts,
/// confirming drops them and releases the target.
#[tokio::test]
async fn leaving_with_unsaved_changes_requires_confirmation() {
    let (session, transport) = loaded_session().await;
    session.observe(Section::Design, json!({ "background": "black" }));
    assert!(session.should_warn_before_unload());

    assert_eq!(session.attempt_navigation("/dashboard/analytics"), NavigationDecision::Held);
    assert_eq!(session.pending_navigation().as_deref(), Some("/dashboard/analytics"));

    assert_eq!(session.cancel_navigation().as_deref(), Some("/dashboard/analytics"));
    assert_eq!(session.pending_navigation(), None);
    assert!(session.is_dirty(Section::Design));

    assert_eq!(session.attempt_navigation("/dashboard/billing"), NavigationDecision::Held);
    assert_eq!(session.confirm_navigation().as_deref(), Some("/dashboard/billing"));

    assert!(!session.has_any_changes());
    assert!(!session.should_warn_before_unload());
    assert_eq!(session.document(), None);
    assert_eq!(session.draft(Section::Design), None);
    assert_eq!(transport.persist_count(), 0);
    assert_eq!(session.attempt_navigation("/dashboard/billing"), NavigationDecision::Proceed);
}

#[tokio::test]
async fn newer_target_replaces_held_one() {
    let (session, _transport) = loaded_session().await;
    session.observe(Section::SocialLinks, json!([]));

    session.attempt_navigation("/dashboard/analytics");
    session.attempt_navigation("/logout");

    assert_eq!(session.pending_navigation().as_deref(), Some("/logout"));
}

#[tokio::test]
async fn confirm_without_held_navigation_keeps_state() {
    let (session, _transport) = loaded_session().await;
    session.observe(Section::SocialLinks, json!([]));

    assert_eq!(session.confirm_navigation(), None);
    assert!(session.is_dirty(Section::SocialLinks));
    assert!(session.document().is_some());
}

// ----------------------------------------------------------------------
// Preview overlay
// ----------------------------------------------------------------------

/// A proposed block is shown first in the merged view without touching the
/// draft; applying it dirties the blocks section.
#[tokio::test]
async fn proposed_block_is_previewed_then_applied() {
    let (session, _transport) = loaded_session().await;

    let id = session.propose_add_block(spec(json!({
        "title": "Book a call",
        "url": "https://example.com/call",
    })));

    assert!(id.starts_with("preview-"));
    assert_eq!(session.overlay_state(), OverlayState::Previewing);
    let merged = session.merged_view();
    assert_eq!(merged.block_list().len(), 3);
    assert_eq!(merged.block_list()[0]["title"], json!("Book a call"));
    assert_eq!(merged.block_list()[0]["id"], json!(id));
    assert_eq!(session.draft(Section::ContentBlocks), Some(sample_blocks()));
    assert!(!session.has_any_changes());
    assert_eq!(session.overlay_summary().added_blocks, 1);

    assert!(session.apply_overlay());

    assert_eq!(session.overlay_state(), OverlayState::Idle);
    assert!(session.is_dirty(Section::ContentBlocks));
    let draft = session.draft(Section::ContentBlocks).unwrap();
    assert_eq!(draft.as_array().map(Vec::len), Some(3));
    assert_eq!(draft[0]["title"], json!("Book a call"));
}

#[tokio::test]
async fn discarding_overlay_leaves_drafts_untouched() {
    let (session, _transport) = loaded_session().await;
    session.observe(Section::Design, json!({ "background": "navy" }));

    session.propose_add_block(spec(json!({ "title": "Shop" })));
    session.propose_design_patch(patch(json!({ "font": "Lora" })));
    session.discard_overlay();

    assert!(!session.has_pending_overlay());
    assert!(!session.apply_overlay());
    assert_eq!(session.draft(Section::Design), Some(json!({ "background": "navy" })));
    assert_eq!(session.draft(Section::ContentBlocks), Some(sample_blocks()));
    assert_eq!(session.dirty_sections(), vec![Section::Design]);
}

#[tokio::test]
async fn removal_matches_title_case_insensitively() {
    let (session, _transport) = loaded_session().await;

    let removed = session.propose_remove_block(&BlockMatcher::Title("portfolio".to_string()));

    assert_eq!(removed, 1);
    assert_eq!(
        session.merged_view().block_list(),
        &[block(2, "Newsletter", "https://example.com/news")]
    );
    assert_eq!(session.overlay_summary().removed_blocks, 1);

    session.apply_overlay();
    assert_eq!(
        session.draft(Section::ContentBlocks),
        Some(json!([block(2, "Newsletter", "https://example.com/news")]))
    );
}

#[tokio::test]
async fn removal_by_id_and_url() {
    let (session, _transport) = loaded_session().await;

    assert_eq!(session.propose_remove_block(&BlockMatcher::Id("2".to_string())), 1);
    assert_eq!(
        session.propose_remove_block(&BlockMatcher::Url("https://example.com/work".to_string())),
        1
    );
    assert!(session.merged_view().block_list().is_empty());
    assert_eq!(
        session.propose_remove_block(&BlockMatcher::Title("missing".to_string())),
        0
    );
}

#[tokio::test]
async fn design_patch_merges_over_draft() {
    let (session, _transport) = loaded_session().await;

    session.propose_design_patch(patch(json!({ "background": "black" })));
    session.propose_design_patch(patch(json!({ "font": "Lora" })));

    let mut expected = sample_design();
    expected["background"] = json!("black");
    expected["font"] = json!("Lora");
    assert_eq!(session.merged_view().design, expected);
    assert!(!session.is_dirty(Section::Design));
    assert_eq!(
        session.overlay_summary().patched_fields,
        vec!["background".to_string(), "font".to_string()]
    );

    session.apply_overlay();
    assert_eq!(session.draft(Section::Design), Some(expected));
    assert_eq!(session.dirty_sections(), vec![Section::Design]);
}

#[tokio::test]
async fn overlay_is_cleared_by_document_switch() {
    let (session, _transport) = loaded_session().await;
    session.propose_add_block(spec(json!({ "title": "Shop" })));

    session.set_document("page-2");

    assert!(!session.has_pending_overlay());
    assert!(session.merged_view().block_list().is_empty());
}

#[tokio::test]
async fn applying_before_load_seeds_empty_sections() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = session_with(SessionConfig::new().with_autosave_default(false), &transport);
    session.set_document(DOCUMENT);

    session.propose_add_block(spec(json!({ "title": "First" })));
    session.propose_design_patch(patch(json!({ "background": "white" })));
    assert!(session.apply_overlay());

    assert_eq!(session.baseline(Section::ContentBlocks), Some(json!([])));
    assert_eq!(session.baseline(Section::Design), Some(json!({})));
    assert_eq!(
        session.dirty_sections(),
        vec![Section::ContentBlocks, Section::Design]
    );
    session.save_now().await.unwrap();
    assert_eq!(transport.persists_of(Section::Design), vec![json!({ "background": "white" })]);
}

/// With autosave on, proposals never schedule a save; applying them does,
/// and the persisted block list then leads with the proposed block.
#[tokio::test(start_paused = true)]
async fn applied_proposal_is_autosaved() {
    let transport = Arc::new(ScriptedTransport::new().with_page(sample_page()));
    let session = session_with(SessionConfig::new(), &transport);
    session.load_document(DOCUMENT).await.unwrap();
    assert!(session.autosave_enabled());

    session.propose_add_block(spec(json!({
        "title": "Instagram",
        "url": "https://instagram.com/example",
    })));
    session.propose_design_patch(patch(json!({ "background": "black" })));

    assert!(!session.flush_scheduled());
    assert!(!session.has_any_changes());
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.persist_count(), 0);

    assert!(session.apply_overlay());
    assert!(session.flush_scheduled());

    transport.wait_for_persists(2).await;
    let mut status = session.subscribe_status();
    status
        .wait_for(|s| matches!(s, SaveStatus::Saved { .. }))
        .await
        .unwrap();

    let blocks = session.baseline(Section::ContentBlocks).unwrap();
    assert_eq!(blocks[0]["title"], json!("Instagram"));
    assert_eq!(blocks.as_array().map(Vec::len), Some(3));
    assert_eq!(
        session.baseline(Section::Design).unwrap()["background"],
        json!("black")
    );
    assert!(!session.has_any_changes());
}
