//! Command implementations

use crate::config::PagedraftConfig;
use anyhow::{bail, Context, Result};
use pagedraft_core::{
    EditorSession, FilePreferenceStore, FlushReport, MemoryPreferenceStore, PreferenceStore,
    Section, SessionError, TransportError,
};
use pagedraft_transport::ResilientTransport;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Session for one-shot commands: manual saves, preferences left untouched
fn cli_session(config: &PagedraftConfig) -> Result<EditorSession> {
    let transport = ResilientTransport::connect(config.transport.clone())
        .context("invalid transport configuration")?;
    EditorSession::try_new(
        config.session.clone().with_autosave_default(false),
        Arc::new(transport),
        Arc::new(MemoryPreferenceStore::new()),
    )
    .context("invalid session configuration")
}

/// Parse a `{"design": {...}, "content-blocks": [...]}` file
pub(crate) fn read_sections(path: &Path) -> Result<BTreeMap<Section, Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not a section map", path.display()))
}

/// Seed every section from the server
async fn load_into(session: &EditorSession, document: &str) -> Result<()> {
    session
        .load_document(document)
        .await
        .with_context(|| format!("cannot load page {document}"))
}

pub(crate) async fn load(config: &PagedraftConfig, document: &str, json: bool) -> Result<()> {
    let session = cli_session(config)?;
    load_into(&session, document).await?;

    let sections: BTreeMap<Section, Value> = Section::ALL
        .into_iter()
        .filter_map(|section| session.draft(section).map(|value| (section, value)))
        .collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&sections)?);
        return Ok(());
    }

    println!("Page {document}");
    for (section, value) in &sections {
        println!("  {section}: {}", describe_value(value));
    }
    Ok(())
}

/// Overlay `file` on a fresh load and report what would change
pub(crate) async fn status(config: &PagedraftConfig, document: &str, file: &Path) -> Result<()> {
    let sections = read_sections(file)?;
    let session = cli_session(config)?;
    load_into(&session, document).await?;
    for (section, value) in sections {
        session.observe(section, value);
    }

    for section in Section::ALL {
        let state = if session.is_dirty(section) {
            "modified"
        } else {
            "unchanged"
        };
        println!("  {section}: {state}");
    }
    Ok(())
}

/// Overlay `file` on a fresh load and persist the sections that differ
pub(crate) async fn push(config: &PagedraftConfig, document: &str, file: &Path) -> Result<()> {
    let sections = read_sections(file)?;
    let session = cli_session(config)?;
    load_into(&session, document).await?;
    for (section, value) in sections {
        session.observe(section, value);
    }

    if !session.has_any_changes() {
        println!("Nothing to push; page {document} is up to date");
        return Ok(());
    }

    match session.save_now().await {
        Ok(report) => {
            print_lines(&report_lines(document, &report));
            Ok(())
        }
        Err(SessionError::SaveFailed { saved, failed }) => {
            print_lines(&failure_lines(document, &saved, &failed));
            Err(SessionError::SaveFailed { saved, failed }.into())
        }
        Err(err) => Err(err.into()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AutosaveAction {
    On,
    Off,
    Show,
}

pub(crate) fn autosave(
    config: &PagedraftConfig,
    preferences: &Path,
    action: AutosaveAction,
) -> Result<()> {
    let store = FilePreferenceStore::new(preferences);
    let key = config.session.preference_key.as_str();
    match action {
        AutosaveAction::On | AutosaveAction::Off => {
            let enabled = action == AutosaveAction::On;
            store.set_bool(key, enabled)?;
            println!("Autosave {}", if enabled { "enabled" } else { "disabled" });
        }
        AutosaveAction::Show => match store.get_bool(key)? {
            Some(enabled) => println!("Autosave: {}", on_off(enabled)),
            None => println!(
                "Autosave: {} (default)",
                on_off(config.session.autosave_default)
            ),
        },
    }
    Ok(())
}

pub(crate) fn parse_autosave_action(value: &str) -> Result<AutosaveAction> {
    match value {
        "on" => Ok(AutosaveAction::On),
        "off" => Ok(AutosaveAction::Off),
        "show" => Ok(AutosaveAction::Show),
        other => bail!("unknown autosave action '{other}', expected on, off or show"),
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

fn report_lines(document: &str, report: &FlushReport) -> Vec<String> {
    let mut lines = vec![format!("Pushed page {document}")];
    lines.extend(report.saved.iter().map(|section| format!("  {section}: saved")));
    lines.extend(
        report
            .still_dirty
            .iter()
            .map(|section| format!("  {section}: changed again during save")),
    );
    lines
}

fn failure_lines(
    document: &str,
    saved: &[Section],
    failed: &[(Section, TransportError)],
) -> Vec<String> {
    let mut lines = vec![format!("Push of page {document} incomplete")];
    lines.extend(saved.iter().map(|section| format!("  {section}: saved")));
    lines.extend(
        failed
            .iter()
            .map(|(section, err)| format!("  {section}: failed ({err})")),
    );
    lines
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::Array(items) => format!("{} item(s)", items.len()),
        Value::Object(fields) => format!("{} field(s)", fields.len()),
        Value::Null => "empty".to_string(),
        other => other.to_string(),
    }
}
