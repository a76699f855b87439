//! The handoff controller
//!
//! Orchestrates indexing, selection, assembly, and the two LLM passes,
//! then hands the composed prompt to the user for review and seeds the
//! child session. Everything the controller touches outside its own crate
//! comes in through narrow capability traits, so the engine stays testable
//! without a terminal or a network.

use std::path::Path;

use baton_ai::{CompletionClient, Model};
use tokio_util::sync::CancellationToken;

use crate::anchor::select_anchors;
use crate::budget::HandoffBudgets;
use crate::bundle::{build_composer_input, build_extractor_input};
use crate::entry::SessionEntry;
use crate::error::{Error, Result};
use crate::index::build_branch_index;
use crate::operational::{FileLists, collect_operational_items, file_lists};
use crate::pipeline::{PassKind, PassOutcome, RetryConfig, run_pass};
use crate::score::score_turns;

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Error,
}

/// Read/append access to the originating session
pub trait SessionAccess {
    /// Entries of the current branch, root to leaf
    fn branch(&self) -> Vec<SessionEntry>;

    /// Append an extension-state entry to the session
    fn append_custom(&mut self, custom_type: &str, data: serde_json::Value)
    -> std::io::Result<()>;

    /// The session's file, used for parent linkage
    fn session_file(&self) -> &Path;
}

/// The user-facing review surface
pub trait HandoffUi {
    /// Open `initial` for editing; `None` means the user cancelled
    fn edit(&self, title: &str, initial: &str) -> Option<String>;

    /// Show a message to the user
    fn notify(&self, message: &str, level: NotifyLevel);
}

/// Parameters of one handoff invocation
pub struct HandoffRequest<'a> {
    /// The follow-up goal, already trimmed
    pub goal: String,
    /// Model used for both passes
    pub model: &'a Model,
    /// API key for the completion layer
    pub api_key: Option<String>,
    /// Budget overrides
    pub budgets: HandoffBudgets,
    /// Retry policy for the passes
    pub retry: RetryConfig,
}

/// What a handoff invocation produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffOutcome {
    /// The child session was seeded with this prompt
    Completed { prompt: String },
    /// The user cancelled somewhere along the way; nothing was mutated
    /// unless the audit record had already been written
    Cancelled,
}

/// Run one handoff end to end.
///
/// `spawn_session` receives the originating session's file (for parent
/// linkage) and the reviewed prompt; it returns `Ok(false)` when the user
/// backed out of session creation.
pub async fn run_handoff(
    request: HandoffRequest<'_>,
    session: &mut dyn SessionAccess,
    ui: &dyn HandoffUi,
    client: &dyn CompletionClient,
    cancel: &CancellationToken,
    spawn_session: impl FnOnce(&Path, &str) -> std::io::Result<bool>,
) -> Result<HandoffOutcome> {
    let goal = request.goal.trim();
    if goal.is_empty() {
        return Err(Error::Precondition("Goal is required".to_string()));
    }

    let entries = session.branch();
    if entries.is_empty() {
        return Err(Error::Precondition(
            "No session entries to hand off".to_string(),
        ));
    }

    let mut index = build_branch_index(&entries, &request.budgets);
    if index.turns.is_empty() {
        return Err(Error::Precondition(
            "No conversation turns to hand off".to_string(),
        ));
    }

    score_turns(&mut index, goal);
    let anchors = select_anchors(&index, &request.budgets);
    let items = collect_operational_items(&index, &request.budgets);
    let lists = file_lists(&index, &request.budgets);

    let extractor_input =
        build_extractor_input(goal, &index, &anchors, &items, &lists, &request.budgets);
    let facts = match run_pass(
        client,
        request.model,
        request.api_key.as_deref(),
        PassKind::Extract,
        &extractor_input,
        cancel,
        &request.retry,
    )
    .await?
    {
        PassOutcome::Text(text) => text,
        PassOutcome::Cancelled => return Ok(HandoffOutcome::Cancelled),
    };

    let composer_input = build_composer_input(goal, &facts, &items, &lists, &request.budgets);
    let composed = match run_pass(
        client,
        request.model,
        request.api_key.as_deref(),
        PassKind::Compose,
        &composer_input,
        cancel,
        &request.retry,
    )
    .await?
    {
        PassOutcome::Text(text) => text,
        PassOutcome::Cancelled => return Ok(HandoffOutcome::Cancelled),
    };

    let prompt = ensure_file_blocks(&composed, &lists);

    if cancel.is_cancelled() {
        return Ok(HandoffOutcome::Cancelled);
    }
    let Some(edited) = ui.edit("Handoff prompt", &prompt) else {
        return Ok(HandoffOutcome::Cancelled);
    };

    // The audit record lands in the originating session before the child
    // session exists.
    session.append_custom(
        "handoff",
        serde_json::json!({
            "goal": goal,
            "timestamp": chrono::Utc::now().timestamp_millis(),
        }),
    )?;

    if !spawn_session(session.session_file(), &edited)? {
        return Ok(HandoffOutcome::Cancelled);
    }

    Ok(HandoffOutcome::Completed { prompt: edited })
}

/// Append any machine-parseable file block the composer left out.
///
/// An output already carrying both blocks passes through unchanged.
pub fn ensure_file_blocks(output: &str, lists: &FileLists) -> String {
    let mut out = output.to_string();
    if !out.contains("<read-files>") {
        out.push_str("\n\n<read-files>\n");
        for path in &lists.read {
            out.push_str(path);
            out.push('\n');
        }
        out.push_str("</read-files>");
    }
    if !out.contains("<modified-files>") {
        out.push_str("\n\n<modified-files>\n");
        for path in &lists.modified {
            out.push_str(path);
            out.push('\n');
        }
        out.push_str("</modified-files>");
    }
    out
}
