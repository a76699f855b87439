//! Offline heuristics rows
//!
//! The offline tool replays the indexing and selection core over stored
//! sessions and emits one row per turn plus one summary row per session,
//! for tuning the selection heuristics against real traffic.

use std::collections::HashMap;

use serde::Serialize;

use crate::anchor::{display_tool_call, select_anchors};
use crate::budget::HandoffBudgets;
use crate::entry::SessionEntry;
use crate::index::build_branch_index;
use crate::redact::is_sensitive_path;
use crate::score::score_turns;

/// One row of `turns.jsonl`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRecord {
    pub session_file: String,
    pub session_id: String,
    pub goal_source: String,
    pub goal: String,
    pub turn_index: usize,
    pub entry_id: String,
    pub user_text: String,
    pub assistant_text: String,
    pub tool_calls: Vec<String>,
    pub tool_errors: Vec<String>,
    pub file_paths: Vec<String>,
    pub has_error: bool,
    pub high_signal: bool,
    pub goal_score: i64,
    pub selected: bool,
    pub required: bool,
    pub reasons: Vec<String>,
}

/// One row of `sessions.json`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_file: String,
    pub session_id: String,
    pub goal_source: String,
    pub goal: String,
    pub turn_count: usize,
    pub selected_count: usize,
}

/// Where a session's goal came from
#[derive(Debug, Clone)]
pub struct GoalSpec {
    pub source: String,
    pub goal: String,
    /// Leaf entry addressing the branch (handoff source only)
    pub leaf_entry_id: Option<String>,
}

/// Derive the goal for a stored session.
///
/// A recorded handoff audit entry wins; its goal is what the user actually
/// asked to carry forward, and its parent id addresses the branch leaf at
/// that moment. Without one, the final user message stands in.
pub fn derive_goal(entries: &[SessionEntry]) -> Option<GoalSpec> {
    for entry in entries.iter().rev() {
        if let SessionEntry::Custom {
            custom_type,
            data,
            parent_id,
            ..
        } = entry
        {
            if custom_type == "handoff" {
                let goal = data.get("goal").and_then(|v| v.as_str())?.to_string();
                return Some(GoalSpec {
                    source: "handoff".to_string(),
                    goal,
                    leaf_entry_id: parent_id.clone(),
                });
            }
        }
    }

    for entry in entries.iter().rev() {
        if let SessionEntry::Message { message, .. } = entry {
            if let baton_ai::Message::User { .. } = message {
                let goal = message.text().trim().to_string();
                if !goal.is_empty() {
                    return Some(GoalSpec {
                        source: "last_user".to_string(),
                        goal,
                        leaf_entry_id: None,
                    });
                }
            }
        }
    }

    None
}

/// Rebuild the branch ending at `leaf_id` by walking parent pointers.
///
/// Logs written without parent linkage fall back to the file-order prefix
/// up to the leaf.
pub fn branch_to_leaf(entries: &[SessionEntry], leaf_id: &str) -> Vec<SessionEntry> {
    let by_id: HashMap<&str, &SessionEntry> =
        entries.iter().map(|e| (e.id(), e)).collect();

    let mut chain: Vec<SessionEntry> = vec![];
    let mut cursor = by_id.get(leaf_id).copied();
    while let Some(entry) = cursor {
        chain.push(entry.clone());
        cursor = entry.parent_id().and_then(|pid| by_id.get(pid).copied());
    }
    chain.reverse();

    if chain.len() > 1 || entries.len() <= 1 {
        return chain;
    }

    // No usable parent chain; take the prefix in log order
    match entries.iter().position(|e| e.id() == leaf_id) {
        Some(pos) => entries[..=pos].to_vec(),
        None => chain,
    }
}

/// Run the selection core over one stored session.
///
/// Returns `None` when no goal can be derived (nothing to score against).
pub fn analyze_session(
    session_file: &str,
    session_id: &str,
    entries: &[SessionEntry],
    budgets: &HandoffBudgets,
) -> Option<(SessionRecord, Vec<TurnRecord>)> {
    let goal_spec = derive_goal(entries)?;

    let branch: Vec<SessionEntry> = match &goal_spec.leaf_entry_id {
        Some(leaf) => branch_to_leaf(entries, leaf),
        None => entries.to_vec(),
    };

    let mut index = build_branch_index(&branch, budgets);
    score_turns(&mut index, &goal_spec.goal);
    let anchors = select_anchors(&index, budgets);

    let mut selection: HashMap<usize, (bool, &'static str)> = HashMap::new();
    for anchor in &anchors {
        selection.insert(anchor.turn_index, (anchor.required, anchor.reason.label()));
    }

    let turns: Vec<TurnRecord> = index
        .turns
        .iter()
        .map(|turn| {
            let selected = selection.get(&turn.index);
            let required = selected.map(|(required, _)| *required).unwrap_or(false);
            let reasons = selected
                .map(|(_, reason)| turn_reasons(turn, required, reason))
                .unwrap_or_default();
            TurnRecord {
                session_file: session_file.to_string(),
                session_id: session_id.to_string(),
                goal_source: goal_spec.source.clone(),
                goal: goal_spec.goal.clone(),
                turn_index: turn.index,
                entry_id: turn.start_entry_id.clone(),
                user_text: turn.user_text.clone(),
                assistant_text: turn.assistant_texts.join("\n"),
                tool_calls: turn.tool_calls.iter().map(display_tool_call).collect(),
                tool_errors: turn
                    .tool_results
                    .iter()
                    .filter(|r| r.is_error)
                    .map(|r| format!("{}: {}", r.tool_name, r.content_text))
                    .collect(),
                file_paths: turn
                    .file_paths
                    .iter()
                    .filter(|p| !is_sensitive_path(p))
                    .cloned()
                    .collect(),
                has_error: turn.has_error,
                high_signal: turn.high_signal,
                goal_score: turn.goal_score,
                selected: selected.is_some(),
                required,
                reasons,
            }
        })
        .collect();

    let record = SessionRecord {
        session_file: session_file.to_string(),
        session_id: session_id.to_string(),
        goal_source: goal_spec.source,
        goal: goal_spec.goal,
        turn_count: index.turns.len(),
        selected_count: anchors.len(),
    };

    Some((record, turns))
}

/// Every reason that applies to a selected turn, falling back to the
/// selection reason when no flag does.
fn turn_reasons(turn: &crate::index::Turn, required: bool, selection_reason: &str) -> Vec<String> {
    let mut reasons = vec![];
    if turn.index == 0 {
        reasons.push("first user".to_string());
    }
    if turn.has_error {
        reasons.push("error".to_string());
    }
    if turn.high_signal {
        reasons.push("key signal".to_string());
    }
    if !required {
        reasons.push("goal match".to_string());
    }
    if reasons.is_empty() {
        reasons.push(selection_reason.to_string());
    }
    reasons
}
