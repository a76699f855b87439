//! Anchor selection: which turns are carried verbatim into the extractor
//!
//! The first turn, recent turns, and turns flagged as errors or high
//! signal are always carried. What remains of the anchor budget goes to
//! goal-matched turns, best score first.

use crate::budget::{HandoffBudgets, estimate_tokens, truncate_to_tokens};
use crate::index::{BranchIndex, Turn};
use crate::redact::{is_sensitive_path, redact};

/// Why a turn was selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorReason {
    FirstUser,
    Error,
    KeySignal,
    GoalMatch,
}

impl AnchorReason {
    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            AnchorReason::FirstUser => "first user",
            AnchorReason::Error => "error",
            AnchorReason::KeySignal => "key signal",
            AnchorReason::GoalMatch => "goal match",
        }
    }
}

/// A turn selected for verbatim inclusion
#[derive(Debug, Clone)]
pub struct Anchor {
    pub turn_index: usize,
    pub reason: AnchorReason,
    pub excerpt: String,
    pub required: bool,
}

/// Select anchors for the branch.
///
/// Required anchors are always present regardless of budget pressure;
/// optional anchors fill the remaining `anchor_tokens`. The result is
/// ordered by turn index so the extractor reads the conversation in
/// order.
pub fn select_anchors(index: &BranchIndex, budgets: &HandoffBudgets) -> Vec<Anchor> {
    let turn_count = index.turns.len();
    if turn_count == 0 {
        return vec![];
    }

    let recent_start = turn_count.saturating_sub(budgets.recent_turn_count);
    let is_required = |turn: &Turn| {
        turn.index == 0 || turn.index >= recent_start || turn.has_error || turn.high_signal
    };

    let mut anchors: Vec<Anchor> = vec![];
    let mut accumulated = 0usize;

    for turn in index.turns.iter().filter(|t| is_required(t)) {
        let excerpt = build_turn_excerpt(turn, budgets.required_anchor_tokens);
        accumulated += estimate_tokens(&excerpt);
        anchors.push(Anchor {
            turn_index: turn.index,
            reason: required_reason(turn),
            excerpt,
            required: true,
        });
    }

    let mut candidates: Vec<&Turn> = index
        .turns
        .iter()
        .filter(|t| !is_required(t) && t.goal_score > 0)
        .collect();
    candidates.sort_by(|a, b| b.goal_score.cmp(&a.goal_score).then(a.index.cmp(&b.index)));

    for turn in candidates {
        if accumulated >= budgets.anchor_tokens {
            break;
        }
        let excerpt = build_turn_excerpt(turn, budgets.optional_anchor_tokens);
        accumulated += estimate_tokens(&excerpt);
        anchors.push(Anchor {
            turn_index: turn.index,
            reason: AnchorReason::GoalMatch,
            excerpt,
            required: false,
        });
    }

    anchors.sort_by_key(|a| a.turn_index);
    anchors
}

/// Reason precedence for required anchors.
fn required_reason(turn: &Turn) -> AnchorReason {
    if turn.index == 0 {
        AnchorReason::FirstUser
    } else if turn.has_error {
        AnchorReason::Error
    } else {
        AnchorReason::KeySignal
    }
}

/// Render one turn for the extractor, capped at `budget` tokens.
pub fn build_turn_excerpt(turn: &Turn, budget: usize) -> String {
    let mut sections: Vec<String> = vec![];

    if !turn.user_text.is_empty() {
        sections.push(format!("[User]: {}", turn.user_text));
    }
    if !turn.assistant_texts.is_empty() {
        sections.push(format!("[Assistant]: {}", turn.assistant_texts.join("\n")));
    }
    if !turn.tool_calls.is_empty() {
        let calls: Vec<String> = turn.tool_calls.iter().map(display_tool_call).collect();
        sections.push(format!("[Assistant tool calls]: {}", calls.join("; ")));
    }
    let errors: Vec<String> = turn
        .tool_results
        .iter()
        .filter(|r| r.is_error)
        .map(|r| format!("{}: {}", r.tool_name, r.content_text))
        .collect();
    if !errors.is_empty() {
        sections.push(format!("[Tool errors]: {}", errors.join("\n")));
    }
    if !turn.extra_texts.is_empty() {
        sections.push(format!("[Custom]: {}", turn.extra_texts.join("\n")));
    }

    truncate_to_tokens(&sections.join("\n"), budget)
}

/// Display form of one tool call inside an excerpt.
pub(crate) fn display_tool_call(call: &crate::index::ToolCallInfo) -> String {
    if call.name == "bash" {
        let command = call
            .arguments
            .get("command")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let command = redact(command);
        let command: String = command.chars().take(180).collect();
        format!("bash(command={})", json_quote(&command))
    } else {
        match call.arguments.get("path").and_then(|v| v.as_str()) {
            Some(path) if is_sensitive_path(path) => format!("{}(path=[redacted])", call.name),
            Some(path) => format!("{}(path={})", call.name, json_quote(path)),
            None => format!("{}()", call.name),
        }
    }
}

fn json_quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text))
}
