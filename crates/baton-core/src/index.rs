//! Branch indexing: from raw session entries to a typed turn model
//!
//! Walks the entries of one branch in order, grouping them into turns. A
//! turn starts at a user message (or at the branch start) and runs until
//! the next user message. Summaries sit outside the turn model; their file
//! details feed the branch-wide file operations directly.

use std::collections::{BTreeSet, HashMap};

use baton_ai::{Content, Message, StopReason};

use crate::budget::{HandoffBudgets, truncate_lines};
use crate::entry::SessionEntry;
use crate::redact::{normalize, redact};

/// Words that mark a turn as carrying durable constraints or state.
const HIGH_SIGNAL_MARKERS: &[&str] = &[
    "must",
    "constraint",
    "decision",
    "blocked",
    "todo",
    "fix",
    "should",
    "require",
    "avoid",
    "risk",
    "bug",
    "prefer",
];

/// Tool names whose path argument counts as a read.
const READ_TOOLS: &[&str] = &["read"];
/// Tool names whose path argument counts as a modification.
const WRITE_TOOLS: &[&str] = &["write", "edit"];

/// A tool call recorded on a turn
#[derive(Debug, Clone)]
pub struct ToolCallInfo {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    pub entry_id: String,
}

/// A tool result recorded on a turn
#[derive(Debug, Clone)]
pub struct ToolResultInfo {
    pub tool_call_id: String,
    pub tool_name: String,
    pub is_error: bool,
    pub content_text: String,
}

/// One conversation turn: a user message and everything emitted in response
#[derive(Debug, Clone)]
pub struct Turn {
    pub index: usize,
    pub start_entry_id: String,
    pub entry_ids: Vec<String>,
    pub user_text: String,
    pub assistant_texts: Vec<String>,
    pub extra_texts: Vec<String>,
    pub tool_calls: Vec<ToolCallInfo>,
    pub tool_results: Vec<ToolResultInfo>,
    pub file_paths: BTreeSet<String>,
    pub has_error: bool,
    pub high_signal: bool,
    pub search_text: String,
    pub goal_score: i64,
}

/// A prior summarization, preserved verbatim
#[derive(Debug, Clone)]
pub struct SummaryEntry {
    pub entry_id: String,
    pub kind: &'static str,
    pub summary: String,
}

/// Paths touched on the branch; modification wins over read
#[derive(Debug, Clone, Default)]
pub struct FileOperations {
    pub read: BTreeSet<String>,
    pub modified: BTreeSet<String>,
}

/// The derived model of one branch
#[derive(Debug, Default)]
pub struct BranchIndex {
    pub turns: Vec<Turn>,
    pub summary_entries: Vec<SummaryEntry>,
    pub file_ops: FileOperations,
    pub tool_calls_by_id: HashMap<String, ToolCallInfo>,
}

/// Accumulates one turn until the next user message closes it.
struct TurnBuilder {
    start_entry_id: String,
    entry_ids: Vec<String>,
    user_text: String,
    assistant_texts: Vec<String>,
    extra_texts: Vec<String>,
    tool_calls: Vec<ToolCallInfo>,
    tool_results: Vec<ToolResultInfo>,
    file_paths: BTreeSet<String>,
    has_error: bool,
}

impl TurnBuilder {
    fn new(start_entry_id: String, user_text: String) -> Self {
        Self {
            start_entry_id,
            entry_ids: vec![],
            user_text,
            assistant_texts: vec![],
            extra_texts: vec![],
            tool_calls: vec![],
            tool_results: vec![],
            file_paths: BTreeSet::new(),
            has_error: false,
        }
    }

    fn finalize(self, index: usize) -> Turn {
        let mut parts: Vec<String> = vec![self.user_text.clone()];
        parts.extend(self.assistant_texts.iter().cloned());
        parts.extend(self.extra_texts.iter().cloned());
        for call in &self.tool_calls {
            parts.push(tool_call_signature(call));
        }
        for result in &self.tool_results {
            if result.is_error {
                parts.push(result.content_text.clone());
            }
        }
        let search_text = normalize(&parts.join("\n")).to_lowercase();
        let high_signal = HIGH_SIGNAL_MARKERS
            .iter()
            .any(|marker| search_text.contains(marker));

        Turn {
            index,
            start_entry_id: self.start_entry_id,
            entry_ids: self.entry_ids,
            user_text: self.user_text,
            assistant_texts: self.assistant_texts,
            extra_texts: self.extra_texts,
            tool_calls: self.tool_calls,
            tool_results: self.tool_results,
            file_paths: self.file_paths,
            has_error: self.has_error,
            high_signal,
            search_text,
            goal_score: 0,
        }
    }
}

/// How a tool call appears in the search index: the redacted command for
/// bash, the tool name plus path otherwise.
fn tool_call_signature(call: &ToolCallInfo) -> String {
    if call.name == "bash" {
        let command = call
            .arguments
            .get("command")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        format!("bash {}", redact(command))
    } else {
        let path = call
            .arguments
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        format!("{} {}", call.name, path)
    }
}

/// Build the branch index from entries in root-to-leaf order.
///
/// Deterministic for a given input sequence.
pub fn build_branch_index(entries: &[SessionEntry], budgets: &HandoffBudgets) -> BranchIndex {
    let mut index = BranchIndex::default();
    let mut current: Option<TurnBuilder> = None;

    for entry in entries {
        match entry {
            SessionEntry::Session { .. } => {}
            SessionEntry::Message {
                id,
                message: Message::User { content, .. },
                ..
            } => {
                if let Some(builder) = current.take() {
                    let turn_index = index.turns.len();
                    index.turns.push(builder.finalize(turn_index));
                }
                let text: String = content
                    .iter()
                    .filter_map(|c| c.as_text())
                    .collect::<Vec<_>>()
                    .join("\n");
                let mut builder = TurnBuilder::new(id.clone(), normalize(&text));
                builder.entry_ids.push(id.clone());
                current = Some(builder);
            }
            SessionEntry::Message {
                id,
                message:
                    Message::Assistant {
                        content, metadata, ..
                    },
                ..
            } => {
                let builder = open_turn(&mut current, id);
                builder.entry_ids.push(id.clone());
                if metadata.stop_reason == Some(StopReason::Error)
                    || metadata.error_message.is_some()
                {
                    builder.has_error = true;
                }
                for block in content {
                    match block {
                        Content::Text { text } => {
                            let text = normalize(text);
                            if !text.is_empty() {
                                builder.assistant_texts.push(text);
                            }
                        }
                        Content::Thinking { .. } => {}
                        Content::ToolCall {
                            id: call_id,
                            name,
                            arguments,
                        } => {
                            let call = ToolCallInfo {
                                id: call_id.clone(),
                                name: name.clone(),
                                arguments: arguments.clone(),
                                entry_id: id.clone(),
                            };
                            record_file_operation(&call, builder, &mut index.file_ops);
                            index
                                .tool_calls_by_id
                                .insert(call_id.clone(), call.clone());
                            builder.tool_calls.push(call);
                        }
                    }
                }
            }
            SessionEntry::Message {
                id,
                message:
                    Message::ToolResult {
                        tool_call_id,
                        tool_name,
                        content,
                        is_error,
                        ..
                    },
                ..
            } => {
                // Orphan results (no matching call) stay on the current turn
                let builder = open_turn(&mut current, id);
                builder.entry_ids.push(id.clone());
                if *is_error {
                    builder.has_error = true;
                }
                let text: String = content
                    .iter()
                    .filter_map(|c| c.as_text())
                    .collect::<Vec<_>>()
                    .join("\n");
                let content_text =
                    normalize(&truncate_lines(&text, budgets.max_tool_output_lines));
                builder.tool_results.push(ToolResultInfo {
                    tool_call_id: tool_call_id.clone(),
                    tool_name: tool_name.clone(),
                    is_error: *is_error,
                    content_text,
                });
            }
            SessionEntry::CustomMessage { id, content, .. } => {
                let builder = open_turn(&mut current, id);
                builder.entry_ids.push(id.clone());
                let text = normalize(content);
                if !text.is_empty() {
                    builder.extra_texts.push(text);
                }
            }
            SessionEntry::Compaction {
                id,
                summary,
                details,
                ..
            } => {
                index.summary_entries.push(SummaryEntry {
                    entry_id: id.clone(),
                    kind: "compaction",
                    summary: summary.clone(),
                });
                apply_summary_details(details.as_ref(), &mut index.file_ops);
            }
            SessionEntry::BranchSummary {
                id,
                summary,
                details,
                ..
            } => {
                index.summary_entries.push(SummaryEntry {
                    entry_id: id.clone(),
                    kind: "branch_summary",
                    summary: summary.clone(),
                });
                apply_summary_details(details.as_ref(), &mut index.file_ops);
            }
            SessionEntry::Custom { .. } => {}
        }
    }

    if let Some(builder) = current.take() {
        let turn_index = index.turns.len();
        index.turns.push(builder.finalize(turn_index));
    }

    index
}

/// Get the open turn, starting a branch-start turn if none is open yet.
fn open_turn<'a>(current: &'a mut Option<TurnBuilder>, entry_id: &str) -> &'a mut TurnBuilder {
    current.get_or_insert_with(|| TurnBuilder::new(entry_id.to_string(), String::new()))
}

fn record_file_operation(
    call: &ToolCallInfo,
    builder: &mut TurnBuilder,
    file_ops: &mut FileOperations,
) {
    let Some(path) = call.arguments.get("path").and_then(|v| v.as_str()) else {
        return;
    };
    builder.file_paths.insert(path.to_string());
    let name = call.name.as_str();
    if READ_TOOLS.contains(&name) {
        file_ops.read.insert(path.to_string());
    } else if WRITE_TOOLS.contains(&name) {
        file_ops.modified.insert(path.to_string());
    }
}

fn apply_summary_details(
    details: Option<&crate::entry::SummaryDetails>,
    file_ops: &mut FileOperations,
) {
    let Some(details) = details else { return };
    for path in &details.read_files {
        file_ops.read.insert(path.clone());
    }
    for path in &details.modified_files {
        file_ops.modified.insert(path.clone());
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    fn index(entries: &[SessionEntry]) -> BranchIndex {
        build_branch_index(entries, &HandoffBudgets::default())
    }

    #[test]
    fn test_turn_count_matches_user_messages() {
        let entries = vec![
            user_entry("u1", "first question"),
            assistant_entry("a1", "first answer"),
            user_entry("u2", "second question"),
            assistant_entry("a2", "second answer"),
            user_entry("u3", "third question"),
        ];
        let idx = index(&entries);
        assert_eq!(idx.turns.len(), 3);
        assert_eq!(idx.turns[0].user_text, "first question");
        assert_eq!(idx.turns[2].index, 2);
    }

    #[test]
    fn test_entries_before_first_user_form_a_turn() {
        let entries = vec![
            assistant_entry("a0", "resuming from before"),
            user_entry("u1", "hello"),
            assistant_entry("a1", "hi"),
        ];
        let idx = index(&entries);
        assert_eq!(idx.turns.len(), 2);
        assert!(idx.turns[0].user_text.is_empty());
        assert_eq!(idx.turns[0].start_entry_id, "a0");
        assert_eq!(idx.turns[1].user_text, "hello");
    }

    #[test]
    fn test_tool_calls_and_results_grouped_on_turn() {
        let entries = vec![
            user_entry("u1", "read that file"),
            tool_call_entry("a1", "c1", "read", serde_json::json!({"path": "/src/lib.rs"})),
            tool_result_entry("t1", "c1", "read", "contents here", false),
            assistant_entry("a2", "done"),
        ];
        let idx = index(&entries);
        assert_eq!(idx.turns.len(), 1);
        let turn = &idx.turns[0];
        assert_eq!(turn.tool_calls.len(), 1);
        assert_eq!(turn.tool_results.len(), 1);
        assert!(turn.file_paths.contains("/src/lib.rs"));
        assert!(idx.file_ops.read.contains("/src/lib.rs"));
        assert!(idx.tool_calls_by_id.contains_key("c1"));
    }

    #[test]
    fn test_write_and_edit_count_as_modified() {
        let entries = vec![
            user_entry("u1", "change it"),
            tool_call_entry("a1", "c1", "write", serde_json::json!({"path": "/a.rs"})),
            tool_call_entry("a2", "c2", "edit", serde_json::json!({"path": "/b.rs"})),
        ];
        let idx = index(&entries);
        assert!(idx.file_ops.modified.contains("/a.rs"));
        assert!(idx.file_ops.modified.contains("/b.rs"));
        assert!(idx.file_ops.read.is_empty());
    }

    #[test]
    fn test_error_result_sets_has_error() {
        let entries = vec![
            user_entry("u1", "run tests"),
            tool_call_entry("a1", "c1", "bash", serde_json::json!({"command": "npm test"})),
            tool_result_entry("t1", "c1", "bash", "1 test failed", true),
        ];
        let idx = index(&entries);
        assert!(idx.turns[0].has_error);
    }

    #[test]
    fn test_assistant_error_metadata_sets_has_error() {
        let entries = vec![
            user_entry("u1", "hello"),
            assistant_error_entry("a1", "partial"),
        ];
        let idx = index(&entries);
        assert!(idx.turns[0].has_error);
    }

    #[test]
    fn test_orphan_tool_result_retained() {
        let entries = vec![
            user_entry("u1", "hello"),
            tool_result_entry("t1", "missing_call", "bash", "output", false),
        ];
        let idx = index(&entries);
        assert_eq!(idx.turns[0].tool_results.len(), 1);
        assert_eq!(idx.turns[0].tool_results[0].tool_call_id, "missing_call");
    }

    #[test]
    fn test_high_signal_markers() {
        let entries = vec![
            user_entry("u1", "we MUST keep the wire format stable"),
            user_entry("u2", "what color is the sky"),
        ];
        let idx = index(&entries);
        assert!(idx.turns[0].high_signal);
        assert!(!idx.turns[1].high_signal);
    }

    #[test]
    fn test_search_text_includes_tool_signatures() {
        let entries = vec![
            user_entry("u1", "look around"),
            tool_call_entry("a1", "c1", "bash", serde_json::json!({"command": "cargo tree"})),
            tool_call_entry("a2", "c2", "read", serde_json::json!({"path": "/src/Fetcher.rs"})),
        ];
        let idx = index(&entries);
        let search = &idx.turns[0].search_text;
        assert!(search.contains("bash cargo tree"), "got: {}", search);
        assert!(search.contains("read /src/fetcher.rs"), "got: {}", search);
    }

    #[test]
    fn test_search_text_is_redacted() {
        let entries = vec![
            user_entry("u1", "set it up"),
            tool_call_entry(
                "a1",
                "c1",
                "bash",
                serde_json::json!({"command": "export API_KEY=abc123def456"}),
            ),
        ];
        let idx = index(&entries);
        assert!(!idx.turns[0].search_text.contains("abc123def456"));
    }

    #[test]
    fn test_error_result_content_in_search_text() {
        let entries = vec![
            user_entry("u1", "run it"),
            tool_call_entry("a1", "c1", "bash", serde_json::json!({"command": "make"})),
            tool_result_entry("t1", "c1", "bash", "undefined reference to `frobnicate'", true),
        ];
        let idx = index(&entries);
        assert!(idx.turns[0].search_text.contains("undefined reference"));
    }

    #[test]
    fn test_tool_output_line_cap() {
        let long_output: String = (0..40).map(|i| format!("line {}\n", i)).collect();
        let entries = vec![
            user_entry("u1", "go"),
            tool_call_entry("a1", "c1", "bash", serde_json::json!({"command": "ls"})),
            tool_result_entry("t1", "c1", "bash", &long_output, false),
        ];
        let idx = index(&entries);
        let content = &idx.turns[0].tool_results[0].content_text;
        assert!(content.contains("more lines truncated"), "got: {}", content);
        assert_eq!(content.matches("line ").count(), 8);
    }

    #[test]
    fn test_summaries_sit_outside_turns() {
        let entries = vec![
            SessionEntry::Compaction {
                id: "s1".into(),
                parent_id: None,
                summary: "earlier work summarized".into(),
                details: Some(crate::entry::SummaryDetails {
                    read_files: vec!["/old/read.rs".into()],
                    modified_files: vec!["/old/changed.rs".into()],
                }),
            },
            user_entry("u1", "continue"),
            assistant_entry("a1", "continuing"),
        ];
        let idx = index(&entries);
        assert_eq!(idx.turns.len(), 1);
        assert_eq!(idx.summary_entries.len(), 1);
        assert_eq!(idx.summary_entries[0].kind, "compaction");
        assert!(idx.file_ops.read.contains("/old/read.rs"));
        assert!(idx.file_ops.modified.contains("/old/changed.rs"));
    }

    #[test]
    fn test_custom_entries_skipped() {
        let entries = vec![
            user_entry("u1", "hello"),
            SessionEntry::Custom {
                id: "x1".into(),
                parent_id: None,
                custom_type: "handoff".into(),
                data: serde_json::json!({"goal": "g"}),
            },
        ];
        let idx = index(&entries);
        assert_eq!(idx.turns.len(), 1);
        assert_eq!(idx.turns[0].entry_ids, vec!["u1"]);
    }

    #[test]
    fn test_custom_message_lands_in_extra_texts() {
        let entries = vec![
            user_entry("u1", "hello"),
            SessionEntry::CustomMessage {
                id: "m1".into(),
                parent_id: None,
                content: "  injected note  ".into(),
            },
        ];
        let idx = index(&entries);
        assert_eq!(idx.turns[0].extra_texts, vec!["injected note"]);
    }

    #[test]
    fn test_deterministic() {
        let entries = vec![
            user_entry("u1", "fix the bug"),
            tool_call_entry("a1", "c1", "read", serde_json::json!({"path": "/z.rs"})),
            tool_call_entry("a2", "c2", "read", serde_json::json!({"path": "/a.rs"})),
        ];
        let first = index(&entries);
        let second = index(&entries);
        assert_eq!(first.turns.len(), second.turns.len());
        assert_eq!(first.turns[0].search_text, second.turns[0].search_text);
        assert_eq!(
            first.turns[0].file_paths.iter().collect::<Vec<_>>(),
            second.turns[0].file_paths.iter().collect::<Vec<_>>()
        );
    }
}
