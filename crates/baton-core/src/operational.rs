//! Operational highlights and file lists
//!
//! Tool failures and notable bash invocations are the operational memory
//! of a session; they get ranked, deduplicated, and carried as short
//! one-line items. File lists come from the branch-wide file operations,
//! with modifications taking precedence over reads.

use std::collections::HashSet;

use crate::budget::HandoffBudgets;
use crate::index::{BranchIndex, ToolResultInfo, Turn};
use crate::redact::is_sensitive_path;

/// Character cap for each side of a rendered item.
const ITEM_TEXT_CAP: usize = 200;

/// One ranked operational highlight
#[derive(Debug, Clone)]
pub struct OperationalItem {
    pub text: String,
    pub is_error: bool,
    pub score: i64,
}

/// Read-only and modified file lists, ready for rendering
#[derive(Debug, Clone, Default)]
pub struct FileLists {
    pub read: Vec<String>,
    pub modified: Vec<String>,
}

/// Collect ranked operational highlights across the branch.
///
/// Errors always sort ahead of successes; within each group, higher
/// scores first, original order on ties.
pub fn collect_operational_items(
    index: &BranchIndex,
    budgets: &HandoffBudgets,
) -> Vec<OperationalItem> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut errors: Vec<OperationalItem> = vec![];
    let mut successes: Vec<OperationalItem> = vec![];

    for turn in &index.turns {
        for result in &turn.tool_results {
            let bash_command = bash_command_for(index, result);
            if !result.is_error && bash_command.is_none() {
                continue;
            }

            let text = render_item(result, bash_command.as_deref());
            if !seen.insert(text.clone()) {
                continue;
            }

            let item = OperationalItem {
                text,
                is_error: result.is_error,
                score: item_score(turn, result.is_error),
            };
            if item.is_error {
                errors.push(item);
            } else {
                successes.push(item);
            }
        }
    }

    errors.sort_by(|a, b| b.score.cmp(&a.score));
    successes.sort_by(|a, b| b.score.cmp(&a.score));
    successes.truncate(budgets.max_operational_items);

    let mut items = errors;
    items.extend(successes);
    items.truncate(budgets.max_operational_items);
    items
}

/// The command behind a bash result, when the call is known.
fn bash_command_for(index: &BranchIndex, result: &ToolResultInfo) -> Option<String> {
    let call = index.tool_calls_by_id.get(&result.tool_call_id)?;
    if call.name != "bash" {
        return None;
    }
    Some(
        call.arguments
            .get("command")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
    )
}

fn render_item(result: &ToolResultInfo, bash_command: Option<&str>) -> String {
    match bash_command {
        Some(command) => {
            let output = if result.content_text.is_empty() {
                "ok".to_string()
            } else {
                truncate_chars(&result.content_text, ITEM_TEXT_CAP)
            };
            format!("bash: {}  -> {}", truncate_chars(command, ITEM_TEXT_CAP), output)
        }
        None => format!(
            "{}: {}",
            result.tool_name,
            truncate_chars(&result.content_text, ITEM_TEXT_CAP)
        ),
    }
}

fn item_score(turn: &Turn, is_error: bool) -> i64 {
    let base = if is_error { 5 } else { 1 };
    let goal_bonus = if turn.goal_score > 0 { 2 } else { 0 };
    base + goal_bonus + turn.goal_score
}

/// Compute the read-only and modified file lists.
///
/// Modification wins when a path was both read and modified. Lists are
/// capped first, then sensitive paths are dropped.
pub fn file_lists(index: &BranchIndex, budgets: &HandoffBudgets) -> FileLists {
    let modified: Vec<String> = index
        .file_ops
        .modified
        .iter()
        .take(budgets.max_file_entries)
        .filter(|p| !is_sensitive_path(p))
        .cloned()
        .collect();

    let read: Vec<String> = index
        .file_ops
        .read
        .iter()
        .filter(|p| !index.file_ops.modified.contains(*p))
        .take(budgets.max_file_entries)
        .filter(|p| !is_sensitive_path(p))
        .cloned()
        .collect();

    FileLists { read, modified }
}

/// Truncate to `max` characters, appending "..." when text was dropped.
fn truncate_chars(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let truncated: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::test_support::*;
    use crate::index::build_branch_index;
    use crate::score::score_turns;

    fn make_index(entries: &[crate::entry::SessionEntry], goal: &str) -> BranchIndex {
        let mut idx = build_branch_index(entries, &HandoffBudgets::default());
        score_turns(&mut idx, goal);
        idx
    }

    #[test]
    fn test_bash_success_is_candidate() {
        let entries = vec![
            user_entry("u0", "list it"),
            tool_call_entry("a0", "c1", "bash", serde_json::json!({"command": "ls src"})),
            tool_result_entry("t0", "c1", "bash", "main.rs", false),
        ];
        let idx = make_index(&entries, "x");
        let items = collect_operational_items(&idx, &HandoffBudgets::default());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "bash: ls src  -> main.rs");
        assert!(!items[0].is_error);
    }

    #[test]
    fn test_bash_empty_output_renders_ok() {
        let entries = vec![
            user_entry("u0", "touch it"),
            tool_call_entry("a0", "c1", "bash", serde_json::json!({"command": "touch x"})),
            tool_result_entry("t0", "c1", "bash", "", false),
        ];
        let idx = make_index(&entries, "x");
        let items = collect_operational_items(&idx, &HandoffBudgets::default());
        assert_eq!(items[0].text, "bash: touch x  -> ok");
    }

    #[test]
    fn test_non_bash_success_skipped() {
        let entries = vec![
            user_entry("u0", "read it"),
            tool_call_entry("a0", "c1", "read", serde_json::json!({"path": "/a.rs"})),
            tool_result_entry("t0", "c1", "read", "contents", false),
        ];
        let idx = make_index(&entries, "x");
        assert!(collect_operational_items(&idx, &HandoffBudgets::default()).is_empty());
    }

    #[test]
    fn test_non_bash_error_is_candidate() {
        let entries = vec![
            user_entry("u0", "read it"),
            tool_call_entry("a0", "c1", "read", serde_json::json!({"path": "/a.rs"})),
            tool_result_entry("t0", "c1", "read", "permission denied", true),
        ];
        let idx = make_index(&entries, "x");
        let items = collect_operational_items(&idx, &HandoffBudgets::default());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "read: permission denied");
        assert!(items[0].is_error);
    }

    #[test]
    fn test_errors_rank_before_successes() {
        let entries = vec![
            user_entry("u0", "work"),
            tool_call_entry("a0", "c1", "bash", serde_json::json!({"command": "ls"})),
            tool_result_entry("t0", "c1", "bash", "fine", false),
            tool_call_entry("a1", "c2", "bash", serde_json::json!({"command": "make"})),
            tool_result_entry("t1", "c2", "bash", "error: no rule", true),
        ];
        let idx = make_index(&entries, "x");
        let items = collect_operational_items(&idx, &HandoffBudgets::default());
        assert_eq!(items.len(), 2);
        assert!(items[0].is_error);
        assert!(!items[1].is_error);
        assert!(items[0].score > items[1].score);
    }

    #[test]
    fn test_goal_scored_turn_boosts_items() {
        let entries = vec![
            user_entry("u0", "unrelated"),
            tool_call_entry("a0", "c1", "bash", serde_json::json!({"command": "ls"})),
            tool_result_entry("t0", "c1", "bash", "out", false),
            user_entry("u1", "fetcher work now"),
            tool_call_entry("a1", "c2", "bash", serde_json::json!({"command": "pwd"})),
            tool_result_entry("t1", "c2", "bash", "out2", false),
        ];
        let idx = make_index(&entries, "fetcher");
        let items = collect_operational_items(&idx, &HandoffBudgets::default());
        // The goal-matched turn's item sorts first: 1 + 2 + 2 vs 1
        assert_eq!(items[0].text, "bash: pwd  -> out2");
    }

    #[test]
    fn test_dedup_on_rendered_text() {
        let entries = vec![
            user_entry("u0", "again"),
            tool_call_entry("a0", "c1", "bash", serde_json::json!({"command": "ls"})),
            tool_result_entry("t0", "c1", "bash", "same", false),
            tool_call_entry("a1", "c2", "bash", serde_json::json!({"command": "ls"})),
            tool_result_entry("t1", "c2", "bash", "same", false),
        ];
        let idx = make_index(&entries, "x");
        assert_eq!(collect_operational_items(&idx, &HandoffBudgets::default()).len(), 1);
    }

    #[test]
    fn test_item_cap() {
        let mut entries = vec![user_entry("u0", "spam")];
        for i in 0..15 {
            entries.push(tool_call_entry(
                &format!("a{}", i),
                &format!("c{}", i),
                "bash",
                serde_json::json!({"command": format!("cmd {}", i)}),
            ));
            entries.push(tool_result_entry(
                &format!("t{}", i),
                &format!("c{}", i),
                "bash",
                &format!("out {}", i),
                false,
            ));
        }
        let idx = make_index(&entries, "x");
        let items = collect_operational_items(&idx, &HandoffBudgets::default());
        assert_eq!(items.len(), 10);
    }

    #[test]
    fn test_file_lists_modified_wins() {
        let entries = vec![
            user_entry("u0", "work"),
            tool_call_entry("a0", "c1", "read", serde_json::json!({"path": "/both.rs"})),
            tool_call_entry("a1", "c2", "edit", serde_json::json!({"path": "/both.rs"})),
            tool_call_entry("a2", "c3", "read", serde_json::json!({"path": "/only-read.rs"})),
        ];
        let idx = make_index(&entries, "x");
        let lists = file_lists(&idx, &HandoffBudgets::default());
        assert_eq!(lists.modified, vec!["/both.rs"]);
        assert_eq!(lists.read, vec!["/only-read.rs"]);
    }

    #[test]
    fn test_file_lists_drop_sensitive() {
        let entries = vec![
            user_entry("u0", "work"),
            tool_call_entry("a0", "c1", "read", serde_json::json!({"path": "/home/u/.env.production"})),
            tool_call_entry("a1", "c2", "read", serde_json::json!({"path": "/src/ok.rs"})),
            tool_call_entry("a2", "c3", "write", serde_json::json!({"path": "/certs/server.key"})),
        ];
        let idx = make_index(&entries, "x");
        let lists = file_lists(&idx, &HandoffBudgets::default());
        assert_eq!(lists.read, vec!["/src/ok.rs"]);
        assert!(lists.modified.is_empty());
    }

    #[test]
    fn test_file_lists_sorted_and_capped() {
        let mut entries = vec![user_entry("u0", "many files")];
        for i in (0..70).rev() {
            entries.push(tool_call_entry(
                &format!("a{}", i),
                &format!("c{}", i),
                "read",
                serde_json::json!({"path": format!("/f/{:03}.rs", i)}),
            ));
        }
        let idx = make_index(&entries, "x");
        let lists = file_lists(&idx, &HandoffBudgets::default());
        assert_eq!(lists.read.len(), 60);
        assert_eq!(lists.read[0], "/f/000.rs");
        let mut sorted = lists.read.clone();
        sorted.sort();
        assert_eq!(lists.read, sorted);
    }

    #[test]
    fn test_truncate_chars_marks_cut() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("0123456789abc", 10), "0123456789...");
    }
}
