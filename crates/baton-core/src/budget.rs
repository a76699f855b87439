//! Token estimation and budget configuration
//!
//! Budgeting uses a cheap, deterministic chars/4 approximation. It does not
//! need to agree with any real tokenizer, only to be stable and monotone so
//! section budgets mean the same thing on every run.

/// Marker appended when token truncation drops text.
const TRUNCATION_MARKER: &str = "\n...[truncated]";

/// Estimate token count for a piece of text (ceil of bytes/4).
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Truncate text to approximately `max_tokens` tokens.
///
/// The truncation marker is charged against the budget, so
/// `estimate_tokens(truncate_to_tokens(t, n)) <= n` holds for any input.
/// A zero budget yields the empty string.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    if max_tokens == 0 {
        return String::new();
    }
    let budget = max_tokens * 4;
    if text.len() <= budget {
        return text.to_string();
    }
    let keep = floor_char_boundary(text, budget.saturating_sub(TRUNCATION_MARKER.len()));
    format!("{}{}", &text[..keep], TRUNCATION_MARKER)
}

/// Keep the first `max_lines` lines, noting how many were dropped.
pub fn truncate_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= max_lines {
        return text.to_string();
    }
    let dropped = lines.len() - max_lines;
    format!(
        "{}\n...[{} more lines truncated]",
        lines[..max_lines].join("\n"),
        dropped
    )
}

/// Largest char boundary at or below `index`.
fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut index = index;
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Budgets for one handoff invocation
///
/// All fields are approximate token counts except the line/entry caps.
#[derive(Debug, Clone)]
pub struct HandoffBudgets {
    /// Overall cap on the extractor input
    pub max_extract_tokens: usize,
    /// Cap on the whole Summaries section
    pub summary_tokens: usize,
    /// Cap on a single summary entry
    pub summary_entry_tokens: usize,
    /// Overall cap on rendered anchors
    pub anchor_tokens: usize,
    /// Per-anchor cap for required anchors
    pub required_anchor_tokens: usize,
    /// Per-anchor cap for optional anchors
    pub optional_anchor_tokens: usize,
    /// Cap on the Operational context section
    pub operational_tokens: usize,
    /// Cap on the Files section
    pub file_tokens: usize,
    /// Overall cap on the composer input
    pub compose_input_tokens: usize,
    /// Lines of tool output kept per result during indexing
    pub max_tool_output_lines: usize,
    /// Maximum operational highlight items
    pub max_operational_items: usize,
    /// Trailing turns that are always required anchors
    pub recent_turn_count: usize,
    /// Cap per file list
    pub max_file_entries: usize,
}

impl Default for HandoffBudgets {
    fn default() -> Self {
        Self {
            max_extract_tokens: 7000,
            summary_tokens: 1800,
            summary_entry_tokens: 600,
            anchor_tokens: 2600,
            required_anchor_tokens: 220,
            optional_anchor_tokens: 260,
            operational_tokens: 800,
            file_tokens: 400,
            compose_input_tokens: 2200,
            max_tool_output_lines: 8,
            max_operational_items: 10,
            recent_turn_count: 2,
            max_file_entries: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_truncate_noop_when_under_budget() {
        let text = "short";
        assert_eq!(truncate_to_tokens(text, 10), text);
    }

    #[test]
    fn test_truncate_appends_marker() {
        let text = "x".repeat(1000);
        let out = truncate_to_tokens(&text, 50);
        assert!(out.ends_with("\n...[truncated]"));
        assert!(out.len() < text.len());
    }

    #[test]
    fn test_truncate_respects_budget_including_marker() {
        let text = "y".repeat(4096);
        for budget in [5usize, 10, 50, 100] {
            let out = truncate_to_tokens(&text, budget);
            assert!(
                estimate_tokens(&out) <= budget,
                "budget {} produced {} tokens",
                budget,
                estimate_tokens(&out)
            );
        }
    }

    #[test]
    fn test_truncate_zero_budget() {
        assert_eq!(truncate_to_tokens("anything", 0), "");
    }

    #[test]
    fn test_truncate_char_boundary() {
        // Multi-byte chars must not be split mid-sequence
        let text = "é".repeat(400);
        let out = truncate_to_tokens(&text, 10);
        assert!(out.ends_with("\n...[truncated]"));
        assert!(estimate_tokens(&out) <= 10);
    }

    #[test]
    fn test_truncate_lines_noop() {
        let text = "a\nb\nc";
        assert_eq!(truncate_lines(text, 3), text);
    }

    #[test]
    fn test_truncate_lines_counts_dropped() {
        let text = "1\n2\n3\n4\n5";
        let out = truncate_lines(text, 2);
        assert_eq!(out, "1\n2\n...[3 more lines truncated]");
    }

    #[test]
    fn test_default_budgets() {
        let b = HandoffBudgets::default();
        assert_eq!(b.max_extract_tokens, 7000);
        assert_eq!(b.compose_input_tokens, 2200);
        assert_eq!(b.recent_turn_count, 2);
        assert_eq!(b.max_tool_output_lines, 8);
    }
}
