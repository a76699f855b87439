//! Bundle assembly: the two strings fed to the LLM passes
//!
//! Each artifact is a sequence of labelled sections joined by blank lines.
//! Sections get their own budgets; the whole artifact is truncated last,
//! so the overall caps hold no matter what the sections contain.

use crate::anchor::Anchor;
use crate::budget::{HandoffBudgets, truncate_to_tokens};
use crate::index::BranchIndex;
use crate::operational::{FileLists, OperationalItem};
use crate::redact::redact;

/// Placeholder for sections with nothing to say.
const NONE_PLACEHOLDER: &str = "(none)";

/// Assemble the extractor (pass 1) input.
pub fn build_extractor_input(
    goal: &str,
    index: &BranchIndex,
    anchors: &[Anchor],
    items: &[OperationalItem],
    lists: &FileLists,
    budgets: &HandoffBudgets,
) -> String {
    let sections = [
        format!("Goal: {}", goal),
        format!("Summaries:\n{}", summaries_section(index, budgets)),
        format!("Anchors:\n{}", anchors_section(anchors)),
        format!(
            "Operational context:\n{}",
            operational_section(items, budgets.operational_tokens)
        ),
        format!("Files:\n{}", files_section(lists, budgets.file_tokens)),
    ];

    truncate_to_tokens(&sections.join("\n\n"), budgets.max_extract_tokens)
}

/// Assemble the composer (pass 2) input from the extracted facts bundle.
pub fn build_composer_input(
    goal: &str,
    facts_bundle: &str,
    items: &[OperationalItem],
    lists: &FileLists,
    budgets: &HandoffBudgets,
) -> String {
    let facts = facts_bundle.trim();
    let sections = [
        format!("Goal: {}", goal),
        format!(
            "Extracted facts bundle:\n{}",
            if facts.is_empty() { NONE_PLACEHOLDER } else { facts }
        ),
        format!(
            "Operational context:\n{}",
            operational_section(items, budgets.operational_tokens)
        ),
        format!("Files:\n{}", files_section(lists, budgets.file_tokens)),
    ];

    truncate_to_tokens(&sections.join("\n\n"), budgets.compose_input_tokens)
}

/// Prior summaries, each redacted and capped at an even share of the
/// section budget.
fn summaries_section(index: &BranchIndex, budgets: &HandoffBudgets) -> String {
    if index.summary_entries.is_empty() {
        return NONE_PLACEHOLDER.to_string();
    }
    let per_entry = budgets
        .summary_entry_tokens
        .min(budgets.summary_tokens / index.summary_entries.len());

    index
        .summary_entries
        .iter()
        .map(|entry| {
            format!(
                "[{} {}]\n{}",
                entry.kind,
                entry.entry_id,
                truncate_to_tokens(&redact(&entry.summary), per_entry)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn anchors_section(anchors: &[Anchor]) -> String {
    if anchors.is_empty() {
        return NONE_PLACEHOLDER.to_string();
    }
    anchors
        .iter()
        .map(|anchor| {
            format!(
                "### Turn {} ({})\n{}",
                anchor.turn_index + 1,
                anchor.reason.label(),
                anchor.excerpt
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn operational_section(items: &[OperationalItem], budget: usize) -> String {
    if items.is_empty() {
        return NONE_PLACEHOLDER.to_string();
    }
    let bullets: Vec<String> = items.iter().map(|item| format!("- {}", item.text)).collect();
    truncate_to_tokens(&bullets.join("\n"), budget)
}

fn files_section(lists: &FileLists, budget: usize) -> String {
    let mut out = String::from("Read-only:\n");
    if lists.read.is_empty() {
        out.push_str(NONE_PLACEHOLDER);
    } else {
        out.push_str(&lists.read.join("\n"));
    }
    out.push_str("\nModified:\n");
    if lists.modified.is_empty() {
        out.push_str(NONE_PLACEHOLDER);
    } else {
        out.push_str(&lists.modified.join("\n"));
    }
    truncate_to_tokens(&out, budget)
}
