//! /session command - show info about the current session

use baton_ai::Model;
use baton_core::SessionEntry;

use crate::session::SessionStore;

/// Build the `/session` info message.
pub fn session_info_message(store: &SessionStore, model: &Model) -> String {
    let mut user_count = 0usize;
    let mut assistant_count = 0usize;
    let mut summary_count = 0usize;
    let mut handoff_count = 0usize;
    let mut parent: Option<&str> = None;

    for entry in store.entries() {
        match entry {
            SessionEntry::Session { parent_session, .. } => {
                parent = parent_session.as_deref();
            }
            SessionEntry::Message { message, .. } => match message {
                baton_ai::Message::User { .. } => user_count += 1,
                baton_ai::Message::Assistant { .. } => assistant_count += 1,
                baton_ai::Message::ToolResult { .. } => {}
            },
            SessionEntry::Compaction { .. } | SessionEntry::BranchSummary { .. } => {
                summary_count += 1;
            }
            SessionEntry::Custom { custom_type, .. } if custom_type == "handoff" => {
                handoff_count += 1;
            }
            _ => {}
        }
    }

    let mut out = format!(
        "Session: {}\nFile: {}\nModel: {} ({})\nMessages: {} user, {} assistant",
        store.id(),
        store.path().display(),
        model.id,
        model.provider.name(),
        user_count,
        assistant_count,
    );
    if summary_count > 0 {
        out.push_str(&format!("\nSummaries: {}", summary_count));
    }
    if handoff_count > 0 {
        out.push_str(&format!("\nHandoffs: {}", handoff_count));
    }
    if let Some(parent) = parent {
        out.push_str(&format!("\nParent session: {}", parent));
    }
    out
}
