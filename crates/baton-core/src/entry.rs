//! Persisted session entry types
//!
//! A session is an append-only log of entries. Entries carry unique ids and
//! a parent id, so the log forms a tree; the engine operates on one branch
//! (root to leaf) at a time.

use baton_ai::Message;
use serde::{Deserialize, Serialize};

/// One entry in a session log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEntry {
    /// Session header (metadata only, always first)
    Session {
        id: String,
        created_at: i64,
        model: String,
        working_dir: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_session: Option<String>,
    },
    /// A conversation message
    Message {
        id: String,
        #[serde(default)]
        parent_id: Option<String>,
        #[serde(default)]
        timestamp: i64,
        message: Message,
    },
    /// User-invisible extension message
    CustomMessage {
        id: String,
        #[serde(default)]
        parent_id: Option<String>,
        content: String,
    },
    /// Prior context compaction
    Compaction {
        id: String,
        #[serde(default)]
        parent_id: Option<String>,
        summary: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<SummaryDetails>,
    },
    /// Summary carried over from a branched-off session
    BranchSummary {
        id: String,
        #[serde(default)]
        parent_id: Option<String>,
        summary: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<SummaryDetails>,
    },
    /// Extension state (the handoff audit record lives here)
    Custom {
        id: String,
        #[serde(default)]
        parent_id: Option<String>,
        custom_type: String,
        data: serde_json::Value,
    },
}

/// File operations recorded alongside a summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryDetails {
    #[serde(default)]
    pub read_files: Vec<String>,
    #[serde(default)]
    pub modified_files: Vec<String>,
}

impl SessionEntry {
    /// The entry's unique id
    pub fn id(&self) -> &str {
        match self {
            SessionEntry::Session { id, .. }
            | SessionEntry::Message { id, .. }
            | SessionEntry::CustomMessage { id, .. }
            | SessionEntry::Compaction { id, .. }
            | SessionEntry::BranchSummary { id, .. }
            | SessionEntry::Custom { id, .. } => id,
        }
    }

    /// The id of the entry this one follows, if any
    pub fn parent_id(&self) -> Option<&str> {
        match self {
            SessionEntry::Session { .. } => None,
            SessionEntry::Message { parent_id, .. }
            | SessionEntry::CustomMessage { parent_id, .. }
            | SessionEntry::Compaction { parent_id, .. }
            | SessionEntry::BranchSummary { parent_id, .. }
            | SessionEntry::Custom { parent_id, .. } => parent_id.as_deref(),
        }
    }

    /// Label used when rendering summaries ("compaction" / "branch_summary")
    pub fn type_label(&self) -> &'static str {
        match self {
            SessionEntry::Session { .. } => "session",
            SessionEntry::Message { .. } => "message",
            SessionEntry::CustomMessage { .. } => "custom_message",
            SessionEntry::Compaction { .. } => "compaction",
            SessionEntry::BranchSummary { .. } => "branch_summary",
            SessionEntry::Custom { .. } => "custom",
        }
    }
}

/// Generate a fresh entry id
pub fn new_entry_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_roundtrip() {
        let entry = SessionEntry::Custom {
            id: "e1".into(),
            parent_id: Some("e0".into()),
            custom_type: "handoff".into(),
            data: serde_json::json!({"goal": "continue migration", "timestamp": 1}),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains(r#""type":"custom"#));
        let back: SessionEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id(), "e1");
        assert_eq!(back.parent_id(), Some("e0"));
    }

    #[test]
    fn test_unknown_type_fails_parse() {
        // Callers skip unparseable lines rather than aborting
        let line = r#"{"type":"telemetry","id":"x"}"#;
        assert!(serde_json::from_str::<SessionEntry>(line).is_err());
    }

    #[test]
    fn test_summary_details_defaults() {
        let entry: SessionEntry = serde_json::from_str(
            r#"{"type":"compaction","id":"c1","summary":"did things","details":{}}"#,
        )
        .unwrap();
        match entry {
            SessionEntry::Compaction { details, .. } => {
                let d = details.unwrap();
                assert!(d.read_files.is_empty());
                assert!(d.modified_files.is_empty());
            }
            other => panic!("expected compaction, got {:?}", other),
        }
    }
}
