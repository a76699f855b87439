//! Session persistence: append-only JSONL logs with parent linkage

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use baton_ai::Message;
use baton_core::{SessionAccess, SessionEntry, new_entry_id};

/// A persisted session: one JSONL file, one entry per line, header first.
///
/// Every appended entry is linked to the previous one via `parent_id`, so
/// the log doubles as a branch in root-to-leaf order.
pub struct SessionStore {
    id: String,
    path: PathBuf,
    entries: Vec<SessionEntry>,
    writer: Option<BufWriter<File>>,
    last_entry_id: Option<String>,
}

impl SessionStore {
    /// Get the sessions directory
    pub fn sessions_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("baton")
            .join("sessions")
    }

    /// Create a new session, optionally linked to a parent session file
    pub fn create(model: &str, parent_session: Option<&Path>) -> std::io::Result<Self> {
        let id = uuid::Uuid::new_v4().to_string();
        let sessions_dir = Self::sessions_dir();
        fs::create_dir_all(&sessions_dir)?;

        let path = sessions_dir.join(format!("{}.jsonl", id));
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);

        let header = SessionEntry::Session {
            id: id.clone(),
            created_at: chrono::Utc::now().timestamp_millis(),
            model: model.to_string(),
            working_dir: std::env::current_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| ".".to_string()),
            parent_session: parent_session.map(|p| p.display().to_string()),
        };
        writeln!(writer, "{}", serde_json::to_string(&header)?)?;
        writer.flush()?;

        let header_id = header.id().to_string();
        Ok(Self {
            id,
            path,
            entries: vec![header],
            writer: Some(writer),
            last_entry_id: Some(header_id),
        })
    }

    /// Load an existing session by id
    pub fn load(id: &str) -> std::io::Result<Self> {
        let path = Self::sessions_dir().join(format!("{}.jsonl", id));
        Self::load_path(&path)
    }

    /// Load a session from a specific file
    pub fn load_path(path: &Path) -> std::io::Result<Self> {
        if !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Session not found: {}", path.display()),
            ));
        }

        let entries = read_entries(path)?;
        let id = entries
            .iter()
            .find_map(|e| match e {
                SessionEntry::Session { id, .. } => Some(id.clone()),
                _ => None,
            })
            .unwrap_or_else(|| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("unknown")
                    .to_string()
            });
        let last_entry_id = entries.last().map(|e| e.id().to_string());

        let file = File::options().append(true).open(path)?;
        Ok(Self {
            id,
            path: path.to_path_buf(),
            entries,
            writer: Some(BufWriter::new(file)),
            last_entry_id,
        })
    }

    /// Get session ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get session file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries, header included
    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    /// Conversation messages in order (for rebuilding the LLM context)
    pub fn messages(&self) -> Vec<Message> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                SessionEntry::Message { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Append a conversation message; returns the new entry id
    pub fn append_message(&mut self, message: &Message) -> std::io::Result<String> {
        let entry = SessionEntry::Message {
            id: new_entry_id(),
            parent_id: self.last_entry_id.clone(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            message: message.clone(),
        };
        let id = entry.id().to_string();
        self.append_entry(entry)?;
        Ok(id)
    }

    /// Append any pre-built entry
    pub fn append_entry(&mut self, entry: SessionEntry) -> std::io::Result<()> {
        if let Some(ref mut writer) = self.writer {
            writeln!(writer, "{}", serde_json::to_string(&entry)?)?;
            writer.flush()?;
        }
        self.last_entry_id = Some(entry.id().to_string());
        self.entries.push(entry);
        Ok(())
    }

    /// List all sessions, newest first
    pub fn list_sessions() -> std::io::Result<Vec<SessionInfo>> {
        let sessions_dir = Self::sessions_dir();
        if !sessions_dir.exists() {
            return Ok(vec![]);
        }

        let mut sessions = Vec::new();
        for entry in fs::read_dir(&sessions_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
                if let Some(info) = read_session_info(&path) {
                    sessions.push(info);
                }
            }
        }

        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }
}

impl SessionAccess for SessionStore {
    fn branch(&self) -> Vec<SessionEntry> {
        self.entries.clone()
    }

    fn append_custom(
        &mut self,
        custom_type: &str,
        data: serde_json::Value,
    ) -> std::io::Result<()> {
        self.append_entry(SessionEntry::Custom {
            id: new_entry_id(),
            parent_id: self.last_entry_id.clone(),
            custom_type: custom_type.to_string(),
            data,
        })
    }

    fn session_file(&self) -> &Path {
        &self.path
    }
}

/// Read every parseable entry from a session file, skipping corrupt lines.
pub fn read_entries(path: &Path) -> std::io::Result<Vec<SessionEntry>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<SessionEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!("Skipping corrupted session line: {}", e);
            }
        }
    }

    Ok(entries)
}

fn read_session_info(path: &Path) -> Option<SessionInfo> {
    let file = File::open(path).ok()?;
    let reader = BufReader::new(file);
    let first_line = reader.lines().next()?.ok()?;

    let SessionEntry::Session {
        id,
        created_at,
        model,
        working_dir,
        parent_session,
    } = serde_json::from_str(&first_line).ok()?
    else {
        return None;
    };

    let file = File::open(path).ok()?;
    let reader = BufReader::new(file);
    let message_count = reader
        .lines()
        .map_while(Result::ok)
        .filter(|l| {
            matches!(
                serde_json::from_str::<SessionEntry>(l),
                Ok(SessionEntry::Message { .. })
            )
        })
        .count();

    Some(SessionInfo {
        id,
        created_at,
        model,
        working_dir,
        parent_session,
        message_count,
    })
}

/// Information about a saved session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: String,
    pub created_at: i64,
    pub model: String,
    pub working_dir: String,
    pub parent_session: Option<String>,
    pub message_count: usize,
}

impl SessionInfo {
    /// Format the created_at timestamp for display
    pub fn created_at_display(&self) -> String {
        use chrono::{TimeZone, Utc};
        Utc.timestamp_millis_opt(self.created_at)
            .single()
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_sessions_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("baton-test-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn create_in(dir: &Path, model: &str, parent: Option<&Path>) -> SessionStore {
        // Mirror SessionStore::create against an explicit directory
        let id = uuid::Uuid::new_v4().to_string();
        let path = dir.join(format!("{}.jsonl", id));
        let file = File::create(&path).unwrap();
        let mut writer = BufWriter::new(file);
        let header = SessionEntry::Session {
            id: id.clone(),
            created_at: chrono::Utc::now().timestamp_millis(),
            model: model.to_string(),
            working_dir: ".".to_string(),
            parent_session: parent.map(|p| p.display().to_string()),
        };
        writeln!(writer, "{}", serde_json::to_string(&header).unwrap()).unwrap();
        writer.flush().unwrap();
        drop(writer);
        SessionStore::load_path(&path).unwrap()
    }

    #[test]
    fn test_append_links_parent_ids() {
        let dir = temp_sessions_dir();
        let mut store = create_in(&dir, "test-model", None);
        let header_id = store.last_entry_id.clone().unwrap();

        let first = store.append_message(&Message::user("one")).unwrap();
        let second = store.append_message(&Message::user("two")).unwrap();

        let entries = store.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].parent_id(), Some(header_id.as_str()));
        assert_eq!(entries[2].parent_id(), Some(first.as_str()));
        assert_eq!(store.last_entry_id.as_deref(), Some(second.as_str()));
    }

    #[test]
    fn test_load_roundtrip() {
        let dir = temp_sessions_dir();
        let path = {
            let mut store = create_in(&dir, "test-model", None);
            store.append_message(&Message::user("persisted")).unwrap();
            store.path().to_path_buf()
        };

        let loaded = SessionStore::load_path(&path).unwrap();
        assert_eq!(loaded.entries().len(), 2);
        assert_eq!(loaded.messages().len(), 1);
        assert_eq!(loaded.messages()[0].text(), "persisted");
    }

    #[test]
    fn test_corrupt_lines_skipped() {
        let dir = temp_sessions_dir();
        let path = {
            let mut store = create_in(&dir, "test-model", None);
            store.append_message(&Message::user("good")).unwrap();
            store.path().to_path_buf()
        };
        // Scribble a corrupt line into the log
        let mut file = File::options().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();

        let loaded = SessionStore::load_path(&path).unwrap();
        assert_eq!(loaded.entries().len(), 2);
    }

    #[test]
    fn test_parent_session_linkage() {
        let dir = temp_sessions_dir();
        let parent = create_in(&dir, "test-model", None);
        let child = create_in(&dir, "test-model", Some(parent.path()));

        match &child.entries()[0] {
            SessionEntry::Session { parent_session, .. } => {
                assert_eq!(
                    parent_session.as_deref(),
                    Some(parent.path().display().to_string().as_str())
                );
            }
            other => panic!("expected header, got {:?}", other),
        }
    }

    #[test]
    fn test_append_custom_via_trait() {
        let dir = temp_sessions_dir();
        let mut store = create_in(&dir, "test-model", None);
        store
            .append_custom("handoff", serde_json::json!({"goal": "g", "timestamp": 1}))
            .unwrap();

        let loaded = SessionStore::load_path(store.path()).unwrap();
        match loaded.entries().last().unwrap() {
            SessionEntry::Custom {
                custom_type, data, ..
            } => {
                assert_eq!(custom_type, "handoff");
                assert_eq!(data.get("goal").and_then(|v| v.as_str()), Some("g"));
            }
            other => panic!("expected custom entry, got {:?}", other),
        }
    }
}
