//! Offline heuristics entry point
//!
//! Replays the indexing and selection core over every stored session and
//! writes `turns.jsonl` (one row per turn) and `sessions.json` (one row
//! per session) for offline tuning.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use baton_core::HandoffBudgets;
use baton_core::heuristics::{SessionRecord, analyze_session};
use baton_core::SessionEntry;

use crate::session::{SessionStore, read_entries};

/// Run the offline analysis.
pub fn run(sessions_dir: Option<PathBuf>, out_dir: &Path) -> anyhow::Result<()> {
    let sessions_dir = sessions_dir.unwrap_or_else(SessionStore::sessions_dir);
    if !sessions_dir.exists() {
        anyhow::bail!("Sessions directory not found: {}", sessions_dir.display());
    }

    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let mut session_files: Vec<PathBuf> = fs::read_dir(&sessions_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("jsonl"))
        .collect();
    session_files.sort();

    let budgets = HandoffBudgets::default();
    let turns_path = out_dir.join("turns.jsonl");
    let mut turns_writer = BufWriter::new(
        File::create(&turns_path).with_context(|| format!("creating {}", turns_path.display()))?,
    );

    let mut session_records: Vec<SessionRecord> = vec![];
    let mut turn_rows = 0usize;
    let mut skipped = 0usize;

    for path in &session_files {
        let entries = match read_entries(path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Skipping unreadable session {}: {}", path.display(), e);
                skipped += 1;
                continue;
            }
        };

        let session_id = entries
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
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        let Some((record, turns)) = analyze_session(&file_name, &session_id, &entries, &budgets)
        else {
            skipped += 1;
            continue;
        };

        for turn in &turns {
            writeln!(turns_writer, "{}", serde_json::to_string(turn)?)?;
        }
        turn_rows += turns.len();
        session_records.push(record);
    }
    turns_writer.flush()?;

    let sessions_path = out_dir.join("sessions.json");
    fs::write(
        &sessions_path,
        serde_json::to_string_pretty(&session_records)?,
    )
    .with_context(|| format!("writing {}", sessions_path.display()))?;

    println!(
        "Analyzed {} sessions ({} skipped): {} turn rows",
        session_records.len(),
        skipped,
        turn_rows
    );
    println!("  {}", turns_path.display());
    println!("  {}", sessions_path.display());

    Ok(())
}
