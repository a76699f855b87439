//! Terminal review surface
//!
//! Prompt review happens in the user's own editor via a temp-file round
//! trip; notifications go to stdout/stderr. Ctrl-c anywhere during a
//! cancellable operation fires the shared cancellation token.

use std::fs;
use std::future::Future;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::Command;

use baton_core::{HandoffUi, NotifyLevel};
use tokio_util::sync::CancellationToken;

/// Terminal implementation of the review surface
pub struct TerminalUi {
    editor: Option<String>,
}

impl TerminalUi {
    pub fn new(editor: Option<String>) -> Self {
        Self { editor }
    }

    /// The editor command: config first, then $EDITOR / $VISUAL
    fn editor_command(&self) -> Option<String> {
        self.editor
            .clone()
            .or_else(|| std::env::var("EDITOR").ok())
            .or_else(|| std::env::var("VISUAL").ok())
    }
}

impl HandoffUi for TerminalUi {
    fn edit(&self, title: &str, initial: &str) -> Option<String> {
        let Some(editor) = self.editor_command() else {
            // No editor available; accept the text as-is
            println!("\n--- {} (no $EDITOR, using as-is) ---\n{}\n", title, initial);
            return Some(initial.to_string());
        };

        let path: PathBuf =
            std::env::temp_dir().join(format!("baton-{}.md", uuid::Uuid::new_v4()));
        if fs::write(&path, initial).is_err() {
            return Some(initial.to_string());
        }

        println!("Opening {} in {}...", title, editor);
        let status = Command::new(&editor).arg(&path).status();

        let result = match status {
            Ok(status) if status.success() => fs::read_to_string(&path).ok(),
            // Editor aborted or failed to launch: treat as cancel
            _ => None,
        };
        let _ = fs::remove_file(&path);
        result
    }

    fn notify(&self, message: &str, level: NotifyLevel) {
        match level {
            NotifyLevel::Info => println!("{}", message),
            NotifyLevel::Error => eprintln!("Error: {}", message),
        }
    }
}

/// Whether this invocation can interact with the user at all.
pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal()
}

/// Drive a future while watching for ctrl-c.
///
/// Ctrl-c fires `cancel` and keeps polling the future, so cancellation
/// unwinds through the operation's own suspension points instead of
/// tearing it down mid-write.
pub async fn run_with_ctrl_c<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> T {
    tokio::pin!(fut);
    loop {
        tokio::select! {
            result = &mut fut => return result,
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_with_ctrl_c_returns_result() {
        let cancel = CancellationToken::new();
        let value = run_with_ctrl_c(&cancel, async { 42 }).await;
        assert_eq!(value, 42);
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn test_editor_command_prefers_config() {
        let ui = TerminalUi::new(Some("my-editor".to_string()));
        assert_eq!(ui.editor_command().as_deref(), Some("my-editor"));
    }
}
