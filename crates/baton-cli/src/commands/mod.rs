//! Slash commands for the interactive shell

pub mod handoff;
mod session;

pub use session::session_info_message;

/// Result of executing a slash command
pub enum CommandResult {
    /// Show a message to the user (not sent to the model)
    Message(String),
    /// Run a handoff with the given goal
    Handoff(String),
    /// Show session info
    SessionInfo,
    /// Start a fresh session
    Clear,
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse a slash command
pub fn execute_command(input: &str) -> Option<CommandResult> {
    let input = input.trim();
    if !input.starts_with('/') {
        return None;
    }

    let parts: Vec<&str> = input[1..].splitn(2, ' ').collect();
    let command = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),
        "handoff" => CommandResult::Handoff(args.to_string()),
        "session" | "s" => CommandResult::SessionInfo,
        "clear" | "c" => CommandResult::Clear,
        "quit" | "exit" | "q" => CommandResult::Exit,
        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?        Show this help message
  /handoff <goal>      Build a handoff prompt and seed a new session with it
  /session, /s         Show session info
  /clear, /c           Start a fresh session
  /quit, /exit, /q     Exit baton

Examples:
  /handoff add retry logic to the fetcher module
  /handoff continue the database migration where we left off"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handoff_command_carries_goal() {
        match execute_command("/handoff fix the tests") {
            Some(CommandResult::Handoff(goal)) => assert_eq!(goal, "fix the tests"),
            _ => panic!("expected handoff"),
        }
    }

    #[test]
    fn test_handoff_without_goal_is_empty() {
        match execute_command("/handoff") {
            Some(CommandResult::Handoff(goal)) => assert!(goal.is_empty()),
            _ => panic!("expected handoff"),
        }
    }

    #[test]
    fn test_non_command_passes_through() {
        assert!(execute_command("plain message").is_none());
    }

    #[test]
    fn test_unknown_command() {
        match execute_command("/frobnicate") {
            Some(CommandResult::Unknown(cmd)) => assert_eq!(cmd, "frobnicate"),
            _ => panic!("expected unknown"),
        }
    }

    #[test]
    fn test_aliases() {
        assert!(matches!(execute_command("/q"), Some(CommandResult::Exit)));
        assert!(matches!(execute_command("/s"), Some(CommandResult::SessionInfo)));
        assert!(matches!(execute_command("/c"), Some(CommandResult::Clear)));
    }
}
