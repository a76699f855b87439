//! Error types for baton-core

use thiserror::Error;

/// Result type alias using baton-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building a handoff
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the completion layer
    #[error(transparent)]
    Ai(#[from] baton_ai::Error),

    /// A precondition for the handoff was not met
    #[error("{0}")]
    Precondition(String),

    /// Session store I/O failed
    #[error("Session error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// User-facing rendering, delegating to the AI layer where it applies
    pub fn friendly_message(&self) -> String {
        match self {
            Error::Ai(e) => e.friendly_message(),
            other => other.to_string(),
        }
    }
}
