//! Error types for baton-ai

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Result type alias using baton-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Retryable transient-failure patterns in provider error text.
static TRANSIENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)rate.?limit|overloaded|service.?unavailable|upstream.?connect|connection.?refused")
        .unwrap()
});

/// Errors that can occur when interacting with LLM providers
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status with response body
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error response
    #[error("API error: {message} (type: {error_type})")]
    Api { error_type: String, message: String },

    /// Subscription quota exhausted (payload carried plan/reset metadata)
    #[error("{provider} usage limit reached ({plan_type} plan)")]
    UsageLimit {
        provider: String,
        plan_type: String,
        resets_at: Option<i64>,
    },

    /// Invalid or missing API key
    #[error("Invalid or missing API key")]
    InvalidApiKey,

    /// Request was aborted via the cancellation signal
    #[error("Request aborted")]
    Aborted,

    /// Server-sent events error
    #[error("SSE error: {0}")]
    Sse(String),

    /// Unexpected response format
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl Error {
    /// Create an API error from type and message
    pub fn api(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// Check whether this error is worth retrying with backoff.
    ///
    /// Covers HTTP 429/5xx plus transient network/overload text in API
    /// error payloads.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::Sse(_) => true,
            Error::HttpStatus { status, .. } => {
                matches!(*status, 429 | 500 | 502 | 503 | 504)
            }
            Error::Api {
                error_type,
                message,
            } => is_retryable_text(error_type) || is_retryable_text(message),
            _ => false,
        }
    }

    /// A user-facing rendering of this error.
    ///
    /// Quota errors with reset metadata get a concrete wait estimate;
    /// everything else falls through to the display form.
    pub fn friendly_message(&self) -> String {
        match self {
            Error::UsageLimit {
                provider,
                plan_type,
                resets_at,
            } => {
                let base = format!(
                    "You have hit your {} usage limit ({} plan).",
                    provider, plan_type
                );
                match resets_at {
                    Some(at) => {
                        let now = chrono::Utc::now().timestamp();
                        let minutes = (at - now).max(0) / 60;
                        format!("{} Try again in ~{} min.", base, minutes.max(1))
                    }
                    None => base,
                }
            }
            Error::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Check error text for transient-failure markers.
pub fn is_retryable_text(text: &str) -> bool {
    TRANSIENT_PATTERN.is_match(text)
}
