//! The two-pass LLM driver
//!
//! Pass 1 (extract) distills the assembled branch material into a facts
//! bundle; pass 2 (compose) turns that bundle into the final prompt. Both
//! passes run through the same retry/cancellation machinery.

use std::time::Duration;

use baton_ai::{CompleteOptions, CompletionClient, Context, Message, Model, StopReason};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::prompts::{COMPOSER_SYSTEM_PROMPT, EXTRACTOR_SYSTEM_PROMPT};

/// Retry configuration for transient completion failures
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_secs_f64(
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32),
        )
    }
}

/// Which pass is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Extract,
    Compose,
}

impl PassKind {
    /// The pass's fixed system prompt
    pub fn system_prompt(&self) -> &'static str {
        match self {
            PassKind::Extract => EXTRACTOR_SYSTEM_PROMPT,
            PassKind::Compose => COMPOSER_SYSTEM_PROMPT,
        }
    }

    /// Output budget per pass
    pub fn max_tokens(&self) -> u32 {
        match self {
            PassKind::Extract => 2400,
            PassKind::Compose => 1600,
        }
    }

    /// Short label for logging
    pub fn label(&self) -> &'static str {
        match self {
            PassKind::Extract => "extract",
            PassKind::Compose => "compose",
        }
    }
}

/// Result of one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Joined text of the completion
    Text(String),
    /// The user cancelled; nothing to report
    Cancelled,
}

/// Run one pass with retry and cancellation.
///
/// Transient failures (HTTP 429/5xx, rate-limit/overload text) are retried
/// up to `retry.max_retries` times with exponential backoff; the backoff
/// sleep itself honors the cancellation signal. Cancellation is an
/// outcome, never an error.
pub async fn run_pass(
    client: &dyn CompletionClient,
    model: &Model,
    api_key: Option<&str>,
    kind: PassKind,
    input: &str,
    cancel: &CancellationToken,
    retry: &RetryConfig,
) -> Result<PassOutcome> {
    let context = Context {
        system_prompt: Some(kind.system_prompt().to_string()),
        messages: vec![Message::user(input)],
    };
    let options = CompleteOptions {
        api_key: api_key.map(str::to_string),
        max_tokens: Some(kind.max_tokens()),
        temperature: None,
    };

    let mut attempt = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Ok(PassOutcome::Cancelled);
        }

        match client.complete(model, &context, &options, cancel.clone()).await {
            Ok(message) => {
                if message.stop_reason() == Some(StopReason::Aborted) {
                    return Ok(PassOutcome::Cancelled);
                }
                return Ok(PassOutcome::Text(message.text()));
            }
            Err(baton_ai::Error::Aborted) => return Ok(PassOutcome::Cancelled),
            Err(e) => {
                let retryable =
                    e.is_retryable() || baton_ai::is_retryable_text(&e.to_string());
                if retryable && attempt < retry.max_retries {
                    let delay = retry.delay_for_attempt(attempt);
                    tracing::warn!(
                        "{} pass failed (attempt {}/{}): {}. Retrying in {:?}...",
                        kind.label(),
                        attempt + 1,
                        retry.max_retries + 1,
                        e,
                        delay
                    );
                    attempt += 1;
                    if !sleep_cancellable(delay, cancel).await {
                        return Ok(PassOutcome::Cancelled);
                    }
                    continue;
                }
                return Err(Error::Ai(e));
            }
        }
    }
}

/// Sleep for `duration`, waking early when `cancel` fires.
///
/// Returns `true` when the full duration elapsed, `false` on cancellation.
pub async fn sleep_cancellable(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    fn rate_limited() -> baton_ai::Error {
        baton_ai::Error::HttpStatus {
            status: 429,
            message: "Too Many Requests".into(),
        }
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let client = ScriptedClient::new(vec![Ok(assistant("facts"))]);
        let cancel = CancellationToken::new();
        let outcome = run_pass(
            &client,
            &test_model(),
            None,
            PassKind::Extract,
            "input",
            &cancel,
            &RetryConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, PassOutcome::Text("facts".into()));
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds() {
        // Two 429s, then success: three calls, two backoff sleeps
        let client = ScriptedClient::new(vec![
            Err(rate_limited()),
            Err(rate_limited()),
            Ok(assistant("eventually")),
        ]);
        let cancel = CancellationToken::new();
        let outcome = run_pass(
            &client,
            &test_model(),
            None,
            PassKind::Extract,
            "input",
            &cancel,
            &RetryConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, PassOutcome::Text("eventually".into()));
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted() {
        let client = ScriptedClient::new(vec![
            Err(rate_limited()),
            Err(rate_limited()),
            Err(rate_limited()),
            Err(rate_limited()),
        ]);
        let cancel = CancellationToken::new();
        let result = run_pass(
            &client,
            &test_model(),
            None,
            PassKind::Compose,
            "input",
            &cancel,
            &RetryConfig::default(),
        )
        .await;
        assert!(result.is_err());
        // Initial attempt plus max_retries
        assert_eq!(client.call_count(), 4);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let client = ScriptedClient::new(vec![Err(baton_ai::Error::api(
            "authentication_error",
            "invalid key",
        ))]);
        let cancel = CancellationToken::new();
        let result = run_pass(
            &client,
            &test_model(),
            None,
            PassKind::Extract,
            "input",
            &cancel,
            &RetryConfig::default(),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let client = ScriptedClient::new(vec![Ok(assistant("never seen"))]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = run_pass(
            &client,
            &test_model(),
            None,
            PassKind::Extract,
            "input",
            &cancel,
            &RetryConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, PassOutcome::Cancelled);
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_aborted_error_is_cancelled() {
        let client = ScriptedClient::new(vec![Err(baton_ai::Error::Aborted)]);
        let cancel = CancellationToken::new();
        let outcome = run_pass(
            &client,
            &test_model(),
            None,
            PassKind::Extract,
            "input",
            &cancel,
            &RetryConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, PassOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_aborted_stop_reason_is_cancelled() {
        let client = ScriptedClient::new(vec![Ok(aborted_message())]);
        let cancel = CancellationToken::new();
        let outcome = run_pass(
            &client,
            &test_model(),
            None,
            PassKind::Extract,
            "input",
            &cancel,
            &RetryConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, PassOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_sleep_cancellable_cancels() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!sleep_cancellable(Duration::from_secs(60), &cancel).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_cancellable_completes() {
        let cancel = CancellationToken::new();
        assert!(sleep_cancellable(Duration::from_millis(10), &cancel).await);
    }

    #[test]
    fn test_backoff_delays() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(retry.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(retry.delay_for_attempt(2), Duration::from_secs(4));
    }

    #[test]
    fn test_pass_budgets() {
        assert_eq!(PassKind::Extract.max_tokens(), 2400);
        assert_eq!(PassKind::Compose.max_tokens(), 1600);
    }
}
