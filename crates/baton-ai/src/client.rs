//! Completion capability seam
//!
//! The engine consumes a single capability: hand a model, a context, and a
//! cancellation signal to `complete` and get back one final assistant
//! message. Providers may stream internally; callers only see the joined
//! result.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    providers,
    types::{CompleteOptions, Context, Message, Model},
};

/// A client capable of producing one assistant message per request
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Run a single completion request.
    ///
    /// Returns `Err(Error::Aborted)` when `cancel` fires mid-request.
    async fn complete(
        &self,
        model: &Model,
        context: &Context,
        options: &CompleteOptions,
        cancel: CancellationToken,
    ) -> Result<Message>;
}

/// HTTP client dispatching on the model's wire dialect
#[derive(Default)]
pub struct HttpCompletionClient;

impl HttpCompletionClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(
        &self,
        model: &Model,
        context: &Context,
        options: &CompleteOptions,
        cancel: CancellationToken,
    ) -> Result<Message> {
        match model.api {
            crate::types::Api::AnthropicMessages => {
                let provider = match options.api_key.as_deref() {
                    Some(key) => providers::anthropic::AnthropicProvider::new(key),
                    None => providers::anthropic::AnthropicProvider::from_env()?,
                };
                provider.complete(model, context, options, cancel).await
            }
            crate::types::Api::OpenAICompletions => {
                let provider = match options.api_key.as_deref() {
                    Some(key) => providers::openai::OpenAIProvider::new(key),
                    None => providers::openai::OpenAIProvider::from_env()?,
                };
                provider.complete(model, context, options, cancel).await
            }
        }
    }
}

/// Interpret a non-success response body as a typed error.
///
/// Recognizes subscription quota payloads (`plan_type` / `resets_at`) and
/// structured API error objects. Retryable statuses keep their status code
/// so the retry layer can classify them without string matching.
pub(crate) fn parse_error_body(provider_label: &str, status: u16, body: &str) -> Error {
    let retryable_status = matches!(status, 429 | 500 | 502 | 503 | 504);

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let detail = value.get("error").unwrap_or(&value);

        if let Some(plan_type) = detail.get("plan_type").and_then(|v| v.as_str()) {
            return Error::UsageLimit {
                provider: provider_label.to_string(),
                plan_type: plan_type.to_string(),
                resets_at: detail.get("resets_at").and_then(|v| v.as_i64()),
            };
        }

        if let Some(message) = detail.get("message").and_then(|v| v.as_str()) {
            if retryable_status {
                return Error::HttpStatus {
                    status,
                    message: message.to_string(),
                };
            }
            let error_type = detail
                .get("type")
                .and_then(|v| v.as_str())
                .unwrap_or("api_error");
            return Error::api(error_type, message);
        }
    }

    Error::HttpStatus {
        status,
        message: body.chars().take(300).collect(),
    }
}
