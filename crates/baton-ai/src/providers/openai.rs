//! OpenAI Chat Completions API provider

use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    client::parse_error_body,
    error::{Error, Result},
    types::{Api, AssistantMetadata, CompleteOptions, Content, Context, Message, Model, StopReason, Usage},
};

/// OpenAI API client
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    /// Create from environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| Error::InvalidApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Run one completion request, buffering the stream into a final message
    pub async fn complete(
        &self,
        model: &Model,
        context: &Context,
        options: &CompleteOptions,
        cancel: CancellationToken,
    ) -> Result<Message> {
        let request = build_request(model, context, options);
        let url = format!("{}/chat/completions", model.base_url);

        tracing::debug!("OpenAI API URL: {}", url);

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Authorization",
            format!("Bearer {}", self.api_key)
                .parse()
                .map_err(|_| Error::InvalidApiKey)?,
        );
        headers.insert(
            "content-type",
            "application/json".parse().unwrap(),
        );
        for (key, value) in &model.headers {
            if let (Ok(name), Ok(val)) = (
                key.parse::<reqwest::header::HeaderName>(),
                value.parse::<reqwest::header::HeaderValue>(),
            ) {
                headers.insert(name, val);
            }
        }

        let request_builder = self.client.post(&url).headers(headers).json(&request);
        let event_source = EventSource::new(request_builder)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;

        collect_message(event_source, model, cancel).await
    }
}

/// Drain the SSE chunk stream into a single assistant message.
async fn collect_message(
    mut event_source: EventSource,
    model: &Model,
    cancel: CancellationToken,
) -> Result<Message> {
    let mut text = String::new();
    let mut usage = Usage::default();
    let mut finish_reason: Option<String> = None;

    loop {
        let event_result = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Aborted),
            next = event_source.next() => match next {
                Some(r) => r,
                None => break,
            },
        };

        match event_result {
            Ok(Event::Open) => {}
            Ok(Event::Message(message)) => {
                if message.data == "[DONE]" {
                    break;
                }
                let chunk: StreamChunk = match serde_json::from_str(&message.data) {
                    Ok(c) => c,
                    Err(_) => continue,
                };
                if let Some(err) = chunk.error {
                    return Err(Error::api(
                        err.error_type.unwrap_or_else(|| "api_error".to_string()),
                        err.message,
                    ));
                }
                for choice in &chunk.choices {
                    if let Some(delta) = choice.delta.content.as_deref() {
                        text.push_str(delta);
                    }
                    if let Some(reason) = choice.finish_reason.as_deref() {
                        finish_reason = Some(reason.to_string());
                    }
                }
                if let Some(u) = chunk.usage {
                    usage.input = u.prompt_tokens;
                    usage.output = u.completion_tokens;
                }
            }
            Err(reqwest_eventsource::Error::InvalidStatusCode(code, response)) => {
                let body = response.text().await.unwrap_or_default();
                return Err(parse_error_body("ChatGPT", code.as_u16(), &body));
            }
            Err(reqwest_eventsource::Error::StreamEnded) => break,
            Err(e) => return Err(Error::Sse(e.to_string())),
        }
    }

    let stop_reason = match finish_reason.as_deref() {
        Some("length") => StopReason::Length,
        Some("tool_calls") => StopReason::ToolUse,
        _ => StopReason::Stop,
    };

    let content = if text.is_empty() {
        vec![]
    } else {
        vec![Content::Text { text }]
    };

    Ok(Message::Assistant {
        content,
        metadata: AssistantMetadata {
            api: Some(Api::OpenAICompletions),
            provider: Some(model.provider),
            model: Some(model.id.clone()),
            usage,
            stop_reason: Some(stop_reason),
            error_message: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        },
    })
}

fn build_request(model: &Model, context: &Context, options: &CompleteOptions) -> OpenAIRequest {
    let mut messages = Vec::new();

    if let Some(ref system_prompt) = context.system_prompt {
        messages.push(OpenAIMessage {
            role: "system".to_string(),
            content: system_prompt.clone(),
        });
    }

    for msg in &context.messages {
        let role = match msg {
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            // Without tool definitions on the request, results are inlined
            Message::ToolResult { .. } => "user",
        };
        let text = msg.text();
        if !text.is_empty() {
            messages.push(OpenAIMessage {
                role: role.to_string(),
                content: text,
            });
        }
    }

    OpenAIRequest {
        model: model.id.clone(),
        messages,
        stream: true,
        max_tokens: Some(options.max_tokens.unwrap_or(model.max_tokens / 3)),
        temperature: options.temperature,
        stream_options: StreamOptionsField {
            include_usage: true,
        },
    }
}

// ============================================================================
// Request / response types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream_options: StreamOptionsField,
}

#[derive(Debug, Serialize)]
struct StreamOptionsField {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<UsageInfo>,
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: DeltaInfo,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeltaInfo {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    #[serde(rename = "type")]
    error_type: Option<String>,
    message: String,
}
