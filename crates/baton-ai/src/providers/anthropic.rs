//! Anthropic Messages API provider

use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    client::parse_error_body,
    error::{Error, Result},
    types::{Api, AssistantMetadata, CompleteOptions, Content, Context, Message, Model, StopReason, Usage},
};

/// Anthropic API client
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    /// Create from environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| Error::InvalidApiKey)?;
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
        let url = format!("{}/v1/messages", model.base_url);

        tracing::debug!("Anthropic API URL: {}", url);

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "x-api-key",
            self.api_key
                .parse()
                .map_err(|_| Error::InvalidApiKey)?,
        );
        headers.insert("accept", "application/json".parse().unwrap());
        headers.insert(
            "content-type",
            "application/json".parse().unwrap(),
        );
        headers.insert(
            "anthropic-version",
            "2023-06-01".parse().unwrap(),
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

/// Drain the SSE stream into a single assistant message.
async fn collect_message(
    mut event_source: EventSource,
    model: &Model,
    cancel: CancellationToken,
) -> Result<Message> {
    let mut usage = Usage::default();
    let mut stop_reason = StopReason::Stop;
    let mut blocks: Vec<BlockBuffer> = vec![];

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
            Ok(Event::Message(message)) => match message.event.as_str() {
                "message_start" => {
                    if let Ok(data) = serde_json::from_str::<MessageStartEvent>(&message.data) {
                        apply_usage(&mut usage, &data.message.usage);
                    }
                }
                "content_block_start" => {
                    if let Ok(data) = serde_json::from_str::<ContentBlockStartEvent>(&message.data)
                    {
                        let index = data.index as usize;
                        while blocks.len() <= index {
                            blocks.push(BlockBuffer::Empty);
                        }
                        blocks[index] = match data.content_block.block_type.as_str() {
                            "thinking" => BlockBuffer::Thinking(String::new()),
                            _ => BlockBuffer::Text(String::new()),
                        };
                    }
                }
                "content_block_delta" => {
                    if let Ok(data) = serde_json::from_str::<ContentBlockDeltaEvent>(&message.data)
                    {
                        let index = data.index as usize;
                        if let Some(block) = blocks.get_mut(index) {
                            match block {
                                BlockBuffer::Text(text) => {
                                    text.push_str(data.delta.text.as_deref().unwrap_or(""));
                                }
                                BlockBuffer::Thinking(thinking) => {
                                    thinking
                                        .push_str(data.delta.thinking.as_deref().unwrap_or(""));
                                }
                                BlockBuffer::Empty => {}
                            }
                        }
                    }
                }
                "message_delta" => {
                    if let Ok(data) = serde_json::from_str::<MessageDeltaEvent>(&message.data) {
                        if let Some(reason) = data.delta.stop_reason.as_deref() {
                            stop_reason = map_stop_reason(reason);
                        }
                        apply_usage(&mut usage, &data.usage);
                    }
                }
                "message_stop" => break,
                "error" => {
                    if let Ok(data) = serde_json::from_str::<ErrorEvent>(&message.data) {
                        return Err(Error::api(data.error.error_type, data.error.message));
                    }
                    return Err(Error::Sse("provider error event".to_string()));
                }
                _ => {}
            },
            Err(reqwest_eventsource::Error::InvalidStatusCode(code, response)) => {
                let body = response.text().await.unwrap_or_default();
                return Err(parse_error_body("Claude", code.as_u16(), &body));
            }
            Err(reqwest_eventsource::Error::StreamEnded) => break,
            Err(e) => return Err(Error::Sse(e.to_string())),
        }
    }

    let content: Vec<Content> = blocks
        .into_iter()
        .filter_map(|block| match block {
            BlockBuffer::Text(text) => Some(Content::Text { text }),
            BlockBuffer::Thinking(thinking) => Some(Content::Thinking { thinking }),
            BlockBuffer::Empty => None,
        })
        .collect();

    Ok(Message::Assistant {
        content,
        metadata: AssistantMetadata {
            api: Some(Api::AnthropicMessages),
            provider: Some(model.provider),
            model: Some(model.id.clone()),
            usage,
            stop_reason: Some(stop_reason),
            error_message: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        },
    })
}

fn build_request(model: &Model, context: &Context, options: &CompleteOptions) -> AnthropicRequest {
    AnthropicRequest {
        model: model.id.clone(),
        messages: convert_messages(&context.messages),
        max_tokens: options.max_tokens.unwrap_or(model.max_tokens / 3),
        stream: true,
        system: context.system_prompt.clone(),
        temperature: options.temperature,
    }
}

fn apply_usage(usage: &mut Usage, info: &UsageInfo) {
    usage.input = info.input_tokens;
    usage.output = info.output_tokens;
    usage.cache_read = info.cache_read_input_tokens.unwrap_or(0);
    usage.cache_write = info.cache_creation_input_tokens.unwrap_or(0);
}

#[derive(Debug)]
enum BlockBuffer {
    Empty,
    Text(String),
    Thinking(String),
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: serde_json::Value,
}

// ============================================================================
// Response event types
// ============================================================================

#[derive(Debug, Deserialize)]
struct MessageStartEvent {
    message: MessageInfo,
}

#[derive(Debug, Deserialize)]
struct MessageInfo {
    usage: UsageInfo,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
    cache_read_input_tokens: Option<u32>,
    cache_creation_input_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ContentBlockStartEvent {
    index: u32,
    content_block: ContentBlockInfo,
}

#[derive(Debug, Deserialize)]
struct ContentBlockInfo {
    #[serde(rename = "type")]
    block_type: String,
}

#[derive(Debug, Deserialize)]
struct ContentBlockDeltaEvent {
    index: u32,
    delta: DeltaInfo,
}

#[derive(Debug, Deserialize)]
struct DeltaInfo {
    text: Option<String>,
    thinking: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaEvent {
    delta: MessageDelta,
    usage: UsageInfo,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEvent {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

// ============================================================================
// Conversion functions
// ============================================================================

fn convert_messages(messages: &[Message]) -> Vec<AnthropicMessage> {
    let mut result = vec![];

    for message in messages {
        match message {
            Message::User { content, .. } => {
                let blocks: Vec<serde_json::Value> = content
                    .iter()
                    .filter_map(|c| {
                        c.as_text()
                            .map(|text| serde_json::json!({ "type": "text", "text": text }))
                    })
                    .collect();
                result.push(AnthropicMessage {
                    role: "user".to_string(),
                    content: serde_json::Value::Array(blocks),
                });
            }
            Message::Assistant { content, .. } => {
                let blocks: Vec<serde_json::Value> = content
                    .iter()
                    .filter_map(|c| match c {
                        Content::Text { text } => {
                            Some(serde_json::json!({ "type": "text", "text": text }))
                        }
                        Content::ToolCall {
                            id,
                            name,
                            arguments,
                        } => Some(serde_json::json!({
                            "type": "tool_use",
                            "id": id,
                            "name": name,
                            "input": arguments
                        })),
                        Content::Thinking { .. } => None,
                    })
                    .collect();
                if !blocks.is_empty() {
                    result.push(AnthropicMessage {
                        role: "assistant".to_string(),
                        content: serde_json::Value::Array(blocks),
                    });
                }
            }
            Message::ToolResult {
                tool_call_id,
                content,
                is_error,
                ..
            } => {
                let text: String = content
                    .iter()
                    .filter_map(|c| c.as_text())
                    .collect::<Vec<_>>()
                    .join("\n");
                result.push(AnthropicMessage {
                    role: "user".to_string(),
                    content: serde_json::Value::Array(vec![serde_json::json!({
                        "type": "tool_result",
                        "tool_use_id": tool_call_id,
                        "content": text,
                        "is_error": is_error
                    })]),
                });
            }
        }
    }

    result
}

fn map_stop_reason(reason: &str) -> StopReason {
    match reason {
        "end_turn" | "stop_sequence" => StopReason::Stop,
        "max_tokens" => StopReason::Length,
        "tool_use" => StopReason::ToolUse,
        _ => StopReason::Stop,
    }
}
