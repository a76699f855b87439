//! baton-ai: LLM completion capability layer
//!
//! This crate provides the single capability the handoff engine consumes:
//! run one completion request against a model and get back the final
//! assistant message, honoring a cancellation signal throughout.

pub mod client;
pub mod error;
pub mod providers;
pub mod types;

pub use client::{CompletionClient, HttpCompletionClient};
pub use error::{Error, Result, is_retryable_text};
pub use types::{
    Api, AssistantMetadata, CompleteOptions, Content, Context, Message, Model, Provider,
    StopReason, Usage,
};
