//! `OpenAI` chat completion wire format, as spoken to the upstream provider
//!
//! Response-side content and reasoning fields are kept as raw JSON values:
//! compatible servers disagree on whether they are strings, arrays of
//! parts, or objects, and `crate::extract` normalizes all of them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use umbra_core::{ChatMessage, ReasoningEffort};

// -- Request types --

/// Upstream chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages, system prompt first
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature
    pub temperature: f64,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Whether to stream the response as SSE
    pub stream: bool,
    /// Reasoning effort hint for reasoning-capable models
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
}

// -- Streaming types --

/// One SSE `data:` payload from a streaming completion
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiStreamChunk {
    /// Choices carried by this chunk (empty or `null` on usage-only chunks)
    #[serde(default, deserialize_with = "null_as_empty")]
    pub choices: Vec<OpenAiStreamChoice>,
    /// Error object some providers send in-band instead of failing the request
    #[serde(default)]
    pub error: Option<Value>,
}

/// Choice within a streaming chunk
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiStreamChoice {
    /// Incremental delta (`content`, `reasoning_content`, `reasoning`)
    #[serde(default)]
    pub delta: Option<Value>,
    /// Cumulative message snapshot sent by non-delta providers
    #[serde(default)]
    pub message: Option<Value>,
    /// Finish reason (present on the final chunk)
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl OpenAiStreamChunk {
    /// Human-readable message of an in-band error object
    pub fn error_message(&self) -> Option<String> {
        let error = self.error.as_ref()?;
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| error.as_str())
            .map_or_else(|| error.to_string(), str::to_owned);
        Some(message)
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
