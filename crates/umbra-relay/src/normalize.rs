//! Request validation and policy defaults
//!
//! Bodies are inspected as untyped JSON so every shape problem maps onto
//! [`RelayError::InvalidMessages`] instead of a framework rejection.

use serde_json::Value;
use umbra_config::RelayConfig;
use umbra_core::{ChatMessage, ReasoningEffort, Role};

use crate::error::RelayError;
use crate::protocol::openai::OpenAiRequest;

/// Defaults applied to every relayed request
#[derive(Debug, Clone)]
pub struct ChatPolicy {
    /// Injected when the caller sends no system message
    pub system_prompt: String,
    /// Used when the request carries no numeric temperature
    pub temperature: f64,
    /// Used when the request carries no usable token budget
    pub max_tokens: u32,
    /// Used when the request names no model
    pub model: Option<String>,
}

impl ChatPolicy {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            system_prompt: config.system_prompt().to_owned(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            model: config.provider.model.clone(),
        }
    }
}

/// A validated request with defaults applied
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedChat {
    /// Messages to forward, system prompt first
    pub messages: Vec<ChatMessage>,
    /// Resolved model, `None` when neither request nor policy names one
    pub model: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Recognized effort level; unknown values are dropped
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Only an explicit `"stream": false` disables streaming
    pub stream: bool,
}

impl PreparedChat {
    /// Validate a raw request body and apply the policy
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidMessages`] when `messages` is not a
    /// non-empty array of `{role, content}` objects with a known role and
    /// non-blank string content.
    pub fn from_body(body: &Value, policy: &ChatPolicy) -> Result<Self, RelayError> {
        let mut messages = sanitize_messages(body.get("messages"))?;

        if !messages.iter().any(|m| m.role == Role::System) {
            messages.insert(0, ChatMessage::system(policy.system_prompt.clone()));
        }

        let model = body
            .get("model")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_owned)
            .or_else(|| policy.model.clone());

        let temperature = body
            .get("temperature")
            .and_then(Value::as_f64)
            .unwrap_or(policy.temperature);

        let max_tokens = body
            .get("max_tokens")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(policy.max_tokens);

        let reasoning_effort = body
            .get("reasoning_effort")
            .and_then(Value::as_str)
            .and_then(ReasoningEffort::parse);

        let stream = body.get("stream") != Some(&Value::Bool(false));

        Ok(Self {
            messages,
            model,
            temperature,
            max_tokens,
            reasoning_effort,
            stream,
        })
    }

    /// Build the upstream request
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ModelMissing`] when no model was resolved
    pub fn into_upstream(self) -> Result<OpenAiRequest, RelayError> {
        let model = self.model.ok_or(RelayError::ModelMissing)?;

        Ok(OpenAiRequest {
            model,
            messages: self.messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: self.stream,
            reasoning_effort: self.reasoning_effort,
        })
    }
}

fn sanitize_messages(raw: Option<&Value>) -> Result<Vec<ChatMessage>, RelayError> {
    let Some(Value::Array(items)) = raw else {
        return Err(invalid("messages must be an array"));
    };

    if items.is_empty() {
        return Err(invalid("messages must not be empty"));
    }

    items
        .iter()
        .map(|item| {
            let Value::Object(map) = item else {
                return Err(invalid("each message must be an object"));
            };

            let role = map
                .get("role")
                .and_then(Value::as_str)
                .and_then(Role::parse)
                .ok_or_else(|| invalid("invalid message role"))?;

            let content = map
                .get("content")
                .and_then(Value::as_str)
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| invalid("message content must be a non-empty string"))?;

            Ok(ChatMessage::new(role, content))
        })
        .collect()
}

fn invalid(message: &str) -> RelayError {
    RelayError::InvalidMessages(message.to_owned())
}
