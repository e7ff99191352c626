//! Relay state and the per-request pipeline

use std::pin::Pin;
use std::sync::Arc;

use futures_util::Stream;
use secrecy::ExposeSecret;
use serde_json::Value;
use umbra_config::RelayConfig;
use umbra_core::{ChatResponse, ProviderInfo, ReasoningEffort, StreamEvent};

use crate::demux::relay_events;
use crate::error::RelayError;
use crate::extract::{choice_reasoning, response_text};
use crate::info::provider_info;
use crate::normalize::{ChatPolicy, PreparedChat};
use crate::provider::Provider;
use crate::provider::openai::OpenAiProvider;

/// Relay events ready to be written to the client
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Outcome of relaying one request
pub enum RelayReply {
    /// Single JSON reply (`"stream": false`)
    Complete(ChatResponse),
    /// Line-delimited event stream
    Stream(EventStream),
}

/// Shared state for relay route handlers
///
/// Read-only after construction; cloning is cheap.
#[derive(Clone)]
pub struct RelayState {
    inner: Arc<RelayStateInner>,
}

struct RelayStateInner {
    upstream: Upstream,
    policy: ChatPolicy,
    info: ProviderInfo,
    chat_path: String,
    provider_info_path: String,
    max_body_bytes: usize,
}

enum Upstream {
    Ready(Arc<dyn Provider>),
    /// Names the missing setting
    Unconfigured(&'static str),
}

impl RelayState {
    /// Build relay state from configuration
    ///
    /// A missing base URL or API key does not fail construction; each chat
    /// request reports it instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout is malformed or the HTTP client
    /// cannot be built
    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        let provider = &config.provider;
        let info = provider_info(provider);

        let api_key = provider
            .api_key
            .clone()
            .filter(|key| !key.expose_secret().trim().is_empty());

        let upstream = match (provider.parsed_base_url(), api_key) {
            (None, _) => Upstream::Unconfigured("relay.provider.base_url"),
            (Some(_), None) => Upstream::Unconfigured("relay.provider.api_key"),
            (Some(base_url), Some(api_key)) => {
                let timeout = provider
                    .timeout
                    .as_deref()
                    .map(umbra_config::parse_duration)
                    .transpose()?;

                tracing::info!(
                    base_url = info.base_url.as_deref().unwrap_or_default(),
                    model = provider.model.as_deref().unwrap_or("<request>"),
                    "relay provider configured"
                );

                Upstream::Ready(Arc::new(OpenAiProvider::new(base_url, api_key, timeout)?))
            }
        };

        if let Upstream::Unconfigured(setting) = upstream {
            tracing::warn!(setting, "relay provider is not configured; chat requests will fail");
        }

        Ok(Self::build(config, upstream, info))
    }

    /// Build relay state around an existing provider
    pub fn with_provider(config: &RelayConfig, provider: Arc<dyn Provider>) -> Self {
        Self::build(config, Upstream::Ready(provider), provider_info(&config.provider))
    }

    fn build(config: &RelayConfig, upstream: Upstream, info: ProviderInfo) -> Self {
        Self {
            inner: Arc::new(RelayStateInner {
                upstream,
                policy: ChatPolicy::from_config(config),
                info,
                chat_path: config.chat_path.clone(),
                provider_info_path: config.provider_info_path.clone(),
                max_body_bytes: config.max_body_bytes,
            }),
        }
    }

    /// Public description of the provider
    pub fn provider_info(&self) -> &ProviderInfo {
        &self.inner.info
    }

    /// Path the chat endpoint is mounted on
    pub fn chat_path(&self) -> &str {
        &self.inner.chat_path
    }

    /// Path the provider metadata endpoint is mounted on
    pub fn provider_info_path(&self) -> &str {
        &self.inner.provider_info_path
    }

    /// Largest chat request body accepted, in bytes
    pub fn max_body_bytes(&self) -> usize {
        self.inner.max_body_bytes
    }

    /// Validate a request body and forward it upstream
    ///
    /// Validation runs before any upstream call, in this order: messages,
    /// provider configuration, model.
    ///
    /// # Errors
    ///
    /// Returns a rejection error for invalid or unservable requests, or
    /// `UpstreamTransport` if the provider cannot be reached or answers
    /// with a non-success status
    pub async fn relay(&self, body: &Value) -> Result<RelayReply, RelayError> {
        let prepared = PreparedChat::from_body(body, &self.inner.policy)?;

        let provider = match &self.inner.upstream {
            Upstream::Ready(provider) => Arc::clone(provider),
            Upstream::Unconfigured(setting) => return Err(RelayError::ProviderUnconfigured(setting)),
        };

        let reasoning_effort = prepared.reasoning_effort;
        let request = prepared.into_upstream()?;

        tracing::debug!(
            model = %request.model,
            stream = request.stream,
            messages = request.messages.len(),
            reasoning_effort = reasoning_effort.map(ReasoningEffort::as_str),
            "relaying chat turn"
        );

        if request.stream {
            let chunks = provider.complete_stream(&request).await?;
            Ok(RelayReply::Stream(Box::pin(relay_events(chunks))))
        } else {
            let raw = provider.complete(&request).await?;
            Ok(RelayReply::Complete(chat_response(raw, reasoning_effort)))
        }
    }
}

/// Shape a non-streaming upstream payload into the relay reply
fn chat_response(raw: Value, reasoning_effort: Option<ReasoningEffort>) -> ChatResponse {
    let message = raw
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .or_else(|| response_text(&raw))
        .unwrap_or_else(|| raw.to_string());

    let finish_reason = raw
        .pointer("/choices/0/finish_reason")
        .and_then(Value::as_str)
        .map(str::to_owned);

    ChatResponse {
        message,
        reasoning_content: choice_reasoning(&raw),
        finish_reason,
        reasoning_effort,
        raw,
    }
}
