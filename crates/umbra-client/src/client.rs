use std::pin::Pin;
use std::time::Duration;

use futures::stream::{Stream, StreamExt};
use umbra_core::{ChatRequest, ChatResponse, ProviderInfo, StreamEvent};
use url::Url;

use crate::error::{RelayClientError, Result};
use crate::reply::{ChatReply, Fold, ReplyAccumulator};
use crate::stream::event_stream;

/// Default path of the chat relay endpoint
pub const DEFAULT_CHAT_PATH: &str = "/api/confidential-chat";

/// Default path of the provider metadata endpoint
pub const DEFAULT_PROVIDER_INFO_PATH: &str = "/api/provider-info";

/// Boxed stream of relay events
pub type RelayEventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// HTTP client for the Umbra relay
#[derive(Debug, Clone)]
pub struct RelayClient {
    base_url: Url,
    http: reqwest::Client,
    chat_path: String,
    provider_info_path: String,
}

impl RelayClient {
    /// Create a new client pointing at the given base URL
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| RelayClientError::Config(format!("invalid base URL: {e}")))?;

        Ok(Self {
            base_url,
            http: reqwest::Client::new(),
            chat_path: DEFAULT_CHAT_PATH.to_owned(),
            provider_info_path: DEFAULT_PROVIDER_INFO_PATH.to_owned(),
        })
    }

    /// Bound every request (including the whole streamed body) by `timeout`
    ///
    /// Without one the transport's own timeouts apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be rebuilt
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(self)
    }

    /// Override the chat endpoint path
    #[must_use]
    pub fn with_chat_path(mut self, path: impl Into<String>) -> Self {
        self.chat_path = path.into();
        self
    }

    /// Override the provider metadata endpoint path
    #[must_use]
    pub fn with_provider_info_path(mut self, path: impl Into<String>) -> Self {
        self.provider_info_path = path.into();
        self
    }

    /// Get the base URL
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Open a streaming chat turn
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the relay answers with a
    /// non-success status. Failures after that arrive as stream items.
    pub async fn chat_stream(&self, req: &ChatRequest) -> Result<RelayEventStream> {
        let request = ChatRequest {
            stream: true,
            ..req.clone()
        };

        let response = self
            .http
            .post(make_url(&self.base_url, &self.chat_path))
            .json(&request)
            .send()
            .await?;

        let response = handle_error(response).await?;
        Ok(Box::pin(event_stream(response.bytes_stream())))
    }

    /// Send a non-streaming chat turn
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed
    pub async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let request = ChatRequest {
            stream: false,
            ..req.clone()
        };

        let response = self
            .http
            .post(make_url(&self.base_url, &self.chat_path))
            .json(&request)
            .send()
            .await?;

        handle_error(response).await?.json().await.map_err(Into::into)
    }

    /// Stream a chat turn and collect it into a single reply
    ///
    /// # Errors
    ///
    /// Returns an error on transport or parse failure, or when the relay
    /// sends an `error` event
    pub async fn collect_chat(&self, req: &ChatRequest) -> Result<ChatReply> {
        let mut events = self.chat_stream(req).await?;
        let mut acc = ReplyAccumulator::new();

        while let Some(event) = events.next().await {
            match acc.apply(event?) {
                Fold::Continue(_) => {}
                Fold::Done => break,
                Fold::Failed(message) => return Err(RelayClientError::Stream(message)),
            }
        }

        Ok(acc.into_reply())
    }

    /// Fetch the public provider description
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed
    pub async fn provider_info(&self) -> Result<ProviderInfo> {
        let response = self
            .http
            .get(make_url(&self.base_url, &self.provider_info_path))
            .send()
            .await?;

        handle_error(response).await?.json().await.map_err(Into::into)
    }
}

/// Build a URL from base + path
fn make_url(base_url: &Url, path: &str) -> Url {
    let mut url = base_url.clone();
    url.set_path(path);
    url
}

/// Check an HTTP response for errors
async fn handle_error(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = parse_error_body(&body)
        .or_else(|| status.canonical_reason().map(str::to_owned))
        .unwrap_or_default();

    tracing::debug!(status = status.as_u16(), %message, "relay request failed");

    Err(RelayClientError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Message of a `{"error": "..."}` body, else the trimmed raw text
fn parse_error_body(body: &str) -> Option<String> {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        let error = &json["error"];
        if let Some(message) = error.as_str().or_else(|| error["message"].as_str()) {
            return Some(message.to_owned());
        }
    }

    let body = body.trim();
    (!body.is_empty()).then(|| body.to_owned())
}
