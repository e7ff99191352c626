//! OpenAI-compatible provider implementation

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::{StreamExt, future};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use umbra_core::DONE_SENTINEL;
use url::Url;

use super::{ChunkStream, Provider};
use crate::error::RelayError;
use crate::protocol::openai::{OpenAiRequest, OpenAiStreamChunk};

/// OpenAI-compatible provider (vLLM, TGI, hosted APIs)
pub struct OpenAiProvider {
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl OpenAiProvider {
    /// Create a provider talking to `{base_url}/chat/completions`
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Internal` if the HTTP client cannot be built
    pub fn new(base_url: Url, api_key: SecretString, timeout: Option<Duration>) -> Result<Self, RelayError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| RelayError::Internal(anyhow::anyhow!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Build the chat completions URL
    fn completions_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    async fn send(&self, request: &OpenAiRequest) -> Result<reqwest::Response, RelayError> {
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(model = %request.model, error = %e, "upstream request failed");
                RelayError::UpstreamTransport(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(model = %request.model, status = %status, "upstream returned error");
            return Err(RelayError::UpstreamTransport(format!("provider returned {status}: {body}")));
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(&self, request: &OpenAiRequest) -> Result<Value, RelayError> {
        let response = self.send(request).await?;

        response
            .json()
            .await
            .map_err(|e| RelayError::UpstreamTransport(format!("failed to parse response: {e}")))
    }

    async fn complete_stream(&self, request: &OpenAiRequest) -> Result<ChunkStream, RelayError> {
        let response = self.send(request).await?;

        let chunks = response
            .bytes_stream()
            .eventsource()
            .take_while(|event| {
                let finished = matches!(event, Ok(event) if event.data.trim() == DONE_SENTINEL);
                future::ready(!finished)
            })
            .filter_map(|event| {
                future::ready(match event {
                    Ok(event) => parse_sse_data(&event.data),
                    Err(e) => Some(Err(RelayError::Streaming(e.to_string()))),
                })
            });

        Ok(Box::pin(chunks))
    }
}

/// Decode one SSE `data:` payload; blank payloads (keep-alives) yield nothing
fn parse_sse_data(data: &str) -> Option<Result<OpenAiStreamChunk, RelayError>> {
    let data = data.trim();
    if data.is_empty() {
        return None;
    }

    Some(serde_json::from_str(data).map_err(|e| {
        tracing::debug!(error = %e, data = %data, "unparseable upstream chunk");
        RelayError::Streaming(format!("failed to parse upstream chunk: {e}"))
    }))
}
