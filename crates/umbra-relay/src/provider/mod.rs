//! Upstream provider seam

pub mod openai;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde_json::Value;

use crate::error::RelayError;
use crate::protocol::openai::{OpenAiRequest, OpenAiStreamChunk};

/// Upstream chunks as they arrive, ending at the provider's `[DONE]`
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<OpenAiStreamChunk, RelayError>> + Send>>;

/// Chat completions backend the relay forwards to
#[async_trait]
pub trait Provider: Send + Sync {
    /// Send a non-streaming request and return the raw JSON payload
    async fn complete(&self, request: &OpenAiRequest) -> Result<Value, RelayError>;

    /// Open a streaming request
    ///
    /// Errors returned here happen before any event reached the client and
    /// become a plain error response. Failures inside the stream become a
    /// terminal `error` event.
    async fn complete_stream(&self, request: &OpenAiRequest) -> Result<ChunkStream, RelayError>;
}
