//! Upstream SSE chunks to relay events
//!
//! [`StreamDemux`] splits each upstream chunk into answer and reasoning
//! fragments and remembers what it has emitted, so that providers sending
//! cumulative snapshots instead of deltas still produce incremental events.
//! [`relay_events`] drives it over a whole upstream stream and guarantees
//! exactly one terminal event.

use futures_util::{Stream, StreamExt, stream};
use umbra_core::StreamEvent;

use crate::extract::{content_text, delta_reasoning, reasoning_text, remainder};
use crate::protocol::openai::OpenAiStreamChunk;
use crate::provider::ChunkStream;

/// Accumulator for one streamed completion
#[derive(Debug, Default)]
pub struct StreamDemux {
    content: String,
    reasoning: String,
    finish_reason: Option<String>,
}

impl StreamDemux {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer text emitted so far
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Reasoning text emitted so far
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// Fold one upstream chunk, returning the events it produces
    ///
    /// Only the first choice is considered. Chunks without choices produce
    /// nothing.
    pub fn push(&mut self, chunk: &OpenAiStreamChunk) -> Vec<StreamEvent> {
        let Some(choice) = chunk.choices.first() else {
            return Vec::new();
        };

        let delta = choice.delta.as_ref();
        let message = choice.message.as_ref();

        if self.finish_reason.is_none()
            && let Some(reason) = choice.finish_reason.as_deref().filter(|r| !r.is_empty())
        {
            self.finish_reason = Some(reason.to_owned());
        }

        let mut content_piece = content_text(delta.and_then(|d| d.get("content")));
        if content_piece.is_empty() {
            let full = content_text(message.and_then(|m| m.get("content")));
            content_piece = remainder(&full, &self.content).to_owned();
        }

        let mut reasoning_piece = delta_reasoning(delta);
        if reasoning_piece.is_empty() {
            let full = reasoning_text(message.and_then(|m| m.get("reasoning_content")));
            reasoning_piece = remainder(&full, &self.reasoning).to_owned();
        }

        let mut events = Vec::with_capacity(2);

        if !content_piece.is_empty() {
            self.content.push_str(&content_piece);
            events.push(StreamEvent::delta(content_piece));
        }

        if !reasoning_piece.is_empty() {
            self.reasoning.push_str(&reasoning_piece);
            events.push(StreamEvent::reasoning_delta(reasoning_piece));
        }

        events
    }

    /// Terminal `Done` carrying everything accumulated
    pub fn finish(self) -> StreamEvent {
        StreamEvent::Done {
            content: self.content,
            reasoning_content: (!self.reasoning.is_empty()).then_some(self.reasoning),
            finish_reason: self.finish_reason,
        }
    }
}

/// Re-emit an upstream chunk stream as relay events
///
/// The output ends with exactly one `Done` (upstream finished) or `Error`
/// (transport failure, unparseable chunk, or an in-band error object).
/// Nothing is read from upstream after the terminal event.
pub fn relay_events(upstream: ChunkStream) -> impl Stream<Item = StreamEvent> + Send {
    stream::unfold(Some((upstream, StreamDemux::new())), |state| async move {
        let (mut upstream, mut demux) = state?;

        match upstream.next().await {
            Some(Ok(chunk)) => {
                if let Some(message) = chunk.error_message() {
                    tracing::warn!(error = %message, "upstream reported an error mid-stream");
                    return Some((vec![StreamEvent::error(message)], None));
                }
                let events = demux.push(&chunk);
                Some((events, Some((upstream, demux))))
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, emitted = demux.content().len(), "upstream stream failed");
                Some((vec![StreamEvent::error(e.to_string())], None))
            }
            None => Some((vec![demux.finish()], None)),
        }
    })
    .flat_map(stream::iter)
}
