//! Decoding the relay's line-delimited event stream

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use umbra_core::StreamEvent;

use crate::error::{RelayClientError, Result};

/// Incremental NDJSON decoder
///
/// Buffers raw bytes so that a multi-byte character split across reads is
/// decoded only once its line is complete.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
}

impl NdjsonDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning an item per complete non-blank line
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<StreamEvent>> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = decode_line(&line[..pos]) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing line that had no terminator
    pub fn finish(self) -> Option<Result<StreamEvent>> {
        decode_line(&self.buffer)
    }
}

fn decode_line(raw: &[u8]) -> Option<Result<StreamEvent>> {
    let line = match std::str::from_utf8(raw) {
        Ok(line) => line.trim(),
        Err(e) => return Some(Err(RelayClientError::StreamParse(format!("invalid UTF-8: {e}")))),
    };

    if line.is_empty() {
        return None;
    }

    Some(StreamEvent::parse_line(line).map_err(|e| {
        tracing::debug!(line, error = %e, "failed to parse stream line");
        RelayClientError::StreamParse(e.to_string())
    }))
}

/// Turn a response body into relay events
///
/// The body is pulled one chunk at a time. Transport errors are yielded as
/// items; the caller decides whether to keep reading.
pub fn event_stream<S, E>(body: S) -> impl Stream<Item = Result<StreamEvent>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Into<RelayClientError> + Send + 'static,
{
    stream::unfold(Some((Box::pin(body), NdjsonDecoder::new())), |state| async move {
        let (mut body, mut decoder) = state?;

        match body.next().await {
            Some(Ok(chunk)) => {
                let events = decoder.push(&chunk);
                Some((events, Some((body, decoder))))
            }
            Some(Err(e)) => Some((vec![Err(e.into())], None)),
            None => Some((decoder.finish().into_iter().collect(), None)),
        }
    })
    .flat_map(stream::iter)
}
