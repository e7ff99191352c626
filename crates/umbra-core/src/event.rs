//! Line-delimited event protocol between the relay and its clients
//!
//! Each event is one JSON object terminated by `\n`. A stream carries zero
//! or more `delta` / `reasoning_delta` events followed by exactly one
//! `done` or `error`.

use serde::{Deserialize, Serialize};

/// Legacy terminator line, decoded as an empty `Done`
pub const DONE_SENTINEL: &str = "[DONE]";

/// One event in a relay response stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental answer fragment
    Delta {
        /// Text to append to the answer
        #[serde(default)]
        content: String,
    },
    /// Incremental reasoning fragment
    ReasoningDelta {
        /// Text to append to the reasoning channel
        #[serde(default)]
        reasoning_content: String,
    },
    /// Terminal snapshot; non-empty fields replace accumulated values
    Done {
        /// Full answer text
        #[serde(default)]
        content: String,
        /// Full reasoning text
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reasoning_content: Option<String>,
        /// Upstream finish reason (e.g. `stop`, `length`)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },
    /// Terminal failure
    Error {
        /// Human-readable failure description
        #[serde(rename = "error")]
        message: String,
    },
}

impl StreamEvent {
    /// Answer fragment
    pub fn delta(content: impl Into<String>) -> Self {
        Self::Delta {
            content: content.into(),
        }
    }

    /// Reasoning fragment
    pub fn reasoning_delta(reasoning_content: impl Into<String>) -> Self {
        Self::ReasoningDelta {
            reasoning_content: reasoning_content.into(),
        }
    }

    /// Terminal failure
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Empty terminal snapshot
    pub const fn empty_done() -> Self {
        Self::Done {
            content: String::new(),
            reasoning_content: None,
            finish_reason: None,
        }
    }

    /// Whether this event ends the stream
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    /// Encode as a single `\n`-terminated line
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn encode_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }

    /// Decode a single line (without its terminator)
    ///
    /// Surrounding whitespace is ignored and the `[DONE]` sentinel maps to
    /// an empty `Done`.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is neither the sentinel nor a valid event
    pub fn parse_line(line: &str) -> Result<Self, serde_json::Error> {
        let line = line.trim();
        if line == DONE_SENTINEL {
            return Ok(Self::empty_done());
        }
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(event: &StreamEvent) -> StreamEvent {
        let line = event.encode_line().unwrap();
        assert_eq!(line.last(), Some(&b'\n'));
        let text = std::str::from_utf8(&line).unwrap();
        StreamEvent::parse_line(text.trim_end_matches('\n')).unwrap()
    }

    #[test]
    fn every_variant_survives_a_line_roundtrip() {
        let events = [
            StreamEvent::delta("He"),
            StreamEvent::reasoning_delta("thinking"),
            StreamEvent::Done {
                content: "Hello".to_owned(),
                reasoning_content: Some("thinking".to_owned()),
                finish_reason: Some("stop".to_owned()),
            },
            StreamEvent::error("boom"),
        ];

        for event in &events {
            assert_eq!(&roundtrip(event), event);
        }
    }

    #[test]
    fn wire_shape_matches_protocol() {
        let json = serde_json::to_value(StreamEvent::reasoning_delta("r")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "reasoning_delta", "reasoning_content": "r"}));

        let json = serde_json::to_value(StreamEvent::error("bad")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "error", "error": "bad"}));

        let json = serde_json::to_value(StreamEvent::Done {
            content: "x".to_owned(),
            reasoning_content: None,
            finish_reason: None,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "done", "content": "x"}));
    }

    #[test]
    fn sentinel_decodes_to_empty_done() {
        assert_eq!(StreamEvent::parse_line("[DONE]").unwrap(), StreamEvent::empty_done());
        assert_eq!(StreamEvent::parse_line("  [DONE]\r").unwrap(), StreamEvent::empty_done());
    }

    #[test]
    fn done_without_content_defaults_to_empty() {
        let event = StreamEvent::parse_line(r#"{"type":"done","finish_reason":"length"}"#).unwrap();
        assert_eq!(
            event,
            StreamEvent::Done {
                content: String::new(),
                reasoning_content: None,
                finish_reason: Some("length".to_owned()),
            }
        );
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert!(StreamEvent::parse_line("{not json").is_err());
        assert!(StreamEvent::parse_line(r#"{"type":"mystery"}"#).is_err());
    }

    #[test]
    fn only_done_and_error_are_terminal() {
        assert!(!StreamEvent::delta("a").is_terminal());
        assert!(!StreamEvent::reasoning_delta("a").is_terminal());
        assert!(StreamEvent::empty_done().is_terminal());
        assert!(StreamEvent::error("e").is_terminal());
    }
}
