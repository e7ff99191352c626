//! Folding relay events into a reply

use serde::{Deserialize, Serialize};
use umbra_core::StreamEvent;

/// Reply assembled from a complete event stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    /// Answer text
    pub message: String,
    /// Reasoning text, if any was streamed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    /// Why generation stopped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Effect of one event on the accumulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fold {
    /// A delta was appended (`true` when visible text changed)
    Continue(bool),
    /// The stream reported completion
    Done,
    /// The stream reported a failure
    Failed(String),
}

/// Running answer and reasoning text for one turn
#[derive(Debug, Clone, Default)]
pub struct ReplyAccumulator {
    content: String,
    reasoning: String,
    finish_reason: Option<String>,
}

impl ReplyAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer text so far
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Reasoning text so far
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// Finish reason reported by `Done`
    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }

    /// Apply one event
    ///
    /// Deltas append. A `Done` replaces each accumulated value only when
    /// it carries a non-empty one, so an empty `Done` keeps the deltas.
    pub fn apply(&mut self, event: StreamEvent) -> Fold {
        match event {
            StreamEvent::Delta { content } => {
                self.content.push_str(&content);
                Fold::Continue(!content.is_empty())
            }
            StreamEvent::ReasoningDelta { reasoning_content } => {
                self.reasoning.push_str(&reasoning_content);
                Fold::Continue(!reasoning_content.is_empty())
            }
            StreamEvent::Done {
                content,
                reasoning_content,
                finish_reason,
            } => {
                if !content.is_empty() {
                    self.content = content;
                }
                if let Some(reasoning) = reasoning_content.filter(|r| !r.is_empty()) {
                    self.reasoning = reasoning;
                }
                if let Some(reason) = finish_reason.filter(|r| !r.is_empty()) {
                    self.finish_reason = Some(reason);
                }
                Fold::Done
            }
            StreamEvent::Error { message } => Fold::Failed(message),
        }
    }

    /// Untrimmed reply
    pub fn into_reply(self) -> ChatReply {
        ChatReply {
            message: self.content,
            reasoning_content: (!self.reasoning.is_empty()).then_some(self.reasoning),
            finish_reason: self.finish_reason,
        }
    }
}
