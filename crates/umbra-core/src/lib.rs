//! Shared wire types for the Umbra chat relay
//!
//! Both the relay endpoint and the client consume these, so the
//! line-delimited event protocol has exactly one definition.

#![allow(clippy::must_use_candidate)]

mod error;
pub mod event;
pub mod types;

pub use error::HttpError;
pub use event::{DONE_SENTINEL, StreamEvent};
pub use types::{ChatMessage, ChatRequest, ChatResponse, ProviderInfo, ReasoningEffort, Role};
