#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

//! Client for the Umbra chat relay
//!
//! [`RelayClient`] speaks the relay's HTTP API and decodes its
//! line-delimited event stream; [`Conversation`] folds those events into a
//! cancel-safe transcript, one turn at a time.

pub mod attachment;
mod client;
pub mod conversation;
pub mod error;
pub mod greeting;
pub mod reply;
pub mod settings;
pub mod stream;

pub use attachment::{Attachment, compose_user_content};
pub use client::{DEFAULT_CHAT_PATH, DEFAULT_PROVIDER_INFO_PATH, RelayClient, RelayEventStream};
pub use conversation::{Conversation, ConversationTurn, TurnOutcome, TurnState};
pub use error::{RelayClientError, Result};
pub use greeting::greeting;
pub use reply::{ChatReply, Fold, ReplyAccumulator};
pub use settings::{ChatSettings, JsonFileStore, MemoryStore, SettingsStore};
pub use stream::{NdjsonDecoder, event_stream};
pub use tokio_util::sync::CancellationToken;
pub use umbra_core::{ChatMessage, ChatRequest, ChatResponse, ProviderInfo, ReasoningEffort, Role, StreamEvent};
