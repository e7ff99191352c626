//! Chat relay between clients and an OpenAI-compatible provider
//!
//! Validates incoming chat turns, applies the deployment's policy (system
//! prompt, sampling defaults, reasoning effort), forwards them upstream and
//! re-emits the reply either as one JSON object or as a line-delimited
//! event stream. Provider credentials never leave this crate.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod demux;
pub mod error;
pub mod extract;
#[cfg(feature = "http")]
pub mod handler;
pub mod info;
pub mod normalize;
pub mod protocol;
pub mod provider;
pub mod state;

pub use demux::{StreamDemux, relay_events};
pub use error::RelayError;
#[cfg(feature = "http")]
pub use handler::relay_router;
pub use normalize::{ChatPolicy, PreparedChat};
pub use provider::{ChunkStream, Provider};
pub use state::{EventStream, RelayReply, RelayState};
