//! Conversation state machine
//!
//! A [`Conversation`] drives one user turn at a time from submission to a
//! terminal state:
//!
//! ```text
//! Idle -> Sending -> Streaming -> Finalized | Failed | Cancelled
//! ```
//!
//! The assistant reply is written into a placeholder turn as deltas
//! arrive. Every exit path (completion, relay error, transport failure,
//! parse failure, cancellation, or the `submit` future being dropped)
//! leaves that turn with `streaming == false` and releases the in-flight
//! slot before the terminal state is published.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::{RwLock, watch};
use tokio_util::sync::CancellationToken;
use umbra_core::{ChatMessage, ChatRequest, ProviderInfo, ReasoningEffort, Role};

use crate::attachment::{Attachment, compose_user_content};
use crate::client::RelayClient;
use crate::error::{RelayClientError, Result};
use crate::greeting::greeting;
use crate::reply::{Fold, ReplyAccumulator};
use crate::settings::{ChatSettings, SettingsStore};

/// Shown when a turn completes without any answer text
pub const EMPTY_REPLY_MESSAGE: &str = "No response received from the confidential service.";

/// Prefix of the text shown in place of a failed reply
pub const FAILURE_PREFIX: &str = "We couldn't reach the confidential service right now.";

/// Used when a failure carries no message of its own
pub const FAILURE_FALLBACK: &str = "Please try again later.";

/// One entry of the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    /// `true` only while the reply is being received
    pub streaming: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl ConversationTurn {
    /// Settled turn with the given text
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            reasoning_content: None,
            streaming: false,
            finish_reason: None,
            attachments: Vec::new(),
        }
    }

    fn placeholder() -> Self {
        Self {
            streaming: true,
            ..Self::new(Role::Assistant, "")
        }
    }

    fn complete(&mut self, acc: &ReplyAccumulator) {
        let content = acc.content().trim();
        self.content = if content.is_empty() {
            EMPTY_REPLY_MESSAGE.to_owned()
        } else {
            content.to_owned()
        };
        self.reasoning_content = non_blank(acc.reasoning());
        self.finish_reason = acc.finish_reason().map(str::to_owned);
        self.streaming = false;
    }

    fn fail(&mut self, message: &str) {
        let message = message.trim();
        let message = if message.is_empty() { FAILURE_FALLBACK } else { message };
        self.content = format!("{FAILURE_PREFIX} {message}");
        self.reasoning_content = None;
        self.finish_reason = None;
        self.streaming = false;
    }

    fn cancel(&mut self, acc: &ReplyAccumulator) {
        self.content = acc.content().trim().to_owned();
        self.reasoning_content = non_blank(acc.reasoning());
        self.finish_reason = None;
        self.streaming = false;
    }

    /// Settle a placeholder whose turn was dropped mid-flight
    fn abandon(&mut self) {
        self.content = self.content.trim().to_owned();
        self.reasoning_content = self.reasoning_content.as_deref().and_then(non_blank);
        self.finish_reason = None;
        self.streaming = false;
    }
}

fn non_blank(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_owned())
}

/// Where the current (or last) turn stands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TurnState {
    /// No turn submitted yet
    #[default]
    Idle,
    /// Request sent, waiting for the response
    Sending,
    /// Response body is being read
    Streaming,
    /// Reply completed
    Finalized,
    /// Reply replaced by a failure message
    Failed,
    /// Aborted by the caller
    Cancelled,
}

impl TurnState {
    /// Whether a turn is underway
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::Sending | Self::Streaming)
    }
}

/// Result of a call to [`Conversation::submit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Nothing to send, or another turn was already in flight
    Ignored,
    /// Reply received
    Finalized,
    /// Reply failed; the turn holds the failure text
    Failed(String),
    /// Aborted; the turn keeps whatever had arrived
    Cancelled,
}

/// Exclusive hold on a conversation's in-flight slot
///
/// [`ActiveTurn::settle`] releases the slot and then publishes the
/// terminal state. Dropping the guard unsettled means the `submit` future
/// itself was dropped: the placeholder is finalized as cancelled (or
/// queued for the next transcript access if the lock is busy) and
/// `Cancelled` is published.
struct ActiveTurn<'a> {
    conversation: &'a Conversation,
    placeholder: Option<usize>,
    settled: bool,
}

impl<'a> ActiveTurn<'a> {
    fn acquire(conversation: &'a Conversation) -> Option<Self> {
        conversation
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        Some(Self {
            conversation,
            placeholder: None,
            settled: false,
        })
    }

    fn settle(mut self, state: TurnState) {
        self.settled = true;
        let conversation = self.conversation;
        drop(self);
        conversation.state.send_replace(state);
    }
}

impl Drop for ActiveTurn<'_> {
    fn drop(&mut self) {
        let conversation = self.conversation;

        if !self.settled
            && let Some(index) = self.placeholder
        {
            match conversation.transcript.try_write() {
                Ok(mut transcript) => {
                    if let Some(turn) = transcript.get_mut(index) {
                        turn.abandon();
                    }
                }
                Err(_) => conversation.abandoned.store(index + 1, Ordering::Release),
            }
        }

        conversation.in_flight.store(false, Ordering::Release);

        if !self.settled {
            tracing::debug!("chat turn dropped before completion");
            conversation.state.send_replace(TurnState::Cancelled);
        }
    }
}

/// A chat transcript bound to a relay
pub struct Conversation {
    client: RelayClient,
    settings: Arc<dyn SettingsStore>,
    transcript: RwLock<Vec<ConversationTurn>>,
    in_flight: AtomicBool,
    /// Placeholder index + 1 left unsettled by a dropped turn; 0 when none
    abandoned: AtomicUsize,
    state: watch::Sender<TurnState>,
}

impl Conversation {
    /// Empty conversation
    pub fn new(client: RelayClient, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            client,
            settings,
            transcript: RwLock::new(Vec::new()),
            in_flight: AtomicBool::new(false),
            abandoned: AtomicUsize::new(0),
            state: watch::Sender::new(TurnState::Idle),
        }
    }

    /// Seed the transcript with an assistant greeting for `info`
    #[must_use]
    pub fn with_greeting(mut self, info: &ProviderInfo) -> Self {
        let text = greeting(info.display_name.as_deref(), info.host.as_deref());
        self.transcript.get_mut().push(ConversationTurn::new(Role::Assistant, text));
        self
    }

    /// Copy of the transcript
    pub async fn transcript(&self) -> Vec<ConversationTurn> {
        self.settle_abandoned().await;
        self.transcript.read().await.clone()
    }

    /// Current turn state
    pub fn state(&self) -> TurnState {
        *self.state.borrow()
    }

    /// Observe turn state changes
    pub fn subscribe(&self) -> watch::Receiver<TurnState> {
        self.state.subscribe()
    }

    /// Whether a turn is underway
    pub fn is_sending(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Settings that the next turn will use
    pub fn settings(&self) -> Result<ChatSettings> {
        self.settings.load()
    }

    /// Change the reasoning effort and persist it
    pub fn set_reasoning_effort(&self, effort: ReasoningEffort) -> Result<()> {
        let mut settings = self.settings.load()?;
        settings.reasoning_effort = effort;
        self.settings.save(&settings)
    }

    /// Submit a user turn and drive the reply to a terminal state
    ///
    /// Blank input without attachments, or a call made while another turn
    /// is in flight, returns [`TurnOutcome::Ignored`] without touching the
    /// transcript. Cancelling `cancel` stops reading at the next suspension
    /// point and keeps the partial reply.
    pub async fn submit(&self, text: &str, attachments: Vec<Attachment>, cancel: &CancellationToken) -> TurnOutcome {
        let text = text.trim();
        if text.is_empty() && attachments.is_empty() {
            return TurnOutcome::Ignored;
        }

        let Some(mut active) = ActiveTurn::acquire(self) else {
            tracing::debug!("turn already in flight; submission ignored");
            return TurnOutcome::Ignored;
        };
        self.state.send_replace(TurnState::Sending);
        self.settle_abandoned().await;

        let settings = self.settings.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default chat settings");
            ChatSettings::default()
        });

        let content = compose_user_content(text, &attachments);
        let user_turn = ConversationTurn {
            attachments,
            ..ConversationTurn::new(Role::User, content)
        };

        let (messages, index) = {
            let mut transcript = self.transcript.write().await;
            transcript.push(user_turn);

            let messages: Vec<ChatMessage> = transcript
                .iter()
                .filter(|turn| !turn.content.trim().is_empty())
                .map(|turn| ChatMessage::new(turn.role, turn.content.clone()))
                .collect();

            transcript.push(ConversationTurn::placeholder());
            (messages, transcript.len() - 1)
        };
        active.placeholder = Some(index);

        let request = ChatRequest {
            model: settings.model,
            reasoning_effort: Some(settings.reasoning_effort),
            ..ChatRequest::new(messages)
        };

        let mut acc = ReplyAccumulator::new();
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = self.receive(index, &request, &mut acc) => Some(result),
        };

        let (state, outcome) = {
            let mut transcript = self.transcript.write().await;
            let turn = &mut transcript[index];

            match result {
                Some(Ok(())) => {
                    turn.complete(&acc);
                    (TurnState::Finalized, TurnOutcome::Finalized)
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "chat turn failed");
                    turn.fail(&e.to_string());
                    (TurnState::Failed, TurnOutcome::Failed(turn.content.clone()))
                }
                None => {
                    tracing::debug!(received = acc.content().len(), "chat turn cancelled");
                    turn.cancel(&acc);
                    (TurnState::Cancelled, TurnOutcome::Cancelled)
                }
            }
        };

        active.settle(state);
        outcome
    }

    /// Finalize a placeholder left behind by a dropped turn
    async fn settle_abandoned(&self) {
        if let Some(index) = self.abandoned.swap(0, Ordering::AcqRel).checked_sub(1)
            && let Some(turn) = self.transcript.write().await.get_mut(index)
        {
            turn.abandon();
        }
    }

    /// Read the reply stream into the placeholder at `index`
    async fn receive(&self, index: usize, request: &ChatRequest, acc: &mut ReplyAccumulator) -> Result<()> {
        let mut events = self.client.chat_stream(request).await?;
        self.state.send_replace(TurnState::Streaming);

        while let Some(event) = events.next().await {
            match acc.apply(event?) {
                Fold::Continue(false) => {}
                Fold::Continue(true) => {
                    let mut transcript = self.transcript.write().await;
                    let turn = &mut transcript[index];
                    acc.content().clone_into(&mut turn.content);
                    turn.reasoning_content = (!acc.reasoning().is_empty()).then(|| acc.reasoning().to_owned());
                }
                Fold::Done => return Ok(()),
                Fold::Failed(message) => return Err(RelayClientError::Stream(message)),
            }
        }

        Ok(())
    }
}
