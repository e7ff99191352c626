//! Client conversation flow through a live relay

mod harness;

use std::sync::Arc;
use std::time::Duration;

use harness::config::ConfigBuilder;
use harness::mock_upstream::{MockUpstream, Script, StreamEnd, delta_chunk, reasoning_chunk};
use harness::server::TestServer;
use harness::stub_relay::StubRelay;
use tokio_util::sync::CancellationToken;
use umbra_client::conversation::{EMPTY_REPLY_MESSAGE, FAILURE_PREFIX};
use umbra_client::{
    Attachment, ChatMessage, ChatRequest, ChatSettings, Conversation, JsonFileStore, MemoryStore, ReasoningEffort,
    RelayClientError, Role, SettingsStore, TurnOutcome, TurnState,
};

async fn start(script: Script) -> (MockUpstream, TestServer) {
    let mock = MockUpstream::start(script).await.unwrap();
    let server = TestServer::start(&ConfigBuilder::new().with_provider(&mock.base_url()).build())
        .await
        .unwrap();
    (mock, server)
}

fn conversation(server: &TestServer) -> Conversation {
    Conversation::new(server.relay_client(), Arc::new(MemoryStore::default()))
}

/// Wait until the streaming turn has shown some reply text
async fn wait_for_partial(conversation: &Conversation) {
    let mut state = conversation.subscribe();
    state.wait_for(|s| *s == TurnState::Streaming).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let transcript = conversation.transcript().await;
            if transcript.last().is_some_and(|turn| !turn.content.is_empty()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("partial reply never arrived");
}

#[tokio::test]
async fn hello_turn_is_finalized() {
    let (mock, server) = start(Script::deltas(&["He", "llo"])).await;
    let conversation = conversation(&server);

    let outcome = conversation.submit("Hello", Vec::new(), &CancellationToken::new()).await;

    assert_eq!(outcome, TurnOutcome::Finalized);
    assert_eq!(conversation.state(), TurnState::Finalized);
    assert!(!conversation.is_sending());

    let transcript = conversation.transcript().await;
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].role, Role::User);
    assert_eq!(transcript[0].content, "Hello");
    assert_eq!(transcript[1].role, Role::Assistant);
    assert_eq!(transcript[1].content, "Hello");
    assert_eq!(transcript[1].finish_reason.as_deref(), Some("stop"));
    assert!(!transcript[1].streaming);

    let sent = mock.last_request().unwrap();
    assert_eq!(sent["reasoning_effort"], "medium");
    assert_eq!(sent["messages"][1]["content"], "Hello");
}

#[tokio::test]
async fn history_is_resent_on_the_next_turn() {
    let (mock, server) = start(Script::deltas(&["Sure"])).await;
    let conversation = conversation(&server);
    let cancel = CancellationToken::new();

    conversation.submit("First", Vec::new(), &cancel).await;
    conversation.submit("Second", Vec::new(), &cancel).await;

    let sent = mock.last_request().unwrap();
    let roles: Vec<&str> = sent["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, ["system", "user", "assistant", "user"]);
    assert_eq!(sent["messages"][2]["content"], "Sure");
    assert_eq!(mock.request_count(), 2);
}

#[tokio::test]
async fn reasoning_is_kept_on_the_assistant_turn() {
    let script = Script::raw(vec![reasoning_chunk("Let me think"), delta_chunk("42")], StreamEnd::Done);
    let (_mock, server) = start(script).await;
    let conversation = conversation(&server);

    conversation.submit("Answer?", Vec::new(), &CancellationToken::new()).await;

    let reply = conversation.transcript().await.pop().unwrap();
    assert_eq!(reply.content, "42");
    assert_eq!(reply.reasoning_content.as_deref(), Some("Let me think"));
}

#[tokio::test]
async fn stream_closing_early_keeps_what_arrived() {
    let (_mock, server) = start(Script::raw(vec![delta_chunk("Half an ans")], StreamEnd::Close)).await;
    let conversation = conversation(&server);

    let outcome = conversation.submit("Hi", Vec::new(), &CancellationToken::new()).await;

    assert_eq!(outcome, TurnOutcome::Finalized);
    let reply = conversation.transcript().await.pop().unwrap();
    assert_eq!(reply.content, "Half an ans");
    assert!(reply.finish_reason.is_none());
}

#[tokio::test]
async fn empty_reply_gets_placeholder_text() {
    let (_mock, server) = start(Script::raw(Vec::new(), StreamEnd::Done)).await;
    let conversation = conversation(&server);

    conversation.submit("Hi", Vec::new(), &CancellationToken::new()).await;

    let reply = conversation.transcript().await.pop().unwrap();
    assert_eq!(reply.content, EMPTY_REPLY_MESSAGE);
}

#[tokio::test]
async fn upstream_failure_becomes_failure_turn() {
    let (_mock, server) = start(Script::Status(500, "model crashed")).await;
    let conversation = conversation(&server);

    let outcome = conversation.submit("Hi", Vec::new(), &CancellationToken::new()).await;

    let TurnOutcome::Failed(text) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(text.starts_with(FAILURE_PREFIX), "got {text}");
    assert!(text.contains("502"), "got {text}");
    assert_eq!(conversation.state(), TurnState::Failed);
    assert!(!conversation.is_sending());

    let reply = conversation.transcript().await.pop().unwrap();
    assert_eq!(reply.content, text);
    assert!(!reply.streaming);
}

#[tokio::test]
async fn mid_stream_error_event_fails_the_turn() {
    let error = serde_json::json!({"error": {"message": "rate limited"}}).to_string();
    let (_mock, server) = start(Script::raw(vec![delta_chunk("par"), error], StreamEnd::Done)).await;
    let conversation = conversation(&server);

    let outcome = conversation.submit("Hi", Vec::new(), &CancellationToken::new()).await;

    assert_eq!(outcome, TurnOutcome::Failed(format!("{FAILURE_PREFIX} rate limited")));
}

#[tokio::test]
async fn concurrent_submit_is_ignored_and_cancel_keeps_partial() {
    let (mock, server) = start(Script::raw(vec![delta_chunk("  Partial answer ")], StreamEnd::Stall)).await;
    let conversation = conversation(&server);
    let cancel = CancellationToken::new();

    let first = conversation.submit("Long question", Vec::new(), &cancel);
    let second = async {
        wait_for_partial(&conversation).await;

        assert!(conversation.is_sending());
        let ignored = conversation.submit("Another", Vec::new(), &CancellationToken::new()).await;
        cancel.cancel();
        ignored
    };

    let (first, second) = tokio::join!(first, second);

    assert_eq!(second, TurnOutcome::Ignored);
    assert_eq!(first, TurnOutcome::Cancelled);
    assert_eq!(conversation.state(), TurnState::Cancelled);
    assert!(!conversation.is_sending());
    assert_eq!(mock.request_count(), 1);

    let transcript = conversation.transcript().await;
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[1].content, "Partial answer");
    assert!(!transcript[1].streaming);
    assert!(transcript[1].finish_reason.is_none());
}

#[tokio::test]
async fn dropped_submit_leaves_no_streaming_turn() {
    let (_mock, server) = start(Script::raw(vec![delta_chunk("  Partial answer ")], StreamEnd::Stall)).await;
    let conversation = conversation(&server);

    let cancel = CancellationToken::new();
    let dropped = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::select! {
            outcome = conversation.submit("Long question", Vec::new(), &cancel) => Some(outcome),
            () = wait_for_partial(&conversation) => None,
        }
    })
    .await
    .unwrap();

    assert!(dropped.is_none());
    assert_eq!(conversation.state(), TurnState::Cancelled);
    assert!(!conversation.is_sending());

    let transcript = conversation.transcript().await;
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[1].content, "Partial answer");
    assert!(!transcript[1].streaming);
    assert!(transcript[1].finish_reason.is_none());
}

#[tokio::test]
async fn timed_out_submit_can_be_followed_by_another() {
    let (mock, server) = start(Script::raw(vec![delta_chunk("slow")], StreamEnd::Stall)).await;
    let conversation = conversation(&server);

    let timed_out = tokio::time::timeout(
        Duration::from_millis(500),
        conversation.submit("Hi", Vec::new(), &CancellationToken::new()),
    )
    .await;
    assert!(timed_out.is_err());
    assert!(!conversation.is_sending());
    assert!(conversation.transcript().await.iter().all(|turn| !turn.streaming));

    let retry = tokio::time::timeout(
        Duration::from_millis(500),
        conversation.submit("Again", Vec::new(), &CancellationToken::new()),
    )
    .await;
    assert!(retry.is_err());
    assert_eq!(mock.request_count(), 2);
    assert_eq!(conversation.transcript().await.len(), 4);
}

#[tokio::test]
async fn terminal_state_is_published_after_the_turn_is_released() {
    let (_mock, server) = start(Script::deltas(&["He", "llo"])).await;
    let conversation = conversation(&server);
    let mut state = conversation.subscribe();

    let cancel = CancellationToken::new();
    let (outcome, released) = tokio::join!(
        conversation.submit("Hello", Vec::new(), &cancel),
        async {
            state.wait_for(|s| *s == TurnState::Finalized).await.unwrap();
            let released = !conversation.is_sending();
            released
        }
    );

    assert_eq!(outcome, TurnOutcome::Finalized);
    assert!(released);

    let followup = conversation.submit("Again", Vec::new(), &CancellationToken::new()).await;
    assert_eq!(followup, TurnOutcome::Finalized);
    assert_eq!(conversation.transcript().await.len(), 4);
}

#[tokio::test]
async fn malformed_relay_line_fails_the_turn() {
    let relay = StubRelay::start(
        "{\"type\":\"reasoning_delta\",\"reasoning_content\":\"r\"}\n{\"type\":\"delta\",\"content\":\"a\"}\n{oops\n",
    )
    .await
    .unwrap();
    let conversation = Conversation::new(relay.relay_client(), Arc::new(MemoryStore::default()));

    let outcome = conversation.submit("Hi", Vec::new(), &CancellationToken::new()).await;

    let TurnOutcome::Failed(text) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(text.starts_with(FAILURE_PREFIX), "got {text}");
    assert!(text.contains("unable to parse chat stream chunk"), "got {text}");
    assert_eq!(conversation.state(), TurnState::Failed);
    assert!(!conversation.is_sending());

    let reply = conversation.transcript().await.pop().unwrap();
    assert_eq!(reply.content, text);
    assert!(reply.reasoning_content.is_none());
    assert!(!reply.streaming);
}

#[tokio::test]
async fn attachments_are_inlined_into_the_user_message() {
    let (mock, server) = start(Script::deltas(&["Summary"])).await;
    let conversation = conversation(&server);

    let notes = Attachment::text("notes.txt", "alpha beta");
    conversation
        .submit("Summarize", vec![notes.clone()], &CancellationToken::new())
        .await;

    let sent = mock.last_request().unwrap();
    assert_eq!(sent["messages"][1]["content"], "Summarize\n\n[File: notes.txt]\nalpha beta");

    let transcript = conversation.transcript().await;
    assert_eq!(transcript[0].attachments, vec![notes]);
}

#[tokio::test]
async fn greeting_uses_provider_info() {
    let (_mock, server) = start(Script::deltas(&["unused"])).await;
    let client = server.relay_client();

    let info = client.provider_info().await.unwrap();
    let conversation = Conversation::new(client, Arc::new(MemoryStore::default())).with_greeting(&info);

    let transcript = conversation.transcript().await;
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].role, Role::Assistant);
    assert!(transcript[0].content.contains("Mock Provider"));
    assert!(transcript[0].content.contains("127.0.0.1"));
}

#[tokio::test]
async fn saved_settings_drive_the_request() {
    let (mock, server) = start(Script::deltas(&["ok"])).await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path().join("settings.json")));
    store
        .save(&ChatSettings {
            reasoning_effort: ReasoningEffort::Low,
            model: Some("custom-model".to_owned()),
        })
        .unwrap();

    let conversation = Conversation::new(server.relay_client(), store);
    conversation.set_reasoning_effort(ReasoningEffort::High).unwrap();
    conversation.submit("Hi", Vec::new(), &CancellationToken::new()).await;

    let sent = mock.last_request().unwrap();
    assert_eq!(sent["reasoning_effort"], "high");
    assert_eq!(sent["model"], "custom-model");

    let reopened = JsonFileStore::new(dir.path().join("settings.json"));
    assert_eq!(reopened.load().unwrap().reasoning_effort, ReasoningEffort::High);
}

#[tokio::test]
async fn collect_chat_and_plain_chat() {
    let (_mock, server) = start(Script::deltas(&["He", "llo"])).await;
    let client = server.relay_client();
    let request = ChatRequest::new(vec![ChatMessage::user("Hello")]);

    let reply = client.collect_chat(&request).await.unwrap();
    assert_eq!(reply.message, "Hello");
    assert_eq!(reply.finish_reason.as_deref(), Some("stop"));

    let response = client.chat(&request).await.unwrap();
    assert_eq!(response.message, harness::mock_upstream::COMPLETION_TEXT);
}

#[tokio::test]
async fn relay_rejection_surfaces_as_api_error() {
    let server = TestServer::start(&ConfigBuilder::new().build()).await.unwrap();
    let client = server.relay_client();

    let err = client
        .collect_chat(&ChatRequest::new(vec![ChatMessage::user("Hello")]))
        .await
        .unwrap_err();

    match err {
        RelayClientError::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "relay.provider.base_url is not configured");
        }
        other => panic!("expected api error, got {other:?}"),
    }
}
