//! Integration test: send-then-poll delivery over a scripted relay service.

mod common;

use common::ScriptedRelay;
use hitl_core::channel::RemoteRelayChannel;
use hitl_core::models::{Answer, InputType, Outcome, Prompt, PromptKind, Request};
use hitl_core::providers::InboundMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const RESPONDER: &str = "42";

fn channel(relay: &Arc<ScriptedRelay>) -> RemoteRelayChannel {
    RemoteRelayChannel::new(
        Arc::clone(relay) as Arc<dyn hitl_core::providers::RelayService>,
        RESPONDER,
        Duration::from_secs(25),
        Duration::from_millis(500),
    )
}

fn ask(text: &str, timeout_secs: u64) -> Request {
    Request::new(Prompt::text("Question", text), Duration::from_secs(timeout_secs))
}

#[tokio::test(start_paused = true)]
async fn test_reply_from_responder_is_accepted_and_others_ignored() {
    let relay = Arc::new(ScriptedRelay::new().with_batch(vec![
        InboundMessage::new(1, "99", "ignore me"),
        InboundMessage::new(2, RESPONDER, "blue"),
    ]));
    let channel = channel(&relay);

    let outcome = channel
        .deliver(&ask("Favourite colour?", 60), CancellationToken::new())
        .await;

    assert_eq!(outcome, Outcome::fulfilled(Answer::Text("blue".into())));
    assert_eq!(relay.sent().len(), 1);
    assert_eq!(relay.sent()[0].0, RESPONDER);
    assert!(relay.sent()[0].1.contains("Favourite colour?"));
    assert_eq!(channel.cursor().await, Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_cursor_advances_past_whole_batch() {
    let relay = Arc::new(ScriptedRelay::new().with_batch(vec![
        InboundMessage::new(5, "7", "a"),
        InboundMessage::new(6, RESPONDER, "yes"),
        InboundMessage::new(7, "8", "b"),
        InboundMessage::new(8, RESPONDER, "no, wait"),
    ]));
    let channel = channel(&relay);

    let request = Request::new(Prompt::confirmation("Deploy", "Ship it?"), Duration::from_secs(60));
    let outcome = channel.deliver(&request, CancellationToken::new()).await;

    assert_eq!(outcome, Outcome::fulfilled(Answer::Confirmed(true)));
    assert_eq!(channel.cursor().await, Some(8));
}

#[tokio::test(start_paused = true)]
async fn test_times_out_at_deadline_without_messages() {
    let relay = Arc::new(ScriptedRelay::new());
    let channel = channel(&relay);

    let started = Instant::now();
    let outcome = channel
        .deliver(&ask("Anyone there?", 5), CancellationToken::new())
        .await;
    let elapsed = started.elapsed();

    assert_eq!(outcome, Outcome::TimedOut);
    assert!(elapsed >= Duration::from_secs(5), "resolved early: {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(6), "resolved late: {:?}", elapsed);
    assert_eq!(relay.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_messages_until_deadline_still_advance_cursor() {
    let relay = Arc::new(
        ScriptedRelay::new()
            .with_batch(vec![InboundMessage::new(10, "99", "hello")])
            .with_batch(vec![InboundMessage::new(11, "100", "me too")]),
    );
    let channel = channel(&relay);

    let outcome = channel
        .deliver(&ask("Anyone there?", 30), CancellationToken::new())
        .await;

    assert_eq!(outcome, Outcome::TimedOut);
    assert_eq!(channel.cursor().await, Some(11));
    assert_eq!(relay.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_poll_stops_fetching() {
    let cancel = CancellationToken::new();
    let relay = Arc::new(
        ScriptedRelay::new().with_batch(vec![InboundMessage::new(1, "99", "noise")]),
    );
    let channel = channel(&relay);

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        canceller.cancel();
    });
    let started = Instant::now();
    let outcome = channel.deliver(&ask("Still there?", 600), cancel).await;

    assert_eq!(outcome, Outcome::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(11));
    // The second fetch was in flight when the signal fired
    assert_eq!(relay.fetches().len(), 2);

    tokio::time::advance(Duration::from_secs(120)).await;
    assert_eq!(relay.fetches().len(), 2);
    assert_eq!(channel.cursor().await, Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_reply_read_after_cancellation_is_dropped() {
    let cancel = CancellationToken::new();
    let relay = Arc::new(
        ScriptedRelay::new()
            .with_batch(vec![InboundMessage::new(3, RESPONDER, "too late")])
            .cancel_after_fetch(1, cancel.clone()),
    );
    let channel = channel(&relay);

    let outcome = channel.deliver(&ask("Name?", 60), cancel).await;

    assert_eq!(outcome, Outcome::Cancelled);
    // Consumed, so a later request never sees it
    assert_eq!(channel.cursor().await, Some(3));
}

#[tokio::test(start_paused = true)]
async fn test_stale_backlog_is_skipped() {
    let relay = Arc::new(
        ScriptedRelay::new()
            .with_latest(10)
            .with_batch(vec![
                InboundMessage::new(9, RESPONDER, "answer to an old question"),
                InboundMessage::new(10, RESPONDER, "another old one"),
                InboundMessage::new(11, RESPONDER, "fresh"),
            ]),
    );
    let channel = channel(&relay);

    let outcome = channel
        .deliver(&ask("New question", 60), CancellationToken::new())
        .await;

    assert_eq!(outcome, Outcome::fulfilled(Answer::Text("fresh".into())));
    assert_eq!(relay.fetches()[0], Some(10));
}

#[tokio::test(start_paused = true)]
async fn test_replayed_batch_is_not_accepted_twice() {
    let relay = Arc::new(
        ScriptedRelay::new().with_batch(vec![InboundMessage::new(3, RESPONDER, "first")]),
    );
    let channel = channel(&relay);

    let first = channel
        .deliver(&ask("One?", 60), CancellationToken::new())
        .await;
    assert_eq!(first, Outcome::fulfilled(Answer::Text("first".into())));

    // At-least-once delivery hands the same update back
    relay.push_batch(vec![InboundMessage::new(3, RESPONDER, "first")]);
    relay.push_batch(vec![InboundMessage::new(4, RESPONDER, "second")]);
    let second = channel
        .deliver(&ask("Two?", 60), CancellationToken::new())
        .await;

    assert_eq!(second, Outcome::fulfilled(Answer::Text("second".into())));
    assert_eq!(relay.sent().len(), 2);
    assert_eq!(channel.cursor().await, Some(4));
}

#[tokio::test(start_paused = true)]
async fn test_send_failure_is_unavailable_without_polling() {
    let relay = Arc::new(ScriptedRelay::new().failing_send());
    let channel = channel(&relay);

    let outcome = channel
        .deliver(&ask("Hello?", 60), CancellationToken::new())
        .await;

    assert!(matches!(outcome, Outcome::ChannelUnavailable { .. }));
    assert!(relay.fetches().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_seed_failure_is_unavailable_without_sending() {
    let relay = Arc::new(ScriptedRelay::new().with_seed_failure());
    let channel = channel(&relay);

    let outcome = channel
        .deliver(&ask("Hello?", 60), CancellationToken::new())
        .await;

    assert!(matches!(outcome, Outcome::ChannelUnavailable { .. }));
    assert!(relay.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_transient_fetch_error_is_retried() {
    let relay = Arc::new(
        ScriptedRelay::new()
            .with_fetch_error()
            .with_batch(vec![InboundMessage::new(1, RESPONDER, " 7 ")]),
    );
    let channel = channel(&relay);
    let request = Request::new(
        Prompt::new(
            "Workers",
            "How many?",
            PromptKind::Text {
                default_value: None,
                input_type: InputType::Integer,
            },
        ),
        Duration::from_secs(60),
    );

    let outcome = channel.deliver(&request, CancellationToken::new()).await;

    assert_eq!(outcome, Outcome::fulfilled(Answer::Integer(7)));
    assert_eq!(relay.fetches().len(), 2);
    assert_eq!(relay.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_info_prompt_is_acknowledged_after_send() {
    let relay = Arc::new(ScriptedRelay::new());
    let channel = channel(&relay);
    let request = Request::new(Prompt::info("Build", "All green"), Duration::from_secs(60));

    let outcome = channel.deliver(&request, CancellationToken::new()).await;

    assert_eq!(outcome, Outcome::fulfilled(Answer::Acknowledged));
    assert_eq!(relay.sent().len(), 1);
    assert!(relay.fetches().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_non_text_message_from_responder_is_skipped() {
    let relay = Arc::new(ScriptedRelay::new().with_batch(vec![
        InboundMessage {
            sequence: 1,
            sender: Some(RESPONDER.to_string()),
            text: None,
        },
        InboundMessage {
            sequence: 2,
            sender: None,
            text: None,
        },
        InboundMessage::new(3, RESPONDER, "typed answer"),
    ]));
    let channel = channel(&relay);

    let outcome = channel
        .deliver(&ask("Name?", 60), CancellationToken::new())
        .await;

    assert_eq!(outcome, Outcome::fulfilled(Answer::Text("typed answer".into())));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_are_served_one_at_a_time() {
    let relay = Arc::new(
        ScriptedRelay::new()
            .with_batch(vec![InboundMessage::new(1, RESPONDER, "for the first")])
            .with_batch(vec![InboundMessage::new(2, RESPONDER, "for the second")]),
    );
    let channel = Arc::new(channel(&relay));

    let first = {
        let channel = Arc::clone(&channel);
        tokio::spawn(async move {
            channel
                .deliver(&ask("First?", 60), CancellationToken::new())
                .await
        })
    };
    tokio::task::yield_now().await;
    let second = channel
        .deliver(&ask("Second?", 60), CancellationToken::new())
        .await;
    let first = first.await.unwrap();

    assert_eq!(first, Outcome::fulfilled(Answer::Text("for the first".into())));
    assert_eq!(second, Outcome::fulfilled(Answer::Text("for the second".into())));
    assert_eq!(relay.fetches(), vec![None, Some(1)]);
}
