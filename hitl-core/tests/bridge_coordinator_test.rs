//! Integration test: channel selection, deadline, cancellation and fallback in the coordinator.

mod common;

use common::{MockSurface, ScriptedRelay};
use hitl_core::channel::{ChannelKind, LocalDialogChannel, RemoteRelayChannel};
use hitl_core::models::{Answer, Outcome, Prompt, RequestValidationError};
use hitl_core::providers::{DialogOutcome, InboundMessage, RelayService};
use hitl_core::BridgeCoordinator;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const HOUR: Duration = Duration::from_secs(3600);

fn remote(relay: &Arc<ScriptedRelay>) -> RemoteRelayChannel {
    RemoteRelayChannel::new(
        Arc::clone(relay) as Arc<dyn RelayService>,
        "42",
        Duration::from_secs(25),
        Duration::from_secs(2),
    )
}

fn local(surface: MockSurface) -> LocalDialogChannel {
    LocalDialogChannel::new(Arc::new(surface))
}

#[tokio::test(start_paused = true)]
async fn test_no_remote_identity_selects_dialog() {
    let surface = MockSurface::replying(DialogOutcome::Submitted("yes".into()));
    let presented = surface.presented();
    let bridge = BridgeCoordinator::new(None, Some(local(surface)), HOUR);

    let resolution = bridge
        .request(
            Prompt::confirmation("Deploy", "Proceed?"),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(resolution.channel, Some(ChannelKind::LocalDialog));
    assert_eq!(resolution.outcome, Outcome::fulfilled(Answer::Confirmed(true)));
    assert_eq!(presented.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reachable_remote_is_preferred() {
    let relay = Arc::new(
        ScriptedRelay::new().with_batch(vec![
            InboundMessage::new(1, "99", "ignore me"),
            InboundMessage::new(2, "42", "2"),
        ]),
    );
    let surface = MockSurface::replying(DialogOutcome::Dismissed);
    let presented = surface.presented();
    let bridge = BridgeCoordinator::new(Some(remote(&relay)), Some(local(surface)), HOUR);

    let resolution = bridge
        .request(
            Prompt::choice("Colour", "Pick one", vec!["red".into(), "blue".into()], false),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(resolution.channel, Some(ChannelKind::RemoteRelay));
    assert_eq!(
        resolution.outcome,
        Outcome::fulfilled(Answer::Choices(vec!["blue".into()]))
    );
    assert_eq!(relay.sent().len(), 1);
    assert_eq!(presented.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_remote_selects_dialog_without_sending() {
    let relay = Arc::new(ScriptedRelay::new().unreachable());
    let surface = MockSurface::replying(DialogOutcome::Submitted("ok".into()));
    let bridge = BridgeCoordinator::new(Some(remote(&relay)), Some(local(surface)), HOUR);

    let resolution = bridge
        .request(Prompt::text("t", "Name?"), None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(resolution.channel, Some(ChannelKind::LocalDialog));
    assert!(relay.sent().is_empty());
    assert_eq!(relay.probes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_send_failure_without_fallback_is_unavailable() {
    let relay = Arc::new(ScriptedRelay::new().failing_send());
    let surface = MockSurface::replying(DialogOutcome::Submitted("ok".into()));
    let presented = surface.presented();
    let bridge = BridgeCoordinator::new(Some(remote(&relay)), Some(local(surface)), HOUR);

    let resolution = bridge
        .request(Prompt::text("t", "Name?"), None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(resolution.channel, Some(ChannelKind::RemoteRelay));
    assert!(matches!(
        resolution.outcome,
        Outcome::ChannelUnavailable { .. }
    ));
    assert_eq!(presented.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_send_failure_with_fallback_uses_dialog() {
    let relay = Arc::new(ScriptedRelay::new().failing_send());
    let surface = MockSurface::replying(DialogOutcome::Submitted("Ada".into()));
    let bridge = BridgeCoordinator::new(Some(remote(&relay)), Some(local(surface)), HOUR)
        .with_fallback_to_dialog(true);

    let resolution = bridge
        .request(Prompt::text("t", "Name?"), None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(resolution.channel, Some(ChannelKind::LocalDialog));
    assert_eq!(resolution.outcome, Outcome::fulfilled(Answer::Text("Ada".into())));
}

#[tokio::test(start_paused = true)]
async fn test_headless_dialog_is_unavailable() {
    let bridge = BridgeCoordinator::new(None, Some(local(MockSurface::headless())), HOUR);

    let resolution = bridge
        .request(Prompt::text("t", "Name?"), None, &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(
        resolution.outcome,
        Outcome::ChannelUnavailable { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_no_channel_configured_is_unavailable() {
    let bridge = BridgeCoordinator::new(None, None, HOUR);

    let resolution = bridge
        .request(Prompt::info("t", "hello"), None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(resolution.channel, None);
    assert!(matches!(
        resolution.outcome,
        Outcome::ChannelUnavailable { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_dialog_deadline_closes_modal() {
    let surface = MockSurface::silent();
    let closed = surface.closed();
    let bridge = BridgeCoordinator::new(None, Some(local(surface)), HOUR);

    let started = Instant::now();
    let resolution = bridge
        .request(
            Prompt::text("t", "Name?"),
            Some(Duration::from_secs(2)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(resolution.outcome, Outcome::TimedOut);
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_default_timeout_applies_without_override() {
    let relay = Arc::new(ScriptedRelay::new());
    let bridge = BridgeCoordinator::new(Some(remote(&relay)), None, Duration::from_secs(90));

    let started = Instant::now();
    let resolution = bridge
        .request(Prompt::text("t", "Name?"), None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(resolution.outcome, Outcome::TimedOut);
    assert!(started.elapsed() >= Duration::from_secs(90));
    assert!(started.elapsed() < Duration::from_secs(91));
}

#[tokio::test(start_paused = true)]
async fn test_caller_cancellation_is_distinct_from_timeout() {
    let surface = MockSurface::silent();
    let closed = surface.closed();
    let bridge = BridgeCoordinator::new(None, Some(local(surface)), HOUR);
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });
    let resolution = bridge
        .request(Prompt::text("t", "Name?"), None, &cancel)
        .await
        .unwrap();

    assert_eq!(resolution.outcome, Outcome::Cancelled);
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_requests_are_rejected_before_delivery() {
    let surface = MockSurface::replying(DialogOutcome::Acknowledged);
    let presented = surface.presented();
    let bridge = BridgeCoordinator::new(None, Some(local(surface)), HOUR);
    let cancel = CancellationToken::new();

    let empty = bridge.request(Prompt::text("t", "  "), None, &cancel).await;
    assert_eq!(empty.unwrap_err(), RequestValidationError::EmptyPrompt);

    let zero = bridge
        .request(Prompt::text("t", "Name?"), Some(Duration::ZERO), &cancel)
        .await;
    assert_eq!(zero.unwrap_err(), RequestValidationError::NonPositiveTimeout);

    let no_choices = bridge
        .request(Prompt::choice("t", "Pick", vec![], false), None, &cancel)
        .await;
    assert_eq!(no_choices.unwrap_err(), RequestValidationError::NoChoices);

    assert_eq!(presented.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_oversized_timeout_is_rejected_not_a_panic() {
    let surface = MockSurface::replying(DialogOutcome::Acknowledged);
    let presented = surface.presented();
    let bridge = BridgeCoordinator::new(None, Some(local(surface)), HOUR);
    let cancel = CancellationToken::new();

    let huge = bridge
        .request(
            Prompt::text("t", "color?"),
            Some(Duration::from_secs(i64::MAX as u64)),
            &cancel,
        )
        .await;
    assert_eq!(huge.unwrap_err(), RequestValidationError::TimeoutTooLong);
    assert_eq!(presented.load(Ordering::SeqCst), 0);

    // An oversized default is capped rather than rejected
    let bridge = BridgeCoordinator::new(
        None,
        Some(local(MockSurface::replying(DialogOutcome::Acknowledged))),
        Duration::from_secs(u64::MAX),
    );
    let resolution = bridge
        .request(Prompt::info("t", "Done"), None, &cancel)
        .await
        .unwrap();
    assert_eq!(resolution.outcome, Outcome::fulfilled(Answer::Acknowledged));
}

#[tokio::test(start_paused = true)]
async fn test_health_probe_sends_nothing_and_keeps_cursor() {
    let relay = Arc::new(ScriptedRelay::new().with_latest(77));
    let bridge = BridgeCoordinator::new(
        Some(remote(&relay)),
        Some(local(MockSurface::headless())),
        HOUR,
    );

    let report = bridge.health().await;

    assert!(report.is_healthy());
    assert!(report.remote_configured);
    assert!(report.remote_reachable);
    assert_eq!(report.bot_username.as_deref(), Some("hitl_test_bot"));
    assert!(!report.dialog_available);
    assert_eq!(report.default_timeout_seconds, 3600);
    assert!(relay.sent().is_empty());
    assert!(relay.fetches().is_empty());
    assert_eq!(bridge.remote().unwrap().cursor().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_health_degraded_when_nothing_reachable() {
    let relay = Arc::new(ScriptedRelay::new().unreachable());
    let bridge = BridgeCoordinator::new(
        Some(remote(&relay)),
        Some(local(MockSurface::headless())),
        HOUR,
    );

    let report = bridge.health().await;

    assert_eq!(report.status, "degraded");
    assert!(!report.remote_reachable);
    assert_eq!(report.dialog_tool.as_deref(), Some("mock"));
}
