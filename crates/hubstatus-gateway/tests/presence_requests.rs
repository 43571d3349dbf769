//! Presence request handling against a scripted gateway.

use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;

use hubstatus_gateway::ConnectionState;
use hubstatus_test::{
    Captured, HUBS_LABEL, TEST_GATEWAY_URL, TEST_TOKEN, TestHarness, expected_presence,
    init_test_tracing, settle,
};

fn token() -> Option<String> {
    Some(TEST_TOKEN.to_string())
}

// ── Idempotence ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn absent_status_before_any_send_is_a_noop() {
    init_test_tracing();
    let harness = TestHarness::start(token());

    harness.request(None);
    settle().await;

    assert_eq!(harness.gateway.open_count(), 0);
    assert_eq!(harness.handle.state(), ConnectionState::Closed);
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn repeating_transmitted_status_sends_nothing() {
    init_test_tracing();
    let mut harness = TestHarness::start(token());

    harness.request(Some(HUBS_LABEL));
    let mut peer = harness.gateway.accept().await;
    let identify = peer.next_frame().await;
    assert_eq!(identify["op"], 2);

    harness.request(Some(HUBS_LABEL));
    harness.request(Some(HUBS_LABEL));
    settle().await;

    assert!(peer.drain().is_empty());
    assert_eq!(harness.gateway.open_count(), 1);
    harness.stop().await;
}

// ── Credential ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn missing_credential_never_touches_the_network() {
    init_test_tracing();
    let harness = TestHarness::start(None::<String>);

    harness.request(Some(HUBS_LABEL));
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(harness.gateway.open_count(), 0);
    assert_eq!(harness.handle.state(), ConnectionState::Closed);
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn request_succeeds_once_credential_appears() {
    init_test_tracing();
    let (token_tx, token_rx) = watch::channel(None);
    let mut harness = TestHarness::start(token_rx);

    harness.request(Some(HUBS_LABEL));
    settle().await;
    assert_eq!(harness.gateway.open_count(), 0);

    token_tx.send_replace(token());
    harness.request(Some(HUBS_LABEL));

    let mut peer = harness.gateway.accept().await;
    let identify = peer.next_frame().await;
    assert_eq!(identify["d"]["token"], TEST_TOKEN);
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn credential_lost_before_open_closes_without_identify() {
    init_test_tracing();
    let (token_tx, token_rx) = watch::channel(token());
    let mut harness = TestHarness::start(token_rx);
    let release = harness.gateway.hold_next();

    harness.request(Some(HUBS_LABEL));
    settle().await;
    assert_eq!(harness.handle.state(), ConnectionState::Connecting);

    token_tx.send_replace(None);
    release.send(()).unwrap();

    let mut peer = harness.gateway.accept().await;
    assert_eq!(
        peer.next_captured().await,
        Captured::Close {
            code: 1000,
            reason: "credential unavailable".into()
        }
    );
    settle().await;
    assert_eq!(harness.handle.state(), ConnectionState::Closing);

    peer.close(1000, "").await;
    settle().await;
    assert_eq!(harness.handle.state(), ConnectionState::Closed);
    harness.stop().await;
}

// ── Connect And Identify ─────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn first_request_connects_and_identifies() {
    init_test_tracing();
    let mut harness = TestHarness::start(token());

    harness.request(Some(HUBS_LABEL));
    let mut peer = harness.gateway.accept().await;
    let identify = peer.next_frame().await;

    assert_eq!(harness.gateway.urls(), vec![TEST_GATEWAY_URL.to_string()]);
    assert_eq!(identify["op"], 2);
    assert!(identify.get("s").is_none());
    let d = &identify["d"];
    assert_eq!(d["token"], TEST_TOKEN);
    assert_eq!(d["compress"], false);
    assert_eq!(d["large_threshold"], 50);
    assert_eq!(d["properties"]["$browser"], "Firefox");
    assert_eq!(d["properties"]["$device"], "hubs-discord-status");
    assert_eq!(d["presence"], expected_presence(Some(HUBS_LABEL)));
    assert_eq!(harness.handle.state(), ConnectionState::Open);
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn open_connection_sends_presence_update() {
    init_test_tracing();
    let mut harness = TestHarness::start(token());

    harness.request(Some(HUBS_LABEL));
    let mut peer = harness.gateway.accept().await;
    peer.next_frame().await;

    harness.request(Some("Spoke"));
    let update = peer.next_frame().await;
    assert_eq!(
        update,
        json!({"op": 3, "d": expected_presence(Some("Spoke"))})
    );
    assert_eq!(harness.gateway.open_count(), 1);
    harness.stop().await;
}

// ── Retry While In Transition ────────────────────────────────

#[tokio::test(start_paused = true)]
async fn requests_during_connect_collapse_into_latest() {
    init_test_tracing();
    let mut harness = TestHarness::start(token());
    let release = harness.gateway.hold_next();

    harness.request(Some("A"));
    harness.request(Some("B"));
    harness.request(Some("C"));
    settle().await;
    assert_eq!(harness.handle.state(), ConnectionState::Connecting);
    assert_eq!(harness.gateway.open_count(), 1);

    release.send(()).unwrap();
    let mut peer = harness.gateway.accept().await;
    let identify = peer.next_frame().await;
    assert_eq!(identify["d"]["presence"]["game"]["name"], "A");

    // Only the retry for the latest request survives.
    let update = peer.next_frame().await;
    assert_eq!(update["op"], 3);
    assert_eq!(update["d"]["game"]["name"], "C");

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(peer.drain().is_empty());
    assert_eq!(harness.gateway.open_count(), 1);
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn retry_waits_for_the_configured_delay() {
    init_test_tracing();
    let mut harness = TestHarness::start(token());
    let release = harness.gateway.hold_next();

    harness.request(Some("A"));
    settle().await;
    harness.request(Some("B"));
    settle().await;

    release.send(()).unwrap();
    let mut peer = harness.gateway.accept().await;
    peer.next_frame().await;

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(peer.drain().is_empty(), "Retry fired early");

    tokio::time::sleep(Duration::from_millis(200)).await;
    let frames = peer.drain_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["d"]["game"]["name"], "B");
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn retry_that_finds_status_transmitted_is_dropped() {
    init_test_tracing();
    let mut harness = TestHarness::start(token());
    let release = harness.gateway.hold_next();

    harness.request(Some("A"));
    settle().await;
    // Retry scheduled for A while connecting; Identify already carries A.
    harness.request(Some("A"));
    settle().await;

    release.send(()).unwrap();
    let mut peer = harness.gateway.accept().await;
    peer.next_frame().await;

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(peer.drain().is_empty());
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn request_while_closing_reconnects_after_close() {
    init_test_tracing();
    let mut harness = TestHarness::start(token());

    harness.request(Some("A"));
    let mut first = harness.gateway.accept().await;
    first.next_frame().await;

    harness.handle.disconnect().unwrap();
    assert_eq!(
        first.next_captured().await,
        Captured::Close {
            code: 1000,
            reason: String::new()
        }
    );
    assert_eq!(harness.handle.state(), ConnectionState::Closing);

    harness.request(Some("B"));
    settle().await;
    assert_eq!(harness.gateway.open_count(), 1);

    first.close(1000, "").await;
    let mut second = harness.gateway.accept().await;
    let identify = second.next_frame().await;
    assert_eq!(identify["op"], 2);
    assert_eq!(identify["d"]["presence"]["game"]["name"], "B");
    assert_eq!(harness.gateway.open_count(), 2);
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn ignored_request_cancels_pending_retry() {
    init_test_tracing();
    let mut harness = TestHarness::start(token());

    harness.request(Some("A"));
    let mut first = harness.gateway.accept().await;
    first.next_frame().await;

    harness.handle.disconnect().unwrap();
    assert_eq!(
        first.next_captured().await,
        Captured::Close {
            code: 1000,
            reason: String::new()
        }
    );

    // B is deferred; A is already on the wire and supersedes it.
    harness.request(Some("B"));
    settle().await;
    harness.request(Some("A"));
    settle().await;

    first.close(1000, "").await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(harness.gateway.open_count(), 1);
    assert!(harness.gateway.try_accept().is_none());
    assert_eq!(harness.handle.state(), ConnectionState::Closed);
    harness.stop().await;
}

// ── Scenario ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn hubs_session_from_idle_to_cleared() {
    init_test_tracing();
    let mut harness = TestHarness::start(token());

    // Nothing desired: no connection.
    harness.request(None);
    settle().await;
    assert_eq!(harness.gateway.open_count(), 0);

    // Activity starts: connect and identify with it.
    harness.request(Some(HUBS_LABEL));
    let mut peer = harness.gateway.accept().await;
    let identify = peer.next_frame().await;
    assert_eq!(identify["d"]["token"], "tok123");
    assert_eq!(identify["d"]["presence"]["game"]["name"], "Hubs by Mozilla");

    // Hello starts the heartbeat.
    peer.hello(41_250).await;
    settle().await;
    assert!(peer.drain().is_empty());

    // Activity ends while open: exactly one update with no game.
    harness.request(None);
    let update = peer.next_frame().await;
    assert_eq!(update, json!({"op": 3, "d": expected_presence(None)}));
    assert_eq!(update["d"]["status"], "online");
    settle().await;
    assert!(peer.drain().is_empty());

    // First heartbeat one full interval after Hello.
    tokio::time::sleep(Duration::from_millis(41_240)).await;
    assert!(peer.drain().is_empty());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(peer.drain_frames(), vec![json!({"op": 1, "d": null})]);
    harness.stop().await;
}
