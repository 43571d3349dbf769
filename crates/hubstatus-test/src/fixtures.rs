//! Frame and configuration fixtures.

use std::time::Duration;

use serde_json::{Value, json};

use hubstatus_gateway::GatewayConfig;

/// Credential used throughout the tests.
pub const TEST_TOKEN: &str = "tok123";

/// Activity label used throughout the tests.
pub const HUBS_LABEL: &str = "Hubs by Mozilla";

/// Endpoint the test config points at.
pub const TEST_GATEWAY_URL: &str = "wss://gateway.test/?v=6&encoding=json";

/// Client config pointing at [`TEST_GATEWAY_URL`] with the default
/// 500 ms retry delay.
#[must_use]
pub fn test_gateway_config() -> GatewayConfig {
    GatewayConfig {
        url: TEST_GATEWAY_URL.to_string(),
        retry_delay: Duration::from_millis(500),
        ..GatewayConfig::default()
    }
}

/// Hello (`op=10`).
#[must_use]
pub fn hello_frame(heartbeat_interval_ms: u64) -> Value {
    json!({"op": 10, "d": {"heartbeat_interval": heartbeat_interval_ms}})
}

/// Heartbeat request (`op=1`).
#[must_use]
pub fn heartbeat_request_frame() -> Value {
    json!({"op": 1, "d": null})
}

/// Dispatch (`op=0`) carrying sequence number `seq`.
#[must_use]
pub fn dispatch_frame(seq: u64, event: &str) -> Value {
    json!({"op": 0, "d": {}, "s": seq, "t": event})
}

/// The `game` object the default profile produces for `name`.
#[must_use]
pub fn expected_activity(name: &str) -> Value {
    json!({
        "name": name,
        "details": "hubs.mozilla.com",
        "application_id": "509129921826914304",
        "assets": {"large_image": "568373390222688257"},
        "type": 0
    })
}

/// The presence descriptor the default profile produces for `status`.
#[must_use]
pub fn expected_presence(status: Option<&str>) -> Value {
    json!({
        "game": status.map(expected_activity),
        "status": "online",
        "since": null,
        "afk": false
    })
}
