//! Bridge from `hubstatus_config::Config` to gateway and telemetry types.

use std::time::Duration;

use hubstatus_config::Config;
use hubstatus_gateway::{ClientProperties, GatewayConfig, PresenceProfile, TrackedHosts};
use hubstatus_telemetry::{LogConfig, LogFormat};

/// Convert config to [`GatewayConfig`].
pub(crate) fn to_gateway_config(cfg: &Config) -> GatewayConfig {
    let defaults = ClientProperties::default();
    GatewayConfig {
        url: cfg.gateway.url.clone(),
        retry_delay: Duration::from_millis(cfg.gateway.retry_delay_ms),
        properties: ClientProperties {
            os: cfg.identify.os.clone().unwrap_or(defaults.os),
            browser: cfg.identify.browser.clone(),
            device: cfg.identify.device.clone(),
        },
        profile: PresenceProfile {
            details: cfg.activity.details.clone(),
            application_id: cfg.activity.application_id.clone(),
            large_image: cfg.activity.large_image.clone(),
            kind: cfg.activity.kind,
        },
    }
}

/// Convert config to [`LogConfig`].
pub(crate) fn to_log_config(cfg: &Config) -> LogConfig {
    let format = cfg
        .logging
        .format
        .parse::<LogFormat>()
        .unwrap_or_default();
    LogConfig::new(cfg.logging.level.to_ascii_lowercase()).with_format(format)
}

/// Build the tracked host set from `[activity]`.
pub(crate) fn to_tracked_hosts(cfg: &Config) -> TrackedHosts {
    TrackedHosts::new(
        cfg.activity.label.clone(),
        cfg.activity.tracked_hosts.clone(),
    )
}
