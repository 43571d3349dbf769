//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Longest accepted retry delay (one minute).
const MAX_RETRY_DELAY_MS: u64 = 60_000;

/// Validate a fully merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_gateway(config)?;
    validate_activity(config)?;
    validate_credential(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_gateway(config: &Config) -> ConfigResult<()> {
    let g = &config.gateway;

    let parsed = url::Url::parse(&g.url)
        .map_err(|e| invalid("gateway.url", format!("'{}' is not a valid URL: {e}", g.url)))?;
    if !matches!(parsed.scheme(), "ws" | "wss") {
        return Err(invalid(
            "gateway.url",
            format!("scheme '{}' is not supported; expected ws or wss", parsed.scheme()),
        ));
    }

    if g.retry_delay_ms == 0 || g.retry_delay_ms > MAX_RETRY_DELAY_MS {
        return Err(invalid(
            "gateway.retry_delay_ms",
            format!("retry_delay_ms must be between 1 and {MAX_RETRY_DELAY_MS}"),
        ));
    }

    Ok(())
}

fn validate_activity(config: &Config) -> ConfigResult<()> {
    let a = &config.activity;

    if a.label.trim().is_empty() {
        return Err(invalid("activity.label", "label must not be empty"));
    }

    if a.tracked_hosts.is_empty() {
        return Err(invalid(
            "activity.tracked_hosts",
            "at least one tracked host is required",
        ));
    }

    if let Some(blank) = a.tracked_hosts.iter().position(|h| h.trim().is_empty()) {
        return Err(invalid(
            "activity.tracked_hosts",
            format!("entry {blank} is empty"),
        ));
    }

    Ok(())
}

fn validate_credential(config: &Config) -> ConfigResult<()> {
    if config.credential.refresh_interval_secs == 0 {
        return Err(invalid(
            "credential.refresh_interval_secs",
            "refresh_interval_secs must be at least 1",
        ));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;

    if !matches!(
        l.level.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        return Err(invalid(
            "logging.level",
            format!(
                "unknown level '{}'; expected one of: trace, debug, info, warn, error",
                l.level
            ),
        ));
    }

    if !matches!(
        l.format.to_ascii_lowercase().as_str(),
        "pretty" | "compact" | "json" | "full"
    ) {
        return Err(invalid(
            "logging.format",
            format!(
                "unknown format '{}'; expected one of: pretty, compact, json, full",
                l.format
            ),
        ));
    }

    Ok(())
}
