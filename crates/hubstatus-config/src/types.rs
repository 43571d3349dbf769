//! Configuration struct definitions.
//!
//! Every section derives `Default` with the same values as the embedded
//! `defaults.toml`, so a partially written file deserializes cleanly.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gateway endpoint and retry timing.
    pub gateway: GatewaySection,
    /// Client identification sent with Identify.
    pub identify: IdentifySection,
    /// What is advertised and when.
    pub activity: ActivitySection,
    /// Where the token comes from.
    pub credential: CredentialSection,
    /// Log level and format.
    pub logging: LoggingSection,
}

/// `[gateway]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    /// Gateway URL (`ws://` or `wss://`).
    pub url: String,
    /// Delay before a request made mid-transition is re-evaluated.
    pub retry_delay_ms: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            url: "wss://gateway.discord.gg/?v=6&encoding=json".to_owned(),
            retry_delay_ms: 500,
        }
    }
}

/// `[identify]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifySection {
    /// Operating system reported to the gateway. Defaults to the host OS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    /// Browser name reported to the gateway.
    pub browser: String,
    /// Device name reported to the gateway.
    pub device: String,
}

impl Default for IdentifySection {
    fn default() -> Self {
        Self {
            os: None,
            browser: "Firefox".to_owned(),
            device: "hubs-discord-status".to_owned(),
        }
    }
}

/// `[activity]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivitySection {
    /// Activity name shown while a tracked host is open.
    pub label: String,
    /// Secondary line under the activity name.
    pub details: String,
    /// Application the activity is attributed to.
    pub application_id: String,
    /// Large image asset reference.
    pub large_image: String,
    /// Activity type (0 = playing).
    pub kind: u8,
    /// Hosts that count as doing the activity.
    pub tracked_hosts: Vec<String>,
}

impl Default for ActivitySection {
    fn default() -> Self {
        Self {
            label: "Hubs by Mozilla".to_owned(),
            details: "hubs.mozilla.com".to_owned(),
            application_id: "509129921826914304".to_owned(),
            large_image: "568373390222688257".to_owned(),
            kind: 0,
            tracked_hosts: vec!["hubs.mozilla.com".to_owned()],
        }
    }
}

/// `[credential]`
///
/// The token is never serialized and is redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialSection {
    /// Token given inline. Takes precedence over `token_file`.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// File holding the token, re-read periodically.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
    /// How often `token_file` is re-read.
    pub refresh_interval_secs: u64,
}

impl Default for CredentialSection {
    fn default() -> Self {
        Self {
            token: None,
            token_file: None,
            refresh_interval_secs: 900,
        }
    }
}

impl fmt::Debug for CredentialSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSection")
            .field("has_token", &self.token.is_some())
            .field("token_file", &self.token_file)
            .field("refresh_interval_secs", &self.refresh_interval_secs)
            .finish()
    }
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Level filter: trace, debug, info, warn or error.
    pub level: String,
    /// Output format: pretty, compact, json or full.
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_debug_redacts_token() {
        let section = CredentialSection {
            token: Some("mfa.secret-token".to_owned()),
            ..CredentialSection::default()
        };
        let debug_str = format!("{section:?}");
        assert!(!debug_str.contains("mfa.secret-token"));
        assert!(debug_str.contains("has_token: true"));
    }

    #[test]
    fn credential_serialize_omits_token() {
        let mut config = Config::default();
        config.credential.token = Some("mfa.secret-token".to_owned());

        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("mfa.secret-token"));
        assert!(!rendered.contains("token ="));
    }

    #[test]
    fn partial_section_fills_defaults() {
        let config: Config = toml::from_str("[activity]\nlabel = \"Spoke\"\n").unwrap();
        assert_eq!(config.activity.label, "Spoke");
        assert_eq!(config.activity.tracked_hosts, vec!["hubs.mozilla.com"]);
        assert_eq!(config.gateway, GatewaySection::default());
    }
}
