//! Layered TOML merging with per-field source tracking.

use std::collections::HashMap;
use std::fmt;

/// Where a configuration value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLayer {
    /// Compiled-in defaults (`defaults.toml`).
    Defaults,
    /// User-level configuration (`~/.config/hubstatus/config.toml`).
    User,
    /// File passed explicitly on the command line.
    Explicit,
    /// Environment variable fallback.
    Environment,
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defaults => write!(f, "defaults"),
            Self::User => write!(f, "user config"),
            Self::Explicit => write!(f, "--config"),
            Self::Environment => write!(f, "environment variable"),
        }
    }
}

/// Dotted field path to the layer that last set it.
pub type FieldSources = HashMap<String, ConfigLayer>;

/// Deep-merge `overlay` into `base`, recording which layer set each leaf.
///
/// Tables merge per key; scalars and arrays from the overlay replace the
/// base value.
pub fn deep_merge_tracking(
    base: &mut toml::Value,
    overlay: &toml::Value,
    prefix: &str,
    layer: &ConfigLayer,
    sources: &mut FieldSources,
) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let path = join_path(prefix, key);
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge_tracking(base_val, overlay_val, &path, layer, sources);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                    record_all_leaves(overlay_val, &path, layer, sources);
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
            record_all_leaves(overlay, prefix, layer, sources);
        },
    }
}

/// Mark every leaf under `val` as set by `layer`.
pub fn record_all_leaves(
    val: &toml::Value,
    prefix: &str,
    layer: &ConfigLayer,
    sources: &mut FieldSources,
) {
    if let toml::Value::Table(table) = val {
        for (key, child) in table {
            record_all_leaves(child, &join_path(prefix, key), layer, sources);
        }
    } else {
        sources.insert(prefix.to_owned(), layer.clone());
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> toml::Value {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn overlay_replaces_scalars_and_keeps_siblings() {
        let mut base = parse("[gateway]\nurl = \"wss://a\"\nretry_delay_ms = 500\n");
        let overlay = parse("[gateway]\nurl = \"wss://b\"\n");
        let mut sources = FieldSources::new();
        record_all_leaves(&base, "", &ConfigLayer::Defaults, &mut sources);

        deep_merge_tracking(&mut base, &overlay, "", &ConfigLayer::User, &mut sources);

        assert_eq!(base["gateway"]["url"].as_str(), Some("wss://b"));
        assert_eq!(base["gateway"]["retry_delay_ms"].as_integer(), Some(500));
        assert_eq!(sources.get("gateway.url"), Some(&ConfigLayer::User));
        assert_eq!(
            sources.get("gateway.retry_delay_ms"),
            Some(&ConfigLayer::Defaults)
        );
    }

    #[test]
    fn arrays_are_replaced_whole() {
        let mut base = parse("[activity]\ntracked_hosts = [\"a\", \"b\"]\n");
        let overlay = parse("[activity]\ntracked_hosts = [\"c\"]\n");
        let mut sources = FieldSources::new();

        deep_merge_tracking(&mut base, &overlay, "", &ConfigLayer::Explicit, &mut sources);

        let hosts = base["activity"]["tracked_hosts"].as_array().unwrap();
        assert_eq!(hosts.len(), 1);
        assert_eq!(
            sources.get("activity.tracked_hosts"),
            Some(&ConfigLayer::Explicit)
        );
    }

    #[test]
    fn new_sections_are_recorded() {
        let mut base = parse("[gateway]\nurl = \"wss://a\"\n");
        let overlay = parse("[credential]\ntoken_file = \"/tmp/t\"\n");
        let mut sources = FieldSources::new();

        deep_merge_tracking(&mut base, &overlay, "", &ConfigLayer::User, &mut sources);

        assert_eq!(base["credential"]["token_file"].as_str(), Some("/tmp/t"));
        assert_eq!(
            sources.get("credential.token_file"),
            Some(&ConfigLayer::User)
        );
    }
}
