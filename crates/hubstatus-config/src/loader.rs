//! Config file discovery and layered loading.
//!
//! `load()` runs these steps in order:
//! 1. Parse the embedded `defaults.toml`
//! 2. Merge the user file (`<config dir>/hubstatus/config.toml`)
//! 3. Merge the file given with `--config`, which must exist
//! 4. Apply `HUBSTATUS_*` env fallbacks
//! 5. Deserialize and validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_all_leaves};
use crate::show::ResolvedConfig;
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
pub(crate) const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Name of the config file inside the config directory.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Load the configuration with layered file precedence.
///
/// `explicit` is a file named on the command line; unlike the user file
/// it must exist. `config_dir_override` replaces the platform config
/// directory when looking for the user file.
///
/// # Errors
///
/// Returns a [`ConfigError`] if a config file is unreadable or malformed,
/// or if the merged configuration fails validation.
pub fn load(
    explicit: Option<&Path>,
    config_dir_override: Option<&Path>,
) -> ConfigResult<ResolvedConfig> {
    let config_dir = match config_dir_override {
        Some(dir) => dir.to_path_buf(),
        None => user_config_dir()?,
    };
    load_with_env(explicit, &config_dir, &collect_env_vars())
}

/// [`load`] with a fixed config directory and environment.
pub(crate) fn load_with_env(
    explicit: Option<&Path>,
    config_dir: &Path,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<ResolvedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_all_leaves(&merged, "", &ConfigLayer::Defaults, &mut field_sources);

    let user_path = config_dir.join(CONFIG_FILE_NAME);
    if let Some(overlay) = try_load_file(&user_path)? {
        deep_merge_tracking(
            &mut merged,
            &overlay,
            "",
            &ConfigLayer::User,
            &mut field_sources,
        );
        loaded_files.push(user_path.display().to_string());
        info!(path = %user_path.display(), "loaded user config");
    }

    if let Some(path) = explicit {
        let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
        })?;
        deep_merge_tracking(
            &mut merged,
            &overlay,
            "",
            &ConfigLayer::Explicit,
            &mut field_sources,
        );
        loaded_files.push(path.display().to_string());
        info!(path = %path.display(), "loaded config file");
    }

    let env_count = apply_env_fallbacks(&mut merged, &mut field_sources, env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// The platform config directory for hubstatus.
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDir`] if no home directory can be found.
pub fn user_config_dir() -> ConfigResult<PathBuf> {
    directories::ProjectDirs::from("", "", "hubstatus")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}

/// Read and parse a file, returning `None` if it does not exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len(),
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn defaults_deserialize_to_default_config() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_without_files_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = load_with_env(None, dir.path(), &no_env()).unwrap();

        assert_eq!(resolved.config, Config::default());
        assert!(resolved.loaded_files.is_empty());
        assert_eq!(
            resolved.field_sources.get("gateway.url"),
            Some(&ConfigLayer::Defaults)
        );
    }

    #[test]
    fn explicit_file_overrides_user_file() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            CONFIG_FILE_NAME,
            "[activity]\nlabel = \"User\"\ndetails = \"user details\"\n",
        );
        let explicit = write(dir.path(), "other.toml", "[activity]\nlabel = \"Explicit\"\n");

        let resolved = load_with_env(Some(&explicit), dir.path(), &no_env()).unwrap();

        assert_eq!(resolved.config.activity.label, "Explicit");
        assert_eq!(resolved.config.activity.details, "user details");
        assert_eq!(resolved.loaded_files.len(), 2);
        assert_eq!(
            resolved.field_sources.get("activity.label"),
            Some(&ConfigLayer::Explicit)
        );
        assert_eq!(
            resolved.field_sources.get("activity.details"),
            Some(&ConfigLayer::User)
        );
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");

        let err = load_with_env(Some(&missing), dir.path(), &no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn env_fills_token_but_not_file_values() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            CONFIG_FILE_NAME,
            "[gateway]\nurl = \"wss://file.test/\"\n",
        );
        let env: HashMap<String, String> = [
            ("HUBSTATUS_TOKEN", "tok123"),
            ("HUBSTATUS_GATEWAY_URL", "wss://env.test/"),
            ("HUBSTATUS_LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();

        let resolved = load_with_env(None, dir.path(), &env).unwrap();

        assert_eq!(resolved.config.credential.token.as_deref(), Some("tok123"));
        assert_eq!(resolved.config.gateway.url, "wss://file.test/");
        assert_eq!(resolved.config.logging.level, "debug");
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), CONFIG_FILE_NAME, "[gateway\nurl = ");

        match load_with_env(None, dir.path(), &no_env()).unwrap_err() {
            ConfigError::ParseError { path: reported, .. } => {
                assert_eq!(reported, path.display().to_string());
            },
            other => panic!("expected ParseError, got {other:?}"),
        }
    }

    #[test]
    fn invalid_merged_value_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), CONFIG_FILE_NAME, "[gateway]\nretry_delay_ms = 0\n");

        let err = load_with_env(None, dir.path(), &no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { ref field, .. } if field == "gateway.retry_delay_ms"));
    }

    #[test]
    fn oversized_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let padding = "#".repeat(1_048_577);
        write(dir.path(), CONFIG_FILE_NAME, &padding);

        let err = load_with_env(None, dir.path(), &no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }
}
