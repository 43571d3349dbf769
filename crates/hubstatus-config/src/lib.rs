#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Layered configuration for hubstatus.
//!
//! # Usage
//!
//! ```rust,no_run
//! use hubstatus_config::Config;
//!
//! let resolved = Config::load(None).unwrap();
//! println!("gateway: {}", resolved.config.gateway.url);
//! ```
//!
//! # Precedence
//!
//! From highest to lowest:
//!
//! 1. **Explicit file** (`hubstatus run --config <path>`)
//! 2. **User** (`~/.config/hubstatus/config.toml` on Linux)
//! 3. **Environment variables** (`HUBSTATUS_*`), fallback only
//! 4. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! This crate has no dependencies on other hubstatus crates. Conversion
//! into gateway and telemetry types happens in the CLI.

/// Environment variable fallbacks.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Layered merging with source tracking.
pub mod merge;
/// Resolved configuration display.
pub mod show;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use merge::ConfigLayer;
pub use show::{ResolvedConfig, ShowFormat};
pub use types::*;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// See [`loader::load`] for the algorithm.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the
    /// final configuration fails validation.
    pub fn load(explicit: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(explicit, None)
    }

    /// Load configuration, looking for the user file in `config_dir`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the
    /// final configuration fails validation.
    pub fn load_with_config_dir(
        explicit: Option<&std::path::Path>,
        config_dir: &std::path::Path,
    ) -> ConfigResult<ResolvedConfig> {
        loader::load(explicit, Some(config_dir))
    }
}
