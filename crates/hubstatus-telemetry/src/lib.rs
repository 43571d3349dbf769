//! Hubstatus Telemetry - logging setup for the hubstatus client.
//!
//! Wraps `tracing-subscriber` so binaries configure logging from one
//! [`LogConfig`]: level and per-target directives, output format, and
//! destination (stdout, stderr or a rolling file).
//!
//! # Example
//!
//! ```rust,no_run
//! use hubstatus_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), hubstatus_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("hubstatus_gateway=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("Logging ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
