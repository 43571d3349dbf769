//! `hubstatus config`.

use anyhow::{Context, Result};
use hubstatus_config::{ResolvedConfig, ShowFormat};

/// Print the resolved configuration to stdout.
pub(crate) fn show(resolved: &ResolvedConfig, section: Option<&str>, json: bool) -> Result<()> {
    let format = if json {
        ShowFormat::Json
    } else {
        ShowFormat::Toml
    };

    let output = resolved.show(format, section).with_context(|| match section {
        Some(name) => format!("failed to render config section '{name}'"),
        None => "failed to render config".to_owned(),
    })?;

    println!("{output}");
    Ok(())
}
