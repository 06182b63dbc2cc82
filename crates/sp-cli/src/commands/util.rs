//! Shared utilities for CLI commands.

use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::DateTime;

use sp_core::{NormalizeError, NormalizeOptions, Normalization, normalize};

/// Reads the whole input from `path`, or from stdin when no path is given.
pub fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
        }
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .lock()
                .read_to_end(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

/// Decodes input bytes as UTF-8.
pub fn decode(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).context("input is not valid UTF-8")
}

/// Normalizes a log, listing every rejected line when strict mode fails.
pub fn normalize_log(text: &str, options: &NormalizeOptions) -> Result<Normalization> {
    match normalize(text, options) {
        Ok(run) => Ok(run),
        Err(NormalizeError::Rejected { diagnostics }) => {
            let details: Vec<String> = diagnostics.iter().map(ToString::to_string).collect();
            anyhow::bail!(
                "strict mode rejected {} line(s):\n  {}",
                diagnostics.len(),
                details.join("\n  ")
            )
        }
        Err(err) => Err(err).context("failed to normalize log"),
    }
}

/// Renders an RFC 3339 timestamp as `YYYY-MM-DD HH:MM`, or returns it unchanged.
pub fn readable_timestamp(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp).map_or_else(
        |_| timestamp.to_string(),
        |dt| dt.format("%Y-%m-%d %H:%M").to_string(),
    )
}
