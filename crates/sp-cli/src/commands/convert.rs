//! Convert command: daily log in, record lines out.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use sp_core::NormalizedRecord;

use crate::Config;
use crate::commands::util::{decode, normalize_log, read_input};

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Daily log to read. Reads stdin when omitted.
    pub input: Option<PathBuf>,

    /// Write records here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output JSON Lines instead of `ID;DESCRIPTION;TIMESTAMP`.
    #[arg(long)]
    pub json: bool,

    /// Fail if any line is dropped.
    #[arg(long)]
    pub strict: bool,
}

/// Runs the convert command, returning the number of records written.
///
/// Records go to `--output` when set, otherwise to `writer`.
pub fn run<W: Write>(writer: &mut W, args: &ConvertArgs, config: &Config) -> Result<usize> {
    let bytes = read_input(args.input.as_deref())?;
    let text = decode(&bytes)?;
    let run = normalize_log(text, &config.normalize_options(args.strict))?;
    let rendered = render(&run.records, args.json)?;

    match &args.output {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => writer.write_all(rendered.as_bytes())?,
    }

    tracing::info!(
        records = run.records.len(),
        dropped = run.diagnostics.len(),
        "conversion complete"
    );
    Ok(run.records.len())
}

fn render(records: &[NormalizedRecord], json: bool) -> Result<String> {
    let mut out = String::new();
    for record in records {
        if json {
            out.push_str(&serde_json::to_string(record).context("failed to encode record")?);
        } else {
            out.push_str(&record.to_line());
        }
        out.push('\n');
    }
    Ok(out)
}
