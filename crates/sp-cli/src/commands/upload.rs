//! Upload command: sync a daily log into the task store.
//!
//! The raw input is fingerprinted before parsing, so an unchanged file costs a
//! single read of the upload state.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;

use sp_core::{Fingerprint, NormalizedRecord, SyncOutcome, sync_records};
use sp_db::Database;

use crate::Config;
use crate::commands::util::{decode, normalize_log, read_input};

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Input file. Reads stdin when omitted.
    pub input: Option<PathBuf>,

    /// Input is already converted `ID;DESCRIPTION;TIMESTAMP` lines.
    #[arg(long)]
    pub records: bool,

    /// Upload even if the input is unchanged.
    #[arg(long)]
    pub force: bool,

    /// Fail if any log line is dropped.
    #[arg(long)]
    pub strict: bool,
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    args: &UploadArgs,
    config: &Config,
) -> Result<SyncOutcome> {
    let bytes = read_input(args.input.as_deref())?;
    let fingerprint = Fingerprint::of(&bytes);
    tracing::debug!(fingerprint = %fingerprint.short(), "fingerprinted input");

    let text = decode(&bytes)?;
    let records = if args.records {
        parse_records(text)?
    } else {
        normalize_log(text, &config.normalize_options(args.strict))?.records
    };

    let outcome = sync_records(db, &records, &fingerprint, Utc::now(), args.force)
        .context("failed to upload tasks")?;

    match &outcome {
        SyncOutcome::Skipped { fingerprint } => {
            writeln!(
                writer,
                "Input unchanged since last upload ({}). Skipping upload.",
                fingerprint.short()
            )?;
        }
        SyncOutcome::Uploaded {
            reason,
            written,
            inserted,
        } => {
            writeln!(
                writer,
                "Uploaded {written} tasks ({inserted} new, {reason})."
            )?;
        }
    }

    Ok(outcome)
}

fn parse_records(text: &str) -> Result<Vec<NormalizedRecord>> {
    let mut records = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = line
            .parse::<NormalizedRecord>()
            .with_context(|| format!("invalid record on line {}", idx + 1))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    use sp_core::UploadReason;

    const LOG: &str = "01/11/2025\n+ Sleep    23h50\n+ Wake     0h10\n";

    fn upload(db: &mut Database, path: PathBuf, records: bool, force: bool) -> (SyncOutcome, String) {
        let args = UploadArgs {
            input: Some(path),
            records,
            force,
            strict: false,
        };
        let mut output = Vec::new();
        let outcome = run(&mut output, db, &args, &Config::default()).unwrap();
        (outcome, String::from_utf8(output).unwrap())
    }

    #[test]
    fn upload_then_skip_unchanged() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("input.txt");
        std::fs::write(&path, LOG).unwrap();
        let mut db = Database::open_in_memory().unwrap();

        let (outcome, output) = upload(&mut db, path.clone(), false, false);
        assert_eq!(
            outcome,
            SyncOutcome::Uploaded {
                reason: UploadReason::EmptySink,
                written: 2,
                inserted: 2,
            }
        );
        assert_eq!(output, "Uploaded 2 tasks (2 new, store is empty).\n");

        let (outcome, output) = upload(&mut db, path, false, false);
        assert!(matches!(outcome, SyncOutcome::Skipped { .. }));
        let short = Fingerprint::of(LOG.as_bytes()).short().to_string();
        assert_eq!(
            output,
            format!("Input unchanged since last upload ({short}). Skipping upload.\n")
        );
    }

    #[test]
    fn upload_converted_records() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("tasks.txt");
        std::fs::write(
            &path,
            "20251101_1;Sleep;2025-11-01T23:50:00-03:00\n\n20251101_2;Wake;2025-11-02T00:10:00-03:00\n",
        )
        .unwrap();
        let mut db = Database::open_in_memory().unwrap();

        upload(&mut db, path, true, false);

        let tasks = db.list_tasks().unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, "20251101001");
        assert_eq!(tasks[0].end_time, "2025-11-02T00:10:00-03:00");
    }

    #[test]
    fn parse_records_reports_line_number() {
        let err = parse_records("20251101_1;Sleep;2025-11-01T23:50:00-03:00\nbroken\n").unwrap_err();
        assert_eq!(err.to_string(), "invalid record on line 2");
    }

    #[test]
    fn forced_upload_rewrites() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("input.txt");
        std::fs::write(&path, LOG).unwrap();
        let mut db = Database::open_in_memory().unwrap();
        upload(&mut db, path.clone(), false, false);

        let (outcome, output) = upload(&mut db, path, false, true);

        assert!(matches!(
            outcome,
            SyncOutcome::Uploaded {
                reason: UploadReason::Forced,
                inserted: 0,
                ..
            }
        ));
        assert_eq!(output, "Uploaded 2 tasks (0 new, forced).\n");
    }
}
