//! Status command for showing the task store and its last upload.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use chrono::SecondsFormat;

use sp_core::RecordSink;
use sp_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &Database, database_path: &Path) -> Result<()> {
    writeln!(writer, "SkillPulse status")?;
    writeln!(writer, "Database: {}", database_path.display())?;
    writeln!(writer, "Id style: {}", db.id_style())?;
    writeln!(writer, "Tasks: {}", db.count_tasks()?)?;

    match db.upload_state()? {
        Some(state) => {
            writeln!(
                writer,
                "Last upload: {} ({} tasks, fingerprint {})",
                state
                    .uploaded_at
                    .to_rfc3339_opts(SecondsFormat::Secs, true),
                state.task_count,
                state.fingerprint.short()
            )?;
        }
        None => writeln!(writer, "No uploads recorded.")?,
    }

    Ok(())
}
