//! Delete command. Irreversible, so it requires `--yes`.

use std::io::Write;

use anyhow::Result;

use sp_db::Database;

/// Deletes every stored task, returning how many were removed.
pub fn run<W: Write>(writer: &mut W, db: &mut Database, confirmed: bool) -> Result<usize> {
    if !confirmed {
        anyhow::bail!("refusing to delete all tasks without --yes");
    }

    let deleted = db.delete_all_tasks()?;
    if deleted > 0 {
        writeln!(writer, "Deleted {deleted} tasks.")?;
    } else {
        writeln!(writer, "No tasks found to delete.")?;
    }
    Ok(deleted)
}
