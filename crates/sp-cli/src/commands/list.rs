//! List command for printing stored tasks.

use std::io::Write;

use anyhow::Result;
use serde::Serialize;

use sp_db::{Database, TaskRow};

use crate::commands::util::readable_timestamp;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskJson<'a> {
    id: &'a str,
    description: &'a str,
    start_time: &'a str,
    end_time: &'a str,
    uploaded_at: &'a str,
}

impl<'a> From<&'a TaskRow> for TaskJson<'a> {
    fn from(task: &'a TaskRow) -> Self {
        Self {
            id: &task.id,
            description: &task.description,
            start_time: &task.start_time,
            end_time: &task.end_time,
            uploaded_at: &task.uploaded_at,
        }
    }
}

pub fn run<W: Write>(writer: &mut W, db: &Database, json: bool) -> Result<()> {
    let tasks = db.list_tasks()?;

    if json {
        for task in &tasks {
            writeln!(writer, "{}", serde_json::to_string(&TaskJson::from(task))?)?;
        }
        return Ok(());
    }

    if tasks.is_empty() {
        writeln!(writer, "No tasks stored.")?;
        return Ok(());
    }

    for task in &tasks {
        writeln!(
            writer,
            "{}: {} ({} → {})",
            task.id,
            task.description,
            readable_timestamp(&task.start_time),
            readable_timestamp(&task.end_time)
        )?;
    }

    Ok(())
}
