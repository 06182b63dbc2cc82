//! Storage layer for SkillPulse.
//!
//! Provides a [`RecordSink`] backed by `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization.
//!
//! # Schema
//!
//! ## Identifiers
//!
//! The `tasks.id` column holds the record id rendered in the database's
//! [`IdStyle`]. Padded ids (`20251101001`) sort lexicographically within a day;
//! plain ids (`20251101_1`) match the converter output. A database should be
//! written in a single style.
//!
//! ## Timestamp Format
//!
//! `start_time` and `end_time` are RFC 3339 with the log's offset
//! (e.g., `2025-11-01T06:45:00-03:00`). `uploaded_at` is RFC 3339 in UTC.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Statement, params};
use thiserror::Error;

use sp_core::{
    Fingerprint, IdStyle, RecordId, RecordSink, TaskSpan, UploadState, format_timestamp,
};

/// Name of the single upload state row.
const UPLOAD_STATE_NAME: &str = "tasks_upload";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp in {column}: {timestamp}")]
    TimestampParse {
        column: &'static str,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// The upload state row holds values that cannot be decoded.
    #[error("invalid upload state: {message}")]
    InvalidUploadState { message: String },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
    id_style: IdStyle,
}

/// A stored task as read back from the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub id: String,
    pub description: String,
    pub start_time: String,
    pub end_time: String,
    pub uploaded_at: String,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn,
            id_style: IdStyle::default(),
        };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn,
            id_style: IdStyle::default(),
        };
        db.init()?;
        Ok(db)
    }

    /// Sets how record ids are spelled in the `tasks` table.
    #[must_use]
    pub fn with_id_style(mut self, id_style: IdStyle) -> Self {
        self.id_style = id_style;
        self
    }

    pub const fn id_style(&self) -> IdStyle {
        self.id_style
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- Tasks table: one row per normalized log entry
            -- start_time/end_time: RFC 3339 with the log's UTC offset
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                description TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                uploaded_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_start ON tasks(start_time);

            -- Upload state: fingerprint of the last uploaded input
            CREATE TABLE IF NOT EXISTS upload_state (
                name TEXT PRIMARY KEY,
                fingerprint TEXT NOT NULL,
                uploaded_at TEXT NOT NULL,
                task_count INTEGER NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Lists stored tasks ordered by start time then ID.
    pub fn list_tasks(&self) -> Result<Vec<TaskRow>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, description, start_time, end_time, uploaded_at
            FROM tasks
            ORDER BY start_time ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(TaskRow {
                id: row.get(0)?,
                description: row.get(1)?,
                start_time: row.get(2)?,
                end_time: row.get(3)?,
                uploaded_at: row.get(4)?,
            })
        })?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?);
        }
        Ok(tasks)
    }

    /// Counts stored tasks.
    pub fn count_tasks(&self) -> Result<usize, DbError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?;
        usize::try_from(count).map_err(|_| DbError::InvalidUploadState {
            message: format!("negative task count {count}"),
        })
    }

    /// Deletes every stored task, returning how many were removed.
    ///
    /// The upload state is kept; an empty table forces the next upload anyway.
    pub fn delete_all_tasks(&mut self) -> Result<usize, DbError> {
        let deleted = self.conn.execute("DELETE FROM tasks", [])?;
        tracing::info!(deleted, "deleted tasks");
        Ok(deleted)
    }
}

impl RecordSink for Database {
    type Error = DbError;

    fn put(&mut self, span: &TaskSpan, uploaded_at: DateTime<Utc>) -> Result<(), DbError> {
        let id_style = self.id_style;
        let mut stmt = self.conn.prepare(UPSERT_TASK_SQL)?;
        upsert_task(&mut stmt, id_style, span, uploaded_at)
    }

    fn exists(&self, id: &RecordId) -> Result<bool, DbError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tasks WHERE id = ?)",
            [id.render(self.id_style)],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn is_empty(&self) -> Result<bool, DbError> {
        let any: bool =
            self.conn
                .query_row("SELECT EXISTS(SELECT 1 FROM tasks)", [], |row| row.get(0))?;
        Ok(!any)
    }

    fn upload_state(&self) -> Result<Option<UploadState>, DbError> {
        let row: Option<(String, String, i64)> = self
            .conn
            .query_row(
                "SELECT fingerprint, uploaded_at, task_count FROM upload_state WHERE name = ?",
                [UPLOAD_STATE_NAME],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let Some((fingerprint, uploaded_at, task_count)) = row else {
            return Ok(None);
        };

        let fingerprint =
            Fingerprint::new(fingerprint).map_err(|err| DbError::InvalidUploadState {
                message: err.to_string(),
            })?;
        let uploaded_at = DateTime::parse_from_rfc3339(&uploaded_at)
            .map_err(|source| DbError::TimestampParse {
                column: "upload_state.uploaded_at",
                timestamp: uploaded_at.clone(),
                source,
            })?
            .with_timezone(&Utc);
        let task_count =
            usize::try_from(task_count).map_err(|_| DbError::InvalidUploadState {
                message: format!("negative task count {task_count}"),
            })?;

        Ok(Some(UploadState {
            fingerprint,
            uploaded_at,
            task_count,
        }))
    }

    fn store_upload_state(&mut self, state: &UploadState) -> Result<(), DbError> {
        upsert_upload_state(&self.conn, state)
    }

    /// Writes every span and the upload state in a single transaction.
    fn put_all(&mut self, spans: &[TaskSpan], state: &UploadState) -> Result<(), DbError> {
        let id_style = self.id_style;
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(UPSERT_TASK_SQL)?;
            for span in spans {
                upsert_task(&mut stmt, id_style, span, state.uploaded_at)?;
            }
        }
        upsert_upload_state(&tx, state)?;
        tx.commit()?;
        Ok(())
    }
}

const UPSERT_TASK_SQL: &str = "
    INSERT INTO tasks (id, description, start_time, end_time, uploaded_at)
    VALUES (?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        description = excluded.description,
        start_time = excluded.start_time,
        end_time = excluded.end_time,
        uploaded_at = excluded.uploaded_at
";

fn upsert_task(
    stmt: &mut Statement<'_>,
    id_style: IdStyle,
    span: &TaskSpan,
    uploaded_at: DateTime<Utc>,
) -> Result<(), DbError> {
    stmt.execute(params![
        span.id.render(id_style),
        span.description,
        format_timestamp(&span.start),
        format_timestamp(&span.end),
        format_utc(uploaded_at),
    ])?;
    Ok(())
}

fn upsert_upload_state(conn: &Connection, state: &UploadState) -> Result<(), DbError> {
    let task_count = i64::try_from(state.task_count).map_err(|_| DbError::InvalidUploadState {
        message: format!("task count {} out of range", state.task_count),
    })?;
    conn.execute(
        "
        INSERT INTO upload_state (name, fingerprint, uploaded_at, task_count)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(name) DO UPDATE SET
            fingerprint = excluded.fingerprint,
            uploaded_at = excluded.uploaded_at,
            task_count = excluded.task_count
        ",
        params![
            UPLOAD_STATE_NAME,
            state.fingerprint.as_str(),
            format_utc(state.uploaded_at),
            task_count,
        ],
    )?;
    Ok(())
}

fn format_utc(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use sp_core::{NormalizeOptions, NormalizedRecord, SyncOutcome, normalize, sync_records};

    const LOG: &str = "01/11/2025\n+ Sleep 23h50\n+ Wake 0h10\n";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 2, 12, 0, 0).unwrap()
    }

    fn span(line: &str, end: &str) -> TaskSpan {
        let record: NormalizedRecord = line.parse().unwrap();
        TaskSpan {
            id: record.id,
            description: record.description,
            start: record.timestamp,
            end: sp_core::parse_timestamp(end).unwrap(),
        }
    }

    fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .expect("prepare table_info");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query table_info");
        rows.map(|row| row.expect("table_info row")).collect()
    }

    #[test]
    fn open_in_memory_database() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn schema_matches_data_model() {
        let db = Database::open_in_memory().expect("open in-memory db");

        assert_eq!(
            table_columns(&db.conn, "tasks"),
            vec!["id", "description", "start_time", "end_time", "uploaded_at"]
        );
        assert_eq!(
            table_columns(&db.conn, "upload_state"),
            vec!["name", "fingerprint", "uploaded_at", "task_count"]
        );
    }

    #[test]
    fn put_is_an_upsert() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let first = span(
            "20251101_1;Acordar;2025-11-01T06:45:00-03:00",
            "2025-11-01T06:45:00-03:00",
        );
        let edited = span(
            "20251101_1;Acordar cedo;2025-11-01T06:40:00-03:00",
            "2025-11-01T07:00:00-03:00",
        );

        db.put(&first, now()).unwrap();
        db.put(&edited, now()).unwrap();

        let tasks = db.list_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(
            tasks[0],
            TaskRow {
                id: "20251101001".to_string(),
                description: "Acordar cedo".to_string(),
                start_time: "2025-11-01T06:40:00-03:00".to_string(),
                end_time: "2025-11-01T07:00:00-03:00".to_string(),
                uploaded_at: "2025-11-02T12:00:00Z".to_string(),
            }
        );
    }

    #[test]
    fn exists_follows_id_style() {
        let mut db = Database::open_in_memory()
            .unwrap()
            .with_id_style(IdStyle::Plain);
        let stored = span(
            "20251101_2;Wake;2025-11-02T00:10:00-03:00",
            "2025-11-02T00:10:00-03:00",
        );
        assert!(db.is_empty().unwrap());

        db.put(&stored, now()).unwrap();

        assert!(!db.is_empty().unwrap());
        assert!(db.exists(&stored.id).unwrap());
        assert!(!db.exists(&"20251101_1".parse().unwrap()).unwrap());
        assert_eq!(db.list_tasks().unwrap()[0].id, "20251101_2");
    }

    #[test]
    fn upload_state_roundtrip() {
        let mut db = Database::open_in_memory().unwrap();
        assert_eq!(db.upload_state().unwrap(), None);

        let state = UploadState {
            fingerprint: Fingerprint::of(LOG.as_bytes()),
            uploaded_at: now(),
            task_count: 2,
        };
        db.store_upload_state(&state).unwrap();
        assert_eq!(db.upload_state().unwrap(), Some(state.clone()));

        let replaced = UploadState {
            task_count: 5,
            ..state
        };
        db.store_upload_state(&replaced).unwrap();
        assert_eq!(db.upload_state().unwrap(), Some(replaced));
    }

    #[test]
    fn corrupt_upload_state_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .execute(
                "INSERT INTO upload_state (name, fingerprint, uploaded_at, task_count) VALUES (?, ?, ?, ?)",
                params![UPLOAD_STATE_NAME, "abc", "yesterday", 1],
            )
            .unwrap();

        assert!(matches!(
            db.upload_state(),
            Err(DbError::TimestampParse { .. })
        ));
    }

    #[test]
    fn delete_all_tasks_empties_the_table() {
        let mut db = Database::open_in_memory().unwrap();
        let records = normalize(LOG, &NormalizeOptions::default()).unwrap().records;
        let fingerprint = Fingerprint::of(LOG.as_bytes());
        sync_records(&mut db, &records, &fingerprint, now(), false).unwrap();
        assert_eq!(db.count_tasks().unwrap(), 2);

        assert_eq!(db.delete_all_tasks().unwrap(), 2);
        assert_eq!(db.count_tasks().unwrap(), 0);
        assert_eq!(db.delete_all_tasks().unwrap(), 0);

        // The stored fingerprint still matches, but an empty table uploads again.
        let outcome = sync_records(&mut db, &records, &fingerprint, now(), false).unwrap();
        assert!(matches!(outcome, SyncOutcome::Uploaded { written: 2, .. }));
    }

    #[test]
    fn failed_upload_leaves_store_untouched() {
        let mut db = Database::open_in_memory().unwrap();
        let records = normalize(LOG, &NormalizeOptions::default()).unwrap().records;
        let fingerprint = Fingerprint::of(LOG.as_bytes());
        sync_records(&mut db, &records, &fingerprint, now(), false).unwrap();
        let before = db.list_tasks().unwrap();

        db.conn
            .execute_batch(
                "
                CREATE TRIGGER reject_third_task BEFORE INSERT ON tasks
                WHEN NEW.id = '20251101003'
                BEGIN
                    SELECT RAISE(ABORT, 'rejected');
                END;
                ",
            )
            .unwrap();

        let changed = "01/11/2025\n+ Run 6h\n+ Read 7h\n+ Cook 8h\n";
        let changed_records = normalize(changed, &NormalizeOptions::default())
            .unwrap()
            .records;
        let result = sync_records(
            &mut db,
            &changed_records,
            &Fingerprint::of(changed.as_bytes()),
            now(),
            false,
        );

        assert!(matches!(result, Err(DbError::Sqlite(_))));
        assert_eq!(db.count_tasks().unwrap(), 2);
        assert_eq!(db.list_tasks().unwrap(), before);
        assert_eq!(db.upload_state().unwrap().unwrap().fingerprint, fingerprint);
    }

    #[test]
    fn sync_records_persists_across_reopen() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("skillpulse.db");
        let records = normalize(LOG, &NormalizeOptions::default()).unwrap().records;
        let fingerprint = Fingerprint::of(LOG.as_bytes());

        {
            let mut db = Database::open(&path).unwrap();
            sync_records(&mut db, &records, &fingerprint, now(), false).unwrap();
        }

        let mut db = Database::open(&path).unwrap();
        let tasks = db.list_tasks().unwrap();
        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["20251101001", "20251101002"]);
        assert_eq!(tasks[0].end_time, "2025-11-02T00:10:00-03:00");
        assert_eq!(tasks[1].end_time, tasks[1].start_time);

        let outcome = sync_records(&mut db, &records, &fingerprint, now(), false).unwrap();
        assert!(matches!(outcome, SyncOutcome::Skipped { .. }));
    }
}
