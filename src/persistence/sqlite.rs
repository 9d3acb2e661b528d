// SQLite-backed task store; the schema is created on open
use super::{
    PersistenceError, PersistenceResult, RunEntry, TaskRecord, TaskStore, format_datetime,
    parse_datetime,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use std::path::Path;

const SCHEMA_VERSION: i32 = 1;

pub struct SqliteTaskStore {
    conn: Connection,
}

impl SqliteTaskStore {
    pub fn open(path: &Path) -> PersistenceResult<Self> {
        log::info!("Opening task database {}", path.display());
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> PersistenceResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(mut conn: Connection) -> PersistenceResult<Self> {
        migrate(&mut conn)?;
        Ok(Self { conn })
    }
}

fn migrate(conn: &mut Connection) -> PersistenceResult<()> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if version > SCHEMA_VERSION {
        return Err(PersistenceError::SchemaTooNew {
            found: version,
            supported: SCHEMA_VERSION,
        });
    }
    if version == SCHEMA_VERSION {
        return Ok(());
    }
    let tx = conn.transaction()?;
    tx.execute_batch(include_str!("schema.sql"))?;
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;
    log::debug!("Task database schema at version {SCHEMA_VERSION}");
    Ok(())
}

fn row_to_record(row: &Row) -> PersistenceResult<TaskRecord> {
    let state: String = row.get("state")?;
    let cooldown_until: String = row.get("cooldown_until")?;
    let retry_count: i64 = row.get("retry_count")?;

    Ok(TaskRecord {
        task_id: row.get("task_id")?,
        state: state.parse().map_err(|detail| PersistenceError::Corrupt {
            column: "state",
            detail,
        })?,
        cooldown_until: parse_datetime(&cooldown_until, "cooldown_until")?,
        retry_count: u32::try_from(retry_count).map_err(|_| PersistenceError::Corrupt {
            column: "retry_count",
            detail: format!("{retry_count} out of range"),
        })?,
        last_error: row.get("last_error")?,
        progress: row.get("progress")?,
    })
}

fn row_to_run(row: &Row) -> PersistenceResult<RunEntry> {
    let outcome: String = row.get("outcome")?;
    let started_at: String = row.get("started_at")?;
    let finished_at: String = row.get("finished_at")?;

    Ok(RunEntry {
        task_id: row.get("task_id")?,
        outcome: outcome.parse().map_err(|detail| PersistenceError::Corrupt {
            column: "outcome",
            detail,
        })?,
        reason: row.get("reason")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        finished_at: parse_datetime(&finished_at, "finished_at")?,
    })
}

const SELECT_TASK: &str = "SELECT task_id, state, cooldown_until, retry_count, last_error, progress
     FROM task_state";

impl SqliteTaskStore {
    fn query_records(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> PersistenceResult<Vec<TaskRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(row_to_record(row)?);
        }
        Ok(records)
    }
}

impl TaskStore for SqliteTaskStore {
    fn load_task_state(&self, task_id: &str) -> PersistenceResult<Option<TaskRecord>> {
        let sql = format!("{SELECT_TASK} WHERE task_id = ?1");
        Ok(self.query_records(&sql, params![task_id])?.into_iter().next())
    }

    fn save_task_state(&mut self, record: &TaskRecord) -> PersistenceResult<()> {
        self.conn.execute(
            "INSERT INTO task_state (task_id, state, cooldown_until, retry_count, last_error, progress, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(task_id) DO UPDATE SET
                 state = excluded.state,
                 cooldown_until = excluded.cooldown_until,
                 retry_count = excluded.retry_count,
                 last_error = excluded.last_error,
                 progress = excluded.progress,
                 updated_at = excluded.updated_at",
            params![
                record.task_id,
                record.state.as_str(),
                format_datetime(&record.cooldown_until),
                i64::from(record.retry_count),
                record.last_error,
                record.progress,
                format_datetime(&Utc::now()),
            ],
        )?;
        Ok(())
    }

    fn list_due_tasks(&self, now: DateTime<Utc>) -> PersistenceResult<Vec<TaskRecord>> {
        let sql = format!(
            "{SELECT_TASK} WHERE state = 'Idle' AND cooldown_until <= ?1 ORDER BY cooldown_until, task_id"
        );
        self.query_records(&sql, params![format_datetime(&now)])
    }

    fn list_tasks(&self) -> PersistenceResult<Vec<TaskRecord>> {
        let sql = format!("{SELECT_TASK} ORDER BY task_id");
        self.query_records(&sql, params![])
    }

    fn record_run(&mut self, entry: &RunEntry) -> PersistenceResult<()> {
        self.conn.execute(
            "INSERT INTO run_history (task_id, outcome, reason, started_at, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.task_id,
                entry.outcome.as_str(),
                entry.reason,
                format_datetime(&entry.started_at),
                format_datetime(&entry.finished_at),
            ],
        )?;
        Ok(())
    }

    fn recent_runs(&self, limit: usize) -> PersistenceResult<Vec<RunEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT task_id, outcome, reason, started_at, finished_at
             FROM run_history
             ORDER BY id DESC
             LIMIT ?1",
        )?;
        let mut rows = stmt.query(params![i64::try_from(limit).unwrap_or(i64::MAX)])?;
        let mut runs = Vec::new();
        while let Some(row) = rows.next()? {
            runs.push(row_to_run(row)?);
        }
        Ok(runs)
    }
}
