//! Persistence Gateway: durable task records and run history
//!
//! The scheduler is the only writer. A write must succeed before the
//! transition it records counts as committed.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryTaskStore;
pub use sqlite::SqliteTaskStore;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt value in column '{column}': {detail}")]
    Corrupt { column: &'static str, detail: String },

    #[error("database schema version {found} is newer than supported {supported}")]
    SchemaTooNew { found: i32, supported: i32 },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    Idle,
    Running,
    Completed,
    Failed,
    Waiting,
}

impl TaskState {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Idle => "Idle",
            TaskState::Running => "Running",
            TaskState::Completed => "Completed",
            TaskState::Failed => "Failed",
            TaskState::Waiting => "Waiting",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Idle" => Ok(TaskState::Idle),
            "Running" => Ok(TaskState::Running),
            "Completed" => Ok(TaskState::Completed),
            "Failed" => Ok(TaskState::Failed),
            "Waiting" => Ok(TaskState::Waiting),
            _ => Err(format!("unknown task state '{s}'")),
        }
    }
}

/// One row of the task table, keyed by `task_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub state: TaskState,
    /// Earliest time the task may run again
    pub cooldown_until: DateTime<Utc>,
    pub retry_count: u32,
    pub last_error: Option<String>,
    /// Task progress as JSON; empty means not started
    pub progress: String,
}

impl TaskRecord {
    /// A never-run task, due immediately
    pub fn new(task_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            task_id: task_id.to_string(),
            state: TaskState::Idle,
            cooldown_until: now,
            retry_count: 0,
            last_error: None,
            progress: String::new(),
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state == TaskState::Idle && self.cooldown_until <= now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    Completed,
    Failed,
    Deferred,
    Cancelled,
}

impl RunOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RunOutcome::Completed => "Completed",
            RunOutcome::Failed => "Failed",
            RunOutcome::Deferred => "Deferred",
            RunOutcome::Cancelled => "Cancelled",
        }
    }
}

impl FromStr for RunOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Completed" => Ok(RunOutcome::Completed),
            "Failed" => Ok(RunOutcome::Failed),
            "Deferred" => Ok(RunOutcome::Deferred),
            "Cancelled" => Ok(RunOutcome::Cancelled),
            _ => Err(format!("unknown run outcome '{s}'")),
        }
    }
}

/// A finished run, appended to the history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunEntry {
    pub task_id: String,
    pub outcome: RunOutcome,
    pub reason: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Narrow key-based store used by the scheduler.
pub trait TaskStore {
    fn load_task_state(&self, task_id: &str) -> PersistenceResult<Option<TaskRecord>>;
    /// Insert or replace the row for `record.task_id`.
    fn save_task_state(&mut self, record: &TaskRecord) -> PersistenceResult<()>;
    /// Idle records whose cooldown has passed, earliest first
    fn list_due_tasks(&self, now: DateTime<Utc>) -> PersistenceResult<Vec<TaskRecord>>;
    fn list_tasks(&self) -> PersistenceResult<Vec<TaskRecord>>;
    fn record_run(&mut self, entry: &RunEntry) -> PersistenceResult<()>;
    /// Newest first
    fn recent_runs(&self, limit: usize) -> PersistenceResult<Vec<RunEntry>>;
}

/// Fixed-width UTC timestamps so text order matches time order.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_datetime(value: &str, column: &'static str) -> PersistenceResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PersistenceError::Corrupt {
            column,
            detail: format!("invalid datetime '{value}': {e}"),
        })
}
