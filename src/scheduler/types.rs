// Control Interface messages
use crate::persistence::TaskState;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Inbound commands, applied only between task steps.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    Pause,
    Resume,
    /// Task id; runs next regardless of cooldown and priority
    RunNow(String),
    CancelCurrent,
    Status,
    Shutdown,
}

/// Outbound events. Sent without waiting; a full channel drops the event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    TaskCompleted { task_id: String },
    TaskFailed { task_id: String, reason: String },
    Status(StatusSnapshot),
    /// Reconnect budget exhausted; the scheduler is paused until Resume
    DeviceLost { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStatus {
    pub task_id: String,
    pub enabled: bool,
    pub state: TaskState,
    pub priority: u32,
    pub cooldown_until: DateTime<Utc>,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub paused: bool,
    pub running: Option<String>,
    pub tasks: Vec<TaskStatus>,
}
