//! Task Scheduler: one task at a time on the single device
//!
//! Every task is `Idle -> Running -> {Completed, Failed, Waiting} -> Idle`.
//! Each transition and each step is persisted before it counts as committed.

pub mod channels;
pub mod types;

pub use channels::create_control_channels;
pub use types::{ControlCommand, Notification, StatusSnapshot, TaskStatus};

use crate::config::{EngineConfig, IdleBehavior, SchedulerSection};
use crate::device::{DeviceBridge, DeviceError};
use crate::executor::{Executor, StateObserver};
use crate::persistence::{
    PersistenceResult, RunEntry, RunOutcome, TaskRecord, TaskState, TaskStore,
};
use crate::tasks::{Decision, TaskContext, TaskKind, TaskProgress, TaskSpec};
use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

/// How a run ended
#[derive(Debug)]
enum RunEnd {
    Completed { cooldown: Option<TimeDelta> },
    Failed(String),
    Deferred { wait: Duration, progress: String },
    /// Cancel, pause or shutdown arrived between steps
    Interrupted { cancelled: bool, progress: String },
    DeviceLost { error: DeviceError, progress: String },
    /// A step could not be persisted
    StoreFailed,
}

pub struct Scheduler<D: DeviceBridge, S: TaskStore> {
    device: D,
    store: S,
    observer: StateObserver,
    executor: Executor,
    cfg: SchedulerSection,
    app_id: String,
    specs: Vec<TaskSpec>,
    /// Last committed record per spec, same order as `specs`
    records: Vec<TaskRecord>,
    commands: mpsc::Receiver<ControlCommand>,
    commands_open: bool,
    notifications: mpsc::Sender<Notification>,
    paused: bool,
    run_now: Option<TaskKind>,
    current: Option<TaskKind>,
    cancel_requested: bool,
    shutdown: bool,
    /// Set once the idle behavior sent the game away; cleared by the next run
    backgrounded: bool,
}

impl<D: DeviceBridge, S: TaskStore> Scheduler<D, S> {
    /// Load or create a record for every task. A task found `Running` (or in
    /// any other non-idle state) was interrupted; it goes back to `Idle` with
    /// its progress intact.
    pub fn new(
        device: D,
        mut store: S,
        observer: StateObserver,
        cfg: &EngineConfig,
        specs: Vec<TaskSpec>,
        commands: mpsc::Receiver<ControlCommand>,
        notifications: mpsc::Sender<Notification>,
    ) -> PersistenceResult<Self> {
        let now = Utc::now();
        let mut records = Vec::with_capacity(specs.len());
        for spec in &specs {
            let record = match store.load_task_state(spec.id())? {
                Some(mut record) => {
                    if record.state != TaskState::Idle {
                        log::warn!(
                            "Task '{}' was {} at shutdown, resuming from saved progress",
                            spec.id(),
                            record.state
                        );
                        record.state = TaskState::Idle;
                        store.save_task_state(&record)?;
                    }
                    record
                }
                None => {
                    let record = TaskRecord::new(spec.id(), now);
                    store.save_task_state(&record)?;
                    record
                }
            };
            records.push(record);
        }

        Ok(Self {
            device,
            store,
            observer,
            executor: Executor::new(&cfg.executor),
            cfg: cfg.scheduler.clone(),
            app_id: cfg.device.app_id.clone(),
            specs,
            records,
            commands,
            commands_open: true,
            notifications,
            paused: false,
            run_now: None,
            current: None,
            cancel_requested: false,
            shutdown: false,
            backgrounded: false,
        })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn record(&self, task_id: &str) -> Option<&TaskRecord> {
        self.records.iter().find(|r| r.task_id == task_id)
    }

    /// Run until `Shutdown`.
    pub async fn run(&mut self) {
        log::info!("🗓️ Scheduler started with {} tasks", self.specs.len());
        while !self.shutdown {
            if !self.tick().await {
                self.idle().await;
            }
        }
        log::info!("🛑 Scheduler stopped");
    }

    /// One iteration: apply commands, then run the next due task if any.
    /// Returns whether a task ran with its state persisted; `false` sends
    /// `run` to idle, including when the store refused a write.
    pub async fn tick(&mut self) -> bool {
        self.drain_commands();
        if self.shutdown || self.paused {
            return false;
        }
        let Some(idx) = self.select_next(Utc::now()) else {
            return false;
        };
        self.run_task(idx).await
    }

    /// Which task would run now
    pub fn next_task(&self, now: DateTime<Utc>) -> Option<TaskKind> {
        self.select_next(now).map(|idx| self.specs[idx].kind)
    }

    /// RunNow first, then lowest priority number, earliest cooldown, catalog order.
    fn select_next(&self, now: DateTime<Utc>) -> Option<usize> {
        let runnable = |idx: &usize| {
            self.specs[*idx].enabled && self.records[*idx].state == TaskState::Idle
        };
        if let Some(kind) = self.run_now
            && let Some(idx) = self.specs.iter().position(|s| s.kind == kind)
            && runnable(&idx)
        {
            return Some(idx);
        }
        (0..self.specs.len())
            .filter(runnable)
            .filter(|&idx| self.records[idx].cooldown_until <= now)
            .min_by_key(|&idx| {
                (
                    self.specs[idx].priority,
                    self.records[idx].cooldown_until,
                    idx,
                )
            })
    }

    /// Time until the nearest cooldown expires
    fn next_wake(&self, now: DateTime<Utc>) -> Option<Duration> {
        (0..self.specs.len())
            .filter(|&idx| self.specs[idx].enabled && self.records[idx].state == TaskState::Idle)
            .map(|idx| self.records[idx].cooldown_until)
            .min()
            .map(|at| (at - now).to_std().unwrap_or(Duration::ZERO))
    }

    /// Sleep until the nearest cooldown or the next command. A task that is
    /// already due but did not run (store refused the write) waits one poll.
    async fn idle(&mut self) {
        let wait = match self.next_wake(Utc::now()) {
            Some(wait) if !self.paused && !wait.is_zero() => wait,
            _ => self.cfg.idle_poll(),
        };
        if !self.paused {
            self.apply_idle_behavior(wait).await;
        }
        if !self.commands_open {
            sleep(wait).await;
            return;
        }
        log::debug!("Idle for up to {wait:?}");
        tokio::select! {
            command = self.commands.recv() => match command {
                Some(command) => self.apply(command),
                None => {
                    log::debug!("Control channel closed");
                    self.commands_open = false;
                }
            },
            _ = sleep(wait) => {}
        }
    }

    async fn apply_idle_behavior(&mut self, wait: Duration) {
        if self.backgrounded
            || self.cfg.idle_behavior != IdleBehavior::SendToBackground
            || wait < self.cfg.idle_background_after()
        {
            return;
        }
        match self.device.send_to_background().await {
            Ok(()) => log::info!("💤 Nothing due for {wait:?}, game sent to background"),
            Err(e) => log::warn!("Could not send the game to background: {e}"),
        }
        self.backgrounded = true;
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: ControlCommand) {
        log::info!("Control command: {command:?}");
        match command {
            ControlCommand::Pause => self.paused = true,
            ControlCommand::Resume => self.paused = false,
            ControlCommand::RunNow(id) => {
                let spec = id
                    .parse::<TaskKind>()
                    .ok()
                    .and_then(|kind| self.specs.iter().find(|s| s.kind == kind));
                match spec {
                    Some(spec) if spec.enabled => self.run_now = Some(spec.kind),
                    Some(_) => log::warn!("RunNow: task '{id}' is disabled"),
                    None => log::warn!("RunNow: no task '{id}'"),
                }
            }
            ControlCommand::CancelCurrent => {
                if self.current.is_some() {
                    self.cancel_requested = true;
                }
            }
            ControlCommand::Status => {
                let snapshot = self.status();
                self.notify(Notification::Status(snapshot));
            }
            ControlCommand::Shutdown => self.shutdown = true,
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            paused: self.paused,
            running: self.current.map(|k| k.id().to_string()),
            tasks: self
                .specs
                .iter()
                .zip(&self.records)
                .map(|(spec, record)| TaskStatus {
                    task_id: record.task_id.clone(),
                    enabled: spec.enabled,
                    state: record.state,
                    priority: spec.priority,
                    cooldown_until: record.cooldown_until,
                    retry_count: record.retry_count,
                    last_error: record.last_error.clone(),
                })
                .collect(),
        }
    }

    fn notify(&self, notification: Notification) {
        if let Err(e) = self.notifications.try_send(notification) {
            log::warn!("Notification dropped: {e}");
        }
    }

    /// Persist `update` applied to the task's record; memory follows only on success.
    fn commit(&mut self, idx: usize, update: impl FnOnce(&mut TaskRecord)) -> bool {
        let mut record = self.records[idx].clone();
        update(&mut record);
        match self.store.save_task_state(&record) {
            Ok(()) => {
                if record.state != self.records[idx].state {
                    log::debug!(
                        "Task '{}': {} -> {}",
                        record.task_id,
                        self.records[idx].state,
                        record.state
                    );
                }
                self.records[idx] = record;
                true
            }
            Err(e) => {
                log::error!("Saving task '{}' failed: {e}", record.task_id);
                false
            }
        }
    }

    /// Returns false when the store refused the `Running` transition or a step.
    async fn run_task(&mut self, idx: usize) -> bool {
        let kind = self.specs[idx].kind;
        if self.run_now == Some(kind) {
            self.run_now = None;
        }
        if !self.commit(idx, |r| r.state = TaskState::Running) {
            return false;
        }
        let started = Utc::now();
        self.current = Some(kind);
        self.backgrounded = false;
        log::info!("▶️ Running task '{kind}'");

        let end = match self.device.ensure_foreground(&self.app_id).await {
            Ok(()) => self.drive(idx).await,
            Err(error) if error.is_device_loss() => RunEnd::DeviceLost {
                error,
                progress: self.records[idx].progress.clone(),
            },
            Err(error) => RunEnd::Failed(error.to_string()),
        };
        let committed = !matches!(end, RunEnd::StoreFailed);
        self.finish(idx, end, started);
        self.current = None;
        self.cancel_requested = false;
        committed
    }

    /// Step the task until it reaches an end.
    async fn drive(&mut self, idx: usize) -> RunEnd {
        let kind = self.specs[idx].kind;
        let chief_order = self.specs[idx].chief_order;
        let mut progress = TaskProgress::from_blob(kind, &self.records[idx].progress);
        let blob = |p: &TaskProgress| {
            p.to_blob().unwrap_or_else(|e| {
                log::warn!("Progress of '{kind}' not serializable ({e}), saving it empty");
                String::new()
            })
        };

        let mut state = match self.observer.look(&mut self.device).await {
            Ok(state) => state,
            Err(error) if error.is_device_loss() => {
                return RunEnd::DeviceLost {
                    error,
                    progress: blob(&progress),
                };
            }
            Err(error) => return RunEnd::Failed(error.to_string()),
        };
        let mut unknown_streak = 0u32;
        let mut steps = 0u32;

        loop {
            self.drain_commands();
            if self.cancel_requested || self.paused || self.shutdown {
                log::info!("Task '{kind}' interrupted between steps");
                return RunEnd::Interrupted {
                    cancelled: self.cancel_requested,
                    progress: blob(&progress),
                };
            }

            if state.is_unknown() {
                unknown_streak += 1;
                log::debug!("Unknown screen ({unknown_streak}/{})", self.cfg.unknown_ceiling);
                if unknown_streak >= self.cfg.unknown_ceiling {
                    return RunEnd::Failed("Unrecognized".into());
                }
            } else {
                unknown_streak = 0;
            }

            if steps >= self.cfg.max_steps_per_run {
                return RunEnd::Failed("StepBudgetExhausted".into());
            }
            steps += 1;

            let ctx = TaskContext {
                now: Utc::now(),
                app_id: &self.app_id,
                buttons: self.observer.pipeline().catalog().buttons(),
                chief_order,
                wait: self.cfg.idle_poll(),
            };
            let action = match kind.decide(&mut progress, &state, &ctx) {
                Decision::Act(action) => action,
                Decision::Complete { cooldown } => return RunEnd::Completed { cooldown },
                Decision::Defer(wait) => {
                    return RunEnd::Deferred {
                        wait,
                        progress: blob(&progress),
                    };
                }
                Decision::Fail(reason) => return RunEnd::Failed(reason),
            };

            let result = match self
                .executor
                .perform(&mut self.device, &self.observer, &action)
                .await
            {
                Ok(result) => result,
                Err(error) if error.is_device_loss() => {
                    return RunEnd::DeviceLost {
                        error,
                        progress: blob(&progress),
                    };
                }
                Err(error) => return RunEnd::Failed(error.to_string()),
            };
            kind.absorb(&mut progress, &result);

            let verified = result.is_success();
            let step_blob = blob(&progress);
            if !self.commit(idx, |r| {
                r.progress = step_blob;
                r.retry_count = if verified { 0 } else { r.retry_count + 1 };
            }) {
                return RunEnd::StoreFailed;
            }

            let retries = self.records[idx].retry_count;
            if retries >= self.cfg.retry_ceiling {
                return RunEnd::Failed(format!(
                    "VerificationFailed {retries} times (last: {action}, saw '{}')",
                    result.state().name()
                ));
            }
            state = result.into_state();
        }
    }

    fn finish(&mut self, idx: usize, end: RunEnd, started: DateTime<Utc>) {
        let kind = self.specs[idx].kind;
        let interval = self.specs[idx].interval;
        let now = Utc::now();
        let backoff = TimeDelta::from_std(self.cfg.failure_backoff()).unwrap_or(TimeDelta::minutes(10));

        let (outcome, reason) = match end {
            RunEnd::Completed { cooldown } => {
                let until = now + cooldown.unwrap_or(interval);
                log::info!("✅ Task '{kind}' completed, next run at {until}");
                self.settle(idx, TaskState::Completed, |r| {
                    r.cooldown_until = until;
                    r.retry_count = 0;
                    r.last_error = None;
                    r.progress.clear();
                });
                self.notify(Notification::TaskCompleted {
                    task_id: kind.id().to_string(),
                });
                (RunOutcome::Completed, None)
            }
            RunEnd::Failed(reason) => {
                log::error!("❌ Task '{kind}' failed: {reason}");
                let until = now + backoff;
                let error = reason.clone();
                self.settle(idx, TaskState::Failed, |r| {
                    r.cooldown_until = until;
                    r.retry_count = 0;
                    r.last_error = Some(error);
                    r.progress.clear();
                });
                self.notify(Notification::TaskFailed {
                    task_id: kind.id().to_string(),
                    reason: reason.clone(),
                });
                (RunOutcome::Failed, Some(reason))
            }
            RunEnd::Deferred { wait, progress } => {
                let until = now + TimeDelta::from_std(wait).unwrap_or(TimeDelta::zero());
                log::info!("⏸️ Task '{kind}' deferred until {until}");
                self.settle(idx, TaskState::Waiting, |r| {
                    r.cooldown_until = until;
                    r.progress = progress;
                });
                (RunOutcome::Deferred, None)
            }
            RunEnd::Interrupted {
                cancelled,
                progress,
            } => {
                // a cancelled task steps aside; a paused one keeps its place
                let until = if cancelled { now + backoff } else { self.records[idx].cooldown_until };
                self.settle(idx, TaskState::Waiting, |r| {
                    r.cooldown_until = until;
                    r.progress = progress;
                });
                (RunOutcome::Cancelled, cancelled.then(|| "cancelled".to_string()))
            }
            RunEnd::DeviceLost { error, progress } => {
                let reason = error.to_string();
                log::error!("📵 Device lost during '{kind}': {reason}; pausing scheduler");
                if !self.commit(idx, |r| {
                    r.state = TaskState::Idle;
                    r.progress = progress;
                }) {
                    self.records[idx].state = TaskState::Idle;
                }
                self.paused = true;
                self.notify(Notification::DeviceLost { reason });
                return;
            }
            RunEnd::StoreFailed => {
                // retried next cycle from the last committed progress
                self.records[idx].state = TaskState::Idle;
                return;
            }
        };

        let entry = RunEntry {
            task_id: kind.id().to_string(),
            outcome,
            reason,
            started_at: started,
            finished_at: now,
        };
        if let Err(e) = self.store.record_run(&entry) {
            log::warn!("Run history not written for '{kind}': {e}");
        }
    }

    /// Persist the terminal state, then `Idle` with `update` applied.
    /// On a failed write the task is left idle in memory to be retried.
    fn settle(&mut self, idx: usize, terminal: TaskState, update: impl FnOnce(&mut TaskRecord)) {
        if !self.commit(idx, |r| r.state = terminal) {
            self.records[idx].state = TaskState::Idle;
            return;
        }
        if !self.commit(idx, |r| {
            update(r);
            r.state = TaskState::Idle;
        }) {
            self.records[idx].state = TaskState::Idle;
        }
    }
}
