// In-memory task store, for tests and dry runs
use super::{PersistenceError, PersistenceResult, RunEntry, TaskRecord, TaskStore};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    records: BTreeMap<String, TaskRecord>,
    runs: Vec<RunEntry>,
    /// Successful saves still allowed before injected failures start
    failures_after: usize,
    /// Number of saves to reject once `failures_after` is used up
    failing_saves: u32,
    pub saves: usize,
    /// Every save call, rejected or not
    pub save_attempts: usize,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `count` saves with `Unavailable`.
    pub fn fail_next_saves(&mut self, count: u32) {
        self.fail_saves_after(0, count);
    }

    /// Let `ok` more saves through, then reject `count`.
    pub fn fail_saves_after(&mut self, ok: usize, count: u32) {
        self.failures_after = ok;
        self.failing_saves = count;
    }

    pub fn runs(&self) -> &[RunEntry] {
        &self.runs
    }
}

impl TaskStore for MemoryTaskStore {
    fn load_task_state(&self, task_id: &str) -> PersistenceResult<Option<TaskRecord>> {
        Ok(self.records.get(task_id).cloned())
    }

    fn save_task_state(&mut self, record: &TaskRecord) -> PersistenceResult<()> {
        self.save_attempts += 1;
        if self.failures_after > 0 {
            self.failures_after -= 1;
        } else if self.failing_saves > 0 {
            self.failing_saves -= 1;
            return Err(PersistenceError::Unavailable("injected save failure".into()));
        }
        self.saves += 1;
        self.records.insert(record.task_id.clone(), record.clone());
        Ok(())
    }

    fn list_due_tasks(&self, now: DateTime<Utc>) -> PersistenceResult<Vec<TaskRecord>> {
        let mut due: Vec<TaskRecord> = self
            .records
            .values()
            .filter(|r| r.is_due(now))
            .cloned()
            .collect();
        due.sort_by(|a, b| {
            a.cooldown_until
                .cmp(&b.cooldown_until)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        Ok(due)
    }

    fn list_tasks(&self) -> PersistenceResult<Vec<TaskRecord>> {
        Ok(self.records.values().cloned().collect())
    }

    fn record_run(&mut self, entry: &RunEntry) -> PersistenceResult<()> {
        self.runs.push(entry.clone());
        Ok(())
    }

    fn recent_runs(&self, limit: usize) -> PersistenceResult<Vec<RunEntry>> {
        Ok(self.runs.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::TaskState;

    #[test]
    fn injected_failures_leave_store_untouched() {
        let now = Utc::now();
        let mut store = MemoryTaskStore::new();
        store.fail_next_saves(1);
        let record = TaskRecord::new("exploration", now);
        assert!(store.save_task_state(&record).is_err());
        assert_eq!(store.load_task_state("exploration").unwrap(), None);
        store.save_task_state(&record).unwrap();
        assert_eq!(
            store.load_task_state("exploration").unwrap().map(|r| r.state),
            Some(TaskState::Idle)
        );
        assert_eq!(store.list_due_tasks(now).unwrap().len(), 1);
    }
}
