//! Authoritative task table.
//!
//! Decides every transition request: the request names the status the
//! client believed the task had, and is refused with the current status
//! when that belief is out of date.

use taskboard_proto::task::{Task, TaskId, TaskStatus};
use taskboard_proto::transition::TransitionOutcome;
use tokio::sync::RwLock;

/// A task plus server-only flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub task: Task,
    /// Locked tasks refuse every transition.
    pub locked: bool,
}

impl From<Task> for TaskRecord {
    fn from(task: Task) -> Self {
        Self {
            task,
            locked: false,
        }
    }
}

/// Thread-safe table of task records in board order.
#[derive(Debug, Default)]
pub struct TaskTable {
    records: RwLock<Vec<TaskRecord>>,
}

impl TaskTable {
    /// Creates a table holding `records`.
    #[must_use]
    pub fn new(records: Vec<TaskRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// All tasks in board order.
    pub async fn snapshot(&self) -> Vec<Task> {
        self.records
            .read()
            .await
            .iter()
            .map(|r| r.task.clone())
            .collect()
    }

    /// Current status of a task.
    pub async fn status_of(&self, task_id: &TaskId) -> Option<TaskStatus> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.task.id == *task_id)
            .map(|r| r.task.status)
    }

    /// Moves a task from `expected` to `target` if nothing stands in the way.
    pub async fn transition(
        &self,
        task_id: &TaskId,
        expected: TaskStatus,
        target: TaskStatus,
    ) -> TransitionOutcome {
        let mut records = self.records.write().await;
        let Some(record) = records.iter_mut().find(|r| r.task.id == *task_id) else {
            return TransitionOutcome::Rejected {
                reason: format!("unknown task {task_id}"),
            };
        };
        if expected == target {
            return TransitionOutcome::Rejected {
                reason: "task is already in the target status".to_string(),
            };
        }
        if record.locked {
            return TransitionOutcome::Rejected {
                reason: "task is locked".to_string(),
            };
        }
        if record.task.status != expected {
            return TransitionOutcome::Conflict {
                current: record.task.status,
            };
        }
        record.task.status = target;
        TransitionOutcome::Applied
    }

    /// Sets a task's status unconditionally; returns whether it exists.
    pub async fn set_status(&self, task_id: &TaskId, status: TaskStatus) -> bool {
        let mut records = self.records.write().await;
        records
            .iter_mut()
            .find(|r| r.task.id == *task_id)
            .map(|r| r.task.status = status)
            .is_some()
    }

    /// Locks or unlocks a task; returns whether it exists.
    pub async fn set_locked(&self, task_id: &TaskId, locked: bool) -> bool {
        let mut records = self.records.write().await;
        records
            .iter_mut()
            .find(|r| r.task.id == *task_id)
            .map(|r| r.locked = locked)
            .is_some()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
