//! Loopback gateway for offline mode and testing.
//!
//! Holds its own authoritative copy of the task table in process and
//! applies the same checks the task server does: unknown and locked tasks
//! are rejected, and a stale `old` status is reported as a conflict.
//! Latency, scripted failures and an offline switch let tests and demos
//! exercise every rollback path without a network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::NaiveDate;
use parking_lot::Mutex;
use taskboard_proto::task::{Priority, Task, TaskId, TaskStatus};

use super::{StatusGateway, TransitionError};

#[derive(Debug, Clone)]
struct Record {
    task: Task,
    locked: bool,
}

/// In-process [`StatusGateway`] backed by a mutex-protected table.
pub struct LoopbackGateway {
    table: Mutex<Vec<Record>>,
    scripted: Mutex<VecDeque<TransitionError>>,
    latency: Duration,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl LoopbackGateway {
    /// Creates a gateway whose backend holds `tasks`.
    #[must_use]
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            table: Mutex::new(
                tasks
                    .into_iter()
                    .map(|task| Record {
                        task,
                        locked: false,
                    })
                    .collect(),
            ),
            scripted: Mutex::new(VecDeque::new()),
            latency: Duration::ZERO,
            offline: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a gateway seeded with a small demo board.
    #[must_use]
    pub fn demo() -> Self {
        Self::new(demo_tasks()).with_latency(Duration::from_millis(300))
    }

    /// Delays every call by `latency`.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Makes the next transition call fail with `error`, in FIFO order.
    pub fn fail_next(&self, error: TransitionError) {
        self.scripted.lock().push_back(error);
    }

    /// Simulates losing (or regaining) the backend.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    /// Locks a task so transitions on it are rejected.
    pub fn lock(&self, task_id: &TaskId) {
        if let Some(record) = self.table.lock().iter_mut().find(|r| r.task.id == *task_id) {
            record.locked = true;
        }
    }

    /// Changes a task's backend status behind the client's back.
    pub fn set_status(&self, task_id: &TaskId, status: TaskStatus) {
        if let Some(record) = self.table.lock().iter_mut().find(|r| r.task.id == *task_id) {
            record.task.status = status;
        }
    }

    /// Backend status of a task.
    #[must_use]
    pub fn status_of(&self, task_id: &TaskId) -> Option<TaskStatus> {
        self.table
            .lock()
            .iter()
            .find(|r| r.task.id == *task_id)
            .map(|r| r.task.status)
    }

    /// Number of transition calls received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn apply(&self, task_id: &TaskId, old: TaskStatus, new: TaskStatus) -> Result<(), TransitionError> {
        if let Some(error) = self.scripted.lock().pop_front() {
            return Err(error);
        }
        let mut table = self.table.lock();
        let Some(record) = table.iter_mut().find(|r| r.task.id == *task_id) else {
            return Err(TransitionError::Validation(format!("task {task_id} not found")));
        };
        if record.locked {
            return Err(TransitionError::Validation("task is locked".to_string()));
        }
        if record.task.status != old {
            return Err(TransitionError::Conflict {
                current: Some(record.task.status),
            });
        }
        record.task.status = new;
        Ok(())
    }
}

impl StatusGateway for LoopbackGateway {
    async fn request_transition(
        &self,
        task_id: &TaskId,
        old: TaskStatus,
        new: TaskStatus,
    ) -> Result<(), TransitionError> {
        assert_ne!(old, new, "gateway called for a no-op transition");
        self.calls.fetch_add(1, Ordering::Relaxed);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.offline.load(Ordering::Relaxed) {
            return Err(TransitionError::Network("backend unreachable".to_string()));
        }
        self.apply(task_id, old, new)
    }

    async fn fetch_tasks(&self) -> Result<Vec<Task>, TransitionError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.offline.load(Ordering::Relaxed) {
            return Err(TransitionError::Network("backend unreachable".to_string()));
        }
        Ok(self.table.lock().iter().map(|r| r.task.clone()).collect())
    }

    fn describe(&self) -> String {
        "Offline".to_string()
    }
}

/// A small law-practice board used when no server is configured.
#[must_use]
pub fn demo_tasks() -> Vec<Task> {
    let due = |m, d| NaiveDate::from_ymd_opt(2026, m, d);
    [
        ("t-101", "Draft engagement letter", TaskStatus::Todo, Priority::High, Some("Smith v. Jones"), due(11, 3)),
        ("t-102", "Collect billing records", TaskStatus::Todo, Priority::Medium, None, None),
        ("t-103", "Draft invoice for October", TaskStatus::InProgress, Priority::Urgent, Some("Monthly billing"), due(10, 31)),
        ("t-104", "Prepare deposition outline", TaskStatus::InProgress, Priority::High, Some("Witness: R. Alvarez"), due(11, 12)),
        ("t-105", "Review lease amendment", TaskStatus::Review, Priority::Medium, None, due(11, 5)),
        ("t-106", "File motion to compel", TaskStatus::Done, Priority::Urgent, Some("Discovery dispute"), None),
        ("t-107", "Schedule client intake", TaskStatus::Cancelled, Priority::Low, None, None),
    ]
    .into_iter()
    .filter_map(|(id, title, status, priority, description, due)| {
        let mut task = Task::new(id, title, status).ok()?.with_priority(priority);
        task.description = description.map(str::to_string);
        task.due_date = due;
        Some(task)
    })
    .collect()
}
