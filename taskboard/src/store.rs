//! Task entity store: the single source of truth for the board.
//!
//! Tasks are held in a flat sequence whose order is the board order; the
//! projection groups that sequence by status. Status changes, inserts and
//! snapshots stamp the touched task with a fresh value from a store-wide
//! counter so in-flight gateway calls can tell whether the state they were
//! issued against is still current. Reordering within a column changes no
//! status and leaves versions alone.

use std::collections::HashMap;

use taskboard_proto::task::{Task, TaskId, TaskStatus};

/// Errors raised by [`TaskStore`] operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    /// No task with the given id is present.
    #[error("task not found: {0}")]
    NotFound(TaskId),
    /// A task with the given id is already present.
    #[error("duplicate task id: {0}")]
    Duplicate(TaskId),
    /// A within-column reorder named tasks in different columns.
    #[error("cannot reorder {task} over {over}: different columns")]
    ColumnMismatch {
        /// Task being moved.
        task: TaskId,
        /// Task it was dropped on.
        over: TaskId,
    },
}

/// In-memory, flat collection of the tasks on the board.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
    versions: HashMap<TaskId, u64>,
    next_version: u64,
    snapshot_version: u64,
}

impl TaskStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `tasks` in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if two tasks share an id.
    pub fn from_tasks(tasks: Vec<Task>) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for task in tasks {
            store.insert(task)?;
        }
        Ok(store)
    }

    /// Returns all tasks in board order.
    #[must_use]
    pub fn get_all(&self) -> &[Task] {
        &self.tasks
    }

    /// Returns the task with the given id.
    #[must_use]
    pub fn get(&self, task_id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == *task_id)
    }

    /// Returns the current status of a task.
    #[must_use]
    pub fn status_of(&self, task_id: &TaskId) -> Option<TaskStatus> {
        self.get(task_id).map(|t| t.status)
    }

    /// Returns the version stamped on a task by its last status change.
    #[must_use]
    pub fn version(&self, task_id: &TaskId) -> Option<u64> {
        self.versions.get(task_id).copied()
    }

    /// Highest version handed out by the last [`replace_all`](Self::replace_all),
    /// or 0 if the board was never replaced.
    ///
    /// A task whose version is at or below this value still holds the
    /// snapshot's status.
    #[must_use]
    pub const fn snapshot_version(&self) -> u64 {
        self.snapshot_version
    }

    /// Number of tasks held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the store holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Appends a task at the end of the board order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if the id is already present.
    pub fn insert(&mut self, task: Task) -> Result<(), StoreError> {
        if self.versions.contains_key(&task.id) {
            return Err(StoreError::Duplicate(task.id));
        }
        let version = self.bump();
        self.versions.insert(task.id.clone(), version);
        self.tasks.push(task);
        Ok(())
    }

    /// Removes a task from whichever column holds it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the id is absent.
    pub fn remove(&mut self, task_id: &TaskId) -> Result<Task, StoreError> {
        let index = self.position(task_id)?;
        self.versions.remove(task_id);
        Ok(self.tasks.remove(index))
    }

    /// Sets a task's status and returns the status it had before.
    ///
    /// The task moves to the end of the board order, which puts it at the
    /// bottom of its new column.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the id is absent.
    pub fn apply_status_change(
        &mut self,
        task_id: &TaskId,
        new_status: TaskStatus,
    ) -> Result<TaskStatus, StoreError> {
        let index = self.position(task_id)?;
        let mut task = self.tasks.remove(index);
        let previous = task.status;
        task.status = new_status;
        self.tasks.push(task);
        let version = self.bump();
        self.versions.insert(task_id.clone(), version);
        Ok(previous)
    }

    /// Moves `task_id` to the position of `over_id` within their shared column.
    ///
    /// Dragging downwards lands after `over_id`, dragging upwards lands
    /// before it. Versions are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if either id is absent, or
    /// [`StoreError::ColumnMismatch`] if the tasks are in different columns.
    pub fn reorder(&mut self, task_id: &TaskId, over_id: &TaskId) -> Result<(), StoreError> {
        let from = self.position(task_id)?;
        let to = self.position(over_id)?;
        if self.tasks[from].status != self.tasks[to].status {
            return Err(StoreError::ColumnMismatch {
                task: task_id.clone(),
                over: over_id.clone(),
            });
        }
        if from == to {
            return Ok(());
        }
        let task = self.tasks.remove(from);
        self.tasks.insert(to, task);
        Ok(())
    }

    /// Replaces the whole board with a fresh snapshot.
    ///
    /// Every task receives a new version, so no earlier in-flight call can
    /// match it afterwards. Later duplicates of an id are dropped.
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        self.tasks.clear();
        self.versions.clear();
        for task in tasks {
            if self.versions.contains_key(&task.id) {
                tracing::warn!(task_id = %task.id, "dropping duplicate task in snapshot");
                continue;
            }
            let version = self.bump();
            self.versions.insert(task.id.clone(), version);
            self.tasks.push(task);
        }
        self.snapshot_version = self.next_version;
    }

    fn position(&self, task_id: &TaskId) -> Result<usize, StoreError> {
        self.tasks
            .iter()
            .position(|t| t.id == *task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.clone()))
    }

    fn bump(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }
}
