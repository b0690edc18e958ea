//! Board projection: groups the flat task list into the five status columns.
//!
//! The projection is a pure function of the task slice and the search
//! query. It borrows tasks from the store and never owns or mutates them,
//! so it is safe to recompute on every frame.

use taskboard_proto::task::{Task, TaskId, TaskStatus};

/// Five-column view over a task slice.
///
/// Every status always has a column, possibly empty.
#[derive(Debug, Clone)]
pub struct Board<'a> {
    columns: [Vec<&'a Task>; 5],
}

impl<'a> Board<'a> {
    /// Tasks in the column for `status`, in board order.
    #[must_use]
    pub fn column(&self, status: TaskStatus) -> &[&'a Task] {
        &self.columns[status.index()]
    }

    /// Iterates over `(status, column)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (TaskStatus, &[&'a Task])> + '_ {
        TaskStatus::ALL
            .into_iter()
            .map(move |status| (status, self.column(status)))
    }

    /// Total number of tasks shown.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }

    /// Whether no task matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(Vec::is_empty)
    }

    /// Column and row at which a task is shown, if it is shown.
    #[must_use]
    pub fn locate(&self, task_id: &TaskId) -> Option<(TaskStatus, usize)> {
        self.iter().find_map(|(status, column)| {
            column
                .iter()
                .position(|t| t.id == *task_id)
                .map(|row| (status, row))
        })
    }
}

/// Groups `tasks` by status, keeping only those matching `search_query`.
///
/// An empty or whitespace-only query matches everything. Otherwise the
/// query is matched case-insensitively as a substring of the title or the
/// description.
#[must_use]
pub fn project<'a>(tasks: &'a [Task], search_query: &str) -> Board<'a> {
    let needle = search_query.trim().to_lowercase();
    let mut columns: [Vec<&'a Task>; 5] = Default::default();
    for task in tasks {
        if needle.is_empty() || matches_query(task, &needle) {
            columns[task.status.index()].push(task);
        }
    }
    Board { columns }
}

/// Whether `task` matches an already-lowercased, non-empty needle.
fn matches_query(task: &Task, needle: &str) -> bool {
    task.title.to_lowercase().contains(needle)
        || task
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(needle))
}
