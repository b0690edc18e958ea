//! Optimistic status changes with version-checked rollback.
//!
//! [`TaskBoard`] is the single owner of board state. A status change is
//! applied to the store before the gateway is asked, and the resulting
//! [`PendingTransition`] remembers the version the store stamped on the
//! task. When the gateway answers with a failure, the rollback only happens
//! if that version is still current; a later move of the same task (or a
//! full refresh) wins over an older failure. A success that lands after a
//! refresh re-applies the confirmed status when the snapshot predates it.

use taskboard_proto::task::{Task, TaskId, TaskStatus};

use crate::board::{self, Board};
use crate::drag::{DragController, DragError, DragEvent, Intent, StatusChange};
use crate::gateway::TransitionError;
use crate::notice::{Notice, NoticeKind, NoticeQueue};
use crate::store::TaskStore;

/// A status change applied locally and awaiting the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransition {
    /// Monotonic id used to correlate log lines.
    pub ticket: u64,
    pub task_id: TaskId,
    /// Status to restore on failure.
    pub from: TaskStatus,
    pub to: TaskStatus,
    /// Store version stamped by the optimistic apply.
    pub version: u64,
}

/// Result of [`TaskBoard::begin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginOutcome {
    /// Applied locally; dispatch to the gateway.
    Pending(PendingTransition),
    /// Source and target are equal; nothing to do.
    NoOp,
    /// The task is not on the board; a refresh was requested.
    NotFound,
    /// The task no longer has the status the move was based on.
    Stale {
        /// Status the task has now.
        current: TaskStatus,
    },
}

/// Result of [`TaskBoard::settle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// The backend accepted the change.
    Confirmed,
    /// The change was reverted and the user notified.
    RolledBack(Notice),
    /// A newer change to the task stands; the failure was ignored.
    Superseded,
    /// The task disappeared meanwhile; a refresh was requested.
    Orphaned,
}

/// Board state owned by the UI loop.
#[derive(Debug)]
pub struct TaskBoard {
    store: TaskStore,
    drag: DragController,
    notices: NoticeQueue,
    needs_refresh: bool,
    next_ticket: u64,
}

impl TaskBoard {
    /// Wraps `store`, keeping at most `max_notices` notices.
    #[must_use]
    pub fn new(store: TaskStore, max_notices: usize) -> Self {
        Self {
            store,
            drag: DragController::new(),
            notices: NoticeQueue::new(max_notices),
            needs_refresh: false,
            next_ticket: 0,
        }
    }

    #[must_use]
    pub const fn store(&self) -> &TaskStore {
        &self.store
    }

    #[must_use]
    pub const fn drag(&self) -> &DragController {
        &self.drag
    }

    #[must_use]
    pub const fn notices(&self) -> &NoticeQueue {
        &self.notices
    }

    pub const fn notices_mut(&mut self) -> &mut NoticeQueue {
        &mut self.notices
    }

    /// Projects the current store for display.
    #[must_use]
    pub fn project(&self, search_query: &str) -> Board<'_> {
        board::project(self.store.get_all(), search_query)
    }

    /// Feeds a gesture event through the drag controller and applies the
    /// resulting intent.
    ///
    /// Reorders are applied locally. A status change is applied
    /// optimistically and returned for dispatch to the gateway.
    ///
    /// # Errors
    ///
    /// Returns [`DragError::UnknownTask`] if a drag starts on a task not on
    /// the board.
    pub fn handle_drag(&mut self, event: DragEvent) -> Result<Option<PendingTransition>, DragError> {
        match self.drag.handle(event, &self.store)? {
            None => Ok(None),
            Some(Intent::Reorder { task_id, over }) => {
                if let Err(e) = self.store.reorder(&task_id, &over) {
                    tracing::warn!(task_id = %task_id, err = %e, "reorder dropped");
                }
                Ok(None)
            }
            Some(Intent::StatusChange(change)) => match self.begin(change) {
                BeginOutcome::Pending(pending) => Ok(Some(pending)),
                BeginOutcome::NoOp | BeginOutcome::NotFound | BeginOutcome::Stale { .. } => {
                    Ok(None)
                }
            },
        }
    }

    /// Applies a status change to the store ahead of confirmation.
    pub fn begin(&mut self, change: StatusChange) -> BeginOutcome {
        let StatusChange { task_id, from, to } = change;
        if from == to {
            return BeginOutcome::NoOp;
        }
        let Some(current) = self.store.status_of(&task_id) else {
            tracing::warn!(task_id = %task_id, "status change for task not on board");
            self.needs_refresh = true;
            return BeginOutcome::NotFound;
        };
        if current != from {
            tracing::info!(
                task_id = %task_id,
                expected = %from,
                current = %current,
                "stale status change, not sent"
            );
            let title = self.title_of(&task_id);
            self.notices
                .push(task_id, title, from, to, NoticeKind::Stale);
            return BeginOutcome::Stale { current };
        }

        if let Err(e) = self.store.apply_status_change(&task_id, to) {
            // Presence was checked above.
            tracing::warn!(task_id = %task_id, err = %e, "optimistic apply failed");
            self.needs_refresh = true;
            return BeginOutcome::NotFound;
        }
        let Some(version) = self.store.version(&task_id) else {
            self.needs_refresh = true;
            return BeginOutcome::NotFound;
        };
        self.next_ticket += 1;
        let pending = PendingTransition {
            ticket: self.next_ticket,
            task_id,
            from,
            to,
            version,
        };
        tracing::info!(
            ticket = pending.ticket,
            task_id = %pending.task_id,
            from = %from,
            to = %to,
            version,
            "optimistic status change applied"
        );
        BeginOutcome::Pending(pending)
    }

    /// Reconciles the board with the gateway's answer for `pending`.
    pub fn settle(
        &mut self,
        pending: &PendingTransition,
        result: Result<(), TransitionError>,
    ) -> Settlement {
        let err = match result {
            Ok(()) => {
                tracing::info!(ticket = pending.ticket, task_id = %pending.task_id, "status change confirmed");
                self.reconcile_confirmed(pending);
                return Settlement::Confirmed;
            }
            Err(err) => err,
        };

        match self.store.version(&pending.task_id) {
            None => {
                tracing::warn!(
                    ticket = pending.ticket,
                    task_id = %pending.task_id,
                    err = %err,
                    "failed task no longer on board"
                );
                self.needs_refresh = true;
                Settlement::Orphaned
            }
            Some(version) if version != pending.version => {
                tracing::info!(
                    ticket = pending.ticket,
                    task_id = %pending.task_id,
                    issued = pending.version,
                    current = version,
                    err = %err,
                    "rollback superseded by newer change"
                );
                Settlement::Superseded
            }
            Some(_) => self.roll_back(pending, &err),
        }
    }

    /// Catches the board up when a refresh replaced the optimistic state
    /// before the confirmation arrived.
    fn reconcile_confirmed(&mut self, pending: &PendingTransition) {
        let snapshot = self.store.snapshot_version();
        if pending.version > snapshot {
            return;
        }
        let Some(version) = self.store.version(&pending.task_id) else {
            tracing::info!(ticket = pending.ticket, task_id = %pending.task_id, "confirmed task missing from snapshot");
            self.needs_refresh = true;
            return;
        };
        if version > snapshot {
            // Moved again after the refresh.
            return;
        }
        match self.store.status_of(&pending.task_id) {
            Some(status) if status == pending.to => {}
            Some(status) if status == pending.from => {
                if let Err(e) = self.store.apply_status_change(&pending.task_id, pending.to) {
                    tracing::warn!(task_id = %pending.task_id, err = %e, "reapply failed");
                    self.needs_refresh = true;
                    return;
                }
                tracing::info!(
                    ticket = pending.ticket,
                    task_id = %pending.task_id,
                    to = %pending.to,
                    "confirmed status reapplied over older snapshot"
                );
            }
            _ => {
                tracing::info!(ticket = pending.ticket, task_id = %pending.task_id, "snapshot disagrees with confirmation");
                self.needs_refresh = true;
            }
        }
    }

    fn roll_back(&mut self, pending: &PendingTransition, err: &TransitionError) -> Settlement {
        if let Err(e) = self
            .store
            .apply_status_change(&pending.task_id, pending.from)
        {
            tracing::warn!(task_id = %pending.task_id, err = %e, "rollback failed");
            self.needs_refresh = true;
            return Settlement::Orphaned;
        }
        // The backend state is unknown or differs from ours.
        if matches!(err, TransitionError::Conflict { .. } | TransitionError::Timeout) {
            self.needs_refresh = true;
        }
        tracing::warn!(
            ticket = pending.ticket,
            task_id = %pending.task_id,
            from = %pending.to,
            to = %pending.from,
            err = %err,
            "status change rolled back"
        );
        let title = self.title_of(&pending.task_id);
        let id = self.notices.push(
            pending.task_id.clone(),
            title,
            pending.from,
            pending.to,
            NoticeKind::from(err),
        );
        match self.notices.iter().find(|n| n.id == id) {
            Some(notice) => Settlement::RolledBack(notice.clone()),
            None => Settlement::Superseded,
        }
    }

    /// Replaces the board with a fresh snapshot from the backend.
    ///
    /// Every task receives a new version, so failures of calls issued
    /// before the refresh no longer roll anything back.
    pub fn refresh(&mut self, tasks: Vec<Task>) {
        tracing::info!(count = tasks.len(), "board refreshed");
        self.drag.cancel();
        self.store.replace_all(tasks);
        self.needs_refresh = false;
    }

    /// Returns and clears the pending refresh request.
    pub fn take_refresh_request(&mut self) -> bool {
        std::mem::take(&mut self.needs_refresh)
    }

    fn title_of(&self, task_id: &TaskId) -> String {
        self.store
            .get(task_id)
            .map_or_else(|| task_id.to_string(), |t| t.title.clone())
    }
}
