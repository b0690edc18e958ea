//! Drag session controller.
//!
//! Turns pointer- or keyboard-level drag gestures into at most one intent
//! per gesture. The controller only reads the store to learn a task's
//! source column; applying intents is the caller's job.
//!
//! ```text
//!            Start(id)                 Over(s)  (last value wins)
//!   Idle ─────────────────▶ Dragging ◀───────┐
//!    ▲                         │  └───────────┘
//!    └──── Drop / Cancel ──────┘
//! ```

use taskboard_proto::task::{TaskId, TaskStatus};

use crate::store::TaskStore;

/// Errors raised by the drag controller.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DragError {
    /// A drag started on a task the store does not hold.
    #[error("cannot drag unknown task: {0}")]
    UnknownTask(TaskId),
}

/// What the pointer was released over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// An empty area of a column.
    Column(TaskStatus),
    /// Another card.
    Task(TaskId),
}

/// Gesture events fed to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragEvent {
    /// Pointer picked up a card.
    Start(TaskId),
    /// Pointer moved; `None` when it is over no valid drop target.
    Over(Option<TaskStatus>),
    /// Pointer released; `None` when released outside any target.
    Drop(Option<DropTarget>),
    /// Gesture aborted (escape key, focus loss).
    Cancel,
}

/// A column-to-column move requested by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    /// Task being moved.
    pub task_id: TaskId,
    /// Status the task had when the drag started.
    pub from: TaskStatus,
    /// Column it was dropped on.
    pub to: TaskStatus,
}

/// Result of a completed gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Move a task to another column; must be confirmed by the gateway.
    StatusChange(StatusChange),
    /// Move a task within its column; local only.
    Reorder {
        /// Task being moved.
        task_id: TaskId,
        /// Card it was dropped on.
        over: TaskId,
    },
}

/// State of an in-progress gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession {
    /// Task being dragged.
    pub task_id: TaskId,
    /// Column the drag started in.
    pub source: TaskStatus,
    /// Column currently under the pointer.
    pub candidate: Option<TaskStatus>,
    /// Whether the pointer is over a valid drop target.
    pub colliding: bool,
}

/// Controller state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragState {
    /// No gesture in progress.
    #[default]
    Idle,
    /// A card is being dragged.
    Dragging(DragSession),
}

/// Drives [`DragState`] from [`DragEvent`]s.
#[derive(Debug, Default)]
pub struct DragController {
    state: DragState,
}

impl DragController {
    /// Creates an idle controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &DragState {
        &self.state
    }

    /// Active session, if dragging.
    #[must_use]
    pub const fn session(&self) -> Option<&DragSession> {
        match &self.state {
            DragState::Idle => None,
            DragState::Dragging(session) => Some(session),
        }
    }

    /// Whether a gesture is in progress.
    #[must_use]
    pub const fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    /// Dispatches an event to the matching transition.
    ///
    /// # Errors
    ///
    /// Returns [`DragError::UnknownTask`] if a drag starts on a task the
    /// store does not hold.
    pub fn handle(
        &mut self,
        event: DragEvent,
        store: &TaskStore,
    ) -> Result<Option<Intent>, DragError> {
        match event {
            DragEvent::Start(task_id) => self.start(task_id, store).map(|()| None),
            DragEvent::Over(candidate) => {
                self.over(candidate);
                Ok(None)
            }
            DragEvent::Drop(target) => Ok(self.drop(target, store)),
            DragEvent::Cancel => {
                self.cancel();
                Ok(None)
            }
        }
    }

    /// Picks up a card, recording its current column as the source.
    ///
    /// A stale session left over from an unfinished gesture is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`DragError::UnknownTask`] if the store does not hold the task.
    pub fn start(&mut self, task_id: TaskId, store: &TaskStore) -> Result<(), DragError> {
        if let DragState::Dragging(stale) = &self.state {
            tracing::debug!(task_id = %stale.task_id, "discarding stale drag session");
        }
        self.state = DragState::Idle;
        let source = store
            .status_of(&task_id)
            .ok_or_else(|| DragError::UnknownTask(task_id.clone()))?;
        tracing::debug!(task_id = %task_id, source = %source, "drag started");
        self.state = DragState::Dragging(DragSession {
            task_id,
            source,
            candidate: Some(source),
            colliding: true,
        });
        Ok(())
    }

    /// Updates the column under the pointer. Ignored when idle.
    pub fn over(&mut self, candidate: Option<TaskStatus>) {
        if let DragState::Dragging(session) = &mut self.state {
            session.candidate = candidate;
            session.colliding = candidate.is_some();
        }
    }

    /// Releases the card and ends the gesture.
    ///
    /// Returns the intent for a genuine move, or `None` for a no-op drop, a
    /// drop outside any target, or a drop while idle.
    pub fn drop(&mut self, target: Option<DropTarget>, store: &TaskStore) -> Option<Intent> {
        let DragState::Dragging(session) = std::mem::take(&mut self.state) else {
            return None;
        };
        let intent = match target? {
            DropTarget::Column(status) => column_move(&session, status),
            DropTarget::Task(over) if over == session.task_id => None,
            DropTarget::Task(over) => match store.status_of(&over) {
                Some(status) if status == session.source => Some(Intent::Reorder {
                    task_id: session.task_id.clone(),
                    over,
                }),
                Some(status) => column_move(&session, status),
                None => {
                    tracing::debug!(over = %over, "dropped on unknown task, ignoring");
                    None
                }
            },
        };
        tracing::debug!(task_id = %session.task_id, ?intent, "drag finished");
        intent
    }

    /// Aborts the gesture without emitting anything.
    pub fn cancel(&mut self) {
        if let DragState::Dragging(session) = std::mem::take(&mut self.state) {
            tracing::debug!(task_id = %session.task_id, "drag cancelled");
        }
    }
}

fn column_move(session: &DragSession, to: TaskStatus) -> Option<Intent> {
    (to != session.source).then(|| {
        Intent::StatusChange(StatusChange {
            task_id: session.task_id.clone(),
            from: session.source,
            to,
        })
    })
}
