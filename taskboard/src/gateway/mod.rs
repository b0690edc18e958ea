//! Status transition gateway: persists status changes against the backend.
//!
//! Defines the [`StatusGateway`] trait the optimistic coordinator talks to.
//! Concrete implementations include:
//! - [`loopback::LoopbackGateway`] -- in-process table for offline mode and tests
//! - [`remote::RemoteGateway`] -- WebSocket client for `taskboard-server`

pub mod loopback;
pub mod remote;

use taskboard_proto::task::{Task, TaskId, TaskStatus};
use taskboard_proto::transition::TransitionOutcome;

/// Typed failures of a transition request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// The request could not reach the backend.
    #[error("network error: {0}")]
    Network(String),
    /// The request was sent but no reply arrived in time; the backend may
    /// or may not have applied it.
    #[error("no reply from the task server in time")]
    Timeout,
    /// The task's status changed concurrently since it was read.
    #[error("conflict: task status changed concurrently")]
    Conflict {
        /// Backend's current status, when reported.
        current: Option<TaskStatus>,
    },
    /// The backend rejected the target status.
    #[error("rejected: {0}")]
    Validation(String),
}

/// Maps a server decision onto the gateway result.
///
/// # Errors
///
/// Returns [`TransitionError::Conflict`] or [`TransitionError::Validation`]
/// for the corresponding outcomes.
pub fn outcome_result(outcome: TransitionOutcome) -> Result<(), TransitionError> {
    match outcome {
        TransitionOutcome::Applied => Ok(()),
        TransitionOutcome::Conflict { current } => Err(TransitionError::Conflict {
            current: Some(current),
        }),
        TransitionOutcome::Rejected { reason } => Err(TransitionError::Validation(reason)),
    }
}

/// Async collaborator that validates and persists status changes.
///
/// The call is the single suspension point of a drag: callers apply the
/// optimistic change first and must never block the UI loop on it.
///
/// # Precondition
///
/// `old != new`. Implementations assert it; callers must not invoke the
/// gateway for no-op moves.
pub trait StatusGateway: Send + Sync {
    /// Requests that `task_id` move from `old` to `new`.
    fn request_transition(
        &self,
        task_id: &TaskId,
        old: TaskStatus,
        new: TaskStatus,
    ) -> impl std::future::Future<Output = Result<(), TransitionError>> + Send;

    /// Fetches the backend's full task list, in board order.
    fn fetch_tasks(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Task>, TransitionError>> + Send;

    /// Short description for the status bar.
    fn describe(&self) -> String;
}
