//! Wire messages between board clients and the task server.
//!
//! The protocol is request/response over a single WebSocket. Every request
//! carries a [`RequestId`] that the server echoes so the client can
//! correlate replies with in-flight calls.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::task::{Task, TaskId, TaskStatus};

/// Correlates a reply with the request that produced it (UUID v7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new time-ordered request identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request to move a task from one status to another.
///
/// `expected` is the status the client believed current when the drag
/// started; the server uses it to detect lost updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    /// Correlation id.
    pub request_id: RequestId,
    /// Task being moved.
    pub task_id: TaskId,
    /// Status the client read before the move.
    pub expected: TaskStatus,
    /// Desired new status.
    pub target: TaskStatus,
}

/// Server decision for a [`TransitionRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionOutcome {
    /// The transition was persisted.
    Applied,
    /// The task's status changed concurrently; `current` is the server's view.
    Conflict {
        /// Status held by the server.
        current: TaskStatus,
    },
    /// The server refused the transition (locked, unknown task, ...).
    Rejected {
        /// Human-readable reason.
        reason: String,
    },
}

/// Every frame exchanged on the board socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoardMessage {
    /// Client asks for the full task list.
    FetchBoard {
        /// Correlation id.
        request_id: RequestId,
    },
    /// Server sends the full task list.
    Board {
        /// Echo of the `FetchBoard` id.
        request_id: RequestId,
        /// All tasks, in board order.
        tasks: Vec<Task>,
    },
    /// Client requests a status transition.
    Transition(TransitionRequest),
    /// Server answers a transition.
    TransitionReply {
        /// Echo of the request id.
        request_id: RequestId,
        /// Decision.
        outcome: TransitionOutcome,
    },
    /// Server reports a protocol-level failure.
    Error {
        /// Id of the offending request, when it could be decoded.
        request_id: Option<RequestId>,
        /// Human-readable description.
        reason: String,
    },
}

impl BoardMessage {
    /// Correlation id carried by this message, if any.
    #[must_use]
    pub const fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::FetchBoard { request_id }
            | Self::Board { request_id, .. }
            | Self::TransitionReply { request_id, .. } => Some(*request_id),
            Self::Transition(req) => Some(req.request_id),
            Self::Error { request_id, .. } => *request_id,
        }
    }
}
